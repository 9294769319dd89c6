//! Mail module: composing MIME messages and delivering them over SMTP.
//!
//! This module provides:
//! - `MessageComposer` and HTML → text extraction (`composer`)
//! - The SMTP `DeliveryEngine` state machine (`delivery`)
//! - The end-to-end send orchestration (`pipeline`)

pub mod composer;
pub mod delivery;
pub mod pipeline;

pub use composer::{html_to_text, mailbox, ComposedMessage, MessageComposer};
pub use delivery::{
    ConfiguredVault, CredentialSource, DeliveryEngine, DeliveryReport, DeliveryState, Endpoint,
    LettreConnector, SmtpConnector, SmtpSession,
};
pub use pipeline::{BodySource, PreparedSend, SendPipeline, SendRequest};
