//! Configuration: the resolved `AppConfig` and the read-only directory of
//! senders, domains, receivers and context profiles.

pub mod directory;
pub mod settings;

pub use directory::{
    ContextProfile, Directory, DomainEntry, Receiver, SecurityMode, SenderProfile,
};
pub use settings::{AppConfig, Settings};
