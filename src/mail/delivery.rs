//! SMTP delivery as an explicit state machine.
//!
//! ```text
//! Idle → Connected → [Secured] → [Authenticated] → Sent → Closed
//! ```
//!
//! - STARTTLS: plaintext connect, then upgrade in place.  A server that
//!   does not advertise STARTTLS is a transport error; there is no
//!   plaintext fallback.
//! - SSL: TLS from the first byte; `Connected` and `Secured` are reached
//!   together.
//! - NONE: no TLS and no authentication; the credential source is never
//!   consulted.
//!
//! The wire work sits behind [`SmtpConnector`] / [`SmtpSession`] so the
//! engine can be driven without a network.  [`LettreConnector`] is the
//! real implementation.

use std::fmt;
use std::time::Duration;

use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{SmtpConnection, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use lettre::Message;
use zeroize::Zeroizing;

use crate::config::{AppConfig, SecurityMode, SenderProfile};
use crate::errors::{RmailError, Result};
use crate::vault::SecretVault;

use super::composer::ComposedMessage;

// ---------------------------------------------------------------------------
// States and endpoints
// ---------------------------------------------------------------------------

/// Where a delivery is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Idle,
    Connected,
    Secured,
    Authenticated,
    Sent,
    Closed,
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Connected => "connected",
            Self::Secured => "secured",
            Self::Authenticated => "authenticated",
            Self::Sent => "sent",
            Self::Closed => "closed",
        })
    }
}

/// An SMTP server address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// Supplies SMTP passwords.
pub trait CredentialSource {
    /// Secret stored for `(service, account)`, if any.
    fn lookup(&self, service: &str, account: &str) -> Result<Option<Zeroizing<String>>>;
}

impl CredentialSource for SecretVault {
    fn lookup(&self, service: &str, account: &str) -> Result<Option<Zeroizing<String>>> {
        self.get(service, account)
    }
}

/// Opens the configured vault on first use, so that sends which never
/// authenticate don't need the master key.
pub struct ConfiguredVault<'a> {
    config: &'a AppConfig,
}

impl<'a> ConfiguredVault<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        Self { config }
    }
}

impl CredentialSource for ConfiguredVault<'_> {
    fn lookup(&self, service: &str, account: &str) -> Result<Option<Zeroizing<String>>> {
        SecretVault::open(self.config)?.get(service, account)
    }
}

/// One open SMTP conversation.  Errors are the server's or transport's
/// own description; the engine attaches the stage.
pub trait SmtpSession {
    /// Upgrade the plaintext connection to TLS.
    fn starttls(&mut self) -> std::result::Result<(), String>;
    fn authenticate(&mut self, user: &str, password: &str) -> std::result::Result<(), String>;
    fn send(&mut self, message: &Message) -> std::result::Result<(), String>;
    fn quit(&mut self) -> std::result::Result<(), String>;
}

/// Opens SMTP sessions.
pub trait SmtpConnector {
    /// Connect to `endpoint`.  With `implicit_tls` the TLS handshake is
    /// part of connecting.
    fn connect(
        &self,
        endpoint: &Endpoint,
        implicit_tls: bool,
    ) -> std::result::Result<Box<dyn SmtpSession>, String>;
}

// ---------------------------------------------------------------------------
// lettre-backed implementation
// ---------------------------------------------------------------------------

/// Real SMTP over lettre's blocking client, bounded by `timeout`.
#[derive(Debug, Clone)]
pub struct LettreConnector {
    timeout: Duration,
}

impl LettreConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

struct LettreSession {
    conn: SmtpConnection,
    host: String,
    client_id: ClientId,
}

impl SmtpConnector for LettreConnector {
    fn connect(
        &self,
        endpoint: &Endpoint,
        implicit_tls: bool,
    ) -> std::result::Result<Box<dyn SmtpSession>, String> {
        let client_id = ClientId::default();
        let tls = if implicit_tls {
            Some(TlsParameters::new(endpoint.host.clone()).map_err(|e| e.to_string())?)
        } else {
            None
        };

        let conn = SmtpConnection::connect(
            (endpoint.host.as_str(), endpoint.port),
            Some(self.timeout),
            &client_id,
            tls.as_ref(),
            None,
        )
        .map_err(|e| e.to_string())?;

        Ok(Box::new(LettreSession {
            conn,
            host: endpoint.host.clone(),
            client_id,
        }))
    }
}

impl SmtpSession for LettreSession {
    fn starttls(&mut self) -> std::result::Result<(), String> {
        if !self.conn.can_starttls() {
            return Err("server does not advertise STARTTLS".to_string());
        }
        let tls = TlsParameters::new(self.host.clone()).map_err(|e| e.to_string())?;
        self.conn
            .starttls(&tls, &self.client_id)
            .map_err(|e| e.to_string())
    }

    fn authenticate(&mut self, user: &str, password: &str) -> std::result::Result<(), String> {
        let credentials = Credentials::new(user.to_string(), password.to_string());
        self.conn
            .auth(&[Mechanism::Plain, Mechanism::Login], &credentials)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    fn send(&mut self, message: &Message) -> std::result::Result<(), String> {
        self.conn
            .send(message.envelope(), &message.formatted())
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    fn quit(&mut self) -> std::result::Result<(), String> {
        self.conn.quit().map(|_| ()).map_err(|e| e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// What happened during a successful delivery.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub endpoint: Endpoint,
    pub security: SecurityMode,
    /// Every state reached, starting with `Idle`.
    pub transitions: Vec<DeliveryState>,
    pub authenticated_as: Option<String>,
    /// Set when the final QUIT failed; the message was still accepted.
    pub close_error: Option<String>,
}

impl DeliveryReport {
    fn new(endpoint: Endpoint, security: SecurityMode) -> Self {
        Self {
            endpoint,
            security,
            transitions: vec![DeliveryState::Idle],
            authenticated_as: None,
            close_error: None,
        }
    }

    pub fn state(&self) -> DeliveryState {
        self.transitions
            .last()
            .copied()
            .unwrap_or(DeliveryState::Idle)
    }

    fn advance(&mut self, state: DeliveryState) {
        tracing::debug!(endpoint = %self.endpoint, from = %self.state(), to = %state, "smtp transition");
        self.transitions.push(state);
    }
}

/// Drives one message through the delivery state machine.  No retries.
pub struct DeliveryEngine<'a> {
    connector: &'a dyn SmtpConnector,
    credentials: &'a dyn CredentialSource,
}

impl<'a> DeliveryEngine<'a> {
    pub fn new(connector: &'a dyn SmtpConnector, credentials: &'a dyn CredentialSource) -> Self {
        Self {
            connector,
            credentials,
        }
    }

    /// Deliver `composed` through `sender`'s domain.
    ///
    /// Either the server accepted the whole message or an error is
    /// returned naming the stage that failed.
    pub fn deliver(
        &self,
        sender: &SenderProfile,
        composed: &ComposedMessage,
    ) -> Result<DeliveryReport> {
        let endpoint = Endpoint::new(sender.smtp_host.clone(), sender.smtp_port);
        let mode = sender.security_mode;
        let mut report = DeliveryReport::new(endpoint.clone(), mode);

        // Idle → Connected (→ Secured for SSL)
        let implicit_tls = mode == SecurityMode::Ssl;
        let mut session = self
            .connector
            .connect(&endpoint, implicit_tls)
            .map_err(|reason| transport_error(&endpoint, reason))?;
        report.advance(DeliveryState::Connected);
        if implicit_tls {
            report.advance(DeliveryState::Secured);
        }

        match self.converse(session.as_mut(), sender, composed, &mut report) {
            Ok(()) => {}
            Err(e) => {
                if let Err(reason) = session.quit() {
                    tracing::debug!(endpoint = %endpoint, %reason, "quit after failure also failed");
                }
                return Err(e);
            }
        }

        // Sent → Closed
        if let Err(reason) = session.quit() {
            tracing::warn!(endpoint = %endpoint, %reason, "failed to close SMTP session cleanly");
            report.close_error = Some(reason);
        }
        report.advance(DeliveryState::Closed);

        Ok(report)
    }

    fn converse(
        &self,
        session: &mut dyn SmtpSession,
        sender: &SenderProfile,
        composed: &ComposedMessage,
        report: &mut DeliveryReport,
    ) -> Result<()> {
        let endpoint = report.endpoint.clone();

        // Connected → Secured
        if sender.security_mode == SecurityMode::Starttls {
            session
                .starttls()
                .map_err(|reason| transport_error(&endpoint, reason))?;
            report.advance(DeliveryState::Secured);
        }

        // Secured → Authenticated
        if sender.security_mode.requires_auth() {
            let password = self
                .credentials
                .lookup(&sender.domain_name, &sender.smtp_user)?
                .ok_or_else(|| RmailError::MissingCredential {
                    domain: sender.domain_name.clone(),
                    user: sender.smtp_user.clone(),
                })?;

            session
                .authenticate(&sender.smtp_user, &password)
                .map_err(|reason| RmailError::AuthRejected {
                    endpoint: endpoint.to_string(),
                    user: sender.smtp_user.clone(),
                    reason,
                })?;
            report.authenticated_as = Some(sender.smtp_user.clone());
            report.advance(DeliveryState::Authenticated);
        }

        // Authenticated → Sent
        session
            .send(&composed.message)
            .map_err(|reason| RmailError::DeliveryRejected {
                endpoint: endpoint.to_string(),
                reason,
            })?;
        report.advance(DeliveryState::Sent);

        Ok(())
    }
}

fn transport_error(endpoint: &Endpoint, reason: String) -> RmailError {
    RmailError::TransportError {
        endpoint: endpoint.to_string(),
        reason,
    }
}
