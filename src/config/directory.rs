//! Read-only sender / domain / receiver / context-profile lookups.
//!
//! The directory lives in `<app_dir>/directory.toml`:
//!
//! ```toml
//! [domains."example.com"]
//! smtp_host = "smtp.example.com"
//! smtp_port = 587
//! smtp_user = "me@example.com"
//! security = "STARTTLS"
//!
//! [senders.me]
//! full_name = "Me Myself"
//! email = "me@example.com"
//! domain = "example.com"
//!
//! [receivers.bob]
//! name = "Bob"
//! email = "bob@x.com"
//!
//! [contexts.launch]
//! description = "Product launch announcement"
//! template = "launch"
//! data = { product = "Widget", price = 42 }
//! ```
//!
//! Nothing here writes the file; it only hands rows to the send path.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{RmailError, Result};

/// SMTP transport-security strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SecurityMode {
    /// Plaintext connect, then upgrade in place.
    #[default]
    #[serde(rename = "STARTTLS", alias = "starttls")]
    Starttls,
    /// TLS from the first byte.
    #[serde(rename = "SSL", alias = "ssl", alias = "TLS", alias = "tls")]
    Ssl,
    /// No encryption and no authentication.
    #[serde(rename = "NONE", alias = "none")]
    None,
}

impl SecurityMode {
    /// Whether this mode authenticates with a vault password.
    pub fn requires_auth(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Starttls => "STARTTLS",
            Self::Ssl => "SSL",
            Self::None => "NONE",
        })
    }
}

impl FromStr for SecurityMode {
    type Err = RmailError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STARTTLS" => Ok(Self::Starttls),
            "SSL" | "TLS" => Ok(Self::Ssl),
            "NONE" => Ok(Self::None),
            other => Err(RmailError::ConfigError(format!(
                "unknown security mode '{other}' (expected STARTTLS, SSL or NONE)"
            ))),
        }
    }
}

/// SMTP settings for one sending domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEntry {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_user: String,
    #[serde(default)]
    pub security: SecurityMode,
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderEntry {
    pub full_name: String,
    pub email: String,
    pub domain: String,
}

/// A resolved recipient.  `name` is empty for raw addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receiver {
    #[serde(default)]
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub data: toml::Table,
}

/// A sender joined with its domain's SMTP settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderProfile {
    pub alias: String,
    pub full_name: String,
    pub email: String,
    pub domain_name: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub security_mode: SecurityMode,
}

/// A saved variable set, flattened to strings in file order.
#[derive(Debug, Clone, Default)]
pub struct ContextProfile {
    pub name: String,
    pub description: Option<String>,
    pub template: Option<String>,
    pub data: IndexMap<String, String>,
}

/// The parsed `directory.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Directory {
    #[serde(default)]
    pub domains: BTreeMap<String, DomainEntry>,
    #[serde(default)]
    pub senders: BTreeMap<String, SenderEntry>,
    #[serde(default)]
    pub receivers: BTreeMap<String, Receiver>,
    #[serde(default)]
    pub contexts: BTreeMap<String, ContextEntry>,
}

impl Directory {
    /// File name inside the app directory.
    pub const FILE_NAME: &'static str = "directory.toml";

    /// Load the directory; a missing file is an empty directory.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no directory file, using empty directory");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
            .map_err(|e| RmailError::ConfigError(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Parse directory TOML.
    pub fn parse(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Resolve a receiver argument.
    ///
    /// Anything containing `@` is taken as a raw address with an empty
    /// name; everything else is an alias.
    pub fn resolve_receiver(&self, input: &str) -> Result<Receiver> {
        let input = input.trim();
        if input.contains('@') {
            return Ok(Receiver {
                name: String::new(),
                email: input.to_string(),
            });
        }

        self.receivers
            .get(input)
            .cloned()
            .ok_or_else(|| RmailError::ReceiverNotFound(input.to_string()))
    }

    /// Look up a sender alias and join it with its domain.
    pub fn sender(&self, alias: &str) -> Result<SenderProfile> {
        let sender = self
            .senders
            .get(alias)
            .ok_or_else(|| RmailError::SenderNotFound(alias.to_string()))?;
        let domain = self.domain(&sender.domain)?;

        Ok(SenderProfile {
            alias: alias.to_string(),
            full_name: sender.full_name.clone(),
            email: sender.email.clone(),
            domain_name: sender.domain.clone(),
            smtp_host: domain.smtp_host.clone(),
            smtp_port: domain.smtp_port,
            smtp_user: domain.smtp_user.clone(),
            security_mode: domain.security,
        })
    }

    pub fn domain(&self, name: &str) -> Result<&DomainEntry> {
        self.domains
            .get(name)
            .ok_or_else(|| RmailError::DomainNotFound(name.to_string()))
    }

    /// Look up a context profile, converting scalar values to strings.
    pub fn context_profile(&self, name: &str) -> Result<ContextProfile> {
        let entry = self
            .contexts
            .get(name)
            .ok_or_else(|| RmailError::ContextNotFound(name.to_string()))?;

        let mut data = IndexMap::with_capacity(entry.data.len());
        for (key, value) in &entry.data {
            data.insert(key.clone(), scalar_to_string(name, key, value)?);
        }

        Ok(ContextProfile {
            name: name.to_string(),
            description: entry.description.clone(),
            template: entry.template.clone(),
            data,
        })
    }
}

fn scalar_to_string(profile: &str, key: &str, value: &toml::Value) -> Result<String> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        toml::Value::Datetime(d) => Ok(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => Err(RmailError::ConfigError(format!(
            "context '{profile}': value for '{key}' must be a string, number or boolean"
        ))),
    }
}
