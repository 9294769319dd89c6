use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur in r-mail.
#[derive(Debug, Error)]
pub enum RmailError {
    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    #[error("Missing {0} environment variable — run `r-mail key generate` and export the key")]
    MissingMasterKey(String),

    #[error("Invalid master key: {0}")]
    InvalidMasterKey(String),

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed — wrong key or corrupted data")]
    DecryptionFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    // --- Vault errors ---
    #[error("Vault at {path} cannot be read ({reason}) — refusing to touch it; check RMAIL_MASTER_KEY")]
    VaultCorrupt { path: PathBuf, reason: String },

    // --- Directory lookups ---
    #[error("Sender alias '{0}' not found")]
    SenderNotFound(String),

    #[error("Receiver alias '{0}' not found")]
    ReceiverNotFound(String),

    #[error("Domain '{0}' not found")]
    DomainNotFound(String),

    #[error("Context profile '{0}' not found")]
    ContextNotFound(String),

    // --- Template errors ---
    #[error("Template '{name}' not found in {}", dir.display())]
    TemplateNotFound { name: String, dir: PathBuf },

    #[error("Invalid template name '{0}' — use a plain file name")]
    InvalidTemplateName(String),

    #[error("Template '{name}' has invalid front-matter: {reason}")]
    TemplateMetadata { name: String, reason: String },

    #[error("Template '{name}' failed to render: {reason}")]
    TemplateRender { name: String, reason: String },

    #[error("Missing value for template variable '{0}' (no terminal to prompt on; pass -S {0}=...)")]
    MissingVariable(String),

    #[error("Invalid override '{0}' — expected key=value")]
    InvalidOverride(String),

    #[error("Subject is required — pass --subject or add `subject` to the template front-matter")]
    MissingSubject,

    #[error("No message body — pass --body, --template, or pipe content on stdin")]
    MissingBody,

    // --- Composition errors ---
    #[error("Attachment {} cannot be read: {source}", path.display())]
    AttachmentUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build message: {0}")]
    MessageBuild(String),

    // --- Delivery errors ---
    #[error("Connection to {endpoint} failed: {reason}")]
    TransportError { endpoint: String, reason: String },

    #[error("No password found in vault for domain '{domain}' user '{user}' — run `r-mail vault set {domain} {user}`")]
    MissingCredential { domain: String, user: String },

    #[error("Authentication as '{user}' rejected by {endpoint}: {reason}")]
    AuthRejected {
        endpoint: String,
        user: String,
        reason: String,
    },

    #[error("Message rejected by {endpoint}: {reason}")]
    DeliveryRejected { endpoint: String, reason: String },

    // --- History errors ---
    #[error("History error: {0}")]
    HistoryError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),
}

impl RmailError {
    /// Short label for the stage an operation failed at.
    ///
    /// Stored in the history log and shown next to send failures.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::ConfigError(_) | Self::MissingMasterKey(_) | Self::InvalidMasterKey(_) => {
                "config"
            }
            Self::EncryptionFailed(_)
            | Self::DecryptionFailed
            | Self::KeyDerivationFailed(_)
            | Self::VaultCorrupt { .. } => "vault",
            Self::SenderNotFound(_)
            | Self::ReceiverNotFound(_)
            | Self::DomainNotFound(_)
            | Self::ContextNotFound(_) => "directory",
            Self::TemplateNotFound { .. }
            | Self::InvalidTemplateName(_)
            | Self::TemplateMetadata { .. }
            | Self::TemplateRender { .. } => "template",
            Self::MissingVariable(_)
            | Self::InvalidOverride(_)
            | Self::MissingSubject
            | Self::MissingBody => "context",
            Self::AttachmentUnreadable { .. } | Self::InvalidAddress(_) | Self::MessageBuild(_) => {
                "compose"
            }
            Self::TransportError { .. } => "connect",
            Self::MissingCredential { .. } => "credentials",
            Self::AuthRejected { .. } => "auth",
            Self::DeliveryRejected { .. } => "delivery",
            Self::HistoryError(_) => "history",
            Self::Io(_) | Self::SerializationError(_) => "io",
            Self::CommandFailed(_) => "cli",
        }
    }
}

/// Convenience type alias for r-mail results.
pub type Result<T> = std::result::Result<T, RmailError>;
