//! Vault module: encrypted SMTP credential storage.
//!
//! This module provides:
//! - The encrypted blob layout and atomic owner-only writes (`format`)
//! - The advisory lock guarding read-modify-write cycles (`lock`)
//! - `SecretVault`, the `(service, account) -> secret` store (`store`)

pub mod format;
pub mod lock;
pub mod store;

pub use format::SecretMap;
pub use lock::VaultLock;
pub use store::{SecretVault, VaultSnapshot};
