//! High-level vault operations.
//!
//! `SecretVault` maps `(service, account)` to a secret.  Every call
//! reconstructs the full map from disk: mutations run load → apply one
//! change → save under an exclusive lock, reads run under a shared lock.
//! Nothing is cached between calls.

use std::path::{Path, PathBuf};

use zeroize::Zeroizing;

use crate::config::AppConfig;
use crate::crypto::keys::MasterKey;
use crate::errors::{RmailError, Result};

use super::format::{self, SecretMap};
use super::lock::VaultLock;

/// What was found on disk when the vault was loaded.
#[derive(Debug)]
pub enum VaultSnapshot {
    /// No vault file exists yet.  Safe to initialize.
    Empty,
    /// The file decrypted and parsed.
    Loaded(SecretMap),
}

impl VaultSnapshot {
    fn into_map(self) -> SecretMap {
        match self {
            Self::Empty => SecretMap::new(),
            Self::Loaded(map) => map,
        }
    }
}

/// The encrypted credential store.
pub struct SecretVault {
    /// Path to the encrypted vault file.
    path: PathBuf,

    /// Key that seals the vault blob (derived from the master key).
    vault_key: Zeroizing<[u8; 32]>,
}

impl SecretVault {
    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Build a vault handle for the file at `path`.
    ///
    /// Nothing is read until the first operation.
    pub fn new(path: impl Into<PathBuf>, master_key: &MasterKey) -> Result<Self> {
        Ok(Self {
            path: path.into(),
            vault_key: master_key.derive_vault_key()?,
        })
    }

    /// Build the vault described by `config`, reading the master key
    /// from its configured environment variable.
    pub fn open(config: &AppConfig) -> Result<Self> {
        let key = MasterKey::from_env(&config.master_key_env)?;
        Self::new(&config.vault_path, &key)
    }

    // ------------------------------------------------------------------
    // Secret operations
    // ------------------------------------------------------------------

    /// Look up the secret for `(service, account)`.
    pub fn get(&self, service: &str, account: &str) -> Result<Option<Zeroizing<String>>> {
        let mut secrets = self.snapshot()?.into_map();
        let secret = secrets
            .get_mut(service)
            .and_then(|accounts| accounts.remove(account))
            .map(Zeroizing::new);
        format::scrub(&mut secrets);
        Ok(secret)
    }

    /// Upsert the secret for `(service, account)`.
    ///
    /// `None` or an empty string deletes the entry instead; an account
    /// map left empty is dropped with it.
    pub fn set(&self, service: &str, account: &str, secret: Option<&str>) -> Result<()> {
        validate_part("service", service)?;
        validate_part("account", account)?;

        match secret.filter(|s| !s.is_empty()) {
            Some(value) => {
                self.mutate(|secrets| {
                    let previous = secrets
                        .entry(service.to_string())
                        .or_default()
                        .insert(account.to_string(), value.to_string());
                    if let Some(mut old) = previous {
                        zeroize::Zeroize::zeroize(&mut old);
                    }
                    true
                })?;
            }
            None => {
                self.delete(service, account)?;
            }
        }
        Ok(())
    }

    /// Remove the entry for `(service, account)`.
    ///
    /// Returns whether an entry existed.
    pub fn delete(&self, service: &str, account: &str) -> Result<bool> {
        self.mutate(|secrets| {
            let Some(accounts) = secrets.get_mut(service) else {
                return false;
            };
            let removed = accounts.remove(account);
            if accounts.is_empty() {
                secrets.remove(service);
            }
            match removed {
                Some(mut old) => {
                    zeroize::Zeroize::zeroize(&mut old);
                    true
                }
                None => false,
            }
        })
    }

    /// List every stored `(service, account)` pair, sorted.  No secret
    /// values are returned.
    pub fn entries(&self) -> Result<Vec<(String, String)>> {
        let mut secrets = self.snapshot()?.into_map();
        let entries = secrets
            .iter()
            .flat_map(|(service, accounts)| {
                accounts
                    .keys()
                    .map(move |account| (service.clone(), account.clone()))
            })
            .collect();
        format::scrub(&mut secrets);
        Ok(entries)
    }

    /// Load the whole vault under a shared lock.
    pub fn snapshot(&self) -> Result<VaultSnapshot> {
        let dir_exists = self.parent_dir().map_or(true, Path::exists);
        if !dir_exists {
            return Ok(VaultSnapshot::Empty);
        }

        let _lock = VaultLock::shared(&self.path)?;
        self.load()
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Run one read-modify-write cycle under the exclusive lock.
    ///
    /// `apply` returns whether it changed anything; unchanged maps are
    /// not rewritten.  A corrupt vault aborts before `apply` runs.
    fn mutate<F>(&self, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut SecretMap) -> bool,
    {
        if let Some(dir) = self.parent_dir() {
            format::ensure_private_dir(dir)?;
        }

        let _lock = VaultLock::exclusive(&self.path)?;
        let mut secrets = self.load()?.into_map();

        let changed = apply(&mut secrets);
        let result = if changed { self.save(&secrets) } else { Ok(()) };
        format::scrub(&mut secrets);
        result.map(|()| changed)
    }

    /// Read and decrypt the vault file.  The caller holds the lock.
    fn load(&self) -> Result<VaultSnapshot> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "vault file absent, starting empty");
                return Ok(VaultSnapshot::Empty);
            }
            Err(e) => return Err(e.into()),
        };

        let secrets =
            format::decode(&self.vault_key[..], &data).map_err(|reason| {
                RmailError::VaultCorrupt {
                    path: self.path.clone(),
                    reason,
                }
            })?;

        tracing::debug!(
            path = %self.path.display(),
            services = secrets.len(),
            "vault loaded"
        );
        Ok(VaultSnapshot::Loaded(secrets))
    }

    /// Encrypt and atomically replace the vault file.  The caller holds
    /// the exclusive lock.
    fn save(&self, secrets: &SecretMap) -> Result<()> {
        let blob = format::encode(&self.vault_key[..], secrets)?;
        format::write_atomic(&self.path, &blob)?;
        tracing::debug!(
            path = %self.path.display(),
            services = secrets.len(),
            "vault saved"
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Returns the path to the vault file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the vault file.  A bare file name has an empty
    /// parent, which means the current directory and is never checked.
    fn parent_dir(&self) -> Option<&Path> {
        self.path.parent().filter(|dir| !dir.as_os_str().is_empty())
    }
}

/// Service and account names must be non-empty and free of control
/// characters.
fn validate_part(label: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RmailError::CommandFailed(format!("{label} cannot be empty")));
    }
    if value.chars().any(char::is_control) {
        return Err(RmailError::CommandFailed(format!(
            "{label} '{}' contains control characters",
            value.escape_debug()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vault(dir: &TempDir) -> SecretVault {
        let key = MasterKey::new([5u8; 32]);
        SecretVault::new(dir.path().join("secrets.enc"), &key).unwrap()
    }

    #[test]
    fn delete_of_missing_entry_does_not_create_file() {
        let dir = TempDir::new().unwrap();
        let v = vault(&dir);
        assert!(!v.delete("example.com", "me").unwrap());
        assert!(!v.path().exists());
    }

    #[test]
    fn empty_service_map_is_dropped() {
        let dir = TempDir::new().unwrap();
        let v = vault(&dir);
        v.set("example.com", "me", Some("pw")).unwrap();
        v.set("example.com", "me", None).unwrap();
        assert!(v.entries().unwrap().is_empty());
    }

    #[test]
    fn rejects_blank_names() {
        let dir = TempDir::new().unwrap();
        let v = vault(&dir);
        assert!(v.set("", "me", Some("pw")).is_err());
        assert!(v.set("example.com", "  ", Some("pw")).is_err());
        assert!(v.set("example.com", "me\n", Some("pw")).is_err());
    }

    #[test]
    fn snapshot_of_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let key = MasterKey::new([5u8; 32]);
        let v = SecretVault::new(dir.path().join("nope").join("secrets.enc"), &key).unwrap();
        assert!(matches!(v.snapshot().unwrap(), VaultSnapshot::Empty));
        assert!(v.get("a", "b").unwrap().is_none());
    }
}
