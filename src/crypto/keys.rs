//! Master key handling and HKDF-SHA256 sub-key derivation.
//!
//! The vault is unlocked by a single 32-byte symmetric key supplied
//! through an environment variable.  The variable may hold the key as
//! URL-safe base64 (the format `r-mail key generate` prints), standard
//! base64, or the raw 32 bytes.
//!
//! The key that actually encrypts the vault is derived from the master
//! key with HKDF so the raw master key never touches AES directly.

use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::errors::{RmailError, Result};

/// Length of the master key and derived sub-keys (256 bits).
pub const KEY_LEN: usize = 32;

/// HKDF context string for the vault encryption key.
const VAULT_KEY_INFO: &[u8] = b"rmail-vault-key:v1";

/// A wrapper around a 32-byte master key that automatically zeroes
/// its memory when dropped.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    /// Create a new `MasterKey` from raw bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Generate a fresh random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rng().fill_bytes(&mut bytes);
        let key = Self::new(bytes);
        bytes.zeroize();
        key
    }

    /// Parse a key from its textual form.
    ///
    /// Accepts URL-safe base64 (padded or not), standard base64, or a
    /// raw 32-byte string, in that order.
    pub fn parse(encoded: &str) -> Result<Self> {
        let trimmed = encoded.trim();
        if trimmed.is_empty() {
            return Err(RmailError::InvalidMasterKey("key is empty".into()));
        }

        let decoded = URL_SAFE
            .decode(trimmed)
            .or_else(|_| URL_SAFE_NO_PAD.decode(trimmed))
            .or_else(|_| STANDARD.decode(trimmed))
            .ok()
            .filter(|bytes| bytes.len() == KEY_LEN)
            .map(Zeroizing::new);

        let candidate = match decoded {
            Some(bytes) => bytes,
            None if trimmed.len() == KEY_LEN => Zeroizing::new(trimmed.as_bytes().to_vec()),
            None => {
                return Err(RmailError::InvalidMasterKey(format!(
                    "expected {KEY_LEN} bytes as base64 or raw text"
                )))
            }
        };

        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&candidate);
        let key = Self::new(bytes);
        bytes.zeroize();
        Ok(key)
    }

    /// Read the key from the environment variable `var`.
    ///
    /// A missing or empty variable is a configuration error; the vault
    /// never falls back to running unencrypted.
    pub fn from_env(var: &str) -> Result<Self> {
        let value = Zeroizing::new(std::env::var(var).unwrap_or_default());
        if value.trim().is_empty() {
            return Err(RmailError::MissingMasterKey(var.to_string()));
        }
        Self::parse(&value)
    }

    /// URL-safe base64 form, suitable for an `export` line.
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(URL_SAFE.encode(self.bytes))
    }

    /// Access the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Derive the key used to seal the vault blob.
    pub fn derive_vault_key(&self) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        hkdf_derive(&self.bytes, VAULT_KEY_INFO)
    }
}

/// Internal helper: run HKDF-SHA256 expand with the given `info`.
fn hkdf_derive(ikm: &[u8], info: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let hk = Hkdf::<Sha256>::new(None, ikm);

    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(info, &mut okm[..])
        .map_err(|e| RmailError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_roundtrips_through_base64() {
        let key = MasterKey::generate();
        let parsed = MasterKey::parse(&key.to_base64()).unwrap();
        assert_eq!(key.as_bytes(), parsed.as_bytes());
    }

    #[test]
    fn parse_accepts_raw_32_byte_text() {
        let raw = "0123456789abcdef0123456789abcdef";
        let key = MasterKey::parse(raw).unwrap();
        assert_eq!(key.as_bytes(), raw.as_bytes());
    }

    #[test]
    fn parse_rejects_short_keys() {
        assert!(matches!(
            MasterKey::parse("c2hvcnQ="),
            Err(RmailError::InvalidMasterKey(_))
        ));
        assert!(MasterKey::parse("   ").is_err());
    }

    #[test]
    fn vault_key_differs_from_master_key() {
        let key = MasterKey::new([9u8; KEY_LEN]);
        let derived = key.derive_vault_key().unwrap();
        assert_ne!(&*derived, key.as_bytes());
        assert_eq!(*derived, *key.derive_vault_key().unwrap());
    }
}
