//! Vault file format and atomic owner-only writes.
//!
//! A vault file has this layout:
//!
//! ```text
//! [RMVT: 4 bytes][version: 1 byte][nonce: 12 bytes][AES-256-GCM ciphertext + tag]
//! ```
//!
//! - **Magic** (`RMVT`): identifies the file as an r-mail vault.
//! - **Version**: format version (currently `1`).
//! - The ciphertext is the JSON object `service -> { account: secret }`.
//!   The 5-byte prefix is authenticated as associated data, so a file
//!   with a rewritten version byte fails to open.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use zeroize::{Zeroize, Zeroizing};

use crate::crypto::encryption::{open, seal};
use crate::errors::{RmailError, Result};

/// Magic bytes at the start of every vault file.
const MAGIC: &[u8; 4] = b"RMVT";

/// Current format version.
pub const CURRENT_VERSION: u8 = 1;

/// Fixed-size prefix: 4 (magic) + 1 (version).
const PREFIX_LEN: usize = 5;

/// The decrypted vault contents: service -> (account -> secret).
///
/// `BTreeMap` keeps the serialized JSON deterministic.
pub type SecretMap = BTreeMap<String, BTreeMap<String, String>>;

/// Overwrite every secret value in place before the map is dropped.
pub fn scrub(secrets: &mut SecretMap) {
    for accounts in secrets.values_mut() {
        for secret in accounts.values_mut() {
            secret.zeroize();
        }
    }
}

/// Serialize and encrypt `secrets` into a complete vault blob.
pub fn encode(key: &[u8], secrets: &SecretMap) -> Result<Vec<u8>> {
    let json = Zeroizing::new(
        serde_json::to_vec(secrets)
            .map_err(|e| RmailError::SerializationError(format!("vault payload: {e}")))?,
    );

    let mut prefix = [0u8; PREFIX_LEN];
    prefix[..4].copy_from_slice(MAGIC);
    prefix[4] = CURRENT_VERSION;

    let sealed = seal(key, &json, &prefix)?;

    let mut buf = Vec::with_capacity(PREFIX_LEN + sealed.len());
    buf.extend_from_slice(&prefix);
    buf.extend_from_slice(&sealed);
    Ok(buf)
}

/// Decrypt and deserialize a vault blob.
///
/// On failure returns a human-readable reason; the caller attaches the
/// file path and reports it as `VaultCorrupt`.
pub fn decode(key: &[u8], data: &[u8]) -> std::result::Result<SecretMap, String> {
    if data.len() < PREFIX_LEN {
        return Err("file too small to be a vault".into());
    }

    let (prefix, sealed) = data.split_at(PREFIX_LEN);
    if &prefix[..4] != MAGIC {
        return Err("missing RMVT magic bytes".into());
    }
    if prefix[4] != CURRENT_VERSION {
        return Err(format!(
            "unsupported version {}, expected {CURRENT_VERSION}",
            prefix[4]
        ));
    }

    let plaintext = Zeroizing::new(
        open(key, sealed, prefix)
            .map_err(|_| "authentication failed (wrong master key or tampered file)".to_string())?,
    );

    serde_json::from_slice(&plaintext).map_err(|e| format!("payload is not a secret map: {e}"))
}

/// Create `dir` (and parents) if absent, restricted to the owner.
pub fn ensure_private_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(dir)?;
    }

    #[cfg(not(unix))]
    fs::create_dir_all(dir)?;

    Ok(())
}

/// Write `bytes` to `path` **atomically** with owner-only permissions.
///
/// 1. Write to a 0600 temp file in the same directory.
/// 2. fsync it.
/// 3. Rename it over the target path.
///
/// The rename ensures readers never see a half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp_path = temp_path_for(path);

    let written = write_private_file(&tmp_path, bytes).and_then(|()| {
        fs::rename(&tmp_path, path)?;
        Ok(())
    });
    if written.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    written?;

    restrict_permissions(path)
}

/// Set a file's permissions to owner read/write only.
pub fn restrict_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    #[cfg(not(unix))]
    let _ = path;

    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!(
        ".{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id()
    ))
}

fn write_private_file(path: &Path, bytes: &[u8]) -> Result<()> {
    #[cfg(unix)]
    let mut file = {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?
    };

    #[cfg(not(unix))]
    let mut file = fs::File::create(path)?;

    restrict_permissions(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}
