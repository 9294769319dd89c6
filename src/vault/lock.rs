//! Advisory file lock around the vault's load → mutate → save cycle.
//!
//! The vault file itself is replaced by rename on every write, so the
//! lock lives on a sibling `<vault>.lock` file that is never renamed.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::errors::Result;

/// Held lock on the vault; released when dropped.
pub struct VaultLock {
    file: File,
    path: PathBuf,
}

impl VaultLock {
    /// Block until no other process holds any lock on the vault.
    pub fn exclusive(vault_path: &Path) -> Result<Self> {
        let (file, path) = open_lock_file(vault_path)?;
        FileExt::lock_exclusive(&file)?;
        tracing::trace!(lock = %path.display(), "acquired exclusive vault lock");
        Ok(Self { file, path })
    }

    /// Block until no other process holds an exclusive lock on the vault.
    pub fn shared(vault_path: &Path) -> Result<Self> {
        let (file, path) = open_lock_file(vault_path)?;
        FileExt::lock_shared(&file)?;
        tracing::trace!(lock = %path.display(), "acquired shared vault lock");
        Ok(Self { file, path })
    }

    /// Path of the lock file guarding `vault_path`.
    pub fn lock_path(vault_path: &Path) -> PathBuf {
        let mut name = vault_path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        vault_path.with_file_name(name)
    }
}

impl Drop for VaultLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(lock = %self.path.display(), error = %e, "failed to release vault lock");
        }
    }
}

fn open_lock_file(vault_path: &Path) -> Result<(File, PathBuf)> {
    let path = VaultLock::lock_path(vault_path);

    #[cfg(unix)]
    let file = {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o600)
            .open(&path)?
    };

    #[cfg(not(unix))]
    let file = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)?;

    Ok((file, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_path_is_a_sibling() {
        let path = Path::new("/home/me/.r-mail/secrets.enc");
        assert_eq!(
            VaultLock::lock_path(path),
            PathBuf::from("/home/me/.r-mail/secrets.enc.lock")
        );
    }

    #[test]
    fn shared_locks_coexist_and_release_on_drop() {
        let dir = TempDir::new().unwrap();
        let vault = dir.path().join("secrets.enc");

        let a = VaultLock::shared(&vault).unwrap();
        let b = VaultLock::shared(&vault).unwrap();
        drop(a);
        drop(b);

        let c = VaultLock::exclusive(&vault).unwrap();
        drop(c);
        assert!(VaultLock::lock_path(&vault).exists());
    }
}
