//! A vault addressed by a bare relative file name.
//!
//! Changing the working directory affects the whole process, so this
//! lives in its own test binary with a single test.

use rmail::crypto::MasterKey;
use rmail::vault::{SecretVault, VaultSnapshot};
use tempfile::TempDir;

#[test]
fn bare_file_name_reads_what_it_wrote() {
    let dir = TempDir::new().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();
    let key = MasterKey::new([4u8; 32]);

    SecretVault::new("./secrets.enc", &key)
        .unwrap()
        .set("example.com", "me", Some("pw"))
        .unwrap();

    let bare = SecretVault::new("secrets.enc", &key).unwrap();
    assert_eq!(bare.get("example.com", "me").unwrap().unwrap().as_str(), "pw");
    assert!(matches!(bare.snapshot().unwrap(), VaultSnapshot::Loaded(_)));

    bare.set("example.com", "other", Some("pw2")).unwrap();
    assert_eq!(bare.entries().unwrap().len(), 2);
    assert!(dir.path().join("secrets.enc").is_file());
}
