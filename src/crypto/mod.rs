//! Cryptographic primitives for r-mail.
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption (`encryption`)
//! - Master key parsing/generation and HKDF sub-key derivation (`keys`)

pub mod encryption;
pub mod keys;

pub use encryption::{open, seal};
pub use keys::MasterKey;
