//! `r-mail key generate`: print a fresh master key.
//!
//! The key is a URL-safe base64 encoding of 32 random bytes (the same
//! shape as a Fernet key).  Nothing is written to disk; the user puts the
//! `export` line into their shell profile.

use crate::cli::output;
use crate::cli::{app_config, Cli};
use crate::crypto::MasterKey;
use crate::errors::Result;

/// Execute the `key generate` command.
pub fn execute_generate(cli: &Cli, raw: bool) -> Result<()> {
    let key = MasterKey::generate();
    let encoded = key.to_base64();

    if raw {
        println!("{}", encoded.as_str());
        return Ok(());
    }

    let var = app_config(cli)
        .map(|c| c.master_key_env)
        .unwrap_or_else(|_| "RMAIL_MASTER_KEY".to_string());

    output::success("Generated a new master key.");
    println!();
    println!("export {var}=\"{}\"", encoded.as_str());
    println!();
    output::tip("Add the line above to your shell profile (~/.bashrc, ~/.zshrc) and restart your shell.");
    output::warning("Anyone with this key can read your vault. Losing it makes the vault unreadable.");
    Ok(())
}
