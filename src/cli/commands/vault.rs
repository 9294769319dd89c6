//! `r-mail vault`: manage SMTP passwords in the encrypted vault.
//!
//! Usage:
//!   r-mail vault set example.com                 # account from directory.toml
//!   r-mail vault set example.com me@example.com
//!   echo "$PW" | r-mail vault set example.com me@example.com
//!   r-mail vault get example.com me@example.com
//!   r-mail vault delete example.com me@example.com --force
//!   r-mail vault list

use std::io::{self, IsTerminal, Read};

use zeroize::Zeroizing;

use crate::cli::output;
use crate::cli::{app_config, confirm, load_directory, Cli};
use crate::errors::{RmailError, Result};
use crate::history::{self, STATUS_OK};
use crate::vault::SecretVault;

/// Execute `vault set`.
pub fn execute_set(cli: &Cli, service: &str, account: Option<&str>) -> Result<()> {
    let config = app_config(cli)?;
    let vault = SecretVault::open(&config)?;

    let account = match account {
        Some(a) => a.to_string(),
        None => {
            let directory = load_directory(&config)?;
            let domain = directory.domain(service).map_err(|_| {
                RmailError::CommandFailed(format!(
                    "no account given and '{service}' is not a domain in {}",
                    config.directory_path.display()
                ))
            })?;
            output::info(&format!("Using smtp_user '{}' for {service}", domain.smtp_user));
            domain.smtp_user.clone()
        }
    };

    let secret = read_secret(service, &account)?;
    if secret.is_empty() {
        return Err(RmailError::CommandFailed(
            "empty password — use `r-mail vault delete` to remove an entry".into(),
        ));
    }

    let existed = vault.get(service, &account)?.is_some();
    vault.set(service, &account, Some(&secret))?;

    let target = format!("{service}/{account}");
    let detail = if existed { "updated" } else { "added" };
    history::record(&config, "vault-set", &target, STATUS_OK, Some(detail));

    output::success(&format!("Password for {target} {detail}."));
    Ok(())
}

/// Execute `vault get`.
pub fn execute_get(cli: &Cli, service: &str, account: &str) -> Result<()> {
    let config = app_config(cli)?;
    let vault = SecretVault::open(&config)?;

    match vault.get(service, account)? {
        Some(secret) => {
            println!("{}", secret.as_str());
            Ok(())
        }
        None => Err(RmailError::CommandFailed(format!(
            "no password stored for {service}/{account}"
        ))),
    }
}

/// Execute `vault delete`.
pub fn execute_delete(cli: &Cli, service: &str, account: &str, force: bool) -> Result<()> {
    let config = app_config(cli)?;
    let vault = SecretVault::open(&config)?;

    if !force && !confirm(&format!("Delete password for {service}/{account}?"))? {
        output::info("Cancelled.");
        return Ok(());
    }

    let target = format!("{service}/{account}");
    if vault.delete(service, account)? {
        history::record(&config, "vault-delete", &target, STATUS_OK, None);
        output::success(&format!("Deleted password for {target}."));
    } else {
        output::info(&format!("Nothing stored for {target}."));
    }
    Ok(())
}

/// Execute `vault list`.
pub fn execute_list(cli: &Cli) -> Result<()> {
    let config = app_config(cli)?;
    let vault = SecretVault::open(&config)?;
    output::print_entries_table(&vault.entries()?);
    Ok(())
}

/// Read the password from piped stdin, or prompt for it hidden.
fn read_secret(service: &str, account: &str) -> Result<Zeroizing<String>> {
    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim_end_matches(['\r', '\n']).len();
        buf.truncate(trimmed);
        return Ok(buf);
    }

    let pw = dialoguer::Password::new()
        .with_prompt(format!("SMTP password for {account} at {service}"))
        .interact()
        .map_err(|e| RmailError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}
