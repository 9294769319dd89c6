//! `r-mail init`: create the app directory and example files.
//!
//! Existing files are never overwritten, so `init` is safe to re-run.

use std::fs;
use std::path::Path;

use crate::cli::output;
use crate::cli::{app_config, Cli};
use crate::config::{Directory, Settings};
use crate::crypto::MasterKey;
use crate::errors::Result;
use crate::vault::format::ensure_private_dir;

const EXAMPLE_CONFIG: &str = r#"# r-mail settings. Every key is optional.

# template_dir = "templates"
# vault_file = "secrets.enc"
# smtp_timeout_secs = 30
# master_key_env = "RMAIL_MASTER_KEY"
"#;

const EXAMPLE_DIRECTORY: &str = r#"# Senders, domains, receivers and saved contexts.
#
# [domains."example.com"]
# smtp_host = "smtp.example.com"
# smtp_port = 587                 # default 587
# smtp_user = "me@example.com"
# security = "STARTTLS"           # STARTTLS (default), SSL or NONE
#
# [senders.me]
# full_name = "Me Myself"
# email = "me@example.com"
# domain = "example.com"
#
# [receivers.bob]
# name = "Bob"
# email = "bob@example.org"
#
# [contexts.launch]
# description = "Product launch"
# template = "welcome"
# data = { product = "Widget" }
"#;

const EXAMPLE_TEMPLATE: &str = r#"---
subject: "Hello {{ name }}"
variables:
  product: What you are announcing
---
# Hi {{ name }}

**{{ product }}** is ready.

{{ message_body }}
"#;

/// Execute the `init` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let config = app_config(cli)?;

    // 1. App directory (owner-only) and template directory.
    let existed = config.app_dir.exists();
    ensure_private_dir(&config.app_dir)?;
    if !existed {
        output::info(&format!("Created {}", config.app_dir.display()));
    }
    ensure_private_dir(&config.template_dir)?;

    // 2. Example files.
    let mut created = 0;
    created += write_if_absent(&config.app_dir.join(Settings::FILE_NAME), EXAMPLE_CONFIG)?;
    created += write_if_absent(&config.app_dir.join(Directory::FILE_NAME), EXAMPLE_DIRECTORY)?;
    created += write_if_absent(&config.template_dir.join("welcome.md"), EXAMPLE_TEMPLATE)?;

    if created == 0 {
        output::info("Already initialized; nothing to do.");
    } else {
        output::success(&format!(
            "Initialized r-mail in {}",
            config.app_dir.display()
        ));
    }

    // 3. Master key.
    match std::env::var(&config.master_key_env) {
        Ok(value) if !value.trim().is_empty() => match MasterKey::parse(&value) {
            Ok(_) => output::info(&format!("{} is set.", config.master_key_env)),
            Err(e) => output::warning(&format!("{} is set but invalid: {e}", config.master_key_env)),
        },
        _ => {
            let key = MasterKey::generate();
            output::warning(&format!("{} is not set.", config.master_key_env));
            output::tip("Add this to your shell profile:");
            println!("export {}=\"{}\"", config.master_key_env, key.to_base64().as_str());
        }
    }

    output::tip(&format!(
        "Edit {} to add your domains and senders.",
        config.directory_path.display()
    ));
    output::tip("Then store an SMTP password: r-mail vault set <domain>");

    Ok(())
}

/// Write `contents` to `path` unless it exists.  Returns 1 if written.
fn write_if_absent(path: &Path, contents: &str) -> Result<usize> {
    if path.exists() {
        return Ok(0);
    }
    fs::write(path, contents)?;
    tracing::debug!(path = %path.display(), "wrote example file");
    Ok(1)
}
