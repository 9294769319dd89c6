//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::config::{AppConfig, Directory};
use crate::errors::{RmailError, Result};

/// r-mail: templated mail from the command line, with an encrypted
/// SMTP credential vault.
#[derive(Parser)]
#[command(
    name = "r-mail",
    about = "Send templated mail over SMTP with an encrypted credential vault",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// App directory (default: $RMAIL_HOME or ~/.r-mail)
    #[arg(long, global = true, value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// More diagnostics on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create the app directory with example config and directory files
    Init,

    /// Send one message
    Send(SendArgs),

    /// Manage SMTP passwords in the encrypted vault
    Vault {
        #[command(subcommand)]
        action: VaultAction,
    },

    /// Master key utilities
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Inspect templates
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },

    /// Show the history of sends and vault changes
    History {
        /// Number of entries to show
        #[arg(long, default_value = "50")]
        last: usize,
        /// Only entries newer than this (e.g. 7d, 24h, 30m)
        #[arg(long)]
        since: Option<String>,
    },

    /// Show version
    Version,

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: String,
    },
}

/// Arguments for `send`.
#[derive(clap::Args, Debug, Clone)]
pub struct SendArgs {
    /// Sender alias
    #[arg(short = 'f', long = "from", value_name = "ALIAS")]
    pub from: String,

    /// Receiver alias or email address
    #[arg(short = 't', long = "to", value_name = "ALIAS|EMAIL")]
    pub to: String,

    /// Subject (optional when the template declares one)
    #[arg(short, long)]
    pub subject: Option<String>,

    /// Raw HTML body (bypasses templates)
    #[arg(short, long)]
    pub body: Option<String>,

    /// Template name (searched as NAME, NAME.md, NAME.html)
    #[arg(short = 'p', long)]
    pub template: Option<String>,

    /// File loaded into {{ message_body }} (.md is converted to HTML)
    #[arg(short = 'M', long = "message-file", value_name = "FILE")]
    pub message_file: Option<PathBuf>,

    /// Context variable, repeatable
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Saved context profile
    #[arg(short = 'C', long = "context", value_name = "NAME")]
    pub context: Option<String>,

    /// Attachment path, repeatable
    #[arg(short = 'a', long = "attach", value_name = "FILE")]
    pub attach: Vec<PathBuf>,

    /// Print the composed message instead of sending it
    #[arg(long)]
    pub dry_run: bool,

    /// SMTP timeout in seconds (overrides config.toml)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: Option<u64>,
}

/// Vault subcommands.
#[derive(clap::Subcommand)]
pub enum VaultAction {
    /// Store a password (prompted, or read from piped stdin)
    Set {
        /// Service, normally the sending domain (e.g. example.com)
        service: String,
        /// Account (default: the domain's smtp_user from directory.toml)
        account: Option<String>,
    },

    /// Print a stored password
    Get { service: String, account: String },

    /// Remove a stored password
    Delete {
        service: String,
        account: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// List stored service/account pairs (never values)
    List,
}

/// Key subcommands.
#[derive(clap::Subcommand)]
pub enum KeyAction {
    /// Print a new random master key
    Generate {
        /// Print only the key, with no instructions
        #[arg(long)]
        raw: bool,
    },
}

/// Template subcommands.
#[derive(clap::Subcommand)]
pub enum TemplateAction {
    /// List templates in the template directory
    List,

    /// Show a template's subject and declared variables
    Show {
        /// Template name
        name: String,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Resolve the configuration for this invocation.
pub fn app_config(cli: &Cli) -> Result<AppConfig> {
    AppConfig::resolve(cli.home.as_deref())
}

/// Load the sender/receiver directory for `config`.
pub fn load_directory(config: &AppConfig) -> Result<Directory> {
    Directory::load(&config.directory_path)
}

/// Read stdin when it is piped, `None` when it is a terminal.
pub fn read_piped_stdin() -> Result<Option<String>> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let mut buf = String::new();
    stdin.lock().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

/// Ask a yes/no question, defaulting to no.
pub fn confirm(prompt: &str) -> Result<bool> {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| RmailError::CommandFailed(format!("confirm prompt: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn send_args_parse() {
        let cli = Cli::try_parse_from([
            "r-mail", "send", "-f", "me", "-t", "bob", "-p", "welcome", "-S", "a=1", "-S",
            "b=2", "-a", "x.pdf", "--dry-run",
        ])
        .unwrap();

        let Commands::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.from, "me");
        assert_eq!(args.template.as_deref(), Some("welcome"));
        assert_eq!(args.set, ["a=1", "b=2"]);
        assert_eq!(args.attach, [PathBuf::from("x.pdf")]);
        assert!(args.dry_run);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let send = |secs: &str| {
            Cli::try_parse_from(["r-mail", "send", "-f", "me", "-t", "bob", "--timeout", secs])
        };
        assert!(send("0").is_err());

        let cli = send("5").unwrap();
        let Commands::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.timeout, Some(5));
    }

    #[test]
    fn verbosity_counts() {
        let cli = Cli::try_parse_from(["r-mail", "-vv", "version"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
