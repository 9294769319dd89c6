use clap::Parser;
use rmail::cli::{Cli, Commands, KeyAction, TemplateAction, VaultAction};

fn main() {
    let cli = Cli::parse();
    rmail::logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Init => rmail::cli::commands::init::execute(&cli),
        Commands::Send(ref args) => rmail::cli::commands::send::execute(&cli, args),
        Commands::Vault { ref action } => match action {
            VaultAction::Set {
                ref service,
                ref account,
            } => rmail::cli::commands::vault::execute_set(&cli, service, account.as_deref()),
            VaultAction::Get {
                ref service,
                ref account,
            } => rmail::cli::commands::vault::execute_get(&cli, service, account),
            VaultAction::Delete {
                ref service,
                ref account,
                force,
            } => rmail::cli::commands::vault::execute_delete(&cli, service, account, *force),
            VaultAction::List => rmail::cli::commands::vault::execute_list(&cli),
        },
        Commands::Key { ref action } => match action {
            KeyAction::Generate { raw } => rmail::cli::commands::key::execute_generate(&cli, *raw),
        },
        Commands::Template { ref action } => match action {
            TemplateAction::List => rmail::cli::commands::template::execute_list(&cli),
            TemplateAction::Show { ref name } => {
                rmail::cli::commands::template::execute_show(&cli, name)
            }
        },
        Commands::History { last, ref since } => {
            rmail::cli::commands::history::execute(&cli, last, since.as_deref())
        }
        Commands::Version => rmail::cli::commands::version::execute(),
        Commands::Completions { ref shell } => rmail::cli::commands::completions::execute(shell),
    };

    if let Err(e) = result {
        tracing::debug!(stage = e.stage(), error = ?e, "command failed");
        rmail::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}
