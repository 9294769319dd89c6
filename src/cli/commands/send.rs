//! `r-mail send`: compose one message and deliver it.
//!
//! Usage:
//!   r-mail send -f me -t bob -p welcome
//!   r-mail send -f me -t bob@x.com -s "Hi" -b "<p>hello</p>" -a report.pdf
//!   cat note.html | r-mail send -f me -t bob -s "Note"
//!   r-mail send -f me -t bob -p welcome --dry-run

use std::time::Duration;

use crate::cli::output;
use crate::cli::{app_config, load_directory, read_piped_stdin, Cli, SendArgs};
use crate::config::AppConfig;
use crate::errors::Result;
use crate::history::{self, STATUS_OK};
use crate::mail::{ConfiguredVault, LettreConnector, SendPipeline, SendRequest};
use crate::template::prompt;

/// Execute the `send` command.
pub fn execute(cli: &Cli, args: &SendArgs) -> Result<()> {
    let mut config = app_config(cli)?;
    if let Some(secs) = args.timeout {
        config = config.with_smtp_timeout(Duration::from_secs(secs));
    }

    let request = SendRequest {
        sender: args.from.clone(),
        receiver: args.to.clone(),
        subject: args.subject.clone(),
        body: args.body.clone(),
        template: args.template.clone(),
        message_file: args.message_file.clone(),
        overrides: args.set.clone(),
        context_profile: args.context.clone(),
        attachments: args.attach.clone(),
        stdin_body: None,
    };

    let result = run(&config, request, args.dry_run);

    if !args.dry_run {
        match &result {
            Ok(subject) => history::record(&config, "send", &args.to, STATUS_OK, Some(subject)),
            Err(e) => {
                output::warning(&format!(
                    "Send aborted at the {} stage; nothing was delivered.",
                    e.stage()
                ));
                history::record(
                    &config,
                    "send",
                    &args.to,
                    &history::failure_status(e),
                    Some(&e.to_string()),
                );
            }
        }
    }

    result.map(|_| ())
}

/// Prepare and (unless `dry_run`) deliver.  Returns the subject used.
fn run(config: &AppConfig, mut request: SendRequest, dry_run: bool) -> Result<String> {
    let directory = load_directory(config)?;
    let pipeline = SendPipeline::new(config, &directory);

    // Stdin is only read when nothing else, including a profile's
    // linked template, supplies the body.
    if pipeline.wants_stdin(&request)? {
        request.stdin_body = read_piped_stdin()?;
    }

    let mut prompter = prompt::for_terminal();
    let prepared = pipeline.prepare(&request, prompter.as_mut())?;

    if dry_run {
        let wire = prepared.composed.formatted();
        println!("{}", String::from_utf8_lossy(&wire));
        output::info(&format!(
            "Dry run: would send via {}:{} ({}); nothing was sent.",
            prepared.sender.smtp_host, prepared.sender.smtp_port, prepared.sender.security_mode
        ));
        return Ok(prepared.subject);
    }

    output::info(&format!(
        "Sending from {} to {} via {}:{} ({})...",
        prepared.sender.email,
        prepared.receiver.email,
        prepared.sender.smtp_host,
        prepared.sender.smtp_port,
        prepared.sender.security_mode
    ));

    let connector = LettreConnector::new(config.smtp_timeout);
    let credentials = ConfiguredVault::new(config);
    let report = pipeline.deliver(&prepared, &connector, &credentials)?;

    if let Some(reason) = &report.close_error {
        output::warning(&format!("Server did not close the session cleanly: {reason}"));
    }

    let attached = prepared.composed.attachments.len();
    if attached > 0 {
        output::success(&format!(
            "Email sent to {} with {attached} attachment(s).",
            prepared.receiver.email
        ));
    } else {
        output::success(&format!("Email sent to {}.", prepared.receiver.email));
    }

    Ok(prepared.subject)
}
