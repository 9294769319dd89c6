//! `r-mail history`: display the operation history.
//!
//! Usage:
//!   r-mail history               # last 50 entries
//!   r-mail history --last 20
//!   r-mail history --since 7d

use chrono::Utc;
use console::style;

use crate::cli::output;
use crate::cli::{app_config, Cli};
use crate::errors::{RmailError, Result};
use crate::history::{HistoryEntry, HistoryLog, STATUS_OK};

/// Execute the `history` command.
pub fn execute(cli: &Cli, last: usize, since: Option<&str>) -> Result<()> {
    let config = app_config(cli)?;

    let since_dt = since.map(parse_duration).transpose()?;

    if !config.history_path.exists() {
        output::info("No history yet.");
        return Ok(());
    }

    let log = HistoryLog::open(&config.history_path)
        .ok_or_else(|| RmailError::HistoryError("failed to open history database".into()))?;
    let entries = log.query(last, since_dt)?;

    if entries.is_empty() {
        output::info("No history entries found.");
        return Ok(());
    }

    print_history_table(&entries);
    Ok(())
}

/// Parse a human-friendly duration like "7d", "24h", "30m" into the
/// instant that long ago.
fn parse_duration(input: &str) -> Result<chrono::DateTime<Utc>> {
    let input = input.trim();
    let invalid = || {
        RmailError::CommandFailed(format!(
            "invalid duration '{input}' — use format like 7d, 24h, or 30m"
        ))
    };

    let (split, _) = input.char_indices().last().ok_or_else(invalid)?;
    let (num_str, unit) = input.split_at(split);
    let num: i64 = num_str.parse().map_err(|_| invalid())?;

    let duration = match unit {
        "d" => chrono::Duration::try_days(num),
        "h" => chrono::Duration::try_hours(num),
        "m" => chrono::Duration::try_minutes(num),
        _ => None,
    }
    .ok_or_else(invalid)?;

    Utc::now().checked_sub_signed(duration).ok_or_else(invalid)
}

fn print_history_table(entries: &[HistoryEntry]) {
    let mut table = output::table(&["Time", "Operation", "Target", "Status", "Details"]);

    for entry in entries {
        let status = if entry.status == STATUS_OK {
            style(&entry.status).green().to_string()
        } else {
            style(&entry.status).red().to_string()
        };
        table.add_row(vec![
            entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            entry.operation.clone(),
            entry.target.clone(),
            status,
            entry.details.clone().unwrap_or_else(|| "-".into()),
        ]);
    }

    println!(
        "{}",
        style(format!("{} history entries:", entries.len())).bold()
    );
    println!("{table}");
}
