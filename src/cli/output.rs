//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::template::resolver::TemplateEntry;

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// A table with the house style.
pub fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header.to_vec());
    table
}

/// Print stored `(service, account)` pairs.
pub fn print_entries_table(entries: &[(String, String)]) {
    if entries.is_empty() {
        info("The vault is empty.");
        tip("Run `r-mail vault set <domain>` to store an SMTP password.");
        return;
    }

    let mut t = table(&["Service", "Account"]);
    for (service, account) in entries {
        t.add_row(vec![service.clone(), account.clone()]);
    }
    println!("{t}");
}

/// Print the template directory listing.
pub fn print_templates_table(entries: &[TemplateEntry]) {
    let mut t = table(&["Template", "Kind", "Size"]);
    for entry in entries {
        t.add_row(vec![
            entry.file_name.clone(),
            entry.kind.to_string(),
            format!("{} B", entry.size),
        ]);
    }
    println!("{t}");
}
