//! `r-mail version`: display version and build details.

use console::style;

use crate::errors::Result;

/// Execute the `version` command.
pub fn execute() -> Result<()> {
    let current = env!("CARGO_PKG_VERSION");
    println!("r-mail {current}");
    println!(
        "{} vault AES-256-GCM, SMTP STARTTLS/SSL/NONE",
        style("features:").dim()
    );
    Ok(())
}
