//! `r-mail template`: inspect templates.
//!
//! Usage:
//!   r-mail template list
//!   r-mail template show welcome

use console::style;

use crate::cli::output;
use crate::cli::{app_config, Cli};
use crate::errors::Result;
use crate::template::TemplateResolver;

/// Execute `template list`.
pub fn execute_list(cli: &Cli) -> Result<()> {
    let config = app_config(cli)?;
    let resolver = TemplateResolver::new(&config.template_dir);
    let entries = resolver.list()?;

    if entries.is_empty() {
        output::info(&format!("No templates in {}", resolver.dir().display()));
        output::tip("Create NAME.md (markdown) or NAME.html files there, then send with `-p NAME`.");
        return Ok(());
    }

    output::print_templates_table(&entries);
    Ok(())
}

/// Execute `template show`.
pub fn execute_show(cli: &Cli, name: &str) -> Result<()> {
    let config = app_config(cli)?;
    let template = TemplateResolver::new(&config.template_dir).resolve(name)?;

    println!("{} {}", style("Template:").bold(), template.path.display());
    println!("{} {}", style("Kind:").bold(), template.kind);
    println!(
        "{} {}",
        style("Subject:").bold(),
        template.metadata.subject.as_deref().unwrap_or("-")
    );

    if template.metadata.variables.is_empty() {
        output::info("No declared variables.");
    } else {
        let mut t = output::table(&["Variable", "Description"]);
        for (var, description) in &template.metadata.variables {
            t.add_row(vec![var.clone(), description.clone()]);
        }
        println!("{t}");
    }

    Ok(())
}
