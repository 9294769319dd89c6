//! Console interaction for missing template variables.
//!
//! `ContextBuilder` only talks to a [`Prompter`]; whether that blocks on
//! a terminal or fails fast is decided by whoever builds it.

use std::io::IsTerminal;

use console::style;

use crate::errors::{RmailError, Result};

/// Capability to ask the user for a variable value.
pub trait Prompter {
    /// Ask for `variable`, showing its declared `description`.
    fn ask(&mut self, variable: &str, description: &str) -> Result<String>;

    /// Called once before the first question with every variable the
    /// template declares.  Default: silent.
    fn announce(&mut self, _declared: &[&str]) {}
}

/// Prompts on the terminal with dialoguer.
#[derive(Debug, Default)]
pub struct ConsolePrompter;

impl Prompter for ConsolePrompter {
    fn ask(&mut self, variable: &str, description: &str) -> Result<String> {
        let prompt = if description.trim().is_empty() {
            variable.to_string()
        } else {
            format!("{variable} ({description})")
        };

        dialoguer::Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(|e| RmailError::CommandFailed(format!("prompt for '{variable}': {e}")))
    }

    fn announce(&mut self, declared: &[&str]) {
        println!("{} {}", style("\u{2139}").blue().bold(), announcement(declared));
    }
}

/// The line shown before the first question.
fn announcement(declared: &[&str]) -> String {
    format!("Template requires: {}", declared.join(", "))
}

/// Never prompts: every missing variable is an error.
#[derive(Debug, Default)]
pub struct NonInteractivePrompter;

impl Prompter for NonInteractivePrompter {
    fn ask(&mut self, variable: &str, _description: &str) -> Result<String> {
        Err(RmailError::MissingVariable(variable.to_string()))
    }
}

/// True when both stdin and stdout are terminals.
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
}

/// The prompter to use for this process.
pub fn for_terminal() -> Box<dyn Prompter> {
    if is_interactive() {
        Box::new(ConsolePrompter)
    } else {
        Box::new(NonInteractivePrompter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_interactive_names_the_variable() {
        let err = NonInteractivePrompter.ask("product", "Product name").unwrap_err();
        assert!(matches!(err, RmailError::MissingVariable(ref v) if v == "product"));
        assert!(err.to_string().contains("-S product="));
    }

    #[test]
    fn announcement_lists_variables_in_order() {
        assert_eq!(
            announcement(&["product", "date"]),
            "Template requires: product, date"
        );
    }
}
