//! Template module: from a template name and variable sources to HTML.
//!
//! This module provides:
//! - Template lookup and front-matter parsing (`resolver`)
//! - The layered render context (`context`)
//! - The prompt capability for missing variables (`prompt`)
//! - Substitution and markdown conversion (`renderer`)

pub mod context;
pub mod prompt;
pub mod renderer;
pub mod resolver;

pub use context::{ContextBuilder, Layer, RenderContext};
pub use prompt::{ConsolePrompter, NonInteractivePrompter, Prompter};
pub use renderer::{markdown_to_html, TemplateRenderer};
pub use resolver::{FrontMatter, ResolvedTemplate, TemplateKind, TemplateResolver};
