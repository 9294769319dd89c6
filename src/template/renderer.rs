//! Placeholder substitution (minijinja) and markdown conversion
//! (pulldown-cmark).
//!
//! Substitution always runs first, on the raw template text; markdown is
//! converted afterwards so that `{{ … }}` never passes through the
//! markdown parser and substituted values get markdown treatment.

use minijinja::{Environment, UndefinedBehavior};
use pulldown_cmark::{html, Options, Parser};

use crate::errors::{RmailError, Result};

use super::context::RenderContext;
use super::resolver::TemplateKind;

/// Renders template bodies and subject lines.
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut env = Environment::new();
        // Unknown variables render as empty strings.
        env.set_undefined_behavior(UndefinedBehavior::Lenient);
        env.set_keep_trailing_newline(true);
        Self { env }
    }

    /// Render `body` against `context`, converting markdown to HTML when
    /// `kind` says so.  `name` only labels errors.
    pub fn render(
        &self,
        name: &str,
        body: &str,
        kind: TemplateKind,
        context: &RenderContext,
    ) -> Result<String> {
        let substituted = self.substitute(name, body, context)?;
        Ok(match kind {
            TemplateKind::Markdown => markdown_to_html(&substituted),
            TemplateKind::Markup => substituted,
        })
    }

    /// Render a subject expression.  No markdown conversion; surrounding
    /// whitespace and line breaks are collapsed since headers are one line.
    pub fn render_subject(
        &self,
        name: &str,
        subject: &str,
        context: &RenderContext,
    ) -> Result<String> {
        let rendered = self.substitute(name, subject, context)?;
        Ok(rendered.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    fn substitute(&self, name: &str, source: &str, context: &RenderContext) -> Result<String> {
        self.env
            .render_str(source, context)
            .map_err(|e| RmailError::TemplateRender {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Convert markdown to HTML (CommonMark plus tables and strikethrough).
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::context::ContextBuilder;

    fn bob() -> RenderContext {
        ContextBuilder::new("Bob", "bob@x.com").build()
    }

    #[test]
    fn markup_is_substituted_only() {
        let r = TemplateRenderer::new();
        let out = r
            .render("t", "<p>**{{ name }}**</p>", TemplateKind::Markup, &bob())
            .unwrap();
        assert_eq!(out, "<p>**Bob**</p>");
    }

    #[test]
    fn undefined_variable_renders_empty() {
        let r = TemplateRenderer::new();
        let out = r
            .render("t", "[{{ nickname }}]", TemplateKind::Markup, &bob())
            .unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn substituted_markdown_is_converted() {
        let r = TemplateRenderer::new();
        let ctx = ContextBuilder::new("Bob", "b@x")
            .with_overrides(&["item=*new*"])
            .unwrap()
            .build();
        let out = r
            .render("t", "Your {{ item }} order", TemplateKind::Markdown, &ctx)
            .unwrap();
        assert!(out.contains("<em>new</em>"));
    }

    #[test]
    fn syntax_error_names_template() {
        let r = TemplateRenderer::new();
        let err = r
            .render("broken", "{{ name ", TemplateKind::Markup, &bob())
            .unwrap_err();
        assert!(matches!(err, RmailError::TemplateRender { ref name, .. } if name == "broken"));
    }

    #[test]
    fn subject_is_single_line() {
        let r = TemplateRenderer::new();
        let s = r
            .render_subject("t", "  Hello\n{{ name }}  ", &bob())
            .unwrap();
        assert_eq!(s, "Hello Bob");
    }

    #[test]
    fn values_are_not_html_escaped() {
        let r = TemplateRenderer::new();
        let ctx = ContextBuilder::new("Bob", "b@x")
            .with_message_body("<p>inner</p>")
            .build();
        let out = r
            .render("t", "<div>{{ message_body }}</div>", TemplateKind::Markup, &ctx)
            .unwrap();
        assert_eq!(out, "<div><p>inner</p></div>");
    }
}
