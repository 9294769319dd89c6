//! The render context and the layers that feed it.
//!
//! Values arrive from five sources, lowest precedence first:
//!
//! 1. defaults (`name`, `email` of the resolved receiver)
//! 2. a saved context profile
//! 3. a message-body file (`message_body`)
//! 4. `-S key=value` overrides
//! 5. interactive prompts for declared variables still missing
//!
//! A value set by a higher layer is never replaced by a lower one,
//! whatever order the builder methods are called in.

use indexmap::IndexMap;
use serde::ser::{Serialize, Serializer};

use crate::errors::{RmailError, Result};

use super::prompt::Prompter;

/// Reserved variable set from the receiver's display name.
pub const NAME_VAR: &str = "name";
/// Reserved variable set from the receiver's address.
pub const EMAIL_VAR: &str = "email";
/// Reserved variable set from a `-M` message file.
pub const MESSAGE_BODY_VAR: &str = "message_body";

/// Where a context value came from.  Ordered by precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Layer {
    Default,
    Profile,
    File,
    Cli,
    Interactive,
}

/// A single context value and the layer that set it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextValue {
    pub value: String,
    pub layer: Layer,
}

/// Ordered variable map handed to the renderer.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    values: IndexMap<String, ContextValue>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` from `layer`.  Returns false (and changes nothing) when
    /// the key is already held by a higher layer.
    pub fn insert(&mut self, layer: Layer, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if let Some(existing) = self.values.get(&key) {
            if existing.layer > layer {
                return false;
            }
        }
        self.values.insert(
            key,
            ContextValue {
                value: value.into(),
                layer,
            },
        );
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|v| v.value.as_str())
    }

    pub fn layer_of(&self, key: &str) -> Option<Layer> {
        self.values.get(key).map(|v| v.layer)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(key, value)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(k, v)| (k.as_str(), v.value.as_str()))
    }
}

impl Serialize for RenderContext {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// Builds a [`RenderContext`] layer by layer.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    context: RenderContext,
}

impl ContextBuilder {
    /// Start from the receiver's `name` and `email`.
    pub fn new(name: &str, email: &str) -> Self {
        let mut context = RenderContext::new();
        context.insert(Layer::Default, NAME_VAR, name);
        context.insert(Layer::Default, EMAIL_VAR, email);
        Self { context }
    }

    /// Apply a saved profile's values.
    pub fn with_profile<'a, I>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (key, value) in values {
            self.context.insert(Layer::Profile, key.as_str(), value.as_str());
        }
        self
    }

    /// Set `message_body` from a file's (already converted) content.
    pub fn with_message_body(mut self, html: impl Into<String>) -> Self {
        self.context.insert(Layer::File, MESSAGE_BODY_VAR, html);
        self
    }

    /// Apply `key=value` overrides.  Splits on the first `=`; a missing
    /// `=` or an empty key is an error.
    pub fn with_overrides<S: AsRef<str>>(mut self, overrides: &[S]) -> Result<Self> {
        for raw in overrides {
            let (key, value) = parse_override(raw.as_ref())?;
            self.context.insert(Layer::Cli, key, value);
        }
        Ok(self)
    }

    /// Prompt for every declared variable not yet in the context, in
    /// declaration order.  Nothing is asked when all are present.
    pub fn resolve_declared(
        mut self,
        declared: &IndexMap<String, String>,
        prompter: &mut dyn Prompter,
    ) -> Result<Self> {
        let missing: Vec<(&String, &String)> = declared
            .iter()
            .filter(|(name, _)| !self.context.contains(name))
            .collect();

        if missing.is_empty() {
            return Ok(self);
        }

        let names: Vec<&str> = declared.keys().map(String::as_str).collect();
        prompter.announce(&names);

        for (name, description) in missing {
            let answer = prompter.ask(name, description)?;
            self.context.insert(Layer::Interactive, name.as_str(), answer);
        }
        Ok(self)
    }

    pub fn build(self) -> RenderContext {
        self.context
    }
}

/// Split one `key=value` override.
pub fn parse_override(raw: &str) -> Result<(&str, &str)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value)),
        _ => Err(RmailError::InvalidOverride(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted {
        asked: Vec<String>,
        announced: usize,
    }

    impl Prompter for Scripted {
        fn ask(&mut self, variable: &str, description: &str) -> Result<String> {
            self.asked.push(variable.to_string());
            Ok(format!("<{description}>"))
        }

        fn announce(&mut self, _declared: &[&str]) {
            self.announced += 1;
        }
    }

    #[test]
    fn lower_layer_cannot_overwrite_higher() {
        let mut ctx = RenderContext::new();
        assert!(ctx.insert(Layer::Cli, "name", "CLI"));
        assert!(!ctx.insert(Layer::Profile, "name", "Saved"));
        assert_eq!(ctx.get("name"), Some("CLI"));
        assert!(ctx.insert(Layer::Cli, "name", "Again"));
        assert_eq!(ctx.get("name"), Some("Again"));
    }

    #[test]
    fn override_parsing() {
        assert_eq!(parse_override("a=b").unwrap(), ("a", "b"));
        assert_eq!(parse_override("url=x?y=z").unwrap(), ("url", "x?y=z"));
        assert_eq!(parse_override("empty=").unwrap(), ("empty", ""));
        assert!(matches!(
            parse_override("novalue"),
            Err(RmailError::InvalidOverride(_))
        ));
        assert!(parse_override("=value").is_err());
    }

    #[test]
    fn prompts_only_for_missing_in_declaration_order() {
        let mut declared = IndexMap::new();
        declared.insert("zeta".to_string(), "Z".to_string());
        declared.insert("name".to_string(), "Name".to_string());
        declared.insert("alpha".to_string(), "A".to_string());

        let mut prompter = Scripted {
            asked: Vec::new(),
            announced: 0,
        };
        let ctx = ContextBuilder::new("Bob", "bob@x.com")
            .resolve_declared(&declared, &mut prompter)
            .unwrap()
            .build();

        assert_eq!(prompter.asked, ["zeta", "alpha"]);
        assert_eq!(prompter.announced, 1);
        assert_eq!(ctx.get("alpha"), Some("<A>"));
        assert_eq!(ctx.layer_of("alpha"), Some(Layer::Interactive));
    }

    #[test]
    fn nothing_is_asked_when_all_declared_present() {
        let mut declared = IndexMap::new();
        declared.insert("email".to_string(), "Email".to_string());

        let mut prompter = Scripted {
            asked: Vec::new(),
            announced: 0,
        };
        ContextBuilder::new("", "bob@x.com")
            .resolve_declared(&declared, &mut prompter)
            .unwrap();
        assert!(prompter.asked.is_empty());
        assert_eq!(prompter.announced, 0);
    }

    #[test]
    fn serializes_as_plain_map() {
        let ctx = ContextBuilder::new("Bob", "bob@x.com").build();
        let json = serde_json::to_string(&ctx).unwrap();
        assert_eq!(json, r#"{"name":"Bob","email":"bob@x.com"}"#);
    }
}
