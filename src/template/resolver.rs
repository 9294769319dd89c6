//! Locating templates on disk and splitting off their front-matter.
//!
//! A template may start with a YAML block fenced by `---` lines:
//!
//! ```text
//! ---
//! subject: "Welcome, {{ name }}"
//! variables:
//!   product: Product being announced
//!   date: Launch date
//! ---
//! **Hi {{ name }}**, {{ product }} ships on {{ date }}.
//! ```
//!
//! Recognized keys are `subject` and `variables`; anything else is ignored.

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::errors::{RmailError, Result};

/// Extensions tried, in order, after the exact name.
const SEARCH_EXTENSIONS: &[&str] = &["md", "html"];

/// How a template body is turned into HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// Markdown: substitute, then convert to HTML.
    Markdown,
    /// Raw markup: substitution only.
    Markup,
}

impl TemplateKind {
    /// Kind implied by a file path's extension.  Anything that isn't
    /// `.md`/`.markdown` is markup.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown") => {
                Self::Markdown
            }
            _ => Self::Markup,
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Markdown => "markdown",
            Self::Markup => "markup",
        })
    }
}

/// Parsed front-matter.  Absent front-matter is the default value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FrontMatter {
    /// Subject expression, rendered with the same context as the body.
    #[serde(default)]
    pub subject: Option<String>,

    /// Declared variables: name -> prompt description, in file order.
    #[serde(default)]
    pub variables: IndexMap<String, String>,
}

/// A located template, split into its three parts.
#[derive(Debug, Clone)]
pub struct ResolvedTemplate {
    pub name: String,
    pub path: PathBuf,
    pub metadata: FrontMatter,
    pub body: String,
    pub kind: TemplateKind,
}

/// A template file found by [`TemplateResolver::list`].
#[derive(Debug, Clone)]
pub struct TemplateEntry {
    pub file_name: String,
    pub kind: TemplateKind,
    pub size: u64,
}

/// Finds templates under one directory.
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    dir: PathBuf,
}

impl TemplateResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory searched.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Locate `name` and split it.
    ///
    /// Search order: `name`, `name.md`, `name.html`.  The first existing
    /// regular file wins.
    pub fn resolve(&self, name: &str) -> Result<ResolvedTemplate> {
        validate_name(name)?;

        let path = self.locate(name).ok_or_else(|| RmailError::TemplateNotFound {
            name: name.to_string(),
            dir: self.dir.clone(),
        })?;

        let text = std::fs::read_to_string(&path)?;
        let (metadata, body) = split_front_matter(&text).map_err(|reason| {
            RmailError::TemplateMetadata {
                name: name.to_string(),
                reason,
            }
        })?;

        let kind = TemplateKind::from_path(&path);
        tracing::debug!(
            template = name,
            path = %path.display(),
            %kind,
            declared = metadata.variables.len(),
            "template resolved"
        );

        Ok(ResolvedTemplate {
            name: name.to_string(),
            path,
            metadata,
            body: body.to_string(),
            kind,
        })
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        std::iter::once(self.dir.join(name))
            .chain(
                SEARCH_EXTENSIONS
                    .iter()
                    .map(|ext| self.dir.join(format!("{name}.{ext}"))),
            )
            .find(|candidate| candidate.is_file())
    }

    /// List `.md` and `.html` files in the template directory, sorted by
    /// name.  A missing directory lists as empty.
    pub fn list(&self) -> Result<Vec<TemplateEntry>> {
        let read_dir = match std::fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry?;
            let path = entry.path();
            let listed = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| matches!(ext, "md" | "html" | "htm" | "markdown"));
            if !listed || !path.is_file() {
                continue;
            }
            entries.push(TemplateEntry {
                file_name: entry.file_name().to_string_lossy().into_owned(),
                kind: TemplateKind::from_path(&path),
                size: entry.metadata()?.len(),
            });
        }

        entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(entries)
    }
}

/// Template names are plain file names: no separators, no `..`.
fn validate_name(name: &str) -> Result<()> {
    let bad = name.trim().is_empty()
        || name.contains(['/', '\\'])
        || name == "."
        || name == ".."
        || name.starts_with("..");
    if bad {
        return Err(RmailError::InvalidTemplateName(name.to_string()));
    }
    Ok(())
}

/// Split a leading `---` YAML block from the body.
///
/// Text without a leading fence is all body.  An opening fence with no
/// closing fence, or YAML that doesn't match [`FrontMatter`], is an error.
pub fn split_front_matter(text: &str) -> std::result::Result<(FrontMatter, &str), String> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let Some(rest) = strip_fence_line(text) else {
        return Ok((FrontMatter::default(), text));
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            let metadata = parse_yaml(yaml)?;
            return Ok((metadata, body));
        }
        offset += line.len();
    }

    Err("front-matter opened with '---' but never closed".to_string())
}

/// If `text` starts with a `---` line, return what follows it.
fn strip_fence_line(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("---")?;
    let rest = rest.trim_start_matches([' ', '\t']);
    rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))
}

fn parse_yaml(yaml: &str) -> std::result::Result<FrontMatter, String> {
    if yaml.trim().is_empty() {
        return Ok(FrontMatter::default());
    }
    serde_yaml::from_str(yaml).map_err(|e| e.to_string())
}
