//! HTML report templates with `{{NAME}}` placeholders
//!
//! Substitution is a single left-to-right pass: replacement text is copied
//! verbatim and never scanned for further tokens. A token with no value in
//! the map is an error rather than being left in the output.

use crate::error::{DiagError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Template compiled into the binary, used when no template file is available
pub const DEFAULT_TEMPLATE: &str = include_str!("../../templates/report.html");

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Placeholder name → replacement text
pub type Placeholders = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    File(PathBuf),
    BuiltIn,
}

#[derive(Debug, Clone)]
pub struct Template {
    text: String,
    source: TemplateSource,
}

impl Template {
    pub fn builtin() -> Self {
        Self {
            text: DEFAULT_TEMPLATE.to_string(),
            source: TemplateSource::BuiltIn,
        }
    }

    pub fn from_string(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: TemplateSource::BuiltIn,
        }
    }

    /// Load a template file, falling back to the built-in template when
    /// `path` is `None` or the file does not exist
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::builtin());
        };

        match std::fs::read_to_string(path) {
            Ok(text) => {
                tracing::debug!("Loaded report template from {}", path.display());
                Ok(Self {
                    text,
                    source: TemplateSource::File(path.to_path_buf()),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    "Template {} not found, using built-in template",
                    path.display()
                );
                Ok(Self::builtin())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn source(&self) -> &TemplateSource {
        &self.source
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Distinct placeholder names used by this template
    pub fn placeholders(&self) -> BTreeSet<String> {
        find_placeholders(&self.text)
    }

    pub fn render(&self, values: &Placeholders) -> Result<String> {
        let mut out = String::with_capacity(self.text.len());
        let mut missing = BTreeSet::new();
        let mut rest = self.text.as_str();

        while let Some(start) = rest.find(OPEN) {
            out.push_str(&rest[..start]);
            let after = &rest[start..];

            match parse_token(after) {
                Some((name, len)) => {
                    match values.get(name) {
                        Some(value) => out.push_str(value),
                        None => {
                            missing.insert(name.to_string());
                        }
                    }
                    rest = &after[len..];
                }
                None => {
                    // Not a placeholder; step over one brace so `{{{A}}}` still matches
                    out.push('{');
                    rest = &after[1..];
                }
            }
        }
        out.push_str(rest);

        if missing.is_empty() {
            Ok(out)
        } else {
            Err(DiagError::UnresolvedPlaceholders(missing.into_iter().collect()))
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'
}

/// Parse `{{NAME}}` at the start of `s`, returning the name and token length
fn parse_token(s: &str) -> Option<(&str, usize)> {
    let body = s.strip_prefix(OPEN)?;
    let name_len = body.find(|c: char| !is_name_char(c)).unwrap_or(body.len());
    if name_len == 0 || !body[name_len..].starts_with(CLOSE) {
        return None;
    }
    Some((&body[..name_len], OPEN.len() + name_len + CLOSE.len()))
}

pub fn find_placeholders(text: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut rest = text;
    while let Some(start) = rest.find(OPEN) {
        let after = &rest[start..];
        match parse_token(after) {
            Some((name, len)) => {
                names.insert(name.to_string());
                rest = &after[len..];
            }
            None => rest = &after[1..],
        }
    }
    names
}
