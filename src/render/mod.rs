//! Template loading and rendering.
//!
//! A template is the file `<root>/<name>.mustache`. Rendering optionally
//! narrows the file to the first capture group of an extraction pattern, then
//! interpolates data with a [`TemplateEngine`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;

use crate::errors::{MailError, MailResult};
use crate::types::RenderedContent;

/// Extension of template files.
pub const TEMPLATE_EXTENSION: &str = "mustache";

/// Pattern extracting the contents of an HTML `<body>` element.
pub const BODY_PATTERN: &str = r"<body[^>]*>([\s\S]*?)</body>";

/// Returns the compiled [`BODY_PATTERN`].
pub fn body_pattern() -> Regex {
    Regex::new(BODY_PATTERN).expect("BODY_PATTERN is a valid regex")
}

/// Interpolates data into template text.
#[cfg_attr(test, mockall::automock)]
pub trait TemplateEngine: Send + Sync {
    /// Renders `template` with `data`.
    fn render(&self, template: &str, data: &serde_json::Value) -> Result<String, String>;
}

/// Mustache engine.
///
/// Supports variables, sections and inverted sections.
/// `{{value}}` is HTML-escaped, `{{{value}}}` is not; missing values render as
/// empty strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct MustacheEngine;

impl MustacheEngine {
    /// Creates the engine.
    pub fn new() -> Self {
        Self
    }
}

impl TemplateEngine for MustacheEngine {
    fn render(&self, template: &str, data: &serde_json::Value) -> Result<String, String> {
        let compiled = mustache::compile_str(template).map_err(|e| e.to_string())?;
        compiled.render_to_string(data).map_err(|e| e.to_string())
    }
}

/// Loads template files and renders them.
#[derive(Clone)]
pub struct TemplateRenderer {
    engine: Arc<dyn TemplateEngine>,
}

impl TemplateRenderer {
    /// Creates a renderer using `engine`.
    pub fn new(engine: Arc<dyn TemplateEngine>) -> Self {
        Self { engine }
    }

    /// Returns `root/<name>.mustache`.
    pub fn template_file_path(root: &Path, name: &str) -> PathBuf {
        root.join(format!("{}.{}", name, TEMPLATE_EXTENSION))
    }

    /// Loads, optionally extracts, and renders the template `name`.
    pub async fn render<T: Serialize + ?Sized>(
        &self,
        root: &Path,
        name: &str,
        data: &T,
        extraction_pattern: Option<&Regex>,
    ) -> MailResult<RenderedContent> {
        let path = Self::template_file_path(root, name);

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MailError::template_not_found(name, &path));
            }
            Err(e) => return Err(MailError::template_read(name, e)),
        };

        tracing::debug!(template = name, path = %path.display(), "Template loaded");
        self.render_str(name, &raw, data, extraction_pattern)
    }

    /// Renders already-loaded template text.
    pub fn render_str<T: Serialize + ?Sized>(
        &self,
        name: &str,
        raw: &str,
        data: &T,
        extraction_pattern: Option<&Regex>,
    ) -> MailResult<RenderedContent> {
        let source = match extraction_pattern {
            Some(pattern) => match extract(raw, pattern) {
                Extracted::Fragment(fragment) => fragment,
                Extracted::NoMatch => {
                    tracing::debug!(
                        template = name,
                        pattern = pattern.as_str(),
                        "Extraction pattern did not match; using full template"
                    );
                    raw
                }
                Extracted::NoGroup => {
                    return Err(MailError::template_render(
                        name,
                        format!(
                            "extraction pattern {:?} matched but captured no group 1",
                            pattern.as_str()
                        ),
                    ));
                }
            },
            None => raw,
        };

        let data = serde_json::to_value(data).map_err(|e| {
            MailError::template_render(name, format!("data is not serializable: {}", e))
                .with_cause(e)
        })?;

        let html = self
            .engine
            .render(source, &data)
            .map_err(|e| MailError::template_render(name, e))?;

        Ok(RenderedContent::html(html))
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new(Arc::new(MustacheEngine::new()))
    }
}

impl fmt::Debug for TemplateRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRenderer").finish_non_exhaustive()
    }
}

enum Extracted<'a> {
    Fragment(&'a str),
    NoMatch,
    NoGroup,
}

/// Returns the trimmed first capture group of the first match.
fn extract<'a>(raw: &'a str, pattern: &Regex) -> Extracted<'a> {
    match pattern.captures(raw) {
        None => Extracted::NoMatch,
        Some(captures) => match captures.get(1) {
            Some(group) => Extracted::Fragment(group.as_str().trim()),
            None => Extracted::NoGroup,
        },
    }
}
