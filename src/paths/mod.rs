//! Template root resolution.
//!
//! A [`PathResolver`] is either unset or holds one absolute directory. The
//! directory comes from an explicit [`TemplatePathConfig`] or from the marker
//! file [`MARKER_FILE`], found by searching upward from a starting directory.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::config::{Environment, TemplatePathConfig};
use crate::errors::{MailError, MailResult};

/// File discovered by [`PathResolver::auto_detect_path`].
pub const MARKER_FILE: &str = "lemur-mail.config.json";

/// Resolution state of the template root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TemplateRootState {
    /// No root resolved yet.
    #[default]
    Unset,
    /// Resolved absolute directory.
    Set(PathBuf),
}

/// Resolves and holds the template root for one session.
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    state: TemplateRootState,
}

impl PathResolver {
    /// Creates an unset resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the root from an explicit value, selecting by [`Environment::current`].
    pub fn set_path(&mut self, config: &TemplatePathConfig) -> MailResult<&Path> {
        self.set_path_for(config, Environment::current())
    }

    /// Sets the root from an explicit value for `environment`.
    pub fn set_path_for(
        &mut self,
        config: &TemplatePathConfig,
        environment: Environment,
    ) -> MailResult<&Path> {
        if self.is_set() {
            tracing::warn!("template root already set; the new configuration replaces it");
        }

        let selected = config.select(environment);
        if selected.trim().is_empty() {
            return Err(MailError::configuration(
                "template root could not be determined; provide a non-empty path",
            ));
        }

        let resolved = absolutize(Path::new(selected))?;
        tracing::debug!(path = %resolved.display(), ?environment, "Template root set");
        self.store(resolved)
    }

    /// Searches upward from the working directory for [`MARKER_FILE`].
    pub async fn auto_detect_path(&mut self) -> MailResult<&Path> {
        let cwd = std::env::current_dir().map_err(|e| {
            self.reset();
            MailError::configuration(format!(
                "failed to auto-detect template root: cannot read working directory: {}",
                e
            ))
            .with_cause(e)
        })?;
        self.auto_detect_path_from(cwd).await
    }

    /// Searches upward from `start` for [`MARKER_FILE`] and stores its `path`.
    ///
    /// On failure the resolver is left unset.
    pub async fn auto_detect_path_from(&mut self, start: impl AsRef<Path>) -> MailResult<&Path> {
        if self.is_set() {
            tracing::warn!("template root already set; auto-detection replaces it");
        }

        match detect(start.as_ref()).await {
            Ok(resolved) => {
                tracing::debug!(path = %resolved.display(), "Template root auto-detected");
                self.store(resolved)
            }
            Err(e) => {
                self.reset();
                Err(e.context(
                    "failed to auto-detect template root; configure the path manually",
                ))
            }
        }
    }

    /// Returns the resolved root.
    pub fn get_path(&self) -> MailResult<&Path> {
        match &self.state {
            TemplateRootState::Set(path) => Ok(path),
            TemplateRootState::Unset => Err(MailError::configuration(
                "template root is not set; call set_path() or auto_detect_path() first",
            )),
        }
    }

    /// Returns true once a root is resolved.
    pub fn is_set(&self) -> bool {
        matches!(self.state, TemplateRootState::Set(_))
    }

    /// Returns the current state.
    pub fn state(&self) -> &TemplateRootState {
        &self.state
    }

    /// Returns to the unset state.
    pub fn reset(&mut self) {
        self.state = TemplateRootState::Unset;
    }

    fn store(&mut self, path: PathBuf) -> MailResult<&Path> {
        self.state = TemplateRootState::Set(path);
        self.get_path()
    }
}

async fn detect(start: &Path) -> MailResult<PathBuf> {
    let marker = find_up(MARKER_FILE, start)
        .await
        .map_err(|e| {
            MailError::configuration(format!("error while searching for {}: {}", MARKER_FILE, e))
                .with_cause(e)
        })?
        .ok_or_else(|| {
            MailError::configuration(format!(
                "{} not found in \"{}\" or any parent directory",
                MARKER_FILE,
                start.display()
            ))
        })?;

    let content = tokio::fs::read_to_string(&marker).await.map_err(|e| {
        MailError::configuration(format!("failed to read \"{}\": {}", marker.display(), e))
            .with_cause(e)
    })?;

    let value: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
        MailError::configuration(format!("\"{}\" is not valid JSON: {}", marker.display(), e))
            .with_cause(e)
    })?;

    let declared = match value.get("path").and_then(|p| p.as_str()) {
        Some(path) if !path.trim().is_empty() => path,
        _ => {
            return Err(MailError::configuration(format!(
                "\"{}\" does not declare a valid string \"path\"",
                marker.display()
            )))
        }
    };

    let declared = Path::new(declared);
    if declared.is_absolute() {
        Ok(normalize(declared))
    } else {
        let base = marker.parent().unwrap_or(start);
        absolutize(&base.join(declared))
    }
}

/// Searches for `name` in `start` and each of its ancestors.
///
/// Returns `Ok(None)` once the filesystem root has been checked. Errors other
/// than "not found" abort the search.
pub async fn find_up(name: &str, start: impl AsRef<Path>) -> io::Result<Option<PathBuf>> {
    let mut current = absolutize_io(start.as_ref())?;

    loop {
        let candidate = current.join(name);
        match tokio::fs::metadata(&candidate).await {
            Ok(_) => return Ok(Some(candidate)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        match current.parent() {
            Some(parent) if parent != current => current = parent.to_path_buf(),
            _ => return Ok(None),
        }
    }
}

fn absolutize(path: &Path) -> MailResult<PathBuf> {
    absolutize_io(path).map_err(|e| {
        MailError::configuration(format!("failed to resolve \"{}\": {}", path.display(), e))
            .with_cause(e)
    })
}

fn absolutize_io(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(normalize(path))
    } else {
        Ok(normalize(&std::env::current_dir()?.join(path)))
    }
}

/// Lexically removes `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
