//! Classpath accumulated over one analysis run.
//!
//! Instrumented classes are compiled against this classpath, so every archive
//! of a run (and every `.jar` of the extra library directory) is added before
//! any analysis task starts. Workers only ever see an immutable snapshot.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ClasspathError {
    #[error("classpath entry [{0}] does not exist")]
    Missing(PathBuf),

    #[error("cannot join classpath: {0}")]
    Join(#[from] std::env::JoinPathsError),
}

/// What to do with an archive whose classpath entry could not be added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClasspathPolicy {
    /// Log and carry on. Instrumentation may later fail to resolve symbols.
    #[default]
    Ignore,
    /// Record a failure for the archive and skip its instrumentation.
    FailInstrumentation,
}

#[derive(Debug, Clone, Default)]
pub struct Classpath {
    entries: Vec<PathBuf>,
}

impl Classpath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `path` unless it is already present.
    ///
    /// A path must exist on disk, or be nested inside an entry that is already
    /// on the classpath (e.g. `app.war/WEB-INF/lib/x.jar` once `app.war` was added),
    /// and must not contain the platform's path separator.
    /// Returns `Ok(false)` for duplicates.
    pub fn insert(&mut self, path: &Path) -> Result<bool, ClasspathError> {
        if self.contains(path) {
            return Ok(false);
        }
        let nested = path.ancestors().skip(1).any(|a| self.contains(a));
        if !nested && !path.exists() {
            return Err(ClasspathError::Missing(path.to_path_buf()));
        }
        std::env::join_paths(std::iter::once(path))?;
        self.entries.push(path.to_path_buf());
        Ok(true)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.iter().any(|e| e == path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All `.jar` files below `dir`, recursively, in a stable order.
pub fn jars_under(dir: &Path) -> Vec<PathBuf> {
    let mut jars: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("jar"))
        .collect();
    jars.sort();
    jars
}
