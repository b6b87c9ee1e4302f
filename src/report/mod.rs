//! Report renderers for archive analysis results.
//!
//! - [`terminal`] — colored summary box plus archive and failure tables;
//!   respects `--verbose` / `--quiet`.
//!
//! JSON output is the [`ScanReport`] serialized as is.

pub mod terminal;

use std::path::PathBuf;

use serde::Serialize;

use crate::analyzer::ConstructKind;
use crate::manager::AnalysisManager;
use crate::models::{ArchiveKind, FailureRecord};

#[derive(Debug, Serialize)]
pub struct ArchiveReport {
    pub path: PathBuf,
    pub kind: ArchiveKind,
    pub parent: Option<PathBuf>,
    pub analyzed: bool,
    pub classes: usize,
    pub packages: usize,
    pub nested: usize,
    pub coordinates: Option<String>,
    pub library_id: Option<String>,
    pub instrumented: Option<PathBuf>,
    /// Archives resolved from the manifest `Class-Path`.
    pub class_path: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub analyzed: usize,
    pub interrupted: bool,
    pub archives: Vec<ArchiveReport>,
    pub failures: Vec<FailureRecord>,
}

impl ScanReport {
    pub fn from_manager(manager: &AnalysisManager) -> ScanReport {
        let mut archives: Vec<ArchiveReport> = manager
            .aggregated_analyzers()
            .iter()
            .map(|a| {
                let contents = a.contents();
                ArchiveReport {
                    path: a.path().to_path_buf(),
                    kind: a.kind(),
                    parent: a.parent().map(PathBuf::from),
                    analyzed: contents.is_some(),
                    classes: contents.map_or(0, |c| c.count(ConstructKind::Class)),
                    packages: contents.map_or(0, |c| c.count(ConstructKind::Package)),
                    nested: a.children().len(),
                    coordinates: a.dependency().map(|d| d.coordinates()),
                    library_id: a.library_id(),
                    instrumented: contents.and_then(|c| c.instrumented.clone()),
                    class_path: manager
                        .resolve_class_path(a.path())
                        .iter()
                        .map(|r| r.path().to_path_buf())
                        .collect(),
                }
            })
            .collect();
        archives.sort_by(|a, b| a.path.cmp(&b.path));

        ScanReport {
            analyzed: manager.analyzed_count(),
            interrupted: manager.was_interrupted(),
            archives,
            failures: manager.failures().to_vec(),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}
