use std::path::PathBuf;

use thiserror::Error;

use crate::models::{FailureKind, FailureRecord};

/// Failures that abort a whole analysis run.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Unable to create work directory: {0}")]
    WorkDir(#[source] std::io::Error),
}

/// Failures scoped to a single archive. They are collected, never propagated.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("cannot read archive: {0}")]
    Read(#[source] std::io::Error),

    #[error("malformed archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error while processing archive: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive was already analyzed")]
    AlreadyAnalyzed,

    #[error("classpath incomplete, instrumentation skipped: {0}")]
    ClasspathIncomplete(String),

    #[error("instrumentation requested but no work directory is set")]
    MissingWorkDir,

    #[error("instrumentation of {class} failed: {message}")]
    Instrumentation { class: String, message: String },

    #[error("analysis interrupted before it started")]
    Cancelled,

    #[error("analysis task failed: {0}")]
    Task(String),
}

impl ArchiveError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ArchiveError::Read(_) => FailureKind::Read,
            ArchiveError::Zip(_) | ArchiveError::Io(_) | ArchiveError::AlreadyAnalyzed => {
                FailureKind::Archive
            }
            ArchiveError::ClasspathIncomplete(_) => FailureKind::Classpath,
            ArchiveError::MissingWorkDir | ArchiveError::Instrumentation { .. } => {
                FailureKind::Instrumentation
            }
            ArchiveError::Cancelled => FailureKind::Cancelled,
            ArchiveError::Task(_) => FailureKind::Task,
        }
    }

    pub fn into_record(self, path: PathBuf) -> FailureRecord {
        FailureRecord {
            path,
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}
