use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Build coordinates of a library, as known to the build tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub group: String,
    pub artifact: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_id: Option<String>,
}

impl Dependency {
    pub fn new(group: &str, artifact: &str, version: &str) -> Self {
        Dependency {
            group: group.to_string(),
            artifact: artifact.to_string(),
            version: version.to_string(),
            library_id: None,
        }
    }

    /// `group:artifact:version`
    pub fn coordinates(&self) -> String {
        format!("{}:{}:{}", self.group, self.artifact, self.version)
    }
}

/// Identity of the scanned application, shared by every analyzer of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

impl Application {
    pub fn new(group: &str, artifact: &str, version: &str) -> Self {
        Application {
            group: group.to_string(),
            artifact: artifact.to_string(),
            version: version.to_string(),
        }
    }
}

/// The archive flavours we know how to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchiveKind {
    Plain,
    Web,
    Android,
}

impl ArchiveKind {
    /// Select the kind from the file extension. The comparison is case-sensitive,
    /// so `LIB.JAR` is not a supported archive.
    pub fn from_path(path: &Path) -> Option<ArchiveKind> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("jar") => Some(ArchiveKind::Plain),
            Some("war") => Some(ArchiveKind::Web),
            Some("aar") => Some(ArchiveKind::Android),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveKind::Plain => write!(f, "JAR"),
            ArchiveKind::Web => write!(f, "WAR"),
            ArchiveKind::Android => write!(f, "AAR"),
        }
    }
}

/// What went wrong for one archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    Read,
    Archive,
    Classpath,
    Instrumentation,
    Cancelled,
    Task,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Read => write!(f, "read"),
            FailureKind::Archive => write!(f, "archive"),
            FailureKind::Classpath => write!(f, "classpath"),
            FailureKind::Instrumentation => write!(f, "instrumentation"),
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::Task => write!(f, "task"),
        }
    }
}

/// A per-archive failure collected during a run instead of aborting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub path: PathBuf,
    pub kind: FailureKind,
    pub message: String,
}

/// Snapshot handed to progress callbacks while the manager waits on its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}
