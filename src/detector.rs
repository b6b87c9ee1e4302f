use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::models::ArchiveKind;

/// Find every supported archive below `path`, sorted.
///
/// A path that is itself an archive yields just that archive.
pub fn discover_archives(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return match ArchiveKind::from_path(path) {
            Some(_) => vec![path.to_path_buf()],
            None => Vec::new(),
        };
    }

    let mut archives: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| ArchiveKind::from_path(p).is_some())
        .collect();
    archives.sort();
    archives
}
