use std::path::Path;

use super::ArchiveLayout;

pub const CLASSES_DIR: &str = "WEB-INF/classes/";
pub const DEFAULT_INCLUDE_DIR: &str = "WEB-INF/lib";

/// Web archive: application classes under `WEB-INF/classes/`, libraries under
/// the include directory.
pub struct WebLayout;

impl ArchiveLayout for WebLayout {
    fn class_name(&self, entry: &str) -> Option<String> {
        entry.strip_prefix(CLASSES_DIR).and_then(super::class_name)
    }

    fn accepts_nested(&self, entry: &str, include_dir: Option<&Path>) -> bool {
        let include = include_dir.unwrap_or(Path::new(DEFAULT_INCLUDE_DIR));
        Path::new(entry).starts_with(include)
    }
}
