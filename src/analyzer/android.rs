use std::path::Path;

use super::ArchiveLayout;

pub const CLASSES_JAR: &str = "classes.jar";
pub const DEFAULT_INCLUDE_DIR: &str = "libs";

/// Android library: compiled code is packed into `classes.jar` and bundled
/// libraries under the include directory, so the AAR itself holds no classes.
pub struct AndroidLayout;

impl ArchiveLayout for AndroidLayout {
    fn class_name(&self, _entry: &str) -> Option<String> {
        None
    }

    fn accepts_nested(&self, entry: &str, include_dir: Option<&Path>) -> bool {
        let include = include_dir.unwrap_or(Path::new(DEFAULT_INCLUDE_DIR));
        entry == CLASSES_JAR || Path::new(entry).starts_with(include)
    }
}
