use std::path::Path;

use super::ArchiveLayout;

/// Plain `.jar`: classes live at the root and nested archives may sit anywhere
/// (e.g. `BOOT-INF/lib/` in executable Spring Boot jars).
pub struct PlainLayout;

impl ArchiveLayout for PlainLayout {
    fn class_name(&self, entry: &str) -> Option<String> {
        super::class_name(entry)
    }

    fn accepts_nested(&self, _entry: &str, _include_dir: Option<&Path>) -> bool {
        true
    }
}
