use std::collections::BTreeMap;

use serde::Serialize;

pub const MANIFEST_ENTRY: &str = "META-INF/MANIFEST.MF";

/// Main section of a JAR manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    attributes: BTreeMap<String, String>,
}

impl Manifest {
    /// Parse the main section. Lines starting with a single space continue the
    /// previous value; the first empty line ends the section.
    pub fn parse(bytes: &[u8]) -> Manifest {
        let text = String::from_utf8_lossy(bytes);
        let mut attributes = BTreeMap::new();
        let mut current: Option<(String, String)> = None;

        for line in text.lines() {
            if let Some(rest) = line.strip_prefix(' ') {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(rest);
                }
                continue;
            }
            if let Some((key, value)) = current.take() {
                attributes.insert(key, value);
            }
            if line.trim().is_empty() {
                break;
            }
            if let Some((key, value)) = line.split_once(':') {
                current = Some((key.trim().to_string(), value.trim_start().to_string()));
            }
        }
        if let Some((key, value)) = current {
            attributes.insert(key, value);
        }

        Manifest { attributes }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Relative archive references from the `Class-Path` attribute.
    pub fn class_path(&self) -> Vec<String> {
        self.get("Class-Path")
            .map(|cp| cp.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }
}
