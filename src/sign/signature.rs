use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Structural fingerprint of one code construct.
///
/// A signature is a set of named elements, each carrying a fingerprint. How the
/// elements are derived from bytecode is up to the producer; two signatures
/// built from identical input compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    construct: String,
    elements: BTreeMap<String, String>,
}

impl Signature {
    pub fn new(construct: &str) -> Self {
        Signature {
            construct: construct.to_string(),
            elements: BTreeMap::new(),
        }
    }

    pub fn with_element(mut self, name: &str, fingerprint: &str) -> Self {
        self.insert(name, fingerprint);
        self
    }

    /// Add or replace an element; returns the previous fingerprint.
    pub fn insert(&mut self, name: &str, fingerprint: &str) -> Option<String> {
        self.elements.insert(name.to_string(), fingerprint.to_string())
    }

    pub fn construct(&self) -> &str {
        &self.construct
    }

    pub fn elements(&self) -> &BTreeMap<String, String> {
        &self.elements
    }

    pub fn fingerprint(&self, element: &str) -> Option<&str> {
        self.elements.get(element).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
