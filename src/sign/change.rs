use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One atomic structural difference between two signatures.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Modification {
    Added { element: String, fingerprint: String },
    Removed { element: String, fingerprint: String },
    Altered { element: String, from: String, to: String },
}

/// The set of modifications turning one signature into another.
///
/// Immutable once built. The modifications are kept ordered so that the JSON
/// form of an unchanged value is byte-identical on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureChange {
    construct: String,
    modifications: BTreeSet<Modification>,
}

impl SignatureChange {
    pub fn new(construct: &str, modifications: impl IntoIterator<Item = Modification>) -> Self {
        SignatureChange {
            construct: construct.to_string(),
            modifications: modifications.into_iter().collect(),
        }
    }

    pub fn construct(&self) -> &str {
        &self.construct
    }

    pub fn modifications(&self) -> &BTreeSet<Modification> {
        &self.modifications
    }

    /// True iff there is no modification at all.
    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty()
    }

    pub fn len(&self) -> usize {
        self.modifications.len()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<SignatureChange> {
        serde_json::from_str(json)
    }
}
