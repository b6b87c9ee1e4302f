//! Signatures of code constructs and the changes between two of them.
//!
//! - [`signature`] — the [`Signature`] value.
//! - [`change`] — [`SignatureChange`] and its atomic [`Modification`]s.
//!
//! A [`SignatureComparator`] turns a (baseline, candidate) pair into a change;
//! [`ConstructStatus`] is the verdict the vulnerability layer acts on.

pub mod change;
pub mod signature;

use serde::Serialize;

pub use change::{Modification, SignatureChange};
pub use signature::Signature;

use crate::analyzer::{Construct, ConstructKind};

pub trait SignatureComparator {
    fn compare(&self, baseline: &Signature, candidate: &Signature) -> SignatureChange;
}

/// Element-wise comparison: elements only in the candidate are added, elements
/// only in the baseline are removed, elements with differing fingerprints are
/// altered.
pub struct ElementComparator;

impl SignatureComparator for ElementComparator {
    fn compare(&self, baseline: &Signature, candidate: &Signature) -> SignatureChange {
        let mut modifications = Vec::new();

        for (element, before) in baseline.elements() {
            match candidate.fingerprint(element) {
                None => modifications.push(Modification::Removed {
                    element: element.clone(),
                    fingerprint: before.clone(),
                }),
                Some(after) if after != before => modifications.push(Modification::Altered {
                    element: element.clone(),
                    from: before.clone(),
                    to: after.to_string(),
                }),
                Some(_) => {}
            }
        }

        for (element, after) in candidate.elements() {
            if baseline.fingerprint(element).is_none() {
                modifications.push(Modification::Added {
                    element: element.clone(),
                    fingerprint: after.clone(),
                });
            }
        }

        SignatureChange::new(candidate.construct(), modifications)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstructStatus {
    Untouched,
    Modified,
    Removed,
}

impl std::fmt::Display for ConstructStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstructStatus::Untouched => write!(f, "untouched"),
            ConstructStatus::Modified => write!(f, "modified"),
            ConstructStatus::Removed => write!(f, "removed"),
        }
    }
}

impl ConstructStatus {
    /// Classify `candidate` against `baseline`. A missing candidate means the
    /// construct was removed.
    pub fn classify(
        comparator: &dyn SignatureComparator,
        baseline: &Signature,
        candidate: Option<&Signature>,
    ) -> (ConstructStatus, Option<SignatureChange>) {
        match candidate {
            None => (ConstructStatus::Removed, None),
            Some(candidate) => {
                let change = comparator.compare(baseline, candidate);
                let status = if change.is_empty() {
                    ConstructStatus::Untouched
                } else {
                    ConstructStatus::Modified
                };
                (status, Some(change))
            }
        }
    }
}

/// Archive-level signature: one element per class, fingerprinted by its digest.
pub fn archive_signature(name: &str, constructs: &[Construct]) -> Signature {
    let mut signature = Signature::new(name);
    for construct in constructs.iter().filter(|c| c.kind == ConstructKind::Class) {
        signature.insert(&construct.name, &construct.digest);
    }
    signature
}
