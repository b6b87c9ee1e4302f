//! Analysis of Java archives: discovery, concurrent unpacking of JAR, WAR and
//! AAR files (nested archives included), optional instrumentation, and the
//! construct signatures used to compare two versions of a library.

pub mod analyzer;
pub mod classpath;
pub mod cli;
pub mod config;
pub mod detector;
pub mod error;
pub mod manager;
pub mod models;
pub mod report;
pub mod sign;
#[cfg(test)]
mod testutil;

pub use crate::analyzer::ArchiveAnalyzer;
pub use crate::error::{AnalysisError, ArchiveError};
pub use crate::manager::{AnalysisManager, InterruptHandle};
pub use crate::sign::{Signature, SignatureChange};
