//! The seam to the type-checking and transpiling engine.
//!
//! The orchestration core never parses or checks anything itself. Each
//! configuration root gets its own [`Analyzer`], created by an
//! [`AnalyzerFactory`] with that root's options, and only ever sees files the
//! root owns. An analyzer is stateful (it grows a program as files are added)
//! and is never called concurrently.

pub mod process;

use std::path::Path;

use crate::config::CompilerOptions;
use crate::diagnostics::Diagnostic;
use crate::error::AnalysisError;

/// Transpiled code plus whatever the engine reported for the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisOutput {
    pub code: String,
    pub diagnostics: Vec<Diagnostic>,
}

pub trait Analyzer: Send {
    /// Transpile and type-check `file`. Diagnostics are part of a successful
    /// result; `Err` means the engine itself could not do its job.
    fn analyze(&mut self, file: &Path, source: &str) -> Result<AnalysisOutput, AnalysisError>;
}

/// Where a configuration root lives, as seen by an analyzer.
#[derive(Debug, Clone, Copy)]
pub struct RootInfo<'a> {
    pub directory: &'a Path,
    /// `None` for the synthesized default root.
    pub descriptor: Option<&'a Path>,
}

pub trait AnalyzerFactory: Send + Sync {
    fn create(&self, root: RootInfo<'_>, options: &CompilerOptions) -> Result<Box<dyn Analyzer>, AnalysisError>;
}
