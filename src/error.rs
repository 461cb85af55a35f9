//! Failures that stop a file (or a whole build) from compiling.
//!
//! A type error is not one of these: it is a successful compilation result
//! that carries diagnostics.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A configuration descriptor could not be read or understood.
#[derive(Debug, Error)]
#[error("Could not parse compiler configuration at {}: {reason}", path.display())]
pub struct ConfigParseError {
    pub path: PathBuf,
    pub reason: String,
}

impl ConfigParseError {
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// The analysis capability crashed or could not produce a result.
#[derive(Debug, Error)]
#[error("Analysis of {} failed: {reason}", file.display())]
pub struct AnalysisError {
    pub file: PathBuf,
    pub reason: String,
}

impl AnalysisError {
    pub fn new(file: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error(transparent)]
    ConfigParse(#[from] ConfigParseError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error("Could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LoaderError {
    /// Configuration failures abort the whole build, everything else only the
    /// file that produced it.
    pub fn is_build_fatal(&self) -> bool {
        matches!(self, LoaderError::ConfigParse(_))
    }
}
