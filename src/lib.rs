//! tsloader - TypeScript transpile-and-typecheck orchestration for bundlers
//!
//! The heavy lifting (parsing, type checking, emitting JavaScript) belongs to
//! an external analysis capability. This crate decides which compiler
//! configuration governs each file, keeps configuration roots isolated from
//! one another, caches results for the length of a build, and turns
//! diagnostics into compiler-style text routed as errors or warnings.
//!
//! # Architecture
//!
//! - [`Loader`] - Per-build entry point, one per bundler invocation
//! - [`resolver::ConfigResolver`] - Maps a file to its nearest configuration root
//! - [`registry::IsolationRegistry`] - Exactly one [`ConfigurationNode`] per root
//! - [`cache::CompilationCache`] - Fingerprint-keyed, single-flight result cache
//! - [`diagnostics::DiagnosticFormatter`] and [`routing`] - Text and severity
//!
//! # Concurrency Model
//!
//! `Loader` is `Send + Sync`. Files compile in parallel; requests that land
//! in the same configuration root share its analyzer one at a time.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tsloader::{Loader, LoaderOptions, ProcessAnalyzerFactory};
//!
//! let factory = Arc::new(ProcessAnalyzerFactory::new("ts-language-service", vec![]));
//! let loader = Loader::new(Path::new("."), LoaderOptions::default(), factory);
//! let report = loader.compile_all(&files)?;
//! for error in report.errors() {
//!     eprintln!("{error}");
//! }
//! ```

#![warn(rust_2018_idioms)]
#![allow(clippy::uninlined_format_args)]

pub mod analysis;
pub mod cache;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod helpers;
pub mod loader;
pub mod registry;
pub mod resolver;
pub mod routing;

#[cfg(test)]
pub(crate) mod testing;

pub use analysis::process::ProcessAnalyzerFactory;
pub use analysis::{AnalysisOutput, Analyzer, AnalyzerFactory};
pub use config::CompilerOptions;
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use error::{AnalysisError, ConfigParseError, LoaderError};
pub use loader::{BuildReport, FileOutcome, Loader, LoaderOptions, LoaderOutput};
pub use registry::ConfigurationNode;
