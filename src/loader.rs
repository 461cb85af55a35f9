//! The bundler-facing entry point.
//!
//! A [`Loader`] lives for one build. It owns the resolver (and through it the
//! registry of configuration nodes) and the compilation cache, and turns each
//! requested file into transpiled code plus routed diagnostic text.

use ahash::AHashSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::analysis::AnalyzerFactory;
use crate::cache::{CacheStats, CompilationCache};
use crate::config::DEFAULT_CONFIG_FILE_NAME;
use crate::diagnostics::DiagnosticFormatter;
use crate::error::LoaderError;
use crate::helpers;
use crate::registry::ConfigurationNode;
use crate::resolver::{ConfigResolver, ResolverSettings};
use crate::routing::{self, SeverityPolicy};

/// Options as the bundler passes them, e.g. `{ "warnOnly": true }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoaderOptions {
    pub warn_only: bool,
    pub config_file_name: String,
    pub config_lookup: bool,
    pub compiler_options: Map<String, Value>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            warn_only: false,
            config_file_name: String::from(DEFAULT_CONFIG_FILE_NAME),
            config_lookup: true,
            compiler_options: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Succeeded,
    /// Compiled, but the analyzer reported diagnostics. Not a failure by itself.
    SucceededWithDiagnostics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoaderOutput {
    pub code: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub outcome: FileOutcome,
}

#[derive(Debug, Clone, Copy)]
enum FileState {
    Unresolved,
    Resolving,
    Resolved,
    Compiling,
    Succeeded,
    SucceededWithDiagnostics,
    Failed,
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileState::Unresolved => "unresolved",
            FileState::Resolving => "resolving",
            FileState::Resolved => "resolved",
            FileState::Compiling => "compiling",
            FileState::Succeeded => "succeeded",
            FileState::SucceededWithDiagnostics => "succeeded with diagnostics",
            FileState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

fn transition(file: &Path, from: FileState, to: FileState) {
    log::trace!("{}: {from} -> {to}", file.display());
}

pub struct Loader {
    build_context: PathBuf,
    policy: SeverityPolicy,
    resolver: ConfigResolver,
    cache: CompilationCache,
}

impl Loader {
    pub fn new(build_context: &Path, options: LoaderOptions, factory: Arc<dyn AnalyzerFactory>) -> Self {
        let build_context = helpers::get_abs_path(build_context);
        let settings = ResolverSettings {
            config_file_name: options.config_file_name,
            config_lookup: options.config_lookup,
            compiler_options: options.compiler_options,
        };
        log::debug!(
            "Starting build in {} (warnOnly: {})",
            build_context.display(),
            options.warn_only
        );
        Self {
            resolver: ConfigResolver::new(&build_context, settings, factory),
            policy: SeverityPolicy::new(options.warn_only),
            cache: CompilationCache::new(),
            build_context,
        }
    }

    pub fn build_context(&self) -> &Path {
        &self.build_context
    }

    /// The configuration node owning `file`.
    pub fn resolve(&self, file: &Path) -> Result<Arc<ConfigurationNode>, LoaderError> {
        self.resolver.resolve(&helpers::get_abs_path(file))
    }

    /// Read `file` from disk and compile it.
    pub fn compile(&self, file: &Path) -> Result<LoaderOutput, LoaderError> {
        let file = helpers::get_abs_path(file);
        let source = helpers::read_file(&file).map_err(|source| LoaderError::Io {
            path: file.clone(),
            source,
        })?;
        self.compile_source(&file, &source)
    }

    /// Compile `source` as the contents of `file`.
    pub fn compile_source(&self, file: &Path, source: &str) -> Result<LoaderOutput, LoaderError> {
        let file = helpers::get_abs_path(file);

        transition(&file, FileState::Unresolved, FileState::Resolving);
        let node = self.resolver.resolve(&file).inspect_err(|_| {
            transition(&file, FileState::Resolving, FileState::Failed);
        })?;
        transition(&file, FileState::Resolving, FileState::Resolved);

        transition(&file, FileState::Resolved, FileState::Compiling);
        let result = self.cache.get_or_compile(&file, source, &node).inspect_err(|_| {
            transition(&file, FileState::Compiling, FileState::Failed);
        })?;

        let formatted = DiagnosticFormatter::new(&self.build_context).format_all(&result.diagnostics);
        let outcome = if formatted.is_empty() {
            transition(&file, FileState::Compiling, FileState::Succeeded);
            FileOutcome::Succeeded
        } else {
            transition(&file, FileState::Compiling, FileState::SucceededWithDiagnostics);
            FileOutcome::SucceededWithDiagnostics
        };

        let routed = routing::route(formatted, &self.policy);
        Ok(LoaderOutput {
            code: result.code.clone(),
            errors: routed.errors,
            warnings: routed.warnings,
            outcome,
        })
    }

    /// Compile `files` in parallel. A configuration error anywhere aborts the
    /// build; any other failure is reported for its file only.
    pub fn compile_all(&self, files: &[PathBuf]) -> Result<BuildReport, LoaderError> {
        let reports = files
            .par_iter()
            .map(|file| match self.compile(file) {
                Err(e) if e.is_build_fatal() => Err(e),
                output => Ok(FileReport {
                    file: helpers::get_abs_path(file),
                    output,
                }),
            })
            .collect::<Result<Vec<FileReport>, LoaderError>>()?;

        let report = BuildReport { files: reports };
        log::info!(
            "Compiled {} file(s) across {} configuration root(s): {} error(s), {} warning(s)",
            report.files.len(),
            self.resolver.registry().len(),
            report.errors().len(),
            report.warnings().len()
        );
        Ok(report)
    }

    /// End of build: drop cache entries for files that are gone and report
    /// how the cache did.
    pub fn finish<I>(&self, live_files: I) -> CacheStats
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let live: AHashSet<PathBuf> = live_files
            .into_iter()
            .map(|file| helpers::get_abs_path(&file))
            .collect();
        let evicted = self.cache.evict_except(&live);
        let stats = self.cache.stats();
        log::info!(
            "Cache: {} hit(s), {} miss(es), {} invalidation(s), {evicted} evicted, hit rate {:.1}%",
            stats.hits,
            stats.misses,
            stats.invalidations,
            stats.hit_rate() * 100.0
        );
        stats
    }
}

#[derive(Debug)]
pub struct FileReport {
    pub file: PathBuf,
    pub output: Result<LoaderOutput, LoaderError>,
}

/// Per-file results of [`Loader::compile_all`], in request order.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub files: Vec<FileReport>,
}

impl BuildReport {
    /// Error diagnostics of every file, followed by each failed file's error.
    pub fn errors(&self) -> Vec<String> {
        let mut errors: Vec<String> = self
            .files
            .iter()
            .filter_map(|report| report.output.as_ref().ok())
            .flat_map(|output| output.errors.iter().cloned())
            .collect();
        errors.extend(self.failed().map(|report| match &report.output {
            Err(e) => e.to_string(),
            Ok(_) => String::new(),
        }));
        errors
    }

    pub fn warnings(&self) -> Vec<String> {
        self.files
            .iter()
            .filter_map(|report| report.output.as_ref().ok())
            .flat_map(|output| output.warnings.iter().cloned())
            .collect()
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|report| report.output.is_err())
    }

    pub fn has_errors(&self) -> bool {
        self.failed().next().is_some()
            || self
                .files
                .iter()
                .filter_map(|report| report.output.as_ref().ok())
                .any(|output| !output.errors.is_empty())
    }
}
