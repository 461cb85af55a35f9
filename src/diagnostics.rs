//! Diagnostics reported by the analysis capability and their compiler-style
//! rendering.
//!
//! A rendered diagnostic looks exactly like the TypeScript compiler prints it:
//!
//! ```text
//! errors/file-with-type-error.ts(1,7): error TS2322: Type '123' is not assignable to type 'string'.
//! ```
//!
//! The path is the only part that depends on where the build is run from.
//! Line, column, code and message pass through untouched, and the label is
//! always `error`: severity routing decides where a diagnostic is delivered,
//! not how it reads.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::helpers;

/// Which analysis phase produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    Syntactic,
    Semantic,
    /// Global configuration problems, not tied to a source position.
    Options,
}

/// A position inside a file. Both fields are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiagnosticLocation {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub location: Option<DiagnosticLocation>,
    /// Numeric compiler code, rendered as `TS<code>`.
    pub code: u32,
    pub message: String,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, code: u32, message: impl Into<String>) -> Self {
        Self {
            location: None,
            code,
            message: message.into(),
            kind,
        }
    }

    pub fn at(mut self, file: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        self.location = Some(DiagnosticLocation {
            file: file.into(),
            line,
            column,
        });
        self
    }
}

/// A head message with nested detail messages, as the compiler produces for
/// assignability failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageChain {
    pub message_text: String,
    #[serde(default)]
    pub next: Vec<MessageChain>,
}

impl MessageChain {
    /// Flatten the chain into one message. Every nesting level starts on a new
    /// line indented two spaces deeper than its parent.
    pub fn flatten(&self) -> String {
        let mut out = String::new();
        self.flatten_into(&mut out, 0);
        out
    }

    fn flatten_into(&self, out: &mut String, depth: usize) {
        if depth > 0 {
            out.push('\n');
            out.push_str(&"  ".repeat(depth));
        }
        out.push_str(&self.message_text);
        for child in &self.next {
            child.flatten_into(out, depth + 1);
        }
    }
}

/// Renders diagnostics relative to the build context.
pub struct DiagnosticFormatter<'a> {
    build_context: &'a Path,
}

impl<'a> DiagnosticFormatter<'a> {
    pub fn new(build_context: &'a Path) -> Self {
        Self { build_context }
    }

    pub fn format(&self, diagnostic: &Diagnostic) -> String {
        format_diagnostic(diagnostic, self.build_context)
    }

    pub fn format_all(&self, diagnostics: &[Diagnostic]) -> Vec<String> {
        diagnostics.iter().map(|d| self.format(d)).collect()
    }
}

pub fn format_diagnostic(diagnostic: &Diagnostic, build_context: &Path) -> String {
    match &diagnostic.location {
        Some(location) => format!(
            "{}({},{}): error TS{}: {}",
            helpers::relative_path(build_context, &location.file),
            location.line,
            location.column,
            diagnostic.code,
            diagnostic.message
        ),
        None => format!("error TS{}: {}", diagnostic.code, diagnostic.message),
    }
}
