//! A scripted stand-in for the type-checking engine.
//!
//! It understands just enough source text to reproduce the compiler behavior
//! the loader is tested against:
//!
//! - unbalanced `(` → `TS1005 ')' expected.` at end of file
//! - `const x: string = 123` → `TS2322` at the declared name
//! - `describe(` / `it(` without `"mocha"` in `types` → `TS2593`
//! - bare imports resolved against `baseUrl`/`paths`, relative imports against
//!   the importing file → `TS2307` when nothing is found
//! - `let x = ...` never read again under `noUnusedLocals` → `TS6133`

use ahash::AHashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::analysis::{AnalysisOutput, Analyzer, AnalyzerFactory, RootInfo};
use crate::config::CompilerOptions;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::AnalysisError;

#[derive(Default)]
struct FixtureState {
    created: AtomicUsize,
    analyses: AtomicUsize,
    seen: Mutex<Vec<(PathBuf, PathBuf)>>,
    failing: Mutex<AHashSet<String>>,
}

#[derive(Clone, Default)]
pub struct FixtureAnalyzerFactory {
    state: Arc<FixtureState>,
}

impl FixtureAnalyzerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make analysis of any file with this name fail as if the engine crashed.
    pub fn fail_on(&self, file_name: &str) {
        self.state.failing.lock().unwrap().insert(file_name.to_string());
    }

    pub fn created(&self) -> usize {
        self.state.created.load(Ordering::SeqCst)
    }

    pub fn analyses(&self) -> usize {
        self.state.analyses.load(Ordering::SeqCst)
    }

    /// Files analyzed by the analyzer of the root at `root_directory`.
    pub fn files_seen_by(&self, root_directory: &Path) -> Vec<PathBuf> {
        self.state
            .seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(root, _)| root == root_directory)
            .map(|(_, file)| file.clone())
            .collect()
    }
}

impl AnalyzerFactory for FixtureAnalyzerFactory {
    fn create(&self, root: RootInfo<'_>, options: &CompilerOptions) -> Result<Box<dyn Analyzer>, AnalysisError> {
        Ok(Box::new(FixtureAnalyzer::new(self, root.directory, options)))
    }
}

pub struct FixtureAnalyzer {
    root: PathBuf,
    options: CompilerOptions,
    state: Arc<FixtureState>,
}

impl FixtureAnalyzer {
    pub fn new(factory: &FixtureAnalyzerFactory, root: &Path, options: &CompilerOptions) -> Self {
        factory.state.created.fetch_add(1, Ordering::SeqCst);
        Self {
            root: root.to_path_buf(),
            options: options.clone(),
            state: factory.state.clone(),
        }
    }

    fn diagnostics(&self, file: &Path, source: &str) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let lines: Vec<&str> = source.lines().collect();

        for (index, line) in lines.iter().enumerate() {
            let line_number = index as u32 + 1;
            if let Some((column, value)) = string_typed_number(line) {
                diagnostics.push(
                    Diagnostic::new(
                        DiagnosticKind::Semantic,
                        2322,
                        format!("Type '{value}' is not assignable to type 'string'."),
                    )
                    .at(file, line_number, column),
                );
            }
            if !self.has_test_runner_types() {
                for name in ["describe", "it"] {
                    if let Some(column) = find_call(line, name) {
                        diagnostics.push(
                            Diagnostic::new(
                                DiagnosticKind::Semantic,
                                2593,
                                format!(
                                    "Cannot find name '{name}'. Do you need to install type definitions for a test runner? Try `npm i --save-dev @types/jest` or `npm i --save-dev @types/mocha`."
                                ),
                            )
                            .at(file, line_number, column),
                        );
                    }
                }
            }
            if let Some((column, specifier)) = import_specifier(line) {
                if !self.resolves(file, specifier) {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticKind::Semantic,
                            2307,
                            format!("Cannot find module '{specifier}' or its corresponding type declarations."),
                        )
                        .at(file, line_number, column),
                    );
                }
            }
            if self.options.get_bool("noUnusedLocals") == Some(true) {
                if let Some((column, name)) = unused_let(line, source) {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticKind::Semantic,
                            6133,
                            format!("'{name}' is declared but its value is never read."),
                        )
                        .at(file, line_number, column),
                    );
                }
            }
        }

        let open = source.matches('(').count();
        let close = source.matches(')').count();
        if open > close {
            let line = source.matches('\n').count() as u32 + 1;
            let column = source.rsplit('\n').next().map_or(0, |last| last.chars().count()) as u32 + 1;
            diagnostics.insert(
                0,
                Diagnostic::new(DiagnosticKind::Syntactic, 1005, "')' expected.").at(file, line, column),
            );
        }

        diagnostics
    }

    fn has_test_runner_types(&self) -> bool {
        self.options
            .types()
            .is_some_and(|types| types.iter().any(|t| t == "mocha" || t == "jest"))
    }

    fn resolves(&self, file: &Path, specifier: &str) -> bool {
        let base = if specifier.starts_with('.') {
            file.parent().map(Path::to_path_buf)
        } else {
            self.options.paths_base()
        };
        let Some(base) = base else {
            return false;
        };
        let target = base.join(specifier);
        ["ts", "tsx", "d.ts"]
            .iter()
            .map(|ext| {
                let mut name = target.clone().into_os_string();
                name.push(".");
                name.push(ext);
                PathBuf::from(name)
            })
            .chain(std::iter::once(target.join("index.ts")))
            .any(|candidate| candidate.is_file())
    }
}

impl Analyzer for FixtureAnalyzer {
    fn analyze(&mut self, file: &Path, source: &str) -> Result<AnalysisOutput, AnalysisError> {
        self.state.analyses.fetch_add(1, Ordering::SeqCst);
        self.state
            .seen
            .lock()
            .unwrap()
            .push((self.root.clone(), file.to_path_buf()));

        let file_name = file.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        if self.state.failing.lock().unwrap().contains(&file_name) {
            return Err(AnalysisError::new(file, "Debug Failure. False expression."));
        }

        Ok(AnalysisOutput {
            code: source.replace(": string", "").replace(": number", ""),
            diagnostics: self.diagnostics(file, source),
        })
    }
}

/// `const name: string = 123` → (1-based column of `name`, `123`).
fn string_typed_number(line: &str) -> Option<(u32, &str)> {
    let rest = line.trim_start();
    let indent = line.len() - rest.len();
    let declaration = rest.strip_prefix("const ")?;
    let (_, init) = declaration.split_once(": string = ")?;
    let value = init.trim_end().trim_end_matches(';').trim();
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(((indent + "const ".len() + 1) as u32, value))
}

/// 1-based column of a call to `name` that is not part of a longer identifier.
fn find_call(line: &str, name: &str) -> Option<u32> {
    let needle = format!("{name}(");
    line.match_indices(&needle).find_map(|(index, _)| {
        let preceded_by_ident = line[..index]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '.');
        (!preceded_by_ident).then_some(index as u32 + 1)
    })
}

/// `import ... from 'spec'` → (1-based column of the opening quote, `spec`).
fn import_specifier(line: &str) -> Option<(u32, &str)> {
    if !line.trim_start().starts_with("import ") {
        return None;
    }
    let from = line.find(" from ")? + " from ".len();
    let quoted = &line[from..];
    let quote = quoted.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let end = quoted[1..].find(quote)?;
    Some(((from + 1) as u32, &quoted[1..1 + end]))
}

/// `let name = ...` where `name` never appears again in `source`.
fn unused_let<'a>(line: &'a str, source: &str) -> Option<(u32, &'a str)> {
    let rest = line.trim_start();
    let indent = line.len() - rest.len();
    let declaration = rest.strip_prefix("let ")?;
    let name = declaration.split(|c: char| !(c.is_alphanumeric() || c == '_')).next()?;
    if name.is_empty() || source.matches(name).count() > 1 {
        return None;
    }
    Some(((indent + "let ".len() + 1) as u32, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_string_typed_number() {
        assert_eq!(string_typed_number("const a: string = 123;"), Some((7, "123")));
        assert_eq!(string_typed_number("const a: string = 'x';"), None);
    }

    #[test]
    fn finds_calls_on_word_boundaries() {
        assert_eq!(find_call("describe('x', () => {", "describe"), Some(1));
        assert_eq!(find_call("form.submit()", "it"), None);
    }

    #[test]
    fn extracts_import_specifier() {
        assert_eq!(
            import_specifier("import { a } from 'first/exports-value';"),
            Some((19, "first/exports-value"))
        );
    }
}
