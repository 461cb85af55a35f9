//! Out-of-process language service backend.
//!
//! One service process is spawned per configuration root, in the root's
//! directory, and kept alive for the build so its program accumulates files.
//! The protocol is newline-delimited JSON over stdin/stdout:
//!
//! ```text
//! -> {"kind":"init","rootDir":"/app","configPath":"/app/tsconfig.json","compilerOptions":{...}}
//! -> {"kind":"analyze","fileName":"/app/src/a.ts","text":"..."}
//! <- {"outputText":"...","diagnostics":[{"fileName":"/app/src/a.ts","line":0,"character":6,
//!      "code":2322,"category":"semantic","messageText":"..."}]}
//! <- {"error":"..."}
//! ```
//!
//! Wire positions are 0-based (as the compiler API reports them) and become
//! 1-based here. Anything the service prints on stderr is logged as a warning.

use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use super::{AnalysisOutput, Analyzer, AnalyzerFactory, RootInfo};
use crate::config::CompilerOptions;
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticLocation, MessageChain};
use crate::error::AnalysisError;
use crate::helpers;

#[derive(Debug, Clone)]
pub struct ProcessAnalyzerFactory {
    program: String,
    args: Vec<String>,
}

impl ProcessAnalyzerFactory {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl AnalyzerFactory for ProcessAnalyzerFactory {
    fn create(&self, root: RootInfo<'_>, options: &CompilerOptions) -> Result<Box<dyn Analyzer>, AnalysisError> {
        let spawn_error = |e: io::Error| {
            AnalysisError::new(
                root.directory,
                format!("Could not start language service '{}': {e}", self.program),
            )
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(root.directory)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            return Err(AnalysisError::new(
                root.directory,
                "Language service pipes are not available",
            ));
        };
        if let Some(stderr) = child.stderr.take() {
            forward_stderr(root.directory, stderr);
        }

        let mut analyzer = ProcessAnalyzer {
            root: root.directory.to_path_buf(),
            child,
            stdin,
            stdout: BufReader::new(stdout),
        };
        analyzer
            .send(&Request::Init {
                root_dir: root.directory,
                config_path: root.descriptor,
                compiler_options: options,
            })
            .map_err(|e| {
                AnalysisError::new(
                    root.directory,
                    format!("Could not initialize language service: {e}"),
                )
            })?;
        log::debug!(
            "Started language service '{}' (pid {}) for {}",
            self.program,
            analyzer.child.id(),
            root.directory.display()
        );
        Ok(Box::new(analyzer))
    }
}

fn forward_stderr(root: &Path, stderr: std::process::ChildStderr) {
    let root = root.display().to_string();
    let spawned = std::thread::Builder::new()
        .name(String::from("language-service-stderr"))
        .spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                log::warn!("[language service {root}] {line}");
            }
        });
    if let Err(e) = spawned {
        log::warn!("Could not forward language service stderr: {e}");
    }
}

struct ProcessAnalyzer {
    root: PathBuf,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum Request<'a> {
    #[serde(rename_all = "camelCase")]
    Init {
        root_dir: &'a Path,
        config_path: Option<&'a Path>,
        compiler_options: &'a CompilerOptions,
    },
    #[serde(rename_all = "camelCase")]
    Analyze { file_name: &'a Path, text: &'a str },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Response {
    Failure {
        error: String,
    },
    Success {
        #[serde(rename = "outputText")]
        output_text: String,
        #[serde(default)]
        diagnostics: Vec<WireDiagnostic>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireMessage {
    Text(String),
    Chain(MessageChain),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDiagnostic {
    #[serde(default)]
    file_name: Option<PathBuf>,
    #[serde(default)]
    line: u32,
    #[serde(default)]
    character: u32,
    code: u32,
    #[serde(default = "default_category")]
    category: DiagnosticKind,
    message_text: WireMessage,
}

fn default_category() -> DiagnosticKind {
    DiagnosticKind::Semantic
}

impl WireDiagnostic {
    fn into_diagnostic(self, root: &Path) -> Diagnostic {
        let message = match self.message_text {
            WireMessage::Text(text) => text,
            WireMessage::Chain(chain) => chain.flatten(),
        };
        Diagnostic {
            location: self.file_name.map(|file| DiagnosticLocation {
                file: helpers::normalize_path(&root.join(file)),
                line: self.line + 1,
                column: self.character + 1,
            }),
            code: self.code,
            message,
            kind: self.category,
        }
    }
}

impl ProcessAnalyzer {
    fn send(&mut self, request: &Request<'_>) -> io::Result<()> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes())?;
        self.stdin.flush()
    }

    fn receive(&mut self) -> io::Result<Response> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            let status = self
                .child
                .try_wait()?
                .map(|s| s.to_string())
                .unwrap_or_else(|| String::from("still running"));
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("language service closed its output ({status})"),
            ));
        }
        Ok(serde_json::from_str(&line)?)
    }
}

impl Analyzer for ProcessAnalyzer {
    fn analyze(&mut self, file: &Path, source: &str) -> Result<AnalysisOutput, AnalysisError> {
        let exchange = self
            .send(&Request::Analyze {
                file_name: file,
                text: source,
            })
            .and_then(|_| self.receive());

        match exchange {
            Ok(Response::Success {
                output_text,
                diagnostics,
            }) => Ok(AnalysisOutput {
                code: output_text,
                diagnostics: diagnostics
                    .into_iter()
                    .map(|d| d.into_diagnostic(&self.root))
                    .collect(),
            }),
            Ok(Response::Failure { error }) => Err(AnalysisError::new(file, error)),
            Err(e) => Err(AnalysisError::new(file, e.to_string())),
        }
    }
}

impl Drop for ProcessAnalyzer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
