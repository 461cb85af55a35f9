//! Compiler configuration descriptors (`tsconfig.json`).
//!
//! Descriptors are JSON with comments and trailing commas, the shape
//! `tsc --init` generates. Only `extends` and `compilerOptions` matter to the
//! loader: the options form an opaque bag handed to the analysis capability,
//! with path-valued entries made absolute against the descriptor that
//! declared them so that `extends` chains keep their meaning.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};

use crate::error::ConfigParseError;
use crate::helpers;

pub const DEFAULT_CONFIG_FILE_NAME: &str = "tsconfig.json";

/// Options whose string values are paths relative to the declaring descriptor.
const PATH_OPTIONS: &[&str] = &["baseUrl", "rootDir", "declarationDir", "outDir", "tsBuildInfoFile"];
/// Options whose array values are paths relative to the declaring descriptor.
const PATH_LIST_OPTIONS: &[&str] = &["rootDirs", "typeRoots"];
/// Set when `paths` is declared; path mappings resolve against it when there is no `baseUrl`.
const PATHS_BASE_KEY: &str = "pathsBasePath";

/// Immutable bag of compiler options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompilerOptions {
    values: Map<String, Value>,
}

impl CompilerOptions {
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Permissive options for files that have no descriptor anywhere above
    /// them. Any valid TypeScript or TSX file transpiles under these.
    pub fn loader_defaults() -> Self {
        let defaults = json!({
            "target": "ES2017",
            "module": "ESNext",
            "moduleResolution": "node",
            "jsx": "react",
            "esModuleInterop": true,
            "resolveJsonModule": true,
        });
        match defaults {
            Value::Object(values) => Self { values },
            _ => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn base_url(&self) -> Option<PathBuf> {
        self.get_str("baseUrl").map(PathBuf::from)
    }

    /// Directory `paths` mappings are resolved against: `baseUrl` when set,
    /// otherwise the descriptor that declared `paths`.
    pub fn paths_base(&self) -> Option<PathBuf> {
        self.base_url()
            .or_else(|| self.get_str(PATHS_BASE_KEY).map(PathBuf::from))
    }

    pub fn paths(&self) -> Option<&Map<String, Value>> {
        self.values.get("paths").and_then(Value::as_object)
    }

    /// `types` restricts which ambient type packages are visible.
    pub fn types(&self) -> Option<Vec<String>> {
        self.values.get("types").and_then(Value::as_array).map(|types| {
            types
                .iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect()
        })
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Overlay `overrides` on top of these options, key by key.
    pub fn merge(&mut self, overrides: &Map<String, Value>) {
        for (key, value) in overrides {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Force the options that would otherwise stop the compiler from handing
    /// back transpiled code in memory.
    pub fn apply_in_memory_emit_overrides(&mut self) {
        for key in ["noEmit", "declaration", "declarationMap", "emitDeclarationOnly", "composite", "incremental"] {
            self.values.insert(key.to_string(), Value::Bool(false));
        }
        for key in ["outDir", "outFile", "out", "declarationDir", "tsBuildInfoFile"] {
            self.values.remove(key);
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Extends {
    One(String),
    Many(Vec<String>),
}

impl Extends {
    fn into_specifiers(self) -> Vec<String> {
        match self {
            Extends::One(spec) => vec![spec],
            Extends::Many(specs) => specs,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    #[serde(default)]
    extends: Option<Extends>,
    #[serde(default)]
    compiler_options: Option<Map<String, Value>>,
}

/// Read a descriptor and everything it extends, returning the merged options.
pub fn read_config(descriptor: &Path) -> Result<CompilerOptions, ConfigParseError> {
    let mut chain = Vec::new();
    read_config_chain(&helpers::get_abs_path(descriptor), &mut chain)
}

fn read_config_chain(path: &Path, chain: &mut Vec<PathBuf>) -> Result<CompilerOptions, ConfigParseError> {
    if chain.iter().any(|visited| visited == path) {
        let cycle = chain
            .iter()
            .chain(std::iter::once(&path.to_path_buf()))
            .map(|p| p.display().to_string())
            .collect::<Vec<String>>()
            .join(" -> ");
        return Err(ConfigParseError::new(
            path,
            format!("Circularity detected while resolving configuration: {cycle}"),
        ));
    }
    chain.push(path.to_path_buf());

    let text = helpers::read_file(path).map_err(|e| ConfigParseError::new(path, e.to_string()))?;
    let raw: RawConfig = parse_config_text(&text).map_err(|e| ConfigParseError::new(path, e))?;
    let dir = path.parent().unwrap_or_else(|| Path::new("/"));

    let mut options = CompilerOptions::default();
    for specifier in raw.extends.map(Extends::into_specifiers).unwrap_or_default() {
        let parent = resolve_extends(dir, &specifier)
            .ok_or_else(|| ConfigParseError::new(path, format!("File '{specifier}' not found.")))?;
        log::debug!("{} extends {}", path.display(), parent.display());
        let inherited = read_config_chain(&parent, chain)?;
        options.merge(inherited.as_map());
    }

    if let Some(own) = raw.compiler_options {
        options.merge(&absolutize_paths(own, dir));
    }

    chain.pop();
    Ok(options)
}

fn parse_config_text(text: &str) -> Result<RawConfig, String> {
    let stripped = strip_json_comments(text);
    if stripped.trim().is_empty() {
        return Err(String::from("The configuration file is empty"));
    }
    serde_json::from_str(&stripped).map_err(|e| e.to_string())
}

fn absolutize_paths(mut options: Map<String, Value>, dir: &Path) -> Map<String, Value> {
    let resolve = |value: &str| -> Value {
        Value::String(helpers::normalize_path(&dir.join(value)).to_string_lossy().to_string())
    };
    for key in PATH_OPTIONS {
        if let Some(Value::String(value)) = options.get(*key) {
            let resolved = resolve(value);
            options.insert(key.to_string(), resolved);
        }
    }
    for key in PATH_LIST_OPTIONS {
        if let Some(Value::Array(values)) = options.get(*key) {
            let resolved = values
                .iter()
                .map(|v| match v {
                    Value::String(s) => resolve(s),
                    other => other.clone(),
                })
                .collect();
            options.insert(key.to_string(), Value::Array(resolved));
        }
    }
    if options.contains_key("paths") {
        options.insert(
            PATHS_BASE_KEY.to_string(),
            Value::String(dir.to_string_lossy().to_string()),
        );
    }
    options
}

/// Find the descriptor an `extends` entry points to: a relative or absolute
/// file (with `.json` optional), or a package under some `node_modules`.
fn resolve_extends(dir: &Path, specifier: &str) -> Option<PathBuf> {
    let with_json = |candidate: PathBuf| -> Option<PathBuf> {
        if candidate.is_file() {
            return Some(candidate);
        }
        let mut name = candidate.clone().into_os_string();
        name.push(".json");
        let candidate = PathBuf::from(name);
        candidate.is_file().then_some(candidate)
    };

    let is_relative = specifier.starts_with("./") || specifier.starts_with("../");
    if is_relative || Path::new(specifier).is_absolute() {
        return with_json(helpers::normalize_path(&dir.join(specifier)));
    }

    dir.ancestors().find_map(|ancestor| {
        let in_node_modules = ancestor.join("node_modules").join(specifier);
        with_json(in_node_modules.clone())
            .or_else(|| Some(in_node_modules.join(DEFAULT_CONFIG_FILE_NAME)).filter(|p| p.is_file()))
    })
}

/// Blank out `//` and `/* */` comments and drop trailing commas so the text
/// parses as plain JSON. Newlines are kept so parse errors point at the
/// original line.
pub fn strip_json_comments(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut without_comments = String::with_capacity(text.len());
    let mut i = 0;
    let mut in_string = false;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            without_comments.push(c);
            if c == '\\' && i + 1 < chars.len() {
                without_comments.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match (c, chars.get(i + 1)) {
            ('"', _) => {
                in_string = true;
                without_comments.push(c);
                i += 1;
            }
            ('/', Some('/')) => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            ('/', Some('*')) => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    if chars[i] == '\n' {
                        without_comments.push('\n');
                    }
                    i += 1;
                }
                i += 2;
                without_comments.push(' ');
            }
            _ => {
                without_comments.push(c);
                i += 1;
            }
        }
    }

    strip_trailing_commas(&without_comments)
}

fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
            out.push(c);
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if !matches!(next, Some('}') | Some(']')) {
                out.push(c);
            }
        } else {
            out.push(c);
        }
        i += 1;
    }
    out
}
