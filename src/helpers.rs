use path_clean::PathClean;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Turn `path` into an absolute, lexically normalized path.
///
/// Symlinks are not resolved; diagnostics echo the paths the bundler uses.
pub fn get_abs_path(path: &Path) -> PathBuf {
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };
    normalize_path(&abs)
}

/// Resolve `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.clean()
}

/// Walk from `start` up through its ancestors and return the first
/// `<dir>/<file_name>` that exists. `start` itself is the first candidate.
pub fn get_nearest_config(start: &Path, file_name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(file_name))
        .find(|candidate| candidate.is_file())
}

/// Relative path from directory `from` to `to`, always with `/` separators and
/// without a leading `./`. Both paths are expected to be absolute.
pub fn relative_path(from: &Path, to: &Path) -> String {
    let from = from.clean();
    let to = to.clean();
    match pathdiff::diff_paths(&to, &from) {
        Some(relative) => relative
            .components()
            .filter(|component| !matches!(component, Component::CurDir))
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        // different prefixes (e.g. drive letters) have no relative form
        None => to_slash(&to),
    }
}

/// Render a path with forward slashes regardless of platform.
fn to_slash(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        raw.to_string()
    } else {
        raw.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

pub fn is_inside(dir: &Path, path: &Path) -> bool {
    normalize_path(path).starts_with(normalize_path(dir))
}

pub fn compute_fingerprint(contents: &str) -> blake3::Hash {
    blake3::hash(contents.as_bytes())
}

pub fn read_file(path: &Path) -> io::Result<String> {
    let contents = fs::read(path)?;
    // a UTF-8 BOM is legal in both source files and tsconfig.json
    let contents = contents.strip_prefix(&[0xEF, 0xBB, 0xBF][..]).unwrap_or(&contents);
    String::from_utf8(contents.to_vec()).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_dot_segments() {
        assert_eq!(
            normalize_path(Path::new("/a/b/./c/../d")),
            PathBuf::from("/a/b/d")
        );
        assert_eq!(normalize_path(Path::new("/../a")), PathBuf::from("/a"));
    }

    #[test]
    fn relative_path_to_descendant_has_no_dot_prefix() {
        let rel = relative_path(Path::new("/fixtures"), Path::new("/fixtures/errors/file.ts"));
        assert_eq!(rel, "errors/file.ts");
    }

    #[test]
    fn relative_path_in_same_directory_is_bare_file_name() {
        let rel = relative_path(Path::new("/fixtures/errors"), Path::new("/fixtures/errors/file.ts"));
        assert_eq!(rel, "file.ts");
    }

    #[test]
    fn relative_path_outside_directory_climbs() {
        let rel = relative_path(Path::new("/fixtures/a/b"), Path::new("/fixtures/c/file.ts"));
        assert_eq!(rel, "../../c/file.ts");
    }

    #[test]
    fn relative_path_cleans_both_ends_first() {
        assert_eq!(relative_path(Path::new("/"), Path::new("/a/b.ts")), "a/b.ts");
        assert_eq!(relative_path(Path::new("/x/y/"), Path::new("/x/y/z.ts")), "z.ts");
        assert_eq!(relative_path(Path::new("/x/y/.."), Path::new("/x/z.ts")), "z.ts");
        assert_eq!(relative_path(Path::new("/x"), Path::new("/x/./a/../b.ts")), "b.ts");
    }

    #[test]
    fn nearest_config_prefers_closest_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("a").join("tsconfig.json"), "{}").unwrap();
        fs::write(nested.join("tsconfig.json"), "{}").unwrap();

        assert_eq!(
            get_nearest_config(&nested, "tsconfig.json"),
            Some(nested.join("tsconfig.json"))
        );
        assert_eq!(
            get_nearest_config(&dir.path().join("a"), "tsconfig.json"),
            Some(dir.path().join("a").join("tsconfig.json"))
        );
    }

    #[test]
    fn read_file_strips_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bom.ts");
        fs::write(&path, b"\xEF\xBB\xBFconst a = 1;").unwrap();
        assert_eq!(read_file(&path).unwrap(), "const a = 1;");
    }
}
