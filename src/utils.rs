//! Small standalone helpers shared across the loader and binder.

use std::path::{Path, PathBuf};

use crate::config::ResolverConfig;

/// The module root of `path`: the nearest ancestor directory containing a recognized
/// manifest file, or `path`'s own directory when none is found (§4.2).
pub fn module_root(path: &Path, config: &ResolverConfig) -> PathBuf {
    let start = if path.is_dir() { path } else { path.parent().unwrap_or(path) };
    for dir in start.ancestors() {
        if config.module_manifest_names.iter().any(|name| dir.join(name).is_file()) {
            return dir.to_path_buf();
        }
    }
    start.to_path_buf()
}

/// Express `path` relative to `root` with a leading `./`, or as an absolute path when
/// it does not live under `root` (§4.2 step 2).
pub fn relative_pattern(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => format!("./{}", rel.display()),
        _ => path.display().to_string(),
    }
}

/// Parse an `import` host declaration's raw source into `(local_name, import_path)`.
///
/// Supports the bare form (`import "ui"`, local name defaults to the path's last
/// segment) and the aliased form (`import widgets "ui"`). Returns `None` for anything
/// that doesn't carry a quoted path, e.g. a grouped `import (...)` block.
pub fn parse_import_decl(source: &str) -> Option<(String, String)> {
    let rest = source.trim().strip_prefix("import")?.trim_start();
    let (alias, quoted) = match rest.split_once(char::is_whitespace) {
        Some((first, remainder)) if !first.starts_with(['"', '\'']) => (Some(first.to_string()), remainder.trim()),
        _ => (None, rest),
    };
    let path = quoted.trim().trim_matches(['"', '\'', ';']).trim();
    if path.is_empty() {
        return None;
    }
    let local = alias.unwrap_or_else(|| path.rsplit('/').next().unwrap_or(path).to_string());
    Some((local, path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn module_root_finds_nearest_manifest() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("package.json"), "{}").unwrap();
        let nested = root.join("src").join("components");
        fs::create_dir_all(&nested).unwrap();
        let file = nested.join("button.templ.ts");
        fs::write(&file, "package ui").unwrap();

        let config = ResolverConfig::default();
        assert_eq!(module_root(&file, &config), root);
    }

    #[test]
    fn module_root_falls_back_to_file_directory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("button.templ.ts");
        std::fs::write(&file, "package ui").unwrap();
        let config = ResolverConfig::default();
        assert_eq!(module_root(&file, &config), dir.path());
    }

    #[test]
    fn relative_pattern_prefixes_with_dot_slash() {
        let root = Path::new("/m");
        assert_eq!(relative_pattern(Path::new("/m/src/a.ts"), root), "./src/a.ts");
    }

    #[test]
    fn relative_pattern_falls_back_to_absolute_outside_root() {
        let root = Path::new("/m");
        assert_eq!(relative_pattern(Path::new("/other/a.ts"), root), "/other/a.ts");
    }

    #[test]
    fn parse_import_decl_defaults_local_name_to_last_path_segment() {
        assert_eq!(parse_import_decl("import \"ui\""), Some(("ui".to_string(), "ui".to_string())));
        assert_eq!(
            parse_import_decl("import \"widgets/ui\""),
            Some(("ui".to_string(), "widgets/ui".to_string()))
        );
    }

    #[test]
    fn parse_import_decl_honors_an_explicit_alias() {
        assert_eq!(
            parse_import_decl("import widgets \"ui\""),
            Some(("widgets".to_string(), "ui".to_string()))
        );
    }

    #[test]
    fn parse_import_decl_rejects_non_import_declarations() {
        assert_eq!(parse_import_decl("const x = 1;"), None);
    }
}
