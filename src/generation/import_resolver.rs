// Relative import resolution for generated source files

use crate::models::{normalize_path, ImportReference};
use std::collections::HashSet;

/// Source extensions tried when an import omits one
pub const SOURCE_EXTENSIONS: [&str; 2] = [".ts", ".tsx"];

/// Whether an import string is relative to the importing file
pub fn is_relative_import(import_path: &str) -> bool {
    import_path.starts_with("./") || import_path.starts_with("../")
}

/// Compute candidate paths for a relative import.
///
/// Returns nothing for bare or aliased specifiers (`react`, `@/lib/x`), which
/// are never reported missing. Candidates are, in order: the bare resolved
/// path, each source extension appended, and an index file per extension.
pub fn resolve(from_path: &str, import_path: &str) -> Vec<String> {
    if !is_relative_import(import_path) {
        return Vec::new();
    }

    let resolved = resolve_base(from_path, import_path);
    if resolved.is_empty() {
        return Vec::new();
    }

    let mut candidates = Vec::with_capacity(1 + SOURCE_EXTENSIONS.len() * 2);
    candidates.push(resolved.clone());
    for ext in SOURCE_EXTENSIONS {
        candidates.push(format!("{}{}", resolved, ext));
    }
    for ext in SOURCE_EXTENSIONS {
        candidates.push(format!("{}/index{}", resolved, ext));
    }
    candidates
}

/// Resolve an import against the importing file's directory without adding
/// any extension. Parent segments above the project root are clamped.
pub fn resolve_base(from_path: &str, import_path: &str) -> String {
    let from = normalize_path(from_path);
    let mut segments: Vec<&str> = from.split('/').collect();
    // Drop the file name to get the directory
    segments.pop();

    for part in import_path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// Build an [`ImportReference`] for a relative import
pub fn reference(from_path: &str, import_path: &str) -> ImportReference {
    ImportReference {
        from_file: normalize_path(from_path),
        import_path: import_path.to_string(),
        resolved_candidates: resolve(from_path, import_path),
    }
}

/// Strip the final extension from a path's file name, if it has one
pub fn strip_extension(path: &str) -> &str {
    let name_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[name_start..].rfind('.') {
        // Dotfiles like `.env` keep their name
        Some(0) | None => path,
        Some(dot) => &path[..name_start + dot],
    }
}

/// The set of paths an import may resolve to.
///
/// Holds every known path plus its extension-stripped form, so `./App`
/// is satisfied by `App.jsx` as well as by `App.tsx`.
#[derive(Debug, Clone, Default)]
pub struct KnownPaths {
    paths: HashSet<String>,
}

impl KnownPaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_paths<'a, I>(paths: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut known = Self::new();
        for path in paths {
            known.insert(path);
        }
        known
    }

    pub fn insert(&mut self, path: &str) {
        let normalized = normalize_path(path);
        let stripped = strip_extension(&normalized).to_string();
        self.paths.insert(normalized);
        self.paths.insert(stripped);
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Whether any candidate of the reference exists
    pub fn satisfies(&self, reference: &ImportReference) -> bool {
        reference
            .resolved_candidates
            .iter()
            .any(|candidate| self.contains(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_directory_candidates() {
        let candidates = resolve("src/App.tsx", "./pages/Home");
        assert_eq!(
            candidates,
            vec![
                "src/pages/Home",
                "src/pages/Home.ts",
                "src/pages/Home.tsx",
                "src/pages/Home/index.ts",
                "src/pages/Home/index.tsx",
            ]
        );
    }

    #[test]
    fn test_parent_directory() {
        assert_eq!(
            resolve_base("src/components/Nav.tsx", "../pages/Home"),
            "src/pages/Home"
        );
        assert_eq!(resolve_base("src/a/b/c.ts", "../../x"), "src/x");
    }

    #[test]
    fn test_parent_above_root_is_clamped() {
        assert_eq!(resolve_base("App.tsx", "../../lib/util"), "lib/util");
    }

    #[test]
    fn test_non_relative_imports_ignored() {
        assert!(resolve("src/App.tsx", "react").is_empty());
        assert!(resolve("src/App.tsx", "@/components/Button").is_empty());
        assert!(resolve("src/App.tsx", "/abs/path").is_empty());
    }

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("src/App.tsx"), "src/App");
        assert_eq!(strip_extension("src/App"), "src/App");
        assert_eq!(strip_extension("src/.env"), "src/.env");
        assert_eq!(strip_extension("src.d/file"), "src.d/file");
    }

    #[test]
    fn test_known_paths_satisfy_stripped_form() {
        let known = KnownPaths::from_paths(["src/pages/Home.jsx", "src/lib/index.ts"]);
        assert!(known.satisfies(&reference("src/App.tsx", "./pages/Home")));
        assert!(known.satisfies(&reference("src/App.tsx", "./lib")));
        assert!(!known.satisfies(&reference("src/App.tsx", "./pages/About")));
    }

    #[test]
    fn test_explicit_extension_satisfied_by_bare_candidate() {
        let known = KnownPaths::from_paths(["src/index.css"]);
        assert!(known.satisfies(&reference("src/main.tsx", "./index.css")));
    }
}
