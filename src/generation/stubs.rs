// Stub repairer - placeholder files for imports that resolve to nothing

use crate::generation::validator::{is_source_file, is_stylesheet};
use crate::models::{file_name, GeneratedFile, MissingImport, StubCandidate, StubKind};
use std::collections::HashSet;

/// Directory names whose modules are treated as plain helpers
const UTIL_DIRECTORIES: [&str; 4] = ["utils", "util", "lib", "helpers"];

/// Decides what kind of module a missing import should become
pub trait StubClassifier: Send + Sync {
    fn classify(&self, target_path: &str) -> StubKind;
}

/// Classifies by file and directory naming conventions
#[derive(Debug, Clone, Copy, Default)]
pub struct NamingClassifier;

impl StubClassifier for NamingClassifier {
    fn classify(&self, target_path: &str) -> StubKind {
        if is_stylesheet(target_path) {
            return StubKind::Stylesheet;
        }

        let stem = file_stem(target_path);
        let directories: Vec<&str> = target_path.split('/').rev().skip(1).collect();

        if is_hook_name(stem) || directories.contains(&"hooks") {
            StubKind::Hook
        } else if directories.iter().any(|dir| UTIL_DIRECTORIES.contains(dir)) {
            StubKind::Util
        } else {
            StubKind::Component
        }
    }
}

/// `useAuth` or `use-auth`
fn is_hook_name(stem: &str) -> bool {
    match stem.strip_prefix("use") {
        Some(rest) => rest.starts_with('-') || rest.chars().next().is_some_and(|c| c.is_ascii_uppercase()),
        None => false,
    }
}

fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(dot) => &name[..dot],
    }
}

/// Target file for a resolved import path.
///
/// Keeps an existing source or stylesheet extension; otherwise `.tsx` for
/// capitalized names and `.ts` for everything else.
pub fn target_path(resolved_path: &str) -> String {
    if is_source_file(resolved_path) || is_stylesheet(resolved_path) {
        return resolved_path.to_string();
    }

    let capitalized = file_name(resolved_path)
        .chars()
        .next()
        .is_some_and(|c| c.is_uppercase());
    if capitalized {
        format!("{}.tsx", resolved_path)
    } else {
        format!("{}.ts", resolved_path)
    }
}

/// Split a name into alphanumeric words
fn words(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Identifier for the module: the file stem, or the directory name for index files
fn base_name(path: &str) -> &str {
    let stem = file_stem(path);
    if stem == "index" {
        let mut segments = path.rsplit('/');
        segments.next();
        segments.next().unwrap_or(stem)
    } else {
        stem
    }
}

fn ensure_identifier(name: String, fallback: &str) -> String {
    match name.chars().next() {
        None => fallback.to_string(),
        Some(c) if c.is_ascii_digit() => format!("_{}", name),
        Some(_) => name,
    }
}

/// `use-auth` -> `useAuth`, `format_date` -> `formatDate`
fn camel_identifier(path: &str) -> String {
    let parts = words(base_name(path));
    let mut name = String::new();
    for (i, word) in parts.iter().enumerate() {
        if i == 0 {
            name.push_str(word);
        } else {
            name.push_str(&capitalize(word));
        }
    }
    ensure_identifier(name, "placeholder")
}

/// `nav-bar` -> `NavBar`
fn pascal_identifier(path: &str) -> String {
    let name: String = words(base_name(path)).iter().map(|w| capitalize(w)).collect();
    ensure_identifier(name, "Placeholder")
}

fn is_typescript(path: &str) -> bool {
    path.ends_with(".ts") || path.ends_with(".tsx")
}

fn is_jsx(path: &str) -> bool {
    path.ends_with(".tsx") || path.ends_with(".jsx")
}

fn header(path: &str) -> String {
    format!("// Placeholder generated for a missing import: {}\n", path)
}

/// No-op function with named and default exports, used for hooks and helpers
fn noop_function_source(path: &str) -> String {
    let name = camel_identifier(path);
    let signature = if is_typescript(path) {
        format!("export function {}(..._args: unknown[]): any {{", name)
    } else {
        format!("export function {}(..._args) {{", name)
    };
    format!(
        "{}\n{}\n  return undefined;\n}}\n\nexport default {};\n",
        header(path),
        signature,
        name
    )
}

fn component_source(path: &str) -> String {
    let name = pascal_identifier(path);
    let message = format!("{} is not implemented yet.", name);
    let style = "{ padding: '1rem', border: '2px dashed #f59e0b', color: '#b45309' }";

    if is_jsx(path) {
        format!(
            "{header}\nexport function {name}() {{\n  return (\n    <div data-placeholder=\"{name}\" style={{{style}}}>\n      {message}\n    </div>\n  );\n}}\n\nexport default {name};\n",
            header = header(path),
            name = name,
            style = style,
            message = message,
        )
    } else {
        format!(
            "{header}import React from 'react';\n\nexport function {name}() {{\n  return React.createElement(\n    'div',\n    {{ 'data-placeholder': '{name}', style: {style} }},\n    '{message}'\n  );\n}}\n\nexport default {name};\n",
            header = header(path),
            name = name,
            style = style,
            message = message,
        )
    }
}

fn stylesheet_source(path: &str) -> String {
    format!("/* Placeholder generated for a missing import: {} */\n", path)
}

/// Synthesizes placeholder modules for missing imports
pub struct StubRepairer {
    classifier: Box<dyn StubClassifier>,
}

impl Default for StubRepairer {
    fn default() -> Self {
        Self::new()
    }
}

impl StubRepairer {
    pub fn new() -> Self {
        Self::with_classifier(Box::new(NamingClassifier))
    }

    pub fn with_classifier(classifier: Box<dyn StubClassifier>) -> Self {
        Self { classifier }
    }

    /// One candidate per distinct target path, in first-seen order
    pub fn candidates(&self, missing: &[MissingImport]) -> Vec<StubCandidate> {
        let mut seen = HashSet::new();
        missing
            .iter()
            .map(|m| target_path(&m.resolved_path))
            .filter(|target| seen.insert(target.clone()))
            .map(|target| StubCandidate {
                inferred_kind: self.classifier.classify(&target),
                resolved_path: target,
            })
            .collect()
    }

    /// Generate stub files for the missing imports
    pub fn repair(&self, missing: &[MissingImport]) -> Vec<GeneratedFile> {
        self.candidates(missing)
            .into_iter()
            .map(|candidate| {
                log::info!(
                    "Creating {:?} stub for {}",
                    candidate.inferred_kind,
                    candidate.resolved_path
                );
                let content = stub_source(&candidate);
                GeneratedFile::new(&candidate.resolved_path, content)
            })
            .collect()
    }
}

/// Placeholder source for a stub candidate
pub fn stub_source(candidate: &StubCandidate) -> String {
    let path = candidate.resolved_path.as_str();
    match candidate.inferred_kind {
        StubKind::Hook | StubKind::Util => noop_function_source(path),
        StubKind::Component => component_source(path),
        StubKind::Stylesheet => stylesheet_source(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::validator::extract_imports;

    fn missing(from: &str, resolved: &str) -> MissingImport {
        MissingImport {
            from: from.to_string(),
            import_path: String::new(),
            resolved_path: resolved.to_string(),
        }
    }

    #[test]
    fn test_target_paths() {
        assert_eq!(target_path("src/pages/Home"), "src/pages/Home.tsx");
        assert_eq!(target_path("src/lib/format"), "src/lib/format.ts");
        assert_eq!(target_path("src/App.jsx"), "src/App.jsx");
        assert_eq!(target_path("src/theme.css"), "src/theme.css");
    }

    #[test]
    fn test_classification() {
        let classifier = NamingClassifier;
        assert_eq!(classifier.classify("src/hooks/useAuth.ts"), StubKind::Hook);
        assert_eq!(classifier.classify("src/use-auth.ts"), StubKind::Hook);
        assert_eq!(classifier.classify("src/hooks/auth.ts"), StubKind::Hook);
        assert_eq!(classifier.classify("src/utils/format.ts"), StubKind::Util);
        assert_eq!(classifier.classify("src/lib/api.ts"), StubKind::Util);
        assert_eq!(classifier.classify("src/theme.scss"), StubKind::Stylesheet);
        assert_eq!(classifier.classify("src/pages/Home.tsx"), StubKind::Component);
        assert_eq!(classifier.classify("src/user.ts"), StubKind::Component);
    }

    #[test]
    fn test_two_importers_one_stub() {
        let repairer = StubRepairer::new();
        let stubs = repairer.repair(&[
            missing("src/App.tsx", "src/pages/Home"),
            missing("src/components/Nav.tsx", "src/pages/Home"),
        ]);
        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].path, "src/pages/Home.tsx");
        assert!(stubs[0].content.contains("export function Home()"));
        assert!(stubs[0].content.contains("export default Home;"));
        assert!(stubs[0].content.contains("not implemented"));
    }

    #[test]
    fn test_stubs_are_deterministic() {
        let repairer = StubRepairer::new();
        let input = [missing("a.ts", "src/hooks/use-auth")];
        assert_eq!(repairer.repair(&input), repairer.repair(&input));
        let stub = &repairer.repair(&input)[0];
        assert_eq!(stub.path, "src/hooks/use-auth.ts");
        assert!(stub.content.contains("export function useAuth("));
        assert!(stub.content.contains("export default useAuth;"));
    }

    #[test]
    fn test_non_jsx_component_uses_create_element() {
        let stub = stub_source(&StubCandidate {
            resolved_path: "src/components/button.ts".to_string(),
            inferred_kind: StubKind::Component,
        });
        assert!(stub.contains("React.createElement("));
        assert!(stub.contains("export function Button()"));
        assert!(!stub.contains("<div"));
    }

    #[test]
    fn test_stubs_have_no_relative_imports() {
        let repairer = StubRepairer::new();
        let stubs = repairer.repair(&[
            missing("a.ts", "src/pages/Home"),
            missing("a.ts", "src/components/card"),
            missing("a.ts", "src/utils/index"),
            missing("a.ts", "src/hooks/useData"),
            missing("a.ts", "src/styles.css"),
        ]);
        assert_eq!(stubs.len(), 5);
        for stub in &stubs {
            assert!(!stub.content.trim().is_empty());
            assert!(extract_imports(&stub.content)
                .iter()
                .all(|import| !import.starts_with('.')));
        }
        assert!(stubs[2].content.contains("export function utils("));
    }

    struct AlwaysUtil;

    impl StubClassifier for AlwaysUtil {
        fn classify(&self, _target_path: &str) -> StubKind {
            StubKind::Util
        }
    }

    #[test]
    fn test_custom_classifier() {
        let repairer = StubRepairer::with_classifier(Box::new(AlwaysUtil));
        let candidates = repairer.candidates(&[missing("a.ts", "src/pages/Home")]);
        assert_eq!(candidates[0].inferred_kind, StubKind::Util);
    }
}
