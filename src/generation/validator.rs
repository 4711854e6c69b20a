// Response validator - empty files and unresolved relative imports

use crate::generation::import_resolver::{self, KnownPaths};
use crate::models::{FileSnapshot, GeneratedFile, MissingImport, ValidationReport};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Extensions whose imports are checked
pub const SOURCE_FILE_EXTENSIONS: [&str; 6] = [".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs"];

/// Stylesheet extensions the stub repairer can synthesize
pub const STYLESHEET_EXTENSIONS: [&str; 2] = [".css", ".scss"];

static IMPORT_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

fn import_patterns() -> &'static [Regex] {
    IMPORT_PATTERNS.get_or_init(|| {
        vec![
            // import X from '...', import { a } from '...', import '...'
            Regex::new(r#"\bimport\s+(?:[\w$*{}\s,]+?\s+from\s+)?['"]([^'"\n]+)['"]"#).unwrap(),
            // export { a } from '...', export * from '...'
            Regex::new(r#"\bexport\s+(?:[\w$*{}\s,]+?\s+)?from\s+['"]([^'"\n]+)['"]"#).unwrap(),
            // import('...')
            Regex::new(r#"\bimport\(\s*['"]([^'"\n]+)['"]\s*\)"#).unwrap(),
            // require('...')
            Regex::new(r#"\brequire\(\s*['"]([^'"\n]+)['"]\s*\)"#).unwrap(),
        ]
    })
}

/// Whether a path names a file whose imports we check
pub fn is_source_file(path: &str) -> bool {
    SOURCE_FILE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

pub fn is_stylesheet(path: &str) -> bool {
    STYLESHEET_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Extension of the last path segment, including the dot
fn extension(path: &str) -> Option<&str> {
    let name = crate::models::file_name(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(dot) => Some(&name[dot..]),
    }
}

/// Imports of images, fonts, JSON and the like: unresolved ones only warn
fn is_asset_import(import_path: &str) -> bool {
    match extension(import_path) {
        Some(ext) => !is_source_file(ext) && !is_stylesheet(ext),
        None => false,
    }
}

/// All distinct import strings in a source file, in order of appearance
pub fn extract_imports(content: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();
    for pattern in import_patterns() {
        for caps in pattern.captures_iter(content) {
            if let Some(m) = caps.get(1) {
                found.push((m.start(), m.as_str().to_string()));
            }
        }
    }
    found.sort_by_key(|(pos, _)| *pos);

    let mut seen = HashSet::new();
    found
        .into_iter()
        .filter_map(|(_, import)| seen.insert(import.clone()).then_some(import))
        .collect()
}

/// Validate a generated file set against itself and the files already in the project
pub fn validate(files: &[GeneratedFile], existing: &FileSnapshot) -> ValidationReport {
    let mut report = ValidationReport::default();

    let mut known = KnownPaths::from_paths(existing.paths());
    for file in files {
        known.insert(&file.path);
    }

    for file in files {
        if file.content.trim().is_empty() {
            report.errors.push(format!("{} is empty", file.path));
            continue;
        }

        if !is_source_file(&file.path) {
            continue;
        }

        for import_path in extract_imports(&file.content) {
            let reference = import_resolver::reference(&file.path, &import_path);
            if reference.resolved_candidates.is_empty() || known.satisfies(&reference) {
                continue;
            }

            if is_asset_import(&import_path) {
                report.warnings.push(format!(
                    "{} imports missing asset '{}'",
                    file.path, import_path
                ));
                continue;
            }

            let resolved_path = import_resolver::resolve_base(&file.path, &import_path);
            report.warnings.push(format!(
                "{} imports '{}' which does not resolve to any file",
                file.path, import_path
            ));
            report.missing_imports.push(MissingImport {
                from: file.path.clone(),
                import_path,
                resolved_path,
            });
        }
    }

    for warning in &report.warnings {
        log::warn!("Validation: {}", warning);
    }

    report.valid = report.errors.is_empty();
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_import_forms() {
        let content = r#"
import React, { useState } from 'react';
import {
  a,
  b,
} from "./lib/ab";
import './index.css';
import * as utils from '../utils';
import type { Props } from './types';
export { Button } from './components/Button';
export * from "./api";
const Lazy = React.lazy(() => import('./pages/Lazy'));
const fs = require("./legacy");
"#;
        assert_eq!(
            extract_imports(content),
            vec![
                "react",
                "./lib/ab",
                "./index.css",
                "../utils",
                "./types",
                "./components/Button",
                "./api",
                "./pages/Lazy",
                "./legacy",
            ]
        );
    }

    #[test]
    fn test_empty_file_is_error() {
        let files = vec![GeneratedFile::new("src/App.tsx", "  \n")];
        let report = validate(&files, &FileSnapshot::new());
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn test_missing_import_reported() {
        let files = vec![GeneratedFile::new(
            "src/App.tsx",
            "import Home from './pages/Home';\nimport x from 'react';\nexport default Home;",
        )];
        let report = validate(&files, &FileSnapshot::new());
        assert!(report.valid);
        assert_eq!(
            report.missing_imports,
            vec![MissingImport {
                from: "src/App.tsx".to_string(),
                import_path: "./pages/Home".to_string(),
                resolved_path: "src/pages/Home".to_string(),
            }]
        );
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_existing_files_satisfy_imports() {
        let existing = FileSnapshot::from_files(vec![GeneratedFile::new(
            "src/pages/Home.jsx",
            "export default 1",
        )]);
        let files = vec![GeneratedFile::new(
            "src/App.tsx",
            "import Home from './pages/Home';",
        )];
        let report = validate(&files, &existing);
        assert!(report.missing_imports.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_asset_import_warns_only() {
        let files = vec![GeneratedFile::new(
            "src/App.tsx",
            "import logo from './logo.svg';\nimport './App.css';",
        )];
        let report = validate(&files, &FileSnapshot::new());
        assert_eq!(report.warnings.len(), 2);
        assert_eq!(report.missing_imports.len(), 1);
        assert_eq!(report.missing_imports[0].resolved_path, "src/App.css");
    }

    #[test]
    fn test_non_source_files_not_scanned() {
        let files = vec![GeneratedFile::new(
            "README.md",
            "import x from './nowhere';",
        )];
        let report = validate(&files, &FileSnapshot::new());
        assert!(report.valid);
        assert!(report.missing_imports.is_empty());
    }
}
