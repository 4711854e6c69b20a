// Data models shared by the generation pipeline and the sync engine

pub mod state_machine;

pub use state_machine::{GenerationState, StateTransitionError};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Normalize a file path into its snapshot key.
///
/// Trims surrounding whitespace and strips every leading `./` and `/`, so
/// `./src/App.tsx`, `src/App.tsx` and ` src/App.tsx ` all map to the same key.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = path.trim();
    loop {
        if let Some(rest) = normalized.strip_prefix("./") {
            normalized = rest;
        } else if let Some(rest) = normalized.strip_prefix('/') {
            normalized = rest;
        } else {
            break;
        }
    }
    normalized.to_string()
}

/// A single generated source file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

impl GeneratedFile {
    /// Create a file record, normalizing the path
    pub fn new(path: impl AsRef<str>, content: impl Into<String>) -> Self {
        Self {
            path: normalize_path(path.as_ref()),
            content: content.into(),
        }
    }

    /// Last path segment (the file name)
    pub fn file_name(&self) -> &str {
        file_name(&self.path)
    }
}

/// Last segment of a slash-separated path
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// What the sandbox currently believes exists: normalized path -> content.
///
/// Ordered by path. Mutated only through the action applier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    files: BTreeMap<String, String>,
}

impl FileSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from file records; later duplicates overwrite earlier ones
    pub fn from_files<I>(files: I) -> Self
    where
        I: IntoIterator<Item = GeneratedFile>,
    {
        let mut snapshot = Self::new();
        for file in files {
            snapshot.upsert(&file.path, file.content);
        }
        snapshot
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(&normalize_path(path)).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    /// Insert or replace a file. Returns true when the stored content changed.
    pub fn upsert(&mut self, path: &str, content: impl Into<String>) -> bool {
        let key = normalize_path(path);
        let content = content.into();
        match self.files.get(&key) {
            Some(existing) if *existing == content => false,
            _ => {
                self.files.insert(key, content);
                true
            }
        }
    }

    /// Remove a file. Returns the previous content if it existed.
    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.files.remove(&normalize_path(path))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn files(&self) -> Vec<GeneratedFile> {
        self.files
            .iter()
            .map(|(path, content)| GeneratedFile {
                path: path.clone(),
                content: content.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Files that differ between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeDelta {
    pub added: Vec<GeneratedFile>,
    pub modified: Vec<GeneratedFile>,
    /// Paths explicitly deleted since the previous sync
    #[serde(default)]
    pub removed: Vec<String>,
}

impl ChangeDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// Number of changed paths
    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }

    /// All changed paths: added, then modified, then removed
    pub fn changed_paths(&self) -> Vec<&str> {
        self.added
            .iter()
            .chain(self.modified.iter())
            .map(|f| f.path.as_str())
            .chain(self.removed.iter().map(String::as_str))
            .collect()
    }
}

/// How the sandbox should react to a synced delta.
///
/// Ordered by strength so that coalesced decisions keep the stronger one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ReloadKind {
    None,
    SoftInvalidate,
    FullRefresh,
}

impl ReloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReloadKind::None => "none",
            ReloadKind::SoftInvalidate => "soft-invalidate",
            ReloadKind::FullRefresh => "full-refresh",
        }
    }
}

impl fmt::Display for ReloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reload decision with the delay before it should be applied
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReloadDecision {
    pub kind: ReloadKind,
    pub delay_ms: u64,
}

impl ReloadDecision {
    pub fn none() -> Self {
        Self {
            kind: ReloadKind::None,
            delay_ms: 0,
        }
    }
}

/// A relative import found in a generated file, with its candidate targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReference {
    pub from_file: String,
    pub import_path: String,
    pub resolved_candidates: Vec<String>,
}

/// An import that no known file satisfies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingImport {
    pub from: String,
    pub import_path: String,
    /// Resolved path without any extension appended
    pub resolved_path: String,
}

/// Inferred role of a missing import target
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StubKind {
    Hook,
    Util,
    Component,
    Stylesheet,
}

/// A stub the repairer will synthesize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StubCandidate {
    pub resolved_path: String,
    pub inferred_kind: StubKind,
}

/// Result of validating a generated file set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub missing_imports: Vec<MissingImport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_variants() {
        assert_eq!(normalize_path("./src/App.tsx"), "src/App.tsx");
        assert_eq!(normalize_path("src/App.tsx"), "src/App.tsx");
        assert_eq!(normalize_path(" src/App.tsx "), "src/App.tsx");
        assert_eq!(normalize_path(" ././src/App.tsx"), "src/App.tsx");
        assert_eq!(normalize_path("/src/App.tsx"), "src/App.tsx");
    }

    #[test]
    fn test_snapshot_keys_are_normalized() {
        let mut snapshot = FileSnapshot::new();
        assert!(snapshot.upsert("./src/App.tsx", "a"));
        assert!(!snapshot.upsert(" src/App.tsx ", "a"));
        assert!(snapshot.upsert("src/App.tsx", "b"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("./src/App.tsx"), Some("b"));
    }

    #[test]
    fn test_snapshot_remove() {
        let mut snapshot = FileSnapshot::from_files(vec![GeneratedFile::new("a.ts", "x")]);
        assert_eq!(snapshot.remove("./a.ts"), Some("x".to_string()));
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.remove("a.ts"), None);
    }

    #[test]
    fn test_reload_kind_ordering() {
        assert!(ReloadKind::FullRefresh > ReloadKind::SoftInvalidate);
        assert!(ReloadKind::SoftInvalidate > ReloadKind::None);
        assert_eq!(
            serde_json::to_string(&ReloadKind::SoftInvalidate).unwrap(),
            "\"soft-invalidate\""
        );
    }

    #[test]
    fn test_delta_changed_paths() {
        let delta = ChangeDelta {
            added: vec![GeneratedFile::new("a.ts", "")],
            modified: vec![GeneratedFile::new("b.ts", "")],
            removed: vec!["c.ts".to_string()],
        };
        assert_eq!(delta.len(), 3);
        assert_eq!(delta.changed_paths(), vec!["a.ts", "b.ts", "c.ts"]);
    }
}
