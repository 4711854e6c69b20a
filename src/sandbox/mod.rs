//! Sandbox adapters
//!
//! The sync engine talks to a running sandbox through the [`Sandbox`] trait.
//! How the sandbox executes the project (installing packages, running the
//! dev server) is its own business.

pub mod channel;
pub mod directory;

pub use channel::{ChannelSandbox, SandboxCommand};
pub use directory::DirectorySandbox;

use crate::models::{GeneratedFile, ReloadKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SandboxError {
    #[error("Sandbox I/O error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("Sandbox is not connected")]
    Disconnected,

    #[error("Sandbox rejected the command: {0}")]
    Rejected(String),
}

/// A running environment that mirrors the project files
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Merge a partial tree into the sandbox file system
    async fn mount(&self, tree: &MountTree) -> Result<(), SandboxError>;

    async fn write_file(&self, path: &str, content: &str) -> Result<(), SandboxError>;

    async fn remove_file(&self, path: &str) -> Result<(), SandboxError>;

    async fn reload(&self, kind: ReloadKind) -> Result<(), SandboxError>;
}

/// A node of a mount tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountNode {
    Directory(MountTree),
    File { contents: String },
}

/// Nested file tree in the sandbox's mount shape:
/// `{"src": {"directory": {"App.tsx": {"file": {"contents": "..."}}}}}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MountTree {
    entries: BTreeMap<String, MountNode>,
}

impl MountTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_files<'a, I>(files: I) -> Self
    where
        I: IntoIterator<Item = &'a GeneratedFile>,
    {
        let mut tree = Self::new();
        for file in files {
            tree.insert(&file.path, &file.content);
        }
        tree
    }

    /// Place a file at a slash-separated path, creating directories on the way
    pub fn insert(&mut self, path: &str, contents: &str) {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some((name, dirs)) = segments.split_last() else {
            return;
        };

        let mut entries = &mut self.entries;
        for dir in dirs {
            let node = entries
                .entry(dir.to_string())
                .or_insert_with(|| MountNode::Directory(MountTree::new()));
            if let MountNode::File { .. } = node {
                *node = MountNode::Directory(MountTree::new());
            }
            let MountNode::Directory(tree) = node else {
                return;
            };
            entries = &mut tree.entries;
        }
        entries.insert(
            name.to_string(),
            MountNode::File {
                contents: contents.to_string(),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&MountNode> {
        self.entries.get(name)
    }

    /// Flatten back into `(path, contents)` pairs, ordered by path
    pub fn files(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        self.collect_files("", &mut out);
        out
    }

    fn collect_files(&self, prefix: &str, out: &mut Vec<(String, String)>) {
        for (name, node) in &self.entries {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };
            match node {
                MountNode::Directory(tree) => tree.collect_files(&path, out),
                MountNode::File { contents } => out.push((path, contents.clone())),
            }
        }
    }

    /// Number of files in the tree
    pub fn file_count(&self) -> usize {
        self.entries
            .values()
            .map(|node| match node {
                MountNode::Directory(tree) => tree.file_count(),
                MountNode::File { .. } => 1,
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.file_count() == 0
    }
}
