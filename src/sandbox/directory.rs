// Local directory sandbox
// Mirrors the project into a directory so an external dev server can pick it up

use super::{MountTree, Sandbox, SandboxError};
use crate::models::{normalize_path, ReloadKind};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

pub struct DirectorySandbox {
    root: PathBuf,
}

impl DirectorySandbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a project path inside the root, refusing anything that escapes it
    fn resolve(&self, path: &str) -> Result<PathBuf, SandboxError> {
        let relative = PathBuf::from(normalize_path(path));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes || relative.as_os_str().is_empty() {
            return Err(SandboxError::Rejected(format!("invalid path '{}'", path)));
        }
        Ok(self.root.join(relative))
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), SandboxError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(path, e))?;
        }
        tokio::fs::write(&target, content)
            .await
            .map_err(|e| io_error(path, e))
    }
}

fn io_error(path: &str, e: std::io::Error) -> SandboxError {
    SandboxError::Io {
        path: path.to_string(),
        message: e.to_string(),
    }
}

#[async_trait]
impl Sandbox for DirectorySandbox {
    async fn mount(&self, tree: &MountTree) -> Result<(), SandboxError> {
        for (path, contents) in tree.files() {
            self.write(&path, &contents).await?;
        }
        Ok(())
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), SandboxError> {
        self.write(path, content).await
    }

    async fn remove_file(&self, path: &str) -> Result<(), SandboxError> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(path, e)),
        }
    }

    async fn reload(&self, kind: ReloadKind) -> Result<(), SandboxError> {
        // The dev server watching the directory reloads on its own
        log::info!("{} requested for {}", kind, self.root.display());
        Ok(())
    }
}
