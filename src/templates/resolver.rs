// Prompt override resolution with cascading lookup
//
// Resolution order:
// 1. Project (.livegen/prompts/<name>.tera)
// 2. Global (~/.livegen/prompts/<name>.tera)
// 3. Builtin prompts compiled into the engine

use super::engine::{PromptEngine, CHAT_SYSTEM, GENERATION_SYSTEM};
use crate::utils::prompts_dir;
use anyhow::{anyhow, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Where a prompt came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSource {
    Project(PathBuf),
    Global(PathBuf),
    Builtin,
}

/// Finds prompt override files
pub struct PromptResolver {
    project_dir: Option<PathBuf>,
    global_dir: Option<PathBuf>,
}

impl PromptResolver {
    pub fn new() -> Self {
        Self {
            project_dir: None,
            global_dir: dirs::home_dir().map(|home| prompts_dir(&home)),
        }
    }

    /// Set the project path for project-level prompts
    pub fn with_project_path(mut self, path: &Path) -> Self {
        self.project_dir = Some(prompts_dir(path));
        self
    }

    /// Override the global prompts directory
    pub fn with_global_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.global_dir = dir;
        self
    }

    /// Locate the override for a prompt name, first match wins
    pub fn locate(&self, name: &str) -> PromptSource {
        let file_name = format!("{}.tera", name);
        if let Some(path) = self.project_dir.as_ref().map(|d| d.join(&file_name)) {
            if path.is_file() {
                return PromptSource::Project(path);
            }
        }
        if let Some(path) = self.global_dir.as_ref().map(|d| d.join(&file_name)) {
            if path.is_file() {
                return PromptSource::Global(path);
            }
        }
        PromptSource::Builtin
    }

    /// Load every override found into the engine
    pub fn apply(&self, engine: &PromptEngine) -> Result<Vec<(String, PromptSource)>> {
        let mut applied = Vec::new();
        for name in [GENERATION_SYSTEM, CHAT_SYSTEM] {
            let source = self.locate(name);
            let path = match &source {
                PromptSource::Project(path) | PromptSource::Global(path) => path,
                PromptSource::Builtin => continue,
            };
            let content = fs::read_to_string(path)
                .map_err(|e| anyhow!("Failed to read prompt '{}': {}", path.display(), e))?;
            engine.add_template(name, &content)?;
            log::info!("Prompt '{}' resolved from {:?}", name, source);
            applied.push((name.to_string(), source));
        }
        Ok(applied)
    }
}
