// Starter templates and prompt rendering

pub mod builtin;
pub mod engine;
pub mod resolver;

// Re-export main types
pub use builtin::{get_template, match_template, starter_templates, StarterTemplate};
pub use engine::{PromptContext, PromptEngine};
pub use resolver::{PromptResolver, PromptSource};

use anyhow::Result;
use std::path::Path;

/// Build a prompt engine with any project or global overrides applied
pub fn load_prompt_engine(project_path: Option<&Path>) -> Result<PromptEngine> {
    let engine = PromptEngine::new()?;
    let resolver = match project_path {
        Some(path) => PromptResolver::new().with_project_path(path),
        None => PromptResolver::new(),
    };
    resolver.apply(&engine)?;
    Ok(engine)
}
