// Prompt rendering engine using Tera

use crate::models::GeneratedFile;
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::sync::Mutex;
use tera::{Context, Tera};

pub const GENERATION_SYSTEM: &str = "generation_system";
pub const CHAT_SYSTEM: &str = "chat_system";

/// Longest file body included verbatim in a prompt
const DEFAULT_MAX_FILE_CHARS: usize = 12_000;

const GENERATION_SYSTEM_TEMPLATE: &str = r#"You are an expert frontend engineer building React + TypeScript apps that run in a Vite sandbox.

{% if files | length > 0 -%}
The project already contains these files:
{% for file in files %}
--- {{ file.path }}{% if file.truncated %} (truncated){% endif %}
{{ file.content }}
{% endfor %}
Change only what the request needs. Return every file you create or modify in full.
{%- else -%}
The project is empty. Create a complete, runnable Vite + React + TypeScript app,
including package.json, index.html, vite.config.ts and src/main.tsx.
{%- endif %}

Rules:
- Every relative import must point at a file that exists or that you return.
- Use paths relative to the project root, for example src/App.tsx.
- Keep components small and put them under src/components/.

{% raw %}Respond with a single JSON object and nothing else:
{"files": [{"path": "src/App.tsx", "content": "<full file source>"}], "deleted": ["<path of a removed file>"], "summary": "<one sentence>"}{% endraw %}
"#;

const CHAT_SYSTEM_TEMPLATE: &str = r#"You are a helpful assistant for a React + TypeScript project running in a Vite sandbox.
Answer the user's question clearly and concisely. Do not return file listings or JSON.
{% if files | length > 0 %}
Project files:
{% for file in files -%}
- {{ file.path }}
{% endfor -%}
{% endif %}"#;

/// A project file as seen by a prompt
#[derive(Debug, Clone, Serialize)]
pub struct PromptFile {
    pub path: String,
    pub content: String,
    pub truncated: bool,
}

/// Context for rendering system prompts
#[derive(Debug, Clone, Serialize, Default)]
pub struct PromptContext {
    pub files: Vec<PromptFile>,
}

impl PromptContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Include existing project files, truncating long ones
    pub fn with_files(mut self, files: &[GeneratedFile]) -> Self {
        self.with_files_limited(files, DEFAULT_MAX_FILE_CHARS);
        self
    }

    fn with_files_limited(&mut self, files: &[GeneratedFile], max_chars: usize) {
        self.files = files
            .iter()
            .map(|file| {
                let truncated = file.content.chars().count() > max_chars;
                let content = if truncated {
                    file.content.chars().take(max_chars).collect()
                } else {
                    file.content.clone()
                };
                PromptFile {
                    path: file.path.clone(),
                    content,
                    truncated,
                }
            })
            .collect();
    }

    /// Convert to Tera context
    pub fn to_tera_context(&self) -> Result<Context> {
        Context::from_serialize(self).map_err(|e| anyhow!("Failed to build template context: {}", e))
    }
}

/// Renders the system prompts
pub struct PromptEngine {
    tera: Mutex<Tera>,
}

impl PromptEngine {
    /// Create an engine with the builtin prompts loaded
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(GENERATION_SYSTEM, GENERATION_SYSTEM_TEMPLATE)
            .map_err(|e| anyhow!("Failed to add template '{}': {}", GENERATION_SYSTEM, e))?;
        tera.add_raw_template(CHAT_SYSTEM, CHAT_SYSTEM_TEMPLATE)
            .map_err(|e| anyhow!("Failed to add template '{}': {}", CHAT_SYSTEM, e))?;
        Ok(Self {
            tera: Mutex::new(tera),
        })
    }

    /// Replace a prompt with a custom template
    pub fn add_template(&self, name: &str, template: &str) -> Result<()> {
        let mut tera = self.tera.lock().map_err(|e| anyhow!("Lock error: {}", e))?;
        tera.add_raw_template(name, template)
            .map_err(|e| anyhow!("Failed to add template '{}': {}", name, e))?;
        Ok(())
    }

    /// Render a template with context
    pub fn render(&self, template_name: &str, context: &PromptContext) -> Result<String> {
        let tera = self.tera.lock().map_err(|e| anyhow!("Lock error: {}", e))?;
        let ctx = context.to_tera_context()?;

        tera.render(template_name, &ctx)
            .map_err(|e| anyhow!("Failed to render template '{}': {}", template_name, e))
    }

    pub fn render_generation(&self, context: &PromptContext) -> Result<String> {
        self.render(GENERATION_SYSTEM, context)
    }

    pub fn render_chat(&self, context: &PromptContext) -> Result<String> {
        self.render(CHAT_SYSTEM, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_prompt_for_empty_project() {
        let engine = PromptEngine::new().unwrap();
        let prompt = engine.render_generation(&PromptContext::new()).unwrap();
        assert!(prompt.contains("The project is empty"));
        assert!(prompt.contains(r#"{"files": [{"path": "src/App.tsx""#));
    }

    #[test]
    fn test_generation_prompt_lists_files() {
        let engine = PromptEngine::new().unwrap();
        let context = PromptContext::new()
            .with_files(&[GeneratedFile::new("src/App.tsx", "export default function App() {}")]);
        let prompt = engine.render_generation(&context).unwrap();
        assert!(prompt.contains("--- src/App.tsx"));
        assert!(prompt.contains("export default function App() {}"));
        assert!(!prompt.contains("The project is empty"));
    }

    #[test]
    fn test_long_files_truncated() {
        let mut context = PromptContext::new();
        context.with_files_limited(&[GeneratedFile::new("a.ts", "x".repeat(50))], 10);
        assert!(context.files[0].truncated);
        assert_eq!(context.files[0].content.len(), 10);
    }

    #[test]
    fn test_chat_prompt() {
        let engine = PromptEngine::new().unwrap();
        let context = PromptContext::new().with_files(&[GeneratedFile::new("src/main.tsx", "")]);
        let prompt = engine.render_chat(&context).unwrap();
        assert!(prompt.contains("- src/main.tsx"));
    }

    #[test]
    fn test_custom_template_override() {
        let engine = PromptEngine::new().unwrap();
        engine
            .add_template(CHAT_SYSTEM, "{{ files | length }} files")
            .unwrap();
        let context = PromptContext::new().with_files(&[GeneratedFile::new("a.ts", "1")]);
        assert_eq!(engine.render_chat(&context).unwrap(), "1 files");
    }
}
