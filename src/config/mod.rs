// Layered configuration system
//
// Reads and writes .livegen/config.yaml for project settings, with a global
// file at ~/.livegen/config.yaml and CLI overrides on top.

pub mod merger;
pub mod providers;
pub mod secrets;

pub use merger::{ConfigMerger, PartialConfig};
pub use providers::{get_provider, ProviderPreset};
pub use secrets::SecretsConfig;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the per-project and global settings directory
pub const CONFIG_DIR: &str = ".livegen";
pub const CONFIG_FILE: &str = "config.yaml";

/// Full livegen configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LivegenConfig {
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

/// Remote model settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelSettings {
    /// Provider preset id, also the key used in the secrets file
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Endpoint base; empty means the provider preset's
    #[serde(default)]
    pub base_url: String,
    /// Primary model id
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable consulted for the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_true")]
    pub require_api_key: bool,
    #[serde(default = "default_temperature")]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Stream token deltas instead of waiting for the full reply
    #[serde(default = "default_true")]
    pub stream: bool,
    /// Limit on a complete reply; for streams, the longest gap between reads
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_temperature() -> Option<f32> {
    Some(0.2)
}
fn default_timeout_secs() -> u64 {
    180
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: String::new(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            require_api_key: true,
            temperature: default_temperature(),
            max_tokens: None,
            stream: true,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ModelSettings {
    /// Fill an empty base URL from the provider preset
    pub fn resolved(mut self) -> Self {
        if self.base_url.trim().is_empty() {
            if let Some(preset) = get_provider(&self.provider) {
                self.base_url = preset.base_url.to_string();
                if !preset.requires_key {
                    self.require_api_key = false;
                }
            }
        }
        self
    }
}

/// Fallback retry settings for model calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrySettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Model ids tried in order after the primary
    #[serde(default)]
    pub fallback_models: Vec<String>,
    #[serde(default = "default_retryable_statuses")]
    pub retryable_statuses: Vec<u16>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_backoff")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_retryable_statuses() -> Vec<u16> {
    vec![429, 502, 503, 504]
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    8000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            fallback_models: Vec::new(),
            retryable_statuses: default_retryable_statuses(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

/// Sandbox synchronization settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
    #[serde(default = "default_structural_delay")]
    pub structural_delay_ms: u64,
    #[serde(default = "default_bulk_delay")]
    pub bulk_delay_ms: u64,
    #[serde(default = "default_soft_delay")]
    pub soft_delay_ms: u64,
    /// Deltas with at least this many changed files get a full refresh
    #[serde(default = "default_full_refresh_threshold")]
    pub full_refresh_threshold: usize,
    /// File names whose change always forces a full refresh
    #[serde(default = "default_structural_files")]
    pub structural_files: Vec<String>,
}

fn default_debounce() -> u64 {
    500
}
fn default_structural_delay() -> u64 {
    1000
}
fn default_bulk_delay() -> u64 {
    600
}
fn default_soft_delay() -> u64 {
    200
}
fn default_full_refresh_threshold() -> usize {
    3
}

pub fn default_structural_files() -> Vec<String> {
    [
        "package.json",
        "package-lock.json",
        "vite.config.ts",
        "vite.config.js",
        "vite.config.mjs",
        "tsconfig.json",
        "tsconfig.app.json",
        "tsconfig.node.json",
        "tailwind.config.js",
        "tailwind.config.ts",
        "postcss.config.js",
        "postcss.config.cjs",
        ".env",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce(),
            structural_delay_ms: default_structural_delay(),
            bulk_delay_ms: default_bulk_delay(),
            soft_delay_ms: default_soft_delay(),
            full_refresh_threshold: default_full_refresh_threshold(),
            structural_files: default_structural_files(),
        }
    }
}

/// Generation pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    /// Serve matching prompts from starter templates on empty projects
    #[serde(default = "default_true")]
    pub templates_enabled: bool,
    /// Emit a progress event every this many received characters
    #[serde(default = "default_progress_interval")]
    pub progress_interval_chars: usize,
    /// Override the generation keyword set
    #[serde(default)]
    pub generation_keywords: Option<Vec<String>>,
    /// Override the question keyword set
    #[serde(default)]
    pub question_keywords: Option<Vec<String>>,
}

fn default_progress_interval() -> usize {
    400
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            templates_enabled: true,
            progress_interval_chars: default_progress_interval(),
            generation_keywords: None,
            question_keywords: None,
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerSettings {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Allowed CORS origins; empty allows any
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    3420
}
fn default_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            cors_origins: Vec::new(),
        }
    }
}

/// Configuration file manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a config manager for a project
    pub fn new(project_path: &Path) -> Self {
        Self::at(project_path.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Create a config manager for an explicit file
    pub fn at(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// Manager for the global config file (~/.livegen/config.yaml)
    pub fn global() -> Option<Self> {
        dirs::home_dir().map(|home| Self::new(&home))
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }

    /// Read config from file, returning defaults if not found
    pub fn read(&self) -> Result<LivegenConfig, String> {
        if !self.config_path.exists() {
            return Ok(LivegenConfig::default());
        }

        let content = std::fs::read_to_string(&self.config_path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        serde_yaml::from_str(&content).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Read only the fields present in the file, for layering
    pub fn read_partial(&self) -> Result<Option<PartialConfig>, String> {
        if !self.config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.config_path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        serde_yaml::from_str(&content)
            .map(Some)
            .map_err(|e| format!("Failed to parse config file: {}", e))
    }

    /// Write config to file
    pub fn write(&self, config: &LivegenConfig) -> Result<(), String> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        let content = serde_yaml::to_string(config)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        std::fs::write(&self.config_path, content)
            .map_err(|e| format!("Failed to write config file: {}", e))
    }

    /// Initialize config with defaults if it doesn't exist
    pub fn initialize(&self) -> Result<LivegenConfig, String> {
        if self.exists() {
            return self.read();
        }

        let config = LivegenConfig::default();
        self.write(&config)?;
        Ok(config)
    }

    /// Update specific fields in the config
    pub fn update<F>(&self, updater: F) -> Result<LivegenConfig, String>
    where
        F: FnOnce(&mut LivegenConfig),
    {
        let mut config = self.read()?;
        updater(&mut config);
        self.write(&config)?;
        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

/// Load and merge configuration from all sources
/// Priority: CLI -> explicit file or project -> global -> defaults
pub fn load_merged_config(
    project_path: Option<&Path>,
    config_file: Option<&Path>,
    cli_overrides: Option<PartialConfig>,
) -> Result<LivegenConfig, String> {
    let global = match ConfigManager::global() {
        Some(manager) => manager.read_partial().unwrap_or_else(|e| {
            log::warn!("Ignoring global config: {}", e);
            None
        }),
        None => None,
    };

    let project = match (config_file, project_path) {
        (Some(file), _) => ConfigManager::at(file.to_path_buf()).read_partial()?,
        (None, Some(path)) => ConfigManager::new(path).read_partial()?,
        (None, None) => None,
    };

    let mut config = ConfigMerger::new()
        .with_global(global)
        .with_project(project)
        .with_cli(cli_overrides)
        .merge();
    config.model = config.model.resolved();
    Ok(config)
}

/// Resolve the API key: the configured environment variable first, then the secrets file
pub fn resolve_api_key(settings: &ModelSettings, secrets: &SecretsConfig) -> Option<String> {
    std::env::var(&settings.api_key_env)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .or_else(|| secrets.token(&settings.provider).map(str::to_string))
}
