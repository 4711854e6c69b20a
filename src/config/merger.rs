// Configuration merging with priority

use super::{
    GenerationSettings, LivegenConfig, ModelSettings, RetrySettings, ServerSettings, SyncSettings,
};
use serde::{Deserialize, Serialize};

/// Partial configuration for merging
/// Uses Option<T> for all fields to support partial overrides
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PartialConfig {
    #[serde(default)]
    pub model: Option<PartialModelSettings>,
    #[serde(default)]
    pub retry: Option<PartialRetrySettings>,
    #[serde(default)]
    pub sync: Option<PartialSyncSettings>,
    #[serde(default)]
    pub generation: Option<PartialGenerationSettings>,
    #[serde(default)]
    pub server: Option<PartialServerSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartialModelSettings {
    pub provider: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub require_api_key: Option<bool>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stream: Option<bool>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartialRetrySettings {
    pub enabled: Option<bool>,
    pub fallback_models: Option<Vec<String>>,
    pub retryable_statuses: Option<Vec<u16>>,
    pub max_attempts: Option<u32>,
    pub base_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartialSyncSettings {
    pub debounce_ms: Option<u64>,
    pub structural_delay_ms: Option<u64>,
    pub bulk_delay_ms: Option<u64>,
    pub soft_delay_ms: Option<u64>,
    pub full_refresh_threshold: Option<usize>,
    pub structural_files: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartialGenerationSettings {
    pub templates_enabled: Option<bool>,
    pub progress_interval_chars: Option<usize>,
    pub generation_keywords: Option<Vec<String>>,
    pub question_keywords: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartialServerSettings {
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub cors_origins: Option<Vec<String>>,
}

/// Configuration merger
/// Priority order: CLI -> Project -> Global -> Defaults
pub struct ConfigMerger {
    defaults: LivegenConfig,
    global: Option<PartialConfig>,
    project: Option<PartialConfig>,
    cli: Option<PartialConfig>,
}

impl ConfigMerger {
    /// Create a new config merger with defaults
    pub fn new() -> Self {
        Self {
            defaults: LivegenConfig::default(),
            global: None,
            project: None,
            cli: None,
        }
    }

    /// Set global config
    pub fn with_global(mut self, config: Option<PartialConfig>) -> Self {
        self.global = config;
        self
    }

    /// Set project config
    pub fn with_project(mut self, config: Option<PartialConfig>) -> Self {
        self.project = config;
        self
    }

    /// Set CLI overrides
    pub fn with_cli(mut self, config: Option<PartialConfig>) -> Self {
        self.cli = config;
        self
    }

    /// Merge all configs with priority
    pub fn merge(&self) -> LivegenConfig {
        let mut result = self.defaults.clone();

        for layer in [&self.global, &self.project, &self.cli].into_iter().flatten() {
            result = self.merge_partial(&result, layer);
        }

        result
    }

    /// Merge partial config into full config
    fn merge_partial(&self, base: &LivegenConfig, partial: &PartialConfig) -> LivegenConfig {
        LivegenConfig {
            model: partial
                .model
                .as_ref()
                .map(|p| self.merge_model(&base.model, p))
                .unwrap_or_else(|| base.model.clone()),
            retry: partial
                .retry
                .as_ref()
                .map(|p| self.merge_retry(&base.retry, p))
                .unwrap_or_else(|| base.retry.clone()),
            sync: partial
                .sync
                .as_ref()
                .map(|p| self.merge_sync(&base.sync, p))
                .unwrap_or_else(|| base.sync.clone()),
            generation: partial
                .generation
                .as_ref()
                .map(|p| self.merge_generation(&base.generation, p))
                .unwrap_or_else(|| base.generation.clone()),
            server: partial
                .server
                .as_ref()
                .map(|p| self.merge_server(&base.server, p))
                .unwrap_or_else(|| base.server.clone()),
        }
    }

    fn merge_model(&self, base: &ModelSettings, over: &PartialModelSettings) -> ModelSettings {
        ModelSettings {
            provider: over.provider.clone().unwrap_or_else(|| base.provider.clone()),
            base_url: over.base_url.clone().unwrap_or_else(|| base.base_url.clone()),
            model: over.model.clone().unwrap_or_else(|| base.model.clone()),
            api_key_env: over
                .api_key_env
                .clone()
                .unwrap_or_else(|| base.api_key_env.clone()),
            require_api_key: over.require_api_key.unwrap_or(base.require_api_key),
            temperature: over.temperature.or(base.temperature),
            max_tokens: over.max_tokens.or(base.max_tokens),
            stream: over.stream.unwrap_or(base.stream),
            timeout_secs: over.timeout_secs.unwrap_or(base.timeout_secs),
        }
    }

    fn merge_retry(&self, base: &RetrySettings, over: &PartialRetrySettings) -> RetrySettings {
        RetrySettings {
            enabled: over.enabled.unwrap_or(base.enabled),
            fallback_models: over
                .fallback_models
                .clone()
                .unwrap_or_else(|| base.fallback_models.clone()),
            retryable_statuses: over
                .retryable_statuses
                .clone()
                .unwrap_or_else(|| base.retryable_statuses.clone()),
            max_attempts: over.max_attempts.unwrap_or(base.max_attempts),
            base_backoff_ms: over.base_backoff_ms.unwrap_or(base.base_backoff_ms),
            max_backoff_ms: over.max_backoff_ms.unwrap_or(base.max_backoff_ms),
        }
    }

    fn merge_sync(&self, base: &SyncSettings, over: &PartialSyncSettings) -> SyncSettings {
        SyncSettings {
            debounce_ms: over.debounce_ms.unwrap_or(base.debounce_ms),
            structural_delay_ms: over.structural_delay_ms.unwrap_or(base.structural_delay_ms),
            bulk_delay_ms: over.bulk_delay_ms.unwrap_or(base.bulk_delay_ms),
            soft_delay_ms: over.soft_delay_ms.unwrap_or(base.soft_delay_ms),
            full_refresh_threshold: over
                .full_refresh_threshold
                .unwrap_or(base.full_refresh_threshold),
            structural_files: over
                .structural_files
                .clone()
                .unwrap_or_else(|| base.structural_files.clone()),
        }
    }

    fn merge_generation(
        &self,
        base: &GenerationSettings,
        over: &PartialGenerationSettings,
    ) -> GenerationSettings {
        GenerationSettings {
            templates_enabled: over.templates_enabled.unwrap_or(base.templates_enabled),
            progress_interval_chars: over
                .progress_interval_chars
                .unwrap_or(base.progress_interval_chars),
            generation_keywords: over
                .generation_keywords
                .clone()
                .or_else(|| base.generation_keywords.clone()),
            question_keywords: over
                .question_keywords
                .clone()
                .or_else(|| base.question_keywords.clone()),
        }
    }

    fn merge_server(&self, base: &ServerSettings, over: &PartialServerSettings) -> ServerSettings {
        ServerSettings {
            port: over.port.unwrap_or(base.port),
            bind: over.bind.clone().unwrap_or_else(|| base.bind.clone()),
            cors_origins: over
                .cors_origins
                .clone()
                .unwrap_or_else(|| base.cors_origins.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_only() {
        let config = ConfigMerger::new().merge();
        assert_eq!(config, LivegenConfig::default());
    }

    #[test]
    fn test_priority_order() {
        let global = PartialConfig {
            model: Some(PartialModelSettings {
                model: Some("global-model".to_string()),
                timeout_secs: Some(30),
                ..Default::default()
            }),
            ..Default::default()
        };
        let project = PartialConfig {
            model: Some(PartialModelSettings {
                model: Some("project-model".to_string()),
                ..Default::default()
            }),
            sync: Some(PartialSyncSettings {
                debounce_ms: Some(300),
                ..Default::default()
            }),
            ..Default::default()
        };
        let cli = PartialConfig {
            server: Some(PartialServerSettings {
                port: Some(9000),
                ..Default::default()
            }),
            model: Some(PartialModelSettings {
                model: Some("cli-model".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = ConfigMerger::new()
            .with_global(Some(global))
            .with_project(Some(project))
            .with_cli(Some(cli))
            .merge();

        assert_eq!(config.model.model, "cli-model");
        assert_eq!(config.model.timeout_secs, 30);
        assert_eq!(config.sync.debounce_ms, 300);
        assert_eq!(config.sync.soft_delay_ms, 200);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind, "127.0.0.1");
    }

    #[test]
    fn test_partial_from_yaml() {
        let partial: PartialConfig =
            serde_yaml::from_str("retry:\n  fallbackModels: [b, c]\n  enabled: false\n").unwrap();
        let config = ConfigMerger::new().with_project(Some(partial)).merge();
        assert!(!config.retry.enabled);
        assert_eq!(config.retry.fallback_models, vec!["b", "c"]);
        assert_eq!(config.retry.max_attempts, 3);
    }
}
