// API token storage
//
// Tokens live in ~/.livegen/secrets.toml, one table per provider id:
//
//   [providers.openai]
//   token = "sk-..."
//
// Never project-level, so tokens stay out of generated project trees.

use crate::utils::livegen_dir;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const SECRETS_FILE: &str = "secrets.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSecret {
    pub token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretsConfig {
    #[serde(default)]
    providers: BTreeMap<String, ProviderSecret>,
}

impl SecretsConfig {
    /// ~/.livegen/secrets.toml
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| livegen_dir(&home).join(SECRETS_FILE))
    }

    pub fn load() -> Result<Self> {
        let path = Self::default_path().ok_or_else(|| anyhow!("Could not determine home directory"))?;
        Self::load_from(&path)
    }

    /// A missing file is an empty store
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
        };
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::default_path().ok_or_else(|| anyhow!("Could not determine home directory"))?;
        self.save_to(&path)
    }

    /// Write through a sibling temp file, then rename over the target.
    /// On Unix the file is created with mode 0600.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow!("Invalid secrets path: {}", path.display()))?;
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;

        let contents = toml::to_string_pretty(self).context("Failed to serialize secrets")?;
        let staging = path.with_extension("toml.tmp");

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&staging)
            .with_context(|| format!("Failed to open {}", staging.display()))?;
        file.write_all(contents.as_bytes())
            .and_then(|_| file.sync_all())
            .with_context(|| format!("Failed to write {}", staging.display()))?;
        drop(file);

        fs::rename(&staging, path).with_context(|| format!("Failed to replace {}", path.display()))?;
        log::info!("Saved secrets to {}", path.display());
        Ok(())
    }

    pub fn token(&self, provider_id: &str) -> Option<&str> {
        self.providers
            .get(provider_id)
            .map(|secret| secret.token.as_str())
            .filter(|token| !token.trim().is_empty())
    }

    pub fn set_token(&mut self, provider_id: &str, token: &str) {
        self.providers.insert(
            provider_id.to_string(),
            ProviderSecret {
                token: token.trim().to_string(),
            },
        );
    }

    pub fn remove_token(&mut self, provider_id: &str) -> bool {
        self.providers.remove(provider_id).is_some()
    }

    /// Provider ids with a stored token
    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}
