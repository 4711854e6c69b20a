// Reload policy
// Decides how disruptive a refresh a synced delta needs

use crate::config::{default_structural_files, SyncSettings};
use crate::models::{file_name, ChangeDelta, ReloadDecision, ReloadKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadPolicy {
    pub structural_files: Vec<String>,
    pub structural_delay_ms: u64,
    pub bulk_delay_ms: u64,
    pub soft_delay_ms: u64,
    pub full_refresh_threshold: usize,
}

impl Default for ReloadPolicy {
    fn default() -> Self {
        Self::from_settings(&SyncSettings::default())
    }
}

impl ReloadPolicy {
    pub fn from_settings(settings: &SyncSettings) -> Self {
        let structural_files = if settings.structural_files.is_empty() {
            default_structural_files()
        } else {
            settings.structural_files.clone()
        };
        Self {
            structural_files,
            structural_delay_ms: settings.structural_delay_ms,
            bulk_delay_ms: settings.bulk_delay_ms,
            soft_delay_ms: settings.soft_delay_ms,
            full_refresh_threshold: settings.full_refresh_threshold.max(1),
        }
    }

    /// Whether a path names a build or dependency file, matched on the file name
    pub fn is_structural(&self, path: &str) -> bool {
        let name = file_name(path);
        self.structural_files.iter().any(|s| s == name)
    }

    pub fn decide(&self, delta: &ChangeDelta) -> ReloadDecision {
        if delta.is_empty() {
            return ReloadDecision::none();
        }

        if delta.changed_paths().iter().any(|p| self.is_structural(p)) {
            return ReloadDecision {
                kind: ReloadKind::FullRefresh,
                delay_ms: self.structural_delay_ms,
            };
        }

        if delta.len() >= self.full_refresh_threshold {
            ReloadDecision {
                kind: ReloadKind::FullRefresh,
                delay_ms: self.bulk_delay_ms,
            }
        } else {
            ReloadDecision {
                kind: ReloadKind::SoftInvalidate,
                delay_ms: self.soft_delay_ms,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeneratedFile;

    fn modified(paths: &[&str]) -> ChangeDelta {
        ChangeDelta {
            modified: paths.iter().map(|p| GeneratedFile::new(p, "x")).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_delta_needs_nothing() {
        let decision = ReloadPolicy::default().decide(&ChangeDelta::default());
        assert_eq!(decision, ReloadDecision::none());
    }

    #[test]
    fn test_structural_match_on_file_name() {
        let policy = ReloadPolicy::default();
        assert!(policy.is_structural("package.json"));
        assert!(policy.is_structural("apps/web/vite.config.ts"));
        assert!(!policy.is_structural("src/package.ts"));
    }

    #[test]
    fn test_removal_counts_toward_threshold() {
        let mut delta = modified(&["src/a.ts", "src/b.ts"]);
        delta.removed.push("src/c.ts".to_string());
        let decision = ReloadPolicy::default().decide(&delta);
        assert_eq!(decision.kind, ReloadKind::FullRefresh);
        assert_eq!(decision.delay_ms, 600);
    }

    #[test]
    fn test_custom_threshold() {
        let settings = SyncSettings {
            full_refresh_threshold: 2,
            ..Default::default()
        };
        let policy = ReloadPolicy::from_settings(&settings);
        assert_eq!(
            policy.decide(&modified(&["a.ts", "b.ts"])).kind,
            ReloadKind::FullRefresh
        );
    }
}
