// Snapshot diffing and sync planning

use super::reload::ReloadPolicy;
use crate::models::{normalize_path, ChangeDelta, FileSnapshot, ReloadDecision};
use crate::sandbox::MountTree;

/// What one sync pass has to do
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPlan {
    pub delta: ChangeDelta,
    /// Only the added and modified files
    pub mount: MountTree,
    pub decision: ReloadDecision,
}

impl SyncPlan {
    pub fn is_noop(&self) -> bool {
        self.delta.is_empty()
    }
}

/// Diff incoming files against what was last synced.
///
/// `incoming` may be partial: paths it does not mention are left alone.
/// Removals only count for paths the previous snapshot actually has.
pub fn compute_delta(
    previous: &FileSnapshot,
    incoming: &FileSnapshot,
    removals: &[String],
) -> ChangeDelta {
    let mut delta = ChangeDelta::default();

    for file in incoming.files() {
        match previous.get(&file.path) {
            None => delta.added.push(file),
            Some(content) if content != file.content => delta.modified.push(file),
            Some(_) => {}
        }
    }

    let mut removed: Vec<String> = removals
        .iter()
        .map(|p| normalize_path(p))
        .filter(|p| previous.contains(p) && !incoming.contains(p))
        .collect();
    removed.sort();
    removed.dedup();
    delta.removed = removed;

    delta
}

pub fn plan_sync(
    previous: &FileSnapshot,
    incoming: &FileSnapshot,
    removals: &[String],
    policy: &ReloadPolicy,
) -> SyncPlan {
    let delta = compute_delta(previous, incoming, removals);
    let mount = MountTree::from_files(delta.added.iter().chain(delta.modified.iter()));
    let decision = policy.decide(&delta);
    SyncPlan {
        delta,
        mount,
        decision,
    }
}
