// Action applier
// The only writer of a session's file snapshot

use crate::events::{FileAction, GenerationEvent};
use crate::models::{normalize_path, FileSnapshot, GeneratedFile};

/// Paths touched by one application, ready to hand to the sync engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedChanges {
    /// Files whose content actually changed
    pub upserted: Vec<GeneratedFile>,
    /// Paths that existed and were deleted
    pub removed: Vec<String>,
}

impl AppliedChanges {
    pub fn is_empty(&self) -> bool {
        self.upserted.is_empty() && self.removed.is_empty()
    }

    fn merge(&mut self, other: AppliedChanges) {
        for file in other.upserted {
            self.removed.retain(|p| *p != file.path);
            self.upserted.retain(|f| f.path != file.path);
            self.upserted.push(file);
        }
        for path in other.removed {
            self.upserted.retain(|f| f.path != path);
            if !self.removed.contains(&path) {
                self.removed.push(path);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActionApplier {
    snapshot: FileSnapshot,
}

impl ActionApplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: FileSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &FileSnapshot {
        &self.snapshot
    }

    pub fn into_snapshot(self) -> FileSnapshot {
        self.snapshot
    }

    /// Apply the file-carrying parts of a generation event
    pub fn apply_event(&mut self, event: &GenerationEvent) -> AppliedChanges {
        let mut changes = AppliedChanges::default();
        match event {
            GenerationEvent::File(file) => {
                changes.merge(self.upsert(&file.path, &file.content));
            }
            GenerationEvent::Actions(payload) => {
                for action in &payload.actions {
                    changes.merge(self.apply_action(action));
                }
            }
            GenerationEvent::Complete(payload) => {
                for file in &payload.files {
                    changes.merge(self.upsert(&file.path, &file.content));
                }
            }
            _ => {}
        }
        changes
    }

    pub fn apply_action(&mut self, action: &FileAction) -> AppliedChanges {
        match action {
            FileAction::CreateOrUpdateFile { path, content } => self.upsert(path, content),
            FileAction::DeleteFile { path } => self.delete(path),
        }
    }

    fn upsert(&mut self, path: &str, content: &str) -> AppliedChanges {
        let mut changes = AppliedChanges::default();
        let path = normalize_path(path);
        if path.is_empty() {
            log::warn!("Ignoring file with empty path");
            return changes;
        }
        if self.snapshot.upsert(&path, content) {
            changes.upserted.push(GeneratedFile::new(&path, content));
        }
        changes
    }

    fn delete(&mut self, path: &str) -> AppliedChanges {
        let mut changes = AppliedChanges::default();
        let path = normalize_path(path);
        if self.snapshot.remove(&path).is_some() {
            changes.removed.push(path);
        }
        changes
    }
}
