//! Generation sessions
//!
//! A session owns one project snapshot, the sync scheduler that mirrors it
//! into a sandbox, and at most one active generation. Every snapshot change,
//! whether from a generation or a manual edit, goes through the action applier
//! and is then handed to the scheduler.

use crate::config::SyncSettings;
use crate::events::{FileAction, GenerationEvent};
use crate::generation::{GenerationRequest, GenerationStream, Orchestrator};
use crate::llm::ChatMessage;
use crate::models::{FileSnapshot, GeneratedFile};
use crate::sandbox::{ChannelSandbox, Sandbox, SandboxCommand};
use crate::sync::{ActionApplier, AppliedChanges, SyncError, SyncHandle, SyncReport, SyncScheduler};
use crate::utils::{lock_mutex_recover, ResultExt};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use walkdir::WalkDir;

/// Conversation turns kept for follow-up prompts
const MAX_HISTORY: usize = 20;

/// Directories never imported from an existing project
const IGNORED_DIRS: &[&str] = &["node_modules", ".git", "dist", "build", ".livegen"];

/// Serializable session summary
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub file_count: usize,
    pub generating: bool,
}

pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    applier: tokio::sync::Mutex<ActionApplier>,
    sync: SyncHandle,
    /// Present when the sandbox lives in a connected browser
    channel: Option<Arc<ChannelSandbox>>,
    active: Mutex<Option<JoinHandle<()>>>,
    history: Mutex<Vec<ChatMessage>>,
}

impl Session {
    /// Session mirroring into any sandbox; `initial` is assumed to be there already
    pub fn new(sandbox: Arc<dyn Sandbox>, settings: &SyncSettings, initial: FileSnapshot) -> Self {
        let sync = SyncScheduler::from_settings(sandbox, settings)
            .with_synced(initial.clone())
            .spawn();
        Self::build(sync, None, initial)
    }

    /// Session whose sandbox commands are streamed to browser subscribers
    pub fn with_channel(settings: &SyncSettings) -> Self {
        let channel = Arc::new(ChannelSandbox::default());
        let sync = SyncScheduler::from_settings(channel.clone(), settings).spawn();
        Self::build(sync, Some(channel), FileSnapshot::new())
    }

    fn build(sync: SyncHandle, channel: Option<Arc<ChannelSandbox>>, initial: FileSnapshot) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            applier: tokio::sync::Mutex::new(ActionApplier::with_snapshot(initial)),
            sync,
            channel,
            active: Mutex::new(None),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sync(&self) -> &SyncHandle {
        &self.sync
    }

    pub async fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            created_at: self.created_at,
            file_count: self.applier.lock().await.snapshot().len(),
            generating: self.is_generating(),
        }
    }

    pub async fn snapshot(&self) -> FileSnapshot {
        self.applier.lock().await.snapshot().clone()
    }

    pub async fn files(&self) -> Vec<GeneratedFile> {
        self.applier.lock().await.snapshot().files()
    }

    pub fn is_generating(&self) -> bool {
        lock_mutex_recover(&self.active)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Subscribe to sandbox commands, starting with a mount of the current files
    pub async fn subscribe_sandbox(
        &self,
    ) -> Option<(Vec<SandboxCommand>, broadcast::Receiver<SandboxCommand>)> {
        let channel = self.channel.as_ref()?;
        let rx = channel.subscribe();
        let files = self.files().await;
        let mut initial = Vec::new();
        if !files.is_empty() {
            initial.push(SandboxCommand::Mount {
                tree: crate::sandbox::MountTree::from_files(&files),
            });
        }
        Some((initial, rx))
    }

    /// Apply a manual edit
    pub async fn apply_action(&self, action: FileAction) -> Result<AppliedChanges, SyncError> {
        let changes = self.applier.lock().await.apply_action(&action);
        self.forward(&changes).await?;
        Ok(changes)
    }

    pub async fn write_file(&self, path: &str, content: &str) -> Result<AppliedChanges, SyncError> {
        self.apply_action(FileAction::CreateOrUpdateFile {
            path: path.to_string(),
            content: content.to_string(),
        })
        .await
    }

    pub async fn delete_file(&self, path: &str) -> Result<AppliedChanges, SyncError> {
        self.apply_action(FileAction::DeleteFile {
            path: path.to_string(),
        })
        .await
    }

    /// Push pending changes to the sandbox now
    pub async fn flush(&self) -> Result<SyncReport, SyncError> {
        self.sync.flush().await
    }

    async fn forward(&self, changes: &AppliedChanges) -> Result<(), SyncError> {
        if changes.is_empty() {
            return Ok(());
        }
        self.sync.request(changes.clone().into()).await
    }

    /// Start a generation, cancelling any that is still running.
    ///
    /// Events are applied to the snapshot before they reach the returned
    /// receiver. Dropping the receiver cancels the generation.
    pub async fn generate(
        self: &Arc<Self>,
        orchestrator: &Orchestrator,
        prompt: &str,
    ) -> mpsc::Receiver<GenerationEvent> {
        self.cancel_generation();

        let request = GenerationRequest::new(prompt)
            .with_existing(self.snapshot().await)
            .with_history(self.history());
        let stream = orchestrator.start(request);
        log::info!("Session {} started generation {}", self.id, stream.id());

        let (tx, rx) = mpsc::channel(64);
        let task = tokio::spawn(pump(self.clone(), stream, tx, prompt.to_string()));
        *lock_mutex_recover(&self.active) = Some(task);
        rx
    }

    /// Abort the running generation, if any
    pub fn cancel_generation(&self) -> bool {
        let task = lock_mutex_recover(&self.active).take();
        match task {
            Some(task) if !task.is_finished() => {
                task.abort();
                log::info!("Session {} cancelled its generation", self.id);
                true
            }
            _ => false,
        }
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        lock_mutex_recover(&self.history).clone()
    }

    fn record_turn(&self, prompt: &str, reply: Option<&str>) {
        let mut history = lock_mutex_recover(&self.history);
        history.push(ChatMessage::user(prompt));
        if let Some(reply) = reply {
            history.push(ChatMessage::assistant(reply));
        }
        let excess = history.len().saturating_sub(MAX_HISTORY);
        history.drain(..excess);
    }

    /// Cancel the generation and stop the sync scheduler
    pub async fn teardown(&self) {
        self.cancel_generation();
        self.sync.shutdown().await;
        log::info!("Session {} torn down", self.id);
    }
}

/// Feed generation events through the applier, then on to the consumer
async fn pump(
    session: Arc<Session>,
    mut stream: GenerationStream,
    tx: mpsc::Sender<GenerationEvent>,
    prompt: String,
) {
    while let Some(event) = stream.next().await {
        let changes = session.applier.lock().await.apply_event(&event);
        if let Err(e) = session.forward(&changes).await {
            log::warn!("Session {} could not queue sync: {}", session.id, e);
        }

        if let GenerationEvent::Complete(payload) = &event {
            session.record_turn(&prompt, payload.message.as_deref());
        }

        if tx.send(event).await.is_err() {
            log::info!("Session {} consumer went away, closing generation", session.id);
            stream.close();
            return;
        }
    }
}

/// Read an existing project directory into a snapshot
pub fn load_project_dir(root: &Path) -> Result<FileSnapshot, String> {
    if !root.exists() {
        return Ok(FileSnapshot::new());
    }
    if !root.is_dir() {
        return Err(format!("{} is not a directory", root.display()));
    }

    let mut snapshot = FileSnapshot::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        let name = entry.file_name().to_string_lossy();
        entry.depth() == 0
            || !(entry.file_type().is_dir() && IGNORED_DIRS.iter().any(|dir| *dir == name))
    });

    for entry in walker {
        let entry = entry.with_context(&format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let path = relative.to_string_lossy().replace('\\', "/");
        match std::fs::read_to_string(entry.path()) {
            Ok(content) => {
                snapshot.upsert(&path, content);
            }
            Err(e) => log::debug!("Skipping non-text file {}: {}", path, e),
        }
    }
    Ok(snapshot)
}

/// All live sessions of a server
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        session
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<SessionInfo> {
        let sessions: Vec<Arc<Session>> = self.sessions.read().await.values().cloned().collect();
        let mut infos = Vec::with_capacity(sessions.len());
        for session in sessions {
            infos.push(session.info().await);
        }
        infos.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        infos
    }

    /// Remove and tear down a session
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(session) => {
                session.teardown().await;
                true
            }
            None => false,
        }
    }

    pub async fn teardown_all(&self) {
        let sessions: Vec<Arc<Session>> = self.sessions.write().await.drain().map(|(_, s)| s).collect();
        for session in sessions {
            session.teardown().await;
        }
    }
}
