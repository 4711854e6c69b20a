// Sync scheduler
//
// One actor task per session owns the snapshot the sandbox is known to have.
// Sync requests merge into a pending batch behind a debounce deadline; at most
// one pass talks to the sandbox at a time. A failed pass leaves the synced
// snapshot untouched and puts its changes back into the pending batch.

use super::applier::AppliedChanges;
use super::delta::{plan_sync, SyncPlan};
use super::reload::ReloadPolicy;
use crate::config::SyncSettings;
use crate::models::{
    normalize_path, ChangeDelta, FileSnapshot, GeneratedFile, ReloadDecision, ReloadKind,
};
use crate::sandbox::{Sandbox, SandboxError};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;

const COMMAND_BUFFER: usize = 256;
const NOTICE_BUFFER: usize = 64;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SyncError {
    #[error("Sync scheduler is not running")]
    Closed,

    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

/// Files and removals to push to the sandbox
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncRequest {
    pub files: Vec<GeneratedFile>,
    pub removals: Vec<String>,
}

impl SyncRequest {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.removals.is_empty()
    }
}

impl From<AppliedChanges> for SyncRequest {
    fn from(changes: AppliedChanges) -> Self {
        Self {
            files: changes.upserted,
            removals: changes.removed,
        }
    }
}

/// Outcome of a completed pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub delta: ChangeDelta,
    pub decision: ReloadDecision,
}

/// Status reported to anyone watching the session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncNotice {
    Synced { changed: usize, reload: ReloadKind },
    /// Recoverable: the changes stay pending and are retried
    SyncFailed { message: String, pending: usize },
    Reloaded { kind: ReloadKind },
    ReloadFailed { kind: ReloadKind, message: String },
}

enum SyncCommand {
    Sync(SyncRequest),
    Flush(oneshot::Sender<Result<SyncReport, SyncError>>),
    Shutdown,
}

/// Changes waiting for the next pass, latest write wins per path
#[derive(Debug, Default)]
struct PendingBatch {
    files: BTreeMap<String, String>,
    removals: BTreeSet<String>,
}

impl PendingBatch {
    fn add_file(&mut self, path: &str, content: String) {
        let path = normalize_path(path);
        self.removals.remove(&path);
        self.files.insert(path, content);
    }

    fn add_removal(&mut self, path: &str) {
        let path = normalize_path(path);
        self.files.remove(&path);
        self.removals.insert(path);
    }

    fn merge(&mut self, request: SyncRequest) {
        for file in request.files {
            self.add_file(&file.path, file.content);
        }
        for path in request.removals {
            self.add_removal(&path);
        }
    }

    /// Put a failed batch back without overriding anything newer
    fn restore(&mut self, failed: PendingBatch) {
        for (path, content) in failed.files {
            if !self.files.contains_key(&path) && !self.removals.contains(&path) {
                self.files.insert(path, content);
            }
        }
        for path in failed.removals {
            if !self.files.contains_key(&path) {
                self.removals.insert(path);
            }
        }
    }

    fn len(&self) -> usize {
        self.files.len() + self.removals.len()
    }

    fn incoming(&self) -> FileSnapshot {
        FileSnapshot::from_files(
            self.files
                .iter()
                .map(|(path, content)| GeneratedFile::new(path, content.clone())),
        )
    }
}

struct InFlight {
    handle: JoinHandle<Result<(), SandboxError>>,
    plan: SyncPlan,
    batch: PendingBatch,
    waiters: Vec<oneshot::Sender<Result<SyncReport, SyncError>>>,
}

/// Builder and actor for one session's sync loop
pub struct SyncScheduler {
    sandbox: Arc<dyn Sandbox>,
    policy: ReloadPolicy,
    debounce: Duration,
    synced: FileSnapshot,
}

impl SyncScheduler {
    pub fn new(sandbox: Arc<dyn Sandbox>, policy: ReloadPolicy) -> Self {
        Self {
            sandbox,
            policy,
            debounce: Duration::from_millis(500),
            synced: FileSnapshot::new(),
        }
    }

    pub fn from_settings(sandbox: Arc<dyn Sandbox>, settings: &SyncSettings) -> Self {
        Self::new(sandbox, ReloadPolicy::from_settings(settings))
            .with_debounce(Duration::from_millis(settings.debounce_ms))
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Start from files the sandbox already has
    pub fn with_synced(mut self, synced: FileSnapshot) -> Self {
        self.synced = synced;
        self
    }

    /// Spawn the actor task
    pub fn spawn(self) -> SyncHandle {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (notices, _) = broadcast::channel(NOTICE_BUFFER);
        let actor = SyncActor {
            sandbox: self.sandbox,
            policy: self.policy,
            debounce: self.debounce,
            synced: self.synced,
            pending: PendingBatch::default(),
            deadline: None,
            pass_due: false,
            in_flight: None,
            flush_waiters: Vec::new(),
            reload: None,
            failures: 0,
            notices: notices.clone(),
            rx,
        };
        tokio::spawn(actor.run());
        SyncHandle { tx, notices }
    }
}

/// Cheap handle for sending work to a scheduler
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::Sender<SyncCommand>,
    notices: broadcast::Sender<SyncNotice>,
}

impl SyncHandle {
    pub async fn request(&self, request: SyncRequest) -> Result<(), SyncError> {
        if request.is_empty() {
            return Ok(());
        }
        self.tx
            .send(SyncCommand::Sync(request))
            .await
            .map_err(|_| SyncError::Closed)
    }

    pub async fn sync_files(&self, files: Vec<GeneratedFile>) -> Result<(), SyncError> {
        self.request(SyncRequest {
            files,
            removals: Vec::new(),
        })
        .await
    }

    pub async fn remove_files(&self, removals: Vec<String>) -> Result<(), SyncError> {
        self.request(SyncRequest {
            files: Vec::new(),
            removals,
        })
        .await
    }

    /// Run a pass now, skipping the debounce, and wait for its outcome
    pub async fn flush(&self) -> Result<SyncReport, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SyncCommand::Flush(reply))
            .await
            .map_err(|_| SyncError::Closed)?;
        rx.await.map_err(|_| SyncError::Closed)?
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotice> {
        self.notices.subscribe()
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(SyncCommand::Shutdown).await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

struct SyncActor {
    sandbox: Arc<dyn Sandbox>,
    policy: ReloadPolicy,
    debounce: Duration,
    synced: FileSnapshot,
    pending: PendingBatch,
    deadline: Option<Instant>,
    pass_due: bool,
    in_flight: Option<InFlight>,
    flush_waiters: Vec<oneshot::Sender<Result<SyncReport, SyncError>>>,
    reload: Option<(ReloadKind, Instant)>,
    failures: u32,
    notices: broadcast::Sender<SyncNotice>,
    rx: mpsc::Receiver<SyncCommand>,
}

impl SyncActor {
    async fn run(mut self) {
        log::debug!("Sync scheduler started");
        loop {
            let deadline = self.deadline;
            let reload_at = self.reload.map(|(_, at)| at);

            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(SyncCommand::Sync(request)) => self.enqueue(request),
                    Some(SyncCommand::Flush(reply)) => {
                        self.flush_waiters.push(reply);
                        self.deadline = None;
                        self.pass_due = true;
                    }
                    Some(SyncCommand::Shutdown) | None => break,
                },
                _ = sleep_until(deadline), if deadline.is_some() => {
                    self.deadline = None;
                    self.pass_due = true;
                }
                result = join_pass(&mut self.in_flight), if self.in_flight.is_some() => {
                    self.finish_pass(result);
                }
                _ = sleep_until(reload_at), if reload_at.is_some() => {
                    self.fire_reload().await;
                }
            }

            if self.pass_due && self.in_flight.is_none() {
                self.pass_due = false;
                self.start_pass();
            }
        }

        if let Some(pass) = self.in_flight.take() {
            pass.handle.abort();
        }
        log::debug!("Sync scheduler stopped");
    }

    fn enqueue(&mut self, request: SyncRequest) {
        self.pending.merge(request);
        self.deadline = Some(Instant::now() + self.debounce);
    }

    fn start_pass(&mut self) {
        let batch = std::mem::take(&mut self.pending);
        let removals: Vec<String> = batch.removals.iter().cloned().collect();
        let plan = plan_sync(&self.synced, &batch.incoming(), &removals, &self.policy);
        let waiters = std::mem::take(&mut self.flush_waiters);

        if plan.is_noop() {
            log::debug!("Sync pass skipped, nothing changed");
            let report = SyncReport {
                delta: plan.delta,
                decision: plan.decision,
            };
            for waiter in waiters {
                let _ = waiter.send(Ok(report.clone()));
            }
            return;
        }

        log::debug!(
            "Sync pass started: {} added, {} modified, {} removed",
            plan.delta.added.len(),
            plan.delta.modified.len(),
            plan.delta.removed.len()
        );
        let sandbox = self.sandbox.clone();
        let task_plan = plan.clone();
        let handle = tokio::spawn(async move { apply_plan(sandbox.as_ref(), &task_plan).await });
        self.in_flight = Some(InFlight {
            handle,
            plan,
            batch,
            waiters,
        });
    }

    fn finish_pass(&mut self, result: Result<Result<(), SandboxError>, JoinError>) {
        let Some(pass) = self.in_flight.take() else {
            return;
        };
        let result = result
            .unwrap_or_else(|e| Err(SandboxError::Rejected(format!("sync pass aborted: {}", e))));

        match result {
            Ok(()) => {
                let delta = &pass.plan.delta;
                for file in delta.added.iter().chain(delta.modified.iter()) {
                    self.synced.upsert(&file.path, file.content.clone());
                }
                for path in &delta.removed {
                    self.synced.remove(path);
                }
                self.failures = 0;

                let decision = pass.plan.decision;
                log::info!(
                    "Synced {} file(s), reload: {}",
                    delta.len(),
                    decision.kind
                );
                let _ = self.notices.send(SyncNotice::Synced {
                    changed: delta.len(),
                    reload: decision.kind,
                });
                self.schedule_reload(decision);

                let report = SyncReport {
                    delta: pass.plan.delta,
                    decision,
                };
                for waiter in pass.waiters {
                    let _ = waiter.send(Ok(report.clone()));
                }
            }
            Err(e) => {
                self.pending.restore(pass.batch);
                self.failures += 1;
                let retry_at = Instant::now() + self.retry_delay();
                self.deadline = Some(self.deadline.map_or(retry_at, |d| d.min(retry_at)));

                log::warn!(
                    "Sync pass failed ({} pending change(s) kept): {}",
                    self.pending.len(),
                    e
                );
                let _ = self.notices.send(SyncNotice::SyncFailed {
                    message: e.to_string(),
                    pending: self.pending.len(),
                });
                for waiter in pass.waiters {
                    let _ = waiter.send(Err(SyncError::Sandbox(e.clone())));
                }
            }
        }
    }

    fn retry_delay(&self) -> Duration {
        let exponent = self.failures.min(6);
        (self.debounce.max(Duration::from_millis(1)) * (1u32 << exponent)).min(MAX_RETRY_DELAY)
    }

    /// Replace any pending reload timer, keeping the stronger kind
    fn schedule_reload(&mut self, decision: ReloadDecision) {
        if decision.kind == ReloadKind::None {
            return;
        }
        let kind = match self.reload {
            Some((pending, _)) => pending.max(decision.kind),
            None => decision.kind,
        };
        let at = Instant::now() + Duration::from_millis(decision.delay_ms);
        self.reload = Some((kind, at));
    }

    async fn fire_reload(&mut self) {
        let Some((kind, _)) = self.reload.take() else {
            return;
        };
        match self.sandbox.reload(kind).await {
            Ok(()) => {
                log::debug!("Sandbox {}", kind);
                let _ = self.notices.send(SyncNotice::Reloaded { kind });
            }
            Err(e) => {
                log::warn!("Sandbox {} failed: {}", kind, e);
                let _ = self.notices.send(SyncNotice::ReloadFailed {
                    kind,
                    message: e.to_string(),
                });
            }
        }
    }
}

/// Push one plan to the sandbox
async fn apply_plan(sandbox: &dyn Sandbox, plan: &SyncPlan) -> Result<(), SandboxError> {
    let delta = &plan.delta;
    let single_edit = delta.added.is_empty() && delta.removed.is_empty() && delta.modified.len() == 1;

    if single_edit {
        let file = &delta.modified[0];
        sandbox.write_file(&file.path, &file.content).await?;
    } else if !plan.mount.is_empty() {
        sandbox.mount(&plan.mount).await?;
    }

    for path in &delta.removed {
        sandbox.remove_file(path).await?;
    }
    Ok(())
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn join_pass(in_flight: &mut Option<InFlight>) -> Result<Result<(), SandboxError>, JoinError> {
    match in_flight {
        Some(pass) => (&mut pass.handle).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_latest_write_wins() {
        let mut batch = PendingBatch::default();
        batch.merge(SyncRequest {
            files: vec![GeneratedFile::new("a.ts", "1")],
            removals: vec!["b.ts".to_string()],
        });
        batch.merge(SyncRequest {
            files: vec![GeneratedFile::new("b.ts", "2")],
            removals: vec!["./a.ts".to_string()],
        });
        assert_eq!(batch.files.get("b.ts").map(String::as_str), Some("2"));
        assert!(batch.removals.contains("a.ts"));
        assert!(!batch.files.contains_key("a.ts"));
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_restore_keeps_newer_changes() {
        let mut failed = PendingBatch::default();
        failed.add_file("a.ts", "old".to_string());
        failed.add_file("b.ts", "old".to_string());
        failed.add_removal("c.ts");

        let mut pending = PendingBatch::default();
        pending.add_file("a.ts", "new".to_string());
        pending.add_file("c.ts", "recreated".to_string());

        pending.restore(failed);
        assert_eq!(pending.files.get("a.ts").map(String::as_str), Some("new"));
        assert_eq!(pending.files.get("b.ts").map(String::as_str), Some("old"));
        assert_eq!(pending.files.get("c.ts").map(String::as_str), Some("recreated"));
        assert!(pending.removals.is_empty());
    }
}
