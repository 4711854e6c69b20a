// Channel sandbox
// Forwards sandbox commands to connected browser clients over a broadcast channel

use super::{MountTree, Sandbox, SandboxError};
use crate::models::ReloadKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A command for the browser-hosted sandbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SandboxCommand {
    Mount { tree: MountTree },
    WriteFile { path: String, content: String },
    RemoveFile { path: String },
    Reload { kind: ReloadKind },
}

/// Sandbox whose commands are consumed by subscribers
pub struct ChannelSandbox {
    tx: broadcast::Sender<SandboxCommand>,
}

impl ChannelSandbox {
    /// Create a channel sandbox buffering up to `capacity` commands per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SandboxCommand> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn send(&self, command: SandboxCommand) -> Result<(), SandboxError> {
        self.tx
            .send(command)
            .map(|_| ())
            .map_err(|_| SandboxError::Disconnected)
    }
}

impl Default for ChannelSandbox {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Sandbox for ChannelSandbox {
    async fn mount(&self, tree: &MountTree) -> Result<(), SandboxError> {
        self.send(SandboxCommand::Mount { tree: tree.clone() })
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), SandboxError> {
        self.send(SandboxCommand::WriteFile {
            path: path.to_string(),
            content: content.to_string(),
        })
    }

    async fn remove_file(&self, path: &str) -> Result<(), SandboxError> {
        self.send(SandboxCommand::RemoveFile {
            path: path.to_string(),
        })
    }

    async fn reload(&self, kind: ReloadKind) -> Result<(), SandboxError> {
        self.send(SandboxCommand::Reload { kind })
    }
}
