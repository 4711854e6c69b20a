// Generation event types and frame encoding
// Frames are streamed to callers as line-prefixed `data:` blocks

use crate::models::GeneratedFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Frame type names
pub const EVENT_START: &str = "start";
pub const EVENT_PLANNING: &str = "planning";
pub const EVENT_GENERATING: &str = "generating";
pub const EVENT_PROGRESS: &str = "progress";
pub const EVENT_FILE: &str = "file";
pub const EVENT_ACTIONS: &str = "actions";
pub const EVENT_COMPLETE: &str = "complete";
pub const EVENT_ERROR: &str = "error";

/// How a prompt is being served
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    Template,
    Chat,
    Generate,
}

/// A mutation of the project file set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileAction {
    CreateOrUpdateFile { path: String, content: String },
    DeleteFile { path: String },
}

impl FileAction {
    pub fn path(&self) -> &str {
        match self {
            FileAction::CreateOrUpdateFile { path, .. } => path,
            FileAction::DeleteFile { path } => path,
        }
    }
}

/// Payload for start events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartPayload {
    pub generation_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Payload for planning events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanningPayload {
    pub mode: GenerationMode,
    pub template: Option<String>,
    pub message: String,
}

/// Payload for generating events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratingPayload {
    pub model: String,
    pub attempts: u32,
}

/// Payload for progress events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPayload {
    pub message: String,
    pub files_so_far: usize,
    pub chars_received: usize,
    /// Raw text delta (chat answers only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,
}

/// Payload for actions events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionsPayload {
    pub actions: Vec<FileAction>,
}

/// Payload for complete events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletePayload {
    pub files: Vec<GeneratedFile>,
    /// Paths of files synthesized by the stub repairer
    pub stubs: Vec<String>,
    pub message: Option<String>,
}

/// Payload for error events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
    pub status: Option<u16>,
}

/// One event of a generation run.
///
/// Serializes as `{"type": "...", "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GenerationEvent {
    Start(StartPayload),
    Planning(PlanningPayload),
    Generating(GeneratingPayload),
    Progress(ProgressPayload),
    File(GeneratedFile),
    Actions(ActionsPayload),
    Complete(CompletePayload),
    Error(ErrorPayload),
}

impl GenerationEvent {
    /// Frame type name
    pub fn event_type(&self) -> &'static str {
        match self {
            GenerationEvent::Start(_) => EVENT_START,
            GenerationEvent::Planning(_) => EVENT_PLANNING,
            GenerationEvent::Generating(_) => EVENT_GENERATING,
            GenerationEvent::Progress(_) => EVENT_PROGRESS,
            GenerationEvent::File(_) => EVENT_FILE,
            GenerationEvent::Actions(_) => EVENT_ACTIONS,
            GenerationEvent::Complete(_) => EVENT_COMPLETE,
            GenerationEvent::Error(_) => EVENT_ERROR,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GenerationEvent::Complete(_) | GenerationEvent::Error(_)
        )
    }

    pub fn error(message: impl Into<String>) -> Self {
        GenerationEvent::Error(ErrorPayload {
            message: message.into(),
            status: None,
        })
    }

    /// Encode as a line-prefixed frame: `data: {json}\n\n`
    pub fn to_frame(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|e| {
            log::warn!("Failed to serialize {} event: {}", self.event_type(), e);
            format!(
                "{{\"type\":\"error\",\"data\":{{\"message\":\"unserializable {} event\",\"status\":null}}}}",
                self.event_type()
            )
        });
        format!("data: {}\n\n", json)
    }

    /// Decode a single frame produced by [`GenerationEvent::to_frame`]
    pub fn from_frame(frame: &str) -> Option<Self> {
        let payload = frame.trim().strip_prefix("data:")?.trim_start();
        serde_json::from_str(payload).ok()
    }
}
