// Generation orchestrator
//
// Drives one prompt through classify -> (template | chat | generate) and
// reports every step as a GenerationEvent on a bounded channel. Dropping or
// closing the stream aborts the run, including any in-flight model call.

use super::extractor::StreamingExtractor;
use super::intent::Intent;
use super::parser::parse_response;
use super::validator::validate;
use super::GenerationContext;
use crate::events::{
    ActionsPayload, CompletePayload, ErrorPayload, FileAction, GeneratingPayload,
    GenerationEvent, GenerationMode, PlanningPayload, ProgressPayload, StartPayload,
};
use crate::llm::{ChatMessage, Invocation, ModelError, ModelReply};
use crate::models::state_machine::{transition_state, GenerationState, StateTransitionError};
use crate::models::{FileSnapshot, GeneratedFile};
use crate::templates::{match_template, PromptContext};
use futures_util::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    State(#[from] StateTransitionError),

    #[error("Failed to render prompt: {0}")]
    Prompt(String),

    #[error("{0}")]
    Response(String),

    /// The consumer went away
    #[error("Generation cancelled")]
    Cancelled,
}

impl GenerationError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GenerationError::Model(e) => e.status(),
            _ => None,
        }
    }
}

/// One prompt against a project
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Files already in the project
    pub existing: FileSnapshot,
    /// Earlier conversation turns, oldest first
    pub history: Vec<ChatMessage>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_existing(mut self, existing: FileSnapshot) -> Self {
        self.existing = existing;
        self
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }
}

/// Lazily consumed events of one run
pub struct GenerationStream {
    id: String,
    rx: mpsc::Receiver<GenerationEvent>,
    task: JoinHandle<()>,
}

impl GenerationStream {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Next event, `None` once the run has finished
    pub async fn next(&mut self) -> Option<GenerationEvent> {
        self.rx.recv().await
    }

    /// Stop the run; no further events are produced
    pub fn close(mut self) {
        self.rx.close();
        self.task.abort();
        log::debug!("Generation {} closed by consumer", self.id);
    }

    /// Drain every remaining event
    pub async fn collect(mut self) -> Vec<GenerationEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.next().await {
            events.push(event);
        }
        events
    }
}

impl Drop for GenerationStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Starts generation runs
#[derive(Clone)]
pub struct Orchestrator {
    context: Arc<GenerationContext>,
}

impl Orchestrator {
    pub fn new(context: Arc<GenerationContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &GenerationContext {
        &self.context
    }

    /// Spawn a run; nothing is lost if the stream is read later
    pub fn start(&self, request: GenerationRequest) -> GenerationStream {
        let id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let run = Run {
            id: id.clone(),
            context: self.context.clone(),
            state: GenerationState::Classifying,
            tx,
        };
        let task = tokio::spawn(run.execute(request));
        GenerationStream { id, rx, task }
    }
}

struct Run {
    id: String,
    context: Arc<GenerationContext>,
    state: GenerationState,
    tx: mpsc::Sender<GenerationEvent>,
}

/// Files and deletions produced by a model response
struct Outcome {
    files: Vec<GeneratedFile>,
    deleted: Vec<String>,
    summary: Option<String>,
    /// Content already emitted as file events, by path
    streamed: HashMap<String, String>,
}

impl Run {
    async fn execute(mut self, request: GenerationRequest) {
        log::info!("Generation {} started", self.id);
        match self.drive(request).await {
            Ok(()) => log::info!("Generation {} complete", self.id),
            Err(GenerationError::Cancelled) => {
                log::info!("Generation {} cancelled", self.id);
            }
            Err(e) => {
                log::error!("Generation {} failed: {}", self.id, e);
                if let Ok(state) = transition_state(self.state, GenerationState::Error) {
                    self.state = state;
                }
                let _ = self
                    .tx
                    .send(GenerationEvent::Error(ErrorPayload {
                        message: e.to_string(),
                        status: e.status(),
                    }))
                    .await;
            }
        }
    }

    async fn drive(&mut self, request: GenerationRequest) -> Result<(), GenerationError> {
        self.emit(GenerationEvent::Start(StartPayload {
            generation_id: self.id.clone(),
            timestamp: chrono::Utc::now(),
        }))
        .await?;

        let intent = self.context.classifier.classify(&request.prompt);
        log::debug!("Generation {} classified as {:?}", self.id, intent);

        match intent {
            Intent::Chat => self.chat(&request).await,
            Intent::Generate => {
                if self.context.settings.templates_enabled && request.existing.is_empty() {
                    if let Some(template) = match_template(&request.prompt) {
                        return self.serve_template(template).await;
                    }
                }
                self.generate(&request).await
            }
        }
    }

    async fn serve_template(
        &mut self,
        template: &'static crate::templates::StarterTemplate,
    ) -> Result<(), GenerationError> {
        self.advance(GenerationState::Templating)?;
        self.emit(GenerationEvent::Planning(PlanningPayload {
            mode: GenerationMode::Template,
            template: Some(template.id.to_string()),
            message: format!("Using the {} starter", template.name),
        }))
        .await?;

        let files = template.files();
        for file in &files {
            self.emit(GenerationEvent::File(file.clone())).await?;
        }

        self.advance(GenerationState::Complete)?;
        self.emit(GenerationEvent::Complete(CompletePayload {
            files,
            stubs: Vec::new(),
            message: Some(template.description.to_string()),
        }))
        .await
    }

    async fn chat(&mut self, request: &GenerationRequest) -> Result<(), GenerationError> {
        self.advance(GenerationState::Chatting)?;
        self.emit(GenerationEvent::Planning(PlanningPayload {
            mode: GenerationMode::Chat,
            template: None,
            message: "Answering question".to_string(),
        }))
        .await?;

        let context = PromptContext::new().with_files(&request.existing.files());
        let system = self
            .context
            .prompts
            .render_chat(&context)
            .map_err(|e| GenerationError::Prompt(e.to_string()))?;
        let invocation = self.invoke(system, request).await?;

        let answer = match invocation.reply {
            ModelReply::Complete(text) => text,
            ModelReply::Stream(mut stream) => {
                let mut answer = String::new();
                while let Some(delta) = stream.next().await {
                    let delta = delta?;
                    if delta.is_empty() {
                        continue;
                    }
                    answer.push_str(&delta);
                    self.emit(GenerationEvent::Progress(ProgressPayload {
                        message: "Answering".to_string(),
                        files_so_far: 0,
                        chars_received: answer.chars().count(),
                        delta: Some(delta),
                    }))
                    .await?;
                }
                answer
            }
        };

        self.advance(GenerationState::Complete)?;
        self.emit(GenerationEvent::Complete(CompletePayload {
            files: Vec::new(),
            stubs: Vec::new(),
            message: Some(answer.trim().to_string()),
        }))
        .await
    }

    async fn generate(&mut self, request: &GenerationRequest) -> Result<(), GenerationError> {
        self.advance(GenerationState::Generating)?;
        self.emit(GenerationEvent::Planning(PlanningPayload {
            mode: GenerationMode::Generate,
            template: None,
            message: "Generating files".to_string(),
        }))
        .await?;

        let context = PromptContext::new().with_files(&request.existing.files());
        let system = self
            .context
            .prompts
            .render_generation(&context)
            .map_err(|e| GenerationError::Prompt(e.to_string()))?;
        let invocation = self.invoke(system, request).await?;
        let outcome = self.receive(invocation).await?;

        self.advance(GenerationState::Validating)?;
        let report = validate(&outcome.files, &request.existing);
        if !report.valid {
            log::warn!(
                "Generation {} produced {} validation errors: {:?}",
                self.id,
                report.errors.len(),
                report.errors
            );
        }

        self.advance(GenerationState::Repairing)?;
        let stubs = self.context.repairer.repair(&report.missing_imports);
        for stub in &stubs {
            self.emit(GenerationEvent::File(stub.clone())).await?;
        }

        let mut actions: Vec<FileAction> = outcome
            .files
            .iter()
            .filter(|file| outcome.streamed.get(&file.path) != Some(&file.content))
            .map(|file| FileAction::CreateOrUpdateFile {
                path: file.path.clone(),
                content: file.content.clone(),
            })
            .collect();
        actions.extend(
            outcome
                .deleted
                .iter()
                .map(|path| FileAction::DeleteFile { path: path.clone() }),
        );
        // Streamed files the final parse dropped go back to what they were
        let kept: HashSet<&str> = outcome.files.iter().map(|file| file.path.as_str()).collect();
        let mut dropped: Vec<&String> = outcome
            .streamed
            .keys()
            .filter(|path| !kept.contains(path.as_str()) && !outcome.deleted.contains(path))
            .collect();
        dropped.sort();
        for path in dropped {
            log::debug!("Generation {} retracting streamed {}", self.id, path);
            actions.push(match request.existing.get(path) {
                Some(original) => FileAction::CreateOrUpdateFile {
                    path: path.clone(),
                    content: original.to_string(),
                },
                None => FileAction::DeleteFile { path: path.clone() },
            });
        }
        if !actions.is_empty() {
            log::debug!("Generation {} sending {} corrective actions", self.id, actions.len());
            self.emit(GenerationEvent::Actions(ActionsPayload { actions }))
                .await?;
        }

        let stub_paths = stubs.iter().map(|stub| stub.path.clone()).collect();
        let mut files = outcome.files;
        files.extend(stubs);

        self.advance(GenerationState::Complete)?;
        self.emit(GenerationEvent::Complete(CompletePayload {
            files,
            stubs: stub_paths,
            message: outcome.summary,
        }))
        .await
    }

    /// Read the model reply, emitting files as soon as they are complete
    async fn receive(&mut self, invocation: Invocation) -> Result<Outcome, GenerationError> {
        let mut extractor = StreamingExtractor::new();
        let mut streamed = HashMap::new();
        let mut full = String::new();

        match invocation.reply {
            ModelReply::Complete(text) => {
                for file in extractor.add_chunk(&text) {
                    streamed.insert(file.path.clone(), file.content.clone());
                    self.emit(GenerationEvent::File(file)).await?;
                }
                full = text;
            }
            ModelReply::Stream(mut stream) => {
                let interval = self.context.settings.progress_interval_chars.max(1);
                let mut received = 0usize;
                let mut next_progress = interval;

                while let Some(delta) = stream.next().await {
                    let delta = delta?;
                    received += delta.chars().count();
                    full.push_str(&delta);

                    for file in extractor.add_chunk(&delta) {
                        log::debug!("Generation {} streamed {}", self.id, file.path);
                        streamed.insert(file.path.clone(), file.content.clone());
                        self.emit(GenerationEvent::File(file)).await?;
                    }

                    if received >= next_progress {
                        while next_progress <= received {
                            next_progress += interval;
                        }
                        self.emit(GenerationEvent::Progress(ProgressPayload {
                            message: format!("Received {} characters", received),
                            files_so_far: streamed.len(),
                            chars_received: received,
                            delta: None,
                        }))
                        .await?;
                    }
                }
            }
        }

        match parse_response(&full) {
            Some(parsed) => Ok(Outcome {
                files: parsed.files,
                deleted: parsed.deleted,
                summary: parsed.summary,
                streamed,
            }),
            None if !streamed.is_empty() => {
                log::warn!(
                    "Generation {} response did not parse; keeping {} streamed files",
                    self.id,
                    streamed.len()
                );
                let mut files: Vec<GeneratedFile> = streamed
                    .iter()
                    .map(|(path, content)| GeneratedFile::new(path, content.clone()))
                    .collect();
                files.sort_by(|a, b| a.path.cmp(&b.path));
                Ok(Outcome {
                    files,
                    deleted: Vec::new(),
                    summary: None,
                    streamed,
                })
            }
            None => Err(GenerationError::Response(
                "Model response did not contain any files".to_string(),
            )),
        }
    }

    async fn invoke(
        &mut self,
        system: String,
        request: &GenerationRequest,
    ) -> Result<Invocation, GenerationError> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ChatMessage::system(system));
        messages.extend(request.history.iter().cloned());
        messages.push(ChatMessage::user(request.prompt.clone()));

        let invocation = self
            .context
            .invoker
            .invoke(messages, &self.context.options)
            .await?;
        self.emit(GenerationEvent::Generating(GeneratingPayload {
            model: invocation.model.clone(),
            attempts: invocation.attempts,
        }))
        .await?;
        Ok(invocation)
    }

    fn advance(&mut self, target: GenerationState) -> Result<(), GenerationError> {
        self.state = transition_state(self.state, target)?;
        Ok(())
    }

    async fn emit(&self, event: GenerationEvent) -> Result<(), GenerationError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| GenerationError::Cancelled)
    }
}
