//! Event stream routes
//!
//! Both streams are server-sent events; every frame is a single
//! `data: {json}` line.

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::convert::Infallible;
use tokio::sync::broadcast::{self, error::RecvError};

use super::{find_session, ApiError};
use crate::events::GenerationEvent;
use crate::sandbox::SandboxCommand;
use crate::server::ServerAppState;
use crate::sync::SyncNotice;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub prompt: String,
}

/// One frame of the sandbox stream
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum SandboxFrame {
    Command(SandboxCommand),
    Notice(SyncNotice),
}

fn frame<T: Serialize>(value: &T) -> Event {
    Event::default().json_data(value).unwrap_or_else(|e| {
        log::warn!("Failed to serialize frame: {}", e);
        Event::default().comment("unserializable frame")
    })
}

/// Run a prompt and stream its events
pub async fn generate(
    State(state): State<ServerAppState>,
    Path(id): Path<String>,
    Json(request): Json<GenerateRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    if request.prompt.trim().is_empty() {
        return Err(ApiError::bad_request("Missing argument: prompt"));
    }
    let session = find_session(&state, &id).await?;
    let rx = session.generate(&state.orchestrator, &request.prompt).await;

    // Ends after the terminal frame; dropping the stream cancels the run
    let events = stream::unfold(rx, |mut rx| async move {
        let event: GenerationEvent = rx.recv().await?;
        Some((Ok(frame(&event)), rx))
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Stream sandbox commands and sync notices for a browser-hosted sandbox
pub async fn sandbox_stream(
    State(state): State<ServerAppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let session = find_session(&state, &id).await?;
    let (initial, commands) = session
        .subscribe_sandbox()
        .await
        .ok_or_else(|| ApiError::bad_request("Session has no browser sandbox"))?;
    let notices = session.sync().subscribe();
    log::info!("Sandbox client connected to session {}", id);

    let queued: VecDeque<SandboxFrame> = initial.into_iter().map(SandboxFrame::Command).collect();
    let frames = stream::unfold(
        (queued, commands, notices),
        |(mut queued, mut commands, mut notices)| async move {
            if let Some(next) = queued.pop_front() {
                return Some((Ok(frame(&next)), (queued, commands, notices)));
            }
            // Commands first so a notice never overtakes the change it reports
            let next = tokio::select! {
                biased;
                command = recv_skipping_lag(&mut commands) => SandboxFrame::Command(command?),
                notice = recv_skipping_lag(&mut notices) => SandboxFrame::Notice(notice?),
            };
            Some((Ok(frame(&next)), (queued, commands, notices)))
        },
    );
    Ok(Sse::new(frames).keep_alive(KeepAlive::default()))
}

/// Next broadcast value; `None` once the sender is gone
async fn recv_skipping_lag<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Option<T> {
    loop {
        match rx.recv().await {
            Ok(value) => return Some(value),
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("Sandbox stream lagged, skipped {} frame(s)", skipped);
            }
            Err(RecvError::Closed) => return None,
        }
    }
}
