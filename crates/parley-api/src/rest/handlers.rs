//! Request handlers

use crate::{ApiError, ApiResult, AppState};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::{Stream, StreamExt};
use parley_conversation::{ResponseOutcome, StreamChunk};
use parley_core::{ConversationTurn, SessionId};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Chunks buffered between the session task and the client
const STREAM_BUFFER: usize = 16;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<SessionId>,
    pub message: String,
}

impl ChatRequest {
    fn validate(&self) -> ApiResult<()> {
        if self.message.trim().is_empty() {
            return Err(ApiError::BadRequest("message must not be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: SessionId,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub outcome: ResponseOutcome,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: SessionId,
    pub turns: Vec<ConversationTurn>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub session_id: SessionId,
    pub cleared: usize,
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    request.validate()?;
    let (session_id, session) = state.sessions.get_or_create(request.session_id);

    let response = session.lock().await.get_response(&request.message).await?;
    info!(%session_id, outcome = ?response.outcome, "Chat request answered");

    Ok(Json(ChatResponse {
        session_id,
        message: response.message,
        source: response.source,
        outcome: response.outcome,
    }))
}

/// Stream a reply as Server-Sent Events.
///
/// The first event (`session`) carries the session id; every following
/// `data:` event is one [`StreamChunk`]. The session is driven by a spawned
/// task; when the client goes away the channel closes and the task drops the
/// reply stream.
pub async fn chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    request.validate()?;
    let (session_id, session) = state.sessions.get_or_create(request.session_id);
    let (tx, rx) = mpsc::channel::<Event>(STREAM_BUFFER);

    tokio::spawn(async move {
        if tx
            .send(Event::default().event("session").data(session_id.to_string()))
            .await
            .is_err()
        {
            return;
        }

        let mut manager = session.lock_owned().await;
        let chunks = match manager.get_streaming_response(&request.message) {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(%session_id, error = %e, "Streaming request rejected");
                return;
            }
        };
        futures::pin_mut!(chunks);

        while let Some(chunk) = chunks.next().await {
            let event = match to_event(&chunk) {
                Some(event) => event,
                None => continue,
            };
            if tx.send(event).await.is_err() {
                debug!(%session_id, "Client disconnected, stopping stream");
                break;
            }
        }
    });

    let events = ReceiverStream::new(rx).map(Ok::<Event, Infallible>);
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn to_event(chunk: &StreamChunk) -> Option<Event> {
    match Event::default().json_data(chunk) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, "Dropping unserializable stream chunk");
            None
        }
    }
}

pub async fn session_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<HistoryResponse>> {
    let session_id = parse_session_id(&id)?;
    let session = state
        .sessions
        .get(&session_id)
        .ok_or_else(|| ApiError::NotFound(format!("session {session_id}")))?;

    let turns = session.lock().await.history_snapshot();
    Ok(Json(HistoryResponse { session_id, turns }))
}

pub async fn clear_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<ClearResponse>)> {
    let session_id = parse_session_id(&id)?;
    let session = state
        .sessions
        .remove(&session_id)
        .ok_or_else(|| ApiError::NotFound(format!("session {session_id}")))?;

    let cleared = session.lock().await.clear_conversation();
    info!(%session_id, cleared, "Removed session");
    Ok((StatusCode::OK, Json(ClearResponse { session_id, cleared })))
}

/// Malformed ids cannot name an existing session
fn parse_session_id(raw: &str) -> ApiResult<SessionId> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("session {raw}")))
}
