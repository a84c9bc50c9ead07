//! HTTP route handlers.
//!
//! All handlers are thin: reads come from the published station snapshot,
//! writes become intents for the station task.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::api::response::{api_ok, api_success};
use crate::api::ws::ws_handler;
use crate::api::AppState;
use crate::constants::{SERVICE_ID, SKIP_STEP_SECS};
use crate::error::OnAirResult;
use crate::events::BroadcastEvent;
use crate::services::Intent;

// ─────────────────────────────────────────────────────────────────────────────
// Request Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PlayRequest {
    slot: String,
}

#[derive(Debug, Default, Deserialize)]
struct SkipRequest {
    /// Defaults to one step forward.
    #[serde(default)]
    seconds: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SeekRequest {
    position: f64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/state", get(get_current_state))
        .route("/api/refresh", post(handle_refresh))
        .route("/api/playback/play", post(handle_play))
        .route("/api/playback/toggle", post(handle_toggle))
        .route("/api/playback/pause", post(handle_pause))
        .route("/api/playback/resume", post(handle_resume))
        .route("/api/playback/stop", post(handle_stop))
        .route("/api/playback/skip", post(handle_skip))
        .route("/api/playback/seek", post(handle_seek))
        .route("/api/events", get(event_stream))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness probe.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    api_success(json!({
        "status": "ok",
        "service": SERVICE_ID,
        "audioAttached": state.audio_link.is_attached(),
        "connections": state.ws_manager.stats(),
    }))
}

/// Returns the latest station snapshot.
async fn get_current_state(State(state): State<AppState>) -> impl IntoResponse {
    api_success(state.station.snapshot())
}

/// Fetches now, bypassing caches; answers once the fetch has finished.
async fn handle_refresh(State(state): State<AppState>) -> OnAirResult<impl IntoResponse> {
    state.station.dispatch(Intent::Refresh).await?;
    Ok(api_success(state.station.snapshot()))
}

async fn handle_play(
    State(state): State<AppState>,
    Json(payload): Json<PlayRequest>,
) -> OnAirResult<impl IntoResponse> {
    state
        .station
        .dispatch(Intent::Play { slot: payload.slot })
        .await?;
    Ok(api_ok())
}

async fn handle_toggle(State(state): State<AppState>) -> OnAirResult<impl IntoResponse> {
    state.station.dispatch(Intent::Toggle).await?;
    Ok(api_ok())
}

async fn handle_pause(State(state): State<AppState>) -> OnAirResult<impl IntoResponse> {
    state.station.dispatch(Intent::Pause).await?;
    Ok(api_ok())
}

async fn handle_resume(State(state): State<AppState>) -> OnAirResult<impl IntoResponse> {
    state.station.dispatch(Intent::Resume).await?;
    Ok(api_ok())
}

async fn handle_stop(State(state): State<AppState>) -> OnAirResult<impl IntoResponse> {
    state.station.dispatch(Intent::Stop).await?;
    Ok(api_ok())
}

async fn handle_skip(
    State(state): State<AppState>,
    payload: Option<Json<SkipRequest>>,
) -> OnAirResult<impl IntoResponse> {
    let seconds = payload
        .and_then(|Json(p)| p.seconds)
        .unwrap_or(SKIP_STEP_SECS);
    state.station.dispatch(Intent::Skip { seconds }).await?;
    Ok(api_ok())
}

async fn handle_seek(
    State(state): State<AppState>,
    Json(payload): Json<SeekRequest>,
) -> OnAirResult<impl IntoResponse> {
    state
        .station
        .dispatch(Intent::Seek {
            position: payload.position,
        })
        .await?;
    Ok(api_ok())
}

fn event_name(event: &BroadcastEvent) -> &'static str {
    match event {
        BroadcastEvent::Store(_) => "store",
        BroadcastEvent::Playback(_) => "playback",
    }
}

/// Server-Sent Events stream of domain events.
///
/// Slow consumers that fall behind the channel skip the missed events.
async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.event_bridge.subscribe()).filter_map(|res| async move {
        match res {
            Ok(event) => match Event::default().event(event_name(&event)).json_data(&event) {
                Ok(sse) => Some(Ok(sse)),
                Err(e) => {
                    log::warn!("[SSE] Failed to encode event: {}", e);
                    None
                }
            },
            Err(BroadcastStreamRecvError::Lagged(n)) => {
                log::warn!("[SSE] Subscriber lagged, skipped {} event(s)", n);
                None
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
