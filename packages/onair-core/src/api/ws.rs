//! WebSocket handler for presenters and the audio client.
//!
//! Every connection receives the initial station snapshot, later snapshots,
//! and the domain event stream. A connection that sends `ATTACH_AUDIO`
//! additionally receives audio commands and must answer each `play` with a
//! `PLAY_RESULT`.

use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::sink::SinkExt;
use futures::stream::{SplitSink, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::api::remote::AudioCommand;
use crate::api::AppState;
use crate::constants::AUDIO_COMMAND_CHANNEL_CAPACITY;
use crate::context::StationSnapshot;
use crate::error::OnAirError;
use crate::playback::{SurfaceError, SurfaceEvent};
use crate::runtime::TaskSpawner;
use crate::services::Intent;

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket Message Types
// ─────────────────────────────────────────────────────────────────────────────

/// Incoming WebSocket message envelope.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum WsIncoming {
    Heartbeat,
    /// An intent; answered with `INTENT_RESULT`.
    Intent {
        payload: Intent,
        #[serde(default, rename = "requestId")]
        request_id: Option<u64>,
    },
    /// A media-key action from the client's media session.
    MediaAction { payload: Intent },
    /// This connection plays the audio from now on.
    AttachAudio,
    /// An audio element report (audio client only). `commandId` marks a
    /// play/pause the server itself asked for.
    Surface {
        payload: SurfaceEvent,
        #[serde(default, rename = "commandId")]
        command_id: Option<u64>,
    },
    /// Answer to an audio `play` command (audio client only).
    PlayResult { payload: PlayResultPayload },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayResultPayload {
    request_id: u64,
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl PlayResultPayload {
    fn into_result(self) -> (u64, Result<(), SurfaceError>) {
        let result = if self.ok {
            Ok(())
        } else {
            Err(SurfaceError::Rejected(
                self.error
                    .unwrap_or_else(|| "playback refused".to_string()),
            ))
        };
        (self.request_id, result)
    }
}

/// Outgoing WebSocket messages.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum WsOutgoing {
    HeartbeatAck,
    Error {
        message: String,
    },
    InitialState {
        payload: StationSnapshot,
    },
    State {
        payload: StationSnapshot,
    },
    IntentResult {
        payload: IntentResultPayload,
    },
    AudioAttached,
    Audio {
        payload: AudioCommand,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IntentResultPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<u64>,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl IntentResultPayload {
    fn from_result(request_id: Option<u64>, result: Result<(), OnAirError>) -> Self {
        match result {
            Ok(()) => Self {
                request_id,
                ok: true,
                error: None,
                message: None,
            },
            Err(e) => Self {
                request_id,
                ok: false,
                error: Some(e.code()),
                message: Some(e.to_string()),
            },
        }
    }
}

impl WsOutgoing {
    /// Serializes the message to a WebSocket text message.
    fn to_message(&self) -> Option<Message> {
        serde_json::to_string(self)
            .ok()
            .map(|s| Message::Text(s.into()))
    }
}

type WsSender = SplitSink<WebSocket, Message>;

/// Sends a message; returns false once the client is gone.
async fn send(sender: &mut WsSender, msg: &WsOutgoing) -> bool {
    match msg.to_message() {
        Some(msg) => sender.send(msg).await.is_ok(),
        None => {
            log::warn!("[WS] Failed to serialize {:?}", msg);
            true
        }
    }
}

/// Next audio command, pending forever for non-audio connections.
async fn next_audio_command(rx: &mut Option<mpsc::Receiver<AudioCommand>>) -> Option<AudioCommand> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection Handler
// ─────────────────────────────────────────────────────────────────────────────

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Main WebSocket connection handler.
async fn handle_ws(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = state.event_bridge.subscribe();
    let mut snapshots = state.station.subscribe();
    let mut audio_rx: Option<mpsc::Receiver<AudioCommand>> = None;
    // Intent outcomes come back here so the loop never waits on the station.
    let (results_tx, mut results_rx) = mpsc::channel::<IntentResultPayload>(16);
    let mut last_activity = Instant::now();

    let conn_guard = state.ws_manager.register();
    let conn_id = conn_guard.id().to_string();
    let cancel_token = conn_guard.cancel_token().clone();

    log::info!("[WS] New connection established: {}", conn_id);

    let initial = WsOutgoing::InitialState {
        payload: snapshots.borrow_and_update().clone(),
    };
    if !send(&mut sender, &initial).await {
        log::warn!("[WS] Failed to send initial state, client disconnected");
        return;
    }

    let heartbeat_timeout = Duration::from_secs(state.config.ws_heartbeat_timeout_secs);
    let mut heartbeat_interval = tokio::time::interval(Duration::from_secs(
        state.config.ws_heartbeat_check_interval_secs,
    ));
    heartbeat_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log::info!("[WS] Connection force-closed: {}", conn_id);
                break;
            }

            msg = receiver.next() => {
                last_activity = Instant::now();
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<WsIncoming>(&text) {
                            Ok(incoming) => {
                                handle_incoming(&state, &conn_id, incoming, &mut audio_rx, &results_tx)
                                    .await
                            }
                            Err(e) => {
                                log::debug!("[WS] Ignoring malformed message: {}", e);
                                Some(WsOutgoing::Error {
                                    message: format!("Malformed message: {}", e),
                                })
                            }
                        };
                        if let Some(reply) = reply {
                            if !send(&mut sender, &reply).await {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }

            Some(result) = results_rx.recv() => {
                if !send(&mut sender, &WsOutgoing::IntentResult { payload: result }).await {
                    break;
                }
            }

            command = next_audio_command(&mut audio_rx) => match command {
                Some(command) => {
                    if !send(&mut sender, &WsOutgoing::Audio { payload: command }).await {
                        break;
                    }
                }
                None => {
                    log::info!("[WS] {} is no longer the audio client", conn_id);
                    audio_rx = None;
                }
            },

            changed = snapshots.changed() => {
                if changed.is_err() {
                    log::info!("[WS] Station stopped, closing {}", conn_id);
                    break;
                }
                let payload = snapshots.borrow_and_update().clone();
                if !send(&mut sender, &WsOutgoing::State { payload }).await {
                    break;
                }
            }

            Ok(event) = events_rx.recv() => {
                if let Ok(json) = serde_json::to_string(&event) {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }

            _ = heartbeat_interval.tick() => {
                if last_activity.elapsed() > heartbeat_timeout {
                    log::warn!("[WS] Heartbeat timeout: {}", conn_id);
                    break;
                }
            }
        }
    }

    if state.audio_link.detach(&conn_id) {
        // Whatever was playing went away with the client.
        let _ = state
            .station
            .report_surface(SurfaceEvent::Error {
                message: "audio client disconnected".to_string(),
            })
            .await;
    }
}

/// Handles one parsed message; returns an immediate reply, if any.
async fn handle_incoming(
    state: &AppState,
    conn_id: &str,
    incoming: WsIncoming,
    audio_rx: &mut Option<mpsc::Receiver<AudioCommand>>,
    results_tx: &mpsc::Sender<IntentResultPayload>,
) -> Option<WsOutgoing> {
    match incoming {
        WsIncoming::Heartbeat => Some(WsOutgoing::HeartbeatAck),
        WsIncoming::Intent {
            payload,
            request_id,
        } => {
            let station = state.station.clone();
            let results_tx = results_tx.clone();
            state.spawner.spawn(async move {
                let result = station.dispatch(payload).await;
                let _ = results_tx
                    .send(IntentResultPayload::from_result(request_id, result))
                    .await;
            });
            None
        }
        WsIncoming::MediaAction { payload } => {
            if state.media_controls.action(payload) {
                None
            } else {
                Some(WsOutgoing::Error {
                    message: "Media action not accepted".to_string(),
                })
            }
        }
        WsIncoming::AttachAudio => {
            let (tx, rx) = mpsc::channel(AUDIO_COMMAND_CHANNEL_CAPACITY);
            let replaced = state.audio_link.attach(conn_id, tx);
            state.ws_manager.set_audio_client(conn_id);
            *audio_rx = Some(rx);
            if replaced {
                // The new client starts empty; whatever played went away.
                let _ = state
                    .station
                    .report_surface(SurfaceEvent::Error {
                        message: "audio client replaced".to_string(),
                    })
                    .await;
            }
            Some(WsOutgoing::AudioAttached)
        }
        WsIncoming::Surface {
            payload,
            command_id,
        } => {
            if !state.audio_link.is_client(conn_id) {
                return Some(not_audio_client());
            }
            state.audio_link.observe(&payload);
            if is_command_echo(state, &payload, command_id) {
                log::trace!("[WS] Ignoring echo of command {:?}", command_id);
                return None;
            }
            match state.station.report_surface(payload).await {
                Ok(()) => None,
                Err(e) => Some(WsOutgoing::Error {
                    message: e.to_string(),
                }),
            }
        }
        WsIncoming::PlayResult { payload } => {
            if !state.audio_link.is_client(conn_id) {
                return Some(not_audio_client());
            }
            let (request_id, result) = payload.into_result();
            state.audio_link.complete_play(request_id, result);
            None
        }
    }
}

fn not_audio_client() -> WsOutgoing {
    WsOutgoing::Error {
        message: "Audio reports require ATTACH_AUDIO".to_string(),
    }
}

/// Play/pause reports caused by our own commands carry nothing new.
fn is_command_echo(state: &AppState, event: &SurfaceEvent, command_id: Option<u64>) -> bool {
    matches!(event, SurfaceEvent::Play | SurfaceEvent::Pause)
        && state.audio_link.is_echo(command_id)
}
