//! Audio surfaces backed by a remote audio client.
//!
//! The browser presenter owns the real audio elements. One WebSocket
//! connection at a time attaches as the audio client; the surfaces here turn
//! controller calls into [`AudioCommand`]s for it and wait for its
//! `PLAY_RESULT` acknowledgement when the controller needs a verdict.
//!
//! `play` and `pause` commands carry an id. The client echoes it as
//! `commandId` on the play/pause report the command caused, so those reports
//! are not mistaken for the user acting on the element.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::playback::{
    AudioFocusSurface, AudioSurface, MediaMetadata, PlatformMediaControls, PlaybackStatus,
    SurfaceError, SurfaceEvent,
};
use crate::services::{Intent, IntentSender};

/// Which audio element a command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AudioChannel {
    /// The broadcast itself.
    Broadcast,
    /// The silent focus keep-alive.
    Focus,
}

/// Commands sent to the attached audio client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum AudioCommand {
    Load { channel: AudioChannel, url: String },
    /// Must be answered with a `PLAY_RESULT` carrying `request_id`.
    #[serde(rename_all = "camelCase")]
    Play {
        channel: AudioChannel,
        request_id: u64,
    },
    #[serde(rename_all = "camelCase")]
    Pause {
        channel: AudioChannel,
        command_id: u64,
    },
    Clear { channel: AudioChannel },
    Seek { position: f64 },
    #[serde(rename_all = "camelCase")]
    Metadata { title: String, slot_label: String },
    PlaybackState { status: PlaybackStatus },
    Position { position: f64, duration: Option<f64> },
    ClearMetadata,
}

struct AudioClient {
    conn_id: String,
    tx: mpsc::Sender<AudioCommand>,
}

/// Broadcast source as last known to the server.
#[derive(Default)]
struct MediaState {
    source: Option<String>,
    position: f64,
    duration: Option<f64>,
}

type PlayAck = oneshot::Sender<Result<(), SurfaceError>>;

/// Connection between the surfaces and whichever client plays audio.
pub struct RemoteAudioLink {
    client: RwLock<Option<AudioClient>>,
    pending: DashMap<u64, PlayAck>,
    /// Ids for `play` and `pause` commands.
    next_command: AtomicU64,
    ack_timeout: Duration,
    media: Mutex<MediaState>,
}

impl RemoteAudioLink {
    pub fn new(ack_timeout: Duration) -> Self {
        Self {
            client: RwLock::new(None),
            pending: DashMap::new(),
            next_command: AtomicU64::new(1),
            ack_timeout,
            media: Mutex::new(MediaState::default()),
        }
    }

    /// Makes `conn_id` the audio client, replacing any previous one.
    ///
    /// A replaced client is told to clear both channels before it is let go.
    /// Returns true if another connection was replaced.
    pub fn attach(&self, conn_id: &str, tx: mpsc::Sender<AudioCommand>) -> bool {
        let previous = self.client.write().replace(AudioClient {
            conn_id: conn_id.to_string(),
            tx,
        });
        self.fail_pending();

        match previous {
            Some(prev) if prev.conn_id != conn_id => {
                log::info!(
                    "[Audio] Audio client {} replaced by {}",
                    prev.conn_id,
                    conn_id
                );
                for channel in [AudioChannel::Broadcast, AudioChannel::Focus] {
                    if let Err(e) = prev.tx.try_send(AudioCommand::Clear { channel }) {
                        log::warn!("[Audio] Could not clear {}: {}", prev.conn_id, e);
                    }
                }
                true
            }
            _ => {
                log::info!("[Audio] Audio client attached: {}", conn_id);
                false
            }
        }
    }

    /// Detaches `conn_id` if it is the current audio client.
    ///
    /// Returns true if it was. Pending play requests fail as unavailable.
    pub fn detach(&self, conn_id: &str) -> bool {
        let mut client = self.client.write();
        if client.as_ref().map_or(true, |c| c.conn_id != conn_id) {
            return false;
        }
        *client = None;
        drop(client);

        log::info!("[Audio] Audio client detached: {}", conn_id);
        self.fail_pending();
        true
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.client.read().is_some()
    }

    /// Whether `conn_id` is the current audio client.
    #[must_use]
    pub fn is_client(&self, conn_id: &str) -> bool {
        self.client
            .read()
            .as_ref()
            .map_or(false, |c| c.conn_id == conn_id)
    }

    /// Whether a report tagged with `command_id` answers one of our commands.
    #[must_use]
    pub fn is_echo(&self, command_id: Option<u64>) -> bool {
        command_id.map_or(false, |id| {
            id > 0 && id < self.next_command.load(Ordering::Relaxed)
        })
    }

    fn next_command_id(&self) -> u64 {
        self.next_command.fetch_add(1, Ordering::Relaxed)
    }

    /// Pauses `channel` on the client.
    pub fn pause(&self, channel: AudioChannel) {
        let command_id = self.next_command_id();
        self.send(AudioCommand::Pause {
            channel,
            command_id,
        });
    }

    /// Queues a command for the audio client. Dropped when none is attached.
    pub fn send(&self, command: AudioCommand) -> bool {
        let client = self.client.read();
        let Some(client) = client.as_ref() else {
            log::trace!("[Audio] No audio client, dropping {:?}", command);
            return false;
        };
        match client.tx.try_send(command) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("[Audio] Failed to queue command for {}: {}", client.conn_id, e);
                false
            }
        }
    }

    /// Asks the audio client to play `channel` and waits for its answer.
    ///
    /// # Errors
    ///
    /// [`SurfaceError::Unavailable`] without an attached client (or if it
    /// goes away), [`SurfaceError::Timeout`] if it does not answer in time,
    /// or whatever rejection it reports.
    pub async fn request_play(&self, channel: AudioChannel) -> Result<(), SurfaceError> {
        let request_id = self.next_command_id();
        let (ack_tx, ack_rx) = oneshot::channel();
        self.pending.insert(request_id, ack_tx);

        if !self.send(AudioCommand::Play {
            channel,
            request_id,
        }) {
            self.pending.remove(&request_id);
            return Err(SurfaceError::Unavailable);
        }

        match tokio::time::timeout(self.ack_timeout, ack_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(SurfaceError::Unavailable),
            Err(_) => {
                self.pending.remove(&request_id);
                log::warn!(
                    "[Audio] Play request {} not acknowledged within {}s",
                    request_id,
                    self.ack_timeout.as_secs()
                );
                Err(SurfaceError::Timeout)
            }
        }
    }

    /// Resolves a pending play request. Unknown ids are ignored.
    pub fn complete_play(&self, request_id: u64, result: Result<(), SurfaceError>) {
        match self.pending.remove(&request_id) {
            Some((_, ack)) => {
                let _ = ack.send(result);
            }
            None => log::debug!("[Audio] Late or unknown play result {}", request_id),
        }
    }

    /// Updates the cached position and duration from a client report.
    pub fn observe(&self, event: &SurfaceEvent) {
        let mut media = self.media.lock();
        match event {
            SurfaceEvent::TimeUpdate { position } if position.is_finite() => {
                media.position = *position;
            }
            SurfaceEvent::LoadedMetadata { duration } if duration.is_finite() => {
                media.duration = Some(*duration);
            }
            _ => {}
        }
    }

    fn fail_pending(&self) {
        // Dropping the senders wakes every waiter with Unavailable.
        self.pending.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Surfaces
// ─────────────────────────────────────────────────────────────────────────────

/// [`AudioSurface`] for the broadcast channel of the remote client.
pub struct RemoteAudioSurface {
    link: Arc<RemoteAudioLink>,
}

impl RemoteAudioSurface {
    pub fn new(link: Arc<RemoteAudioLink>) -> Self {
        Self { link }
    }
}

#[async_trait]
impl AudioSurface for RemoteAudioSurface {
    fn load(&self, url: &str) {
        *self.link.media.lock() = MediaState {
            source: Some(url.to_string()),
            ..MediaState::default()
        };
        self.link.send(AudioCommand::Load {
            channel: AudioChannel::Broadcast,
            url: url.to_string(),
        });
    }

    async fn play(&self) -> Result<(), SurfaceError> {
        self.link.request_play(AudioChannel::Broadcast).await
    }

    fn pause(&self) {
        self.link.pause(AudioChannel::Broadcast);
    }

    fn clear(&self) {
        *self.link.media.lock() = MediaState::default();
        self.link.send(AudioCommand::Clear {
            channel: AudioChannel::Broadcast,
        });
    }

    fn has_source(&self) -> bool {
        self.link.media.lock().source.is_some()
    }

    fn position(&self) -> f64 {
        self.link.media.lock().position
    }

    fn set_position(&self, secs: f64) {
        self.link.media.lock().position = secs;
        self.link.send(AudioCommand::Seek { position: secs });
    }

    fn duration(&self) -> Option<f64> {
        self.link.media.lock().duration
    }
}

/// [`AudioFocusSurface`] for the focus channel of the remote client.
pub struct RemoteFocusSurface {
    link: Arc<RemoteAudioLink>,
}

impl RemoteFocusSurface {
    pub fn new(link: Arc<RemoteAudioLink>) -> Self {
        Self { link }
    }
}

#[async_trait]
impl AudioFocusSurface for RemoteFocusSurface {
    fn load(&self, url: &str) {
        self.link.send(AudioCommand::Load {
            channel: AudioChannel::Focus,
            url: url.to_string(),
        });
    }

    async fn play(&self) -> Result<(), SurfaceError> {
        self.link.request_play(AudioChannel::Focus).await
    }

    fn pause(&self) {
        self.link.pause(AudioChannel::Focus);
    }
}

/// Media session of the remote client.
///
/// Now-playing updates go out as audio commands; media-key actions the client
/// reports come back in through the registered [`IntentSender`].
pub struct RemoteMediaControls {
    link: Arc<RemoteAudioLink>,
    intents: RwLock<Option<IntentSender>>,
}

impl RemoteMediaControls {
    pub fn new(link: Arc<RemoteAudioLink>) -> Self {
        Self {
            link,
            intents: RwLock::new(None),
        }
    }

    /// Forwards a media-key action. Returns false before registration.
    pub fn action(&self, intent: Intent) -> bool {
        match self.intents.read().as_ref() {
            Some(intents) => intents.send(intent),
            None => {
                log::debug!("[Audio] Media action before registration: {:?}", intent);
                false
            }
        }
    }
}

impl PlatformMediaControls for RemoteMediaControls {
    fn register(&self, intents: IntentSender) {
        *self.intents.write() = Some(intents);
    }

    fn set_metadata(&self, metadata: &MediaMetadata) {
        self.link.send(AudioCommand::Metadata {
            title: metadata.title.clone(),
            slot_label: metadata.slot_label.clone(),
        });
    }

    fn set_position(&self, position: f64, duration: Option<f64>) {
        self.link.send(AudioCommand::Position { position, duration });
    }

    fn set_playback_state(&self, status: PlaybackStatus) {
        self.link.send(AudioCommand::PlaybackState { status });
    }

    fn clear(&self) {
        self.link.send(AudioCommand::ClearMetadata);
    }
}
