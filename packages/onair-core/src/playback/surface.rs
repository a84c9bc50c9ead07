//! Host audio capabilities the controller drives.
//!
//! Only `play()` is asynchronous: the host may refuse to start audio (an
//! autoplay policy, a missing output), and the controller needs the verdict
//! before it changes state. Everything else is a fire-and-forget command.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::PlaybackStatus;
use crate::services::IntentSender;

/// Reasons an audio surface refuses to play.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    /// The host rejected the request.
    #[error("{0}")]
    Rejected(String),

    /// No audio output is attached.
    #[error("no audio output attached")]
    Unavailable,

    /// The host never answered.
    #[error("audio output did not answer in time")]
    Timeout,
}

/// Events reported by the audio surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SurfaceEvent {
    /// Playback started outside the controller (element or OS control).
    Play,
    /// Playback paused outside the controller.
    Pause,
    /// The broadcast played to the end.
    Ended,
    /// The surface failed while loading or playing.
    Error { message: String },
    /// Periodic position report, in seconds.
    TimeUpdate { position: f64 },
    /// Duration became known, in seconds.
    LoadedMetadata { duration: f64 },
}

/// Primary audio output for broadcasts.
#[async_trait]
pub trait AudioSurface: Send + Sync {
    /// Replaces the current source.
    fn load(&self, url: &str);

    /// Starts or resumes playback of the loaded source.
    async fn play(&self) -> Result<(), SurfaceError>;

    fn pause(&self);

    /// Drops the current source.
    fn clear(&self);

    fn has_source(&self) -> bool;

    /// Current position in seconds.
    fn position(&self) -> f64;

    fn set_position(&self, secs: f64);

    /// Duration in seconds, once known.
    fn duration(&self) -> Option<f64>;
}

/// Silent output that keeps audio focus while the broadcast is paused.
#[async_trait]
pub trait AudioFocusSurface: Send + Sync {
    fn load(&self, url: &str);

    async fn play(&self) -> Result<(), SurfaceError>;

    fn pause(&self);
}

/// Metadata shown by the platform's now-playing UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    pub title: String,
    pub slot_label: String,
}

/// Operating system media session (lock screen, media keys).
pub trait PlatformMediaControls: Send + Sync {
    /// Hands the controls a channel for play/pause/seek/stop/skip actions.
    fn register(&self, intents: IntentSender);

    fn set_metadata(&self, metadata: &MediaMetadata);

    fn set_position(&self, position: f64, duration: Option<f64>);

    fn set_playback_state(&self, status: PlaybackStatus);

    /// Removes metadata and state.
    fn clear(&self);
}

/// Media controls for hosts without a media session.
pub struct NoopMediaControls;

impl PlatformMediaControls for NoopMediaControls {
    fn register(&self, _intents: IntentSender) {}

    fn set_metadata(&self, _metadata: &MediaMetadata) {}

    fn set_position(&self, _position: f64, _duration: Option<f64>) {}

    fn set_playback_state(&self, _status: PlaybackStatus) {}

    fn clear(&self) {}
}
