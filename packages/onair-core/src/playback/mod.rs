//! Playback of at most one broadcast at a time.
//!
//! The [`PlaybackController`] is a small state machine over three statuses.
//! It drives an [`AudioSurface`] for the broadcast itself, an
//! [`AudioFocusSurface`] that plays silence to keep audio focus while paused,
//! and optional [`PlatformMediaControls`].

mod controller;
mod surface;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use controller::PlaybackController;
pub use surface::{
    AudioFocusSurface, AudioSurface, MediaMetadata, NoopMediaControls, PlatformMediaControls,
    SurfaceError, SurfaceEvent,
};

use serde::Serialize;
use thiserror::Error;

/// Playback status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Errors surfaced to whoever asked for playback.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum PlaybackError {
    /// The slot has no broadcast today, or the broadcast has no audio.
    #[error("No playable broadcast for slot {0}")]
    NoBroadcast(String),

    /// The audio surface refused to start.
    #[error("Playback rejected: {0}")]
    Rejected(String),

    /// Toggle found nothing to play.
    #[error("No broadcasts yet today")]
    NoBroadcastsYet,

    /// No audio output is attached.
    #[error("No audio output available")]
    Unavailable,
}

impl From<SurfaceError> for PlaybackError {
    fn from(err: SurfaceError) -> Self {
        match err {
            SurfaceError::Unavailable => Self::Unavailable,
            other => Self::Rejected(other.to_string()),
        }
    }
}

/// Convenient Result alias for playback operations.
pub type PlaybackResult<T> = Result<T, PlaybackError>;

/// Presenter view of the playback session.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub status: PlaybackStatus,
    pub current_slot: Option<String>,
    /// Position in seconds.
    pub position: f64,
    /// Duration in seconds, once known.
    pub duration: Option<f64>,
    pub focus_timer_armed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_surface_maps_to_unavailable() {
        assert_eq!(
            PlaybackError::from(SurfaceError::Unavailable),
            PlaybackError::Unavailable
        );
        assert!(matches!(
            PlaybackError::from(SurfaceError::Rejected("autoplay".into())),
            PlaybackError::Rejected(msg) if msg.contains("autoplay")
        ));
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let json = serde_json::to_value(PlaybackSnapshot {
            status: PlaybackStatus::Paused,
            current_slot: Some("18:00".into()),
            position: 12.5,
            duration: Some(600.0),
            focus_timer_armed: true,
        })
        .unwrap();
        assert_eq!(json["status"], "paused");
        assert_eq!(json["currentSlot"], "18:00");
        assert_eq!(json["focusTimerArmed"], true);
    }
}
