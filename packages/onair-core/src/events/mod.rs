//! Event system for real-time presenter communication.
//!
//! This module provides:
//! - [`EventEmitter`] trait for the station to emit events
//! - [`BroadcastEventBridge`] for WebSocket and SSE transport
//! - Event types for the store and playback domains

mod bridge;
mod emitter;

pub use bridge::BroadcastEventBridge;
pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};

use chrono::NaiveDate;
use serde::Serialize;

use crate::feed::FetchError;
use crate::playback::{PlaybackError, PlaybackStatus};
use crate::scheduler::PollTier;

/// Events broadcast to presenters.
///
/// Each category has its own inner event type with specific variants.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum BroadcastEvent {
    /// Events from the broadcast store and the poll cycle.
    Store(StoreEvent),

    /// Events from the playback controller.
    Playback(PlaybackEvent),
}

/// Events related to the broadcast store and feed polling.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StoreEvent {
    /// A fetch brought new or changed broadcasts.
    Updated {
        /// Local date the store describes.
        date: NaiveDate,
        /// Slots now holding a broadcast, in slot order.
        slots: Vec<String>,
        /// Slot with the most recent broadcast.
        #[serde(skip_serializing_if = "Option::is_none")]
        latest: Option<String>,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// The local day changed and the store was emptied.
    DayReset {
        date: NaiveDate,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A fetch failed; the store was left untouched.
    FetchFailed {
        error: FetchError,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// The next poll was scheduled.
    PollScheduled {
        tier: PollTier,
        /// Seconds until the poll fires.
        #[serde(rename = "inSecs")]
        in_secs: u64,
        /// Slot whose window decided the tier.
        #[serde(skip_serializing_if = "Option::is_none")]
        slot: Option<String>,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

/// Events related to playback state changes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlaybackEvent {
    /// The controller moved to a new status.
    StatusChanged {
        status: PlaybackStatus,
        /// Slot now current, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        slot: Option<String>,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A playback request failed.
    Failed {
        error: PlaybackError,
        /// Human-readable description of the failure.
        message: String,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A pause outlived the audio focus timeout and playback was released.
    FocusReleased {
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
}

impl From<StoreEvent> for BroadcastEvent {
    fn from(event: StoreEvent) -> Self {
        BroadcastEvent::Store(event)
    }
}

impl From<PlaybackEvent> for BroadcastEvent {
    fn from(event: PlaybackEvent) -> Self {
        BroadcastEvent::Playback(event)
    }
}
