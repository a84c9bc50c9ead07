//! Core configuration.
//!
//! [`Config`] carries the deployment-specific settings: where the feed lives,
//! which timezone "today" is evaluated in, and the slot set. Timing constants
//! that must not change live in [`crate::constants`].

use chrono::FixedOffset;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::clock::offset_from_minutes;
use crate::constants::{
    EVENT_CHANNEL_CAPACITY, FEED_TIMEOUT_SECS, PLAY_ACK_TIMEOUT, WS_HEARTBEAT_CHECK_INTERVAL_SECS,
    WS_HEARTBEAT_TIMEOUT_SECS,
};
use crate::slots::{default_slots, validate_slots, Slot};

/// Default broadcast timezone: UTC+09:00.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 9 * 60;

/// Configuration for the On Air core.
///
/// Every field has a default except `feed_url`, which must be provided.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    // Server
    /// Preferred port for the HTTP/WS server (0 = auto-allocate).
    pub preferred_port: u16,

    /// Origin prefixes allowed by CORS. Empty allows any origin.
    pub trusted_origins: Vec<String>,

    // Feed
    /// Location of the broadcast metadata feed.
    pub feed_url: String,

    /// Timeout for a single feed request (seconds).
    pub feed_timeout_secs: u64,

    /// Offset of the broadcast timezone from UTC, in minutes.
    pub utc_offset_minutes: i32,

    /// Daily broadcast slots, in tie-break order.
    pub slots: Vec<Slot>,

    // Playback
    /// Silent source the focus surface loops while paused.
    pub focus_source_url: String,

    /// How long the audio client has to acknowledge a play request (seconds).
    pub play_ack_timeout_secs: u64,

    // WebSocket
    /// WebSocket heartbeat timeout (seconds).
    pub ws_heartbeat_timeout_secs: u64,

    /// Interval between WebSocket heartbeat checks (seconds).
    pub ws_heartbeat_check_interval_secs: u64,

    /// Capacity of the event broadcast channel.
    pub event_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferred_port: 0,
            trusted_origins: Vec::new(),
            feed_url: String::new(),
            feed_timeout_secs: FEED_TIMEOUT_SECS,
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            slots: default_slots(),
            focus_source_url: "/silence.mp3".to_string(),
            play_ack_timeout_secs: PLAY_ACK_TIMEOUT.as_secs(),
            ws_heartbeat_timeout_secs: WS_HEARTBEAT_TIMEOUT_SECS,
            ws_heartbeat_check_interval_secs: WS_HEARTBEAT_CHECK_INTERVAL_SECS,
            event_channel_capacity: EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl Config {
    /// The broadcast timezone as a fixed offset.
    ///
    /// # Errors
    ///
    /// Returns an error if `utc_offset_minutes` is a day or more.
    pub fn offset(&self) -> Result<FixedOffset, String> {
        offset_from_minutes(self.utc_offset_minutes).ok_or_else(|| {
            format!(
                "utc_offset_minutes must be within ±1439, got {}",
                self.utc_offset_minutes
            )
        })
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.feed_url.trim().is_empty() {
            return Err("feed_url must be set".to_string());
        }
        Url::parse(&self.feed_url).map_err(|e| format!("feed_url is not a valid URL: {e}"))?;
        self.offset()?;
        validate_slots(&self.slots)?;
        if self.feed_timeout_secs == 0 {
            return Err("feed_timeout_secs must be >= 1".to_string());
        }
        if self.play_ack_timeout_secs == 0 {
            return Err("play_ack_timeout_secs must be >= 1".to_string());
        }
        if self.ws_heartbeat_check_interval_secs == 0 {
            return Err("ws_heartbeat_check_interval_secs must be >= 1".to_string());
        }
        if self.event_channel_capacity == 0 {
            return Err(
                "event_channel_capacity must be >= 1 (broadcast::channel panics on 0)".to_string(),
            );
        }
        Ok(())
    }
}
