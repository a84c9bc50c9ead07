//! Fixed timing constants that should NOT be changed.
//!
//! These values define the polling and audio-focus behaviour presenters rely
//! on. Deployment-specific settings (feed URL, timezone, slots) live in
//! [`crate::state::Config`] instead.

use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Poll Windows
// ─────────────────────────────────────────────────────────────────────────────

/// Minutes after a slot's poll start during which polling is most aggressive.
pub const ACTIVE_WINDOW_MINS: i32 = 10;

/// Minutes after a slot's poll start after which polling falls back to idle.
///
/// The extended tier covers `(ACTIVE_WINDOW_MINS, EXTENDED_WINDOW_MINS]`.
pub const EXTENDED_WINDOW_MINS: i32 = 30;

/// Poll interval while a missing slot is inside its active window.
pub const ACTIVE_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Poll interval while a missing slot is inside its extended window.
pub const EXTENDED_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// Poll interval when no missing slot is due.
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(1800);

// ─────────────────────────────────────────────────────────────────────────────
// Playback
// ─────────────────────────────────────────────────────────────────────────────

/// How long a pause may hold audio focus before playback is fully released.
pub const AUDIO_FOCUS_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Default skip step (seconds) for forward/back intents.
pub const SKIP_STEP_SECS: f64 = 15.0;

/// How long the remote audio client has to acknowledge a play request.
pub const PLAY_ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Number of broadcast slots per day.
pub const SLOT_COUNT: usize = 4;

// ─────────────────────────────────────────────────────────────────────────────
// HTTP
// ─────────────────────────────────────────────────────────────────────────────

/// Timeout for feed HTTP requests (seconds).
pub const FEED_TIMEOUT_SECS: u64 = 30;

/// User-Agent sent with feed requests.
pub const USER_AGENT: &str = concat!("onair/", env!("CARGO_PKG_VERSION"));

// ─────────────────────────────────────────────────────────────────────────────
// Channels
// ─────────────────────────────────────────────────────────────────────────────

/// Capacity of the event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Capacity of the intent channel feeding the station task.
pub const INTENT_CHANNEL_CAPACITY: usize = 32;

/// Capacity of the audio surface event channel.
pub const SURFACE_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Capacity of the outgoing audio command channel (server → audio client).
pub const AUDIO_COMMAND_CHANNEL_CAPACITY: usize = 64;

// ─────────────────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────────────────

/// First port tried when no preferred port is configured.
pub const PORT_RANGE_START: u16 = 49400;

/// Last port tried when no preferred port is configured.
pub const PORT_RANGE_END: u16 = 49410;

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket
// ─────────────────────────────────────────────────────────────────────────────

/// WebSocket heartbeat timeout (seconds).
pub const WS_HEARTBEAT_TIMEOUT_SECS: u64 = 30;

/// Interval between WebSocket heartbeat checks (seconds).
pub const WS_HEARTBEAT_CHECK_INTERVAL_SECS: u64 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Application Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Service identifier returned by the health endpoint.
pub const SERVICE_ID: &str = "onair";
