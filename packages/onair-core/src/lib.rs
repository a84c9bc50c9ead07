//! On Air Core - shared library for the On Air daily broadcast player.
//!
//! The crate tracks which of a fixed set of daily radio broadcasts have
//! appeared "today", polls the broadcast feed adaptively, and drives playback
//! of at most one broadcast at a time while holding audio focus through
//! pauses.
//!
//! # Architecture
//!
//! - [`slots`], [`clock`]: the fixed slot set and the broadcast-local time
//! - [`feed`]: feed client with conditional caching and date normalisation
//! - [`store`]: today's broadcasts, merge and day rollover
//! - [`scheduler`]: adaptive poll interval and the poll timer
//! - [`playback`]: playback state machine and the audio-focus timer
//! - [`services`]: the station task owning all of the above
//! - [`events`]: domain events for presenters
//! - [`api`]: HTTP/WebSocket presenter boundary and the remote audio client
//! - [`bootstrap`]: composition root
//!
//! # Abstraction Traits
//!
//! - [`TaskSpawner`](runtime::TaskSpawner): spawning background tasks
//! - [`EventEmitter`](events::EventEmitter): emitting domain events
//! - [`TimeSource`](clock::TimeSource): local date and time
//! - [`FeedClient`](feed::FeedClient): fetching the broadcast feed
//! - [`AudioSurface`](playback::AudioSurface),
//!   [`AudioFocusSurface`](playback::AudioFocusSurface),
//!   [`PlatformMediaControls`](playback::PlatformMediaControls): host audio

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod bootstrap;
pub mod clock;
pub mod constants;
pub mod context;
pub mod error;
pub mod events;
pub mod feed;
pub mod playback;
pub mod runtime;
pub mod scheduler;
pub mod services;
pub mod slots;
pub mod state;
pub mod store;
pub mod timer;
pub mod utils;

// Re-export commonly used types at the crate root
pub use clock::{LocalTime, ManualClock, SystemClock, TimeSource};
pub use context::{FetchReport, FetchStatus, StationContext, StationSnapshot};
pub use error::{ErrorCode, FetchResult, OnAirError, OnAirResult, PlaybackResult};
pub use events::{
    BroadcastEvent, BroadcastEventBridge, EventEmitter, LoggingEventEmitter, NoopEventEmitter,
    PlaybackEvent, StoreEvent,
};
pub use feed::{CacheTokens, FeedClient, FeedItem, FeedOutcome, FetchError, HttpFeedClient};
pub use playback::{
    AudioFocusSurface, AudioSurface, MediaMetadata, NoopMediaControls, PlatformMediaControls,
    PlaybackController, PlaybackError, PlaybackSnapshot, PlaybackStatus, SurfaceError,
    SurfaceEvent,
};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use scheduler::{compute_interval, PollDecision, PollScheduler, PollTier};
pub use services::{Intent, IntentSender, StationHandle, StationService};
pub use slots::{default_slots, Slot};
pub use state::Config;
pub use store::{Broadcast, BroadcastStore, StoreSnapshot};
pub use utils::now_millis;

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, BootstrappedServices};

// Re-export API types
pub use api::{bind, start_server, AppState, AppStateBuilder, ServerError, WsConnectionManager};
