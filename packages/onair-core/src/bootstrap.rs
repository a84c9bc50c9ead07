//! Application bootstrap and dependency wiring.
//!
//! This module is the composition root: the single place where the feed
//! client, clock, surfaces, controller and station are instantiated and
//! wired together. Nothing in the core reaches for a global.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::api::{
    RemoteAudioLink, RemoteAudioSurface, RemoteFocusSurface, RemoteMediaControls,
    WsConnectionManager,
};
use crate::clock::SystemClock;
use crate::constants::USER_AGENT;
use crate::context::StationContext;
use crate::error::{OnAirError, OnAirResult};
use crate::events::{BroadcastEventBridge, EventEmitter, LoggingEventEmitter};
use crate::feed::HttpFeedClient;
use crate::playback::{PlatformMediaControls, PlaybackController};
use crate::runtime::TokioSpawner;
use crate::services::{StationHandle, StationService};
use crate::state::Config;

/// Container for all bootstrapped services.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Handle to the running station task.
    pub station: StationHandle,
    /// Event bridge for WebSocket/SSE and optional external consumers.
    pub event_bridge: Arc<BroadcastEventBridge>,
    pub ws_manager: Arc<WsConnectionManager>,
    /// Link to the remote audio client.
    pub audio_link: Arc<RemoteAudioLink>,
    pub media_controls: Arc<RemoteMediaControls>,
    pub spawner: TokioSpawner,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
    pub config: Arc<Config>,
}

impl BootstrappedServices {
    /// Initiates graceful shutdown of all services.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");

        // Stops the station loop and the HTTP server.
        self.cancel_token.cancel();

        // The station publishes a final snapshot and closes its channel.
        let mut snapshots = self.station.subscribe();
        while snapshots.changed().await.is_ok() {}

        let connections_closed = self.ws_manager.close_all();
        if connections_closed > 0 {
            log::info!(
                "[Bootstrap] Closed {} WebSocket connection(s)",
                connections_closed
            );
        }

        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Creates the shared HTTP client for feed requests.
fn create_http_client(timeout_secs: u64) -> OnAirResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| OnAirError::Internal(format!("Failed to create HTTP client: {}", e)))
}

/// Bootstraps all services and starts the station on the current runtime.
///
/// Wiring order:
///
/// 1. Shared infrastructure (HTTP client, event bridge, cancellation token)
/// 2. Feed client and clock (depend on config)
/// 3. Remote audio link and the surfaces over it
/// 4. Playback controller, station context, station task
/// 5. Media controls registration (needs the station's intent sender)
///
/// # Errors
///
/// [`OnAirError::Configuration`] if the configuration is invalid, or
/// [`OnAirError::Internal`] if the HTTP client cannot be built.
pub fn bootstrap_services(config: &Config) -> OnAirResult<BootstrappedServices> {
    config.validate().map_err(OnAirError::Configuration)?;
    let offset = config.offset().map_err(OnAirError::Configuration)?;

    let spawner = TokioSpawner::current();
    let http_client = create_http_client(config.feed_timeout_secs)?;
    let event_bridge = Arc::new(BroadcastEventBridge::new(config.event_channel_capacity));
    event_bridge.set_external_emitter(Arc::new(LoggingEventEmitter));
    let cancel_token = CancellationToken::new();

    let feed = Arc::new(HttpFeedClient::new(http_client, &config.feed_url, offset)?);
    let clock = Arc::new(SystemClock::new(offset));

    let audio_link = Arc::new(RemoteAudioLink::new(Duration::from_secs(
        config.play_ack_timeout_secs,
    )));
    let media_controls = Arc::new(RemoteMediaControls::new(Arc::clone(&audio_link)));

    let controller = PlaybackController::new(
        Arc::new(RemoteAudioSurface::new(Arc::clone(&audio_link))),
        Arc::new(RemoteFocusSurface::new(Arc::clone(&audio_link))),
        Arc::clone(&media_controls) as Arc<dyn PlatformMediaControls>,
        Arc::clone(&event_bridge) as Arc<dyn EventEmitter>,
        config.focus_source_url.clone(),
    );
    let ctx = StationContext::new(
        config.slots.clone(),
        controller,
        feed,
        clock,
        Arc::clone(&event_bridge) as Arc<dyn EventEmitter>,
    );

    let (service, station) = StationService::new(ctx, cancel_token.clone());
    service.spawn(&spawner);
    media_controls.register(station.intent_sender());

    log::info!(
        "[Bootstrap] Station started (feed: {}, offset: {})",
        config.feed_url,
        offset
    );

    Ok(BootstrappedServices {
        station,
        event_bridge,
        ws_manager: Arc::new(WsConnectionManager::new()),
        audio_link,
        media_controls,
        spawner,
        cancel_token,
        config: Arc::new(config.clone()),
    })
}
