//! HTTP/WebSocket presenter boundary.
//!
//! Thin handlers over a [`StationHandle`]: presenters read snapshots and
//! events, and send intents. The browser audio client is wired in through
//! [`remote`].

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::bootstrap::BootstrappedServices;
use crate::constants::{PORT_RANGE_END, PORT_RANGE_START};
use crate::error::{OnAirError, OnAirResult};
use crate::events::BroadcastEventBridge;
use crate::runtime::TokioSpawner;
use crate::services::StationHandle;
use crate::state::Config;

pub mod http;
pub mod remote;
pub mod response;
pub mod ws;
pub mod ws_connection;

pub use remote::{RemoteAudioLink, RemoteAudioSurface, RemoteFocusSurface, RemoteMediaControls};
pub use ws_connection::WsConnectionManager;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),

    /// No available ports in the specified range.
    #[error("No available ports in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },
}

/// Shared application state for the API layer.
#[derive(Clone)]
pub struct AppState {
    /// Handle to the station task.
    pub station: StationHandle,
    /// Domain events for WebSocket and SSE subscribers.
    pub event_bridge: Arc<BroadcastEventBridge>,
    pub ws_manager: Arc<WsConnectionManager>,
    /// Link to whichever connection plays the audio.
    pub audio_link: Arc<RemoteAudioLink>,
    pub media_controls: Arc<RemoteMediaControls>,
    pub config: Arc<Config>,
    pub spawner: TokioSpawner,
}

/// Builder for constructing an `AppState`.
#[derive(Default)]
pub struct AppStateBuilder {
    station: Option<StationHandle>,
    event_bridge: Option<Arc<BroadcastEventBridge>>,
    ws_manager: Option<Arc<WsConnectionManager>>,
    audio_link: Option<Arc<RemoteAudioLink>>,
    media_controls: Option<Arc<RemoteMediaControls>>,
    config: Option<Arc<Config>>,
    spawner: Option<TokioSpawner>,
}

impl AppStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn station(mut self, station: StationHandle) -> Self {
        self.station = Some(station);
        self
    }

    pub fn event_bridge(mut self, bridge: Arc<BroadcastEventBridge>) -> Self {
        self.event_bridge = Some(bridge);
        self
    }

    pub fn ws_manager(mut self, manager: Arc<WsConnectionManager>) -> Self {
        self.ws_manager = Some(manager);
        self
    }

    pub fn audio_link(mut self, link: Arc<RemoteAudioLink>) -> Self {
        self.audio_link = Some(link);
        self
    }

    pub fn media_controls(mut self, controls: Arc<RemoteMediaControls>) -> Self {
        self.media_controls = Some(controls);
        self
    }

    pub fn config(mut self, config: Arc<Config>) -> Self {
        self.config = Some(config);
        self
    }

    pub fn spawner(mut self, spawner: TokioSpawner) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Builds the `AppState`.
    ///
    /// # Errors
    ///
    /// [`OnAirError::Configuration`] naming the first missing field.
    pub fn build(self) -> OnAirResult<AppState> {
        fn require<T>(value: Option<T>, name: &str) -> OnAirResult<T> {
            value.ok_or_else(|| OnAirError::Configuration(format!("{name} is required")))
        }

        Ok(AppState {
            station: require(self.station, "station")?,
            event_bridge: require(self.event_bridge, "event_bridge")?,
            ws_manager: require(self.ws_manager, "ws_manager")?,
            audio_link: require(self.audio_link, "audio_link")?,
            media_controls: require(self.media_controls, "media_controls")?,
            config: require(self.config, "config")?,
            spawner: require(self.spawner, "spawner")?,
        })
    }
}

impl AppState {
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }

    /// Creates the API state from bootstrapped services.
    pub fn new(services: &BootstrappedServices) -> Self {
        Self {
            station: services.station.clone(),
            event_bridge: Arc::clone(&services.event_bridge),
            ws_manager: Arc::clone(&services.ws_manager),
            audio_link: Arc::clone(&services.audio_link),
            media_controls: Arc::clone(&services.media_controls),
            config: Arc::clone(&services.config),
            spawner: services.spawner.clone(),
        }
    }
}

fn cors_layer(trusted_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if trusted_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let trusted = trusted_origins.to_vec();
    cors.allow_origin(AllowOrigin::predicate(
        move |origin: &HeaderValue, _| {
            let origin = origin.to_str().unwrap_or("");
            trusted.iter().any(|allowed| origin.starts_with(allowed.as_str()))
        },
    ))
}

/// Router with CORS and request tracing applied.
pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.trusted_origins);
    http::create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn find_available_port(start: u16, end: u16) -> Result<(u16, TcpListener), ServerError> {
    for port in start..=end {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        match TcpListener::bind(&addr).await {
            Ok(listener) => return Ok((port, listener)),
            Err(_) => continue,
        }
    }
    Err(ServerError::NoAvailablePort { start, end })
}

/// Binds the preferred port, or the first free port in the default range.
pub async fn bind(preferred_port: u16) -> Result<(u16, TcpListener), ServerError> {
    if preferred_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], preferred_port));
        Ok((preferred_port, TcpListener::bind(&addr).await?))
    } else {
        find_available_port(PORT_RANGE_START, PORT_RANGE_END).await
    }
}

/// Serves the API until `shutdown` is cancelled.
pub async fn start_server(
    state: AppState,
    listener: TcpListener,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("Server listening on http://{}", addr);
    }
    let app = build_app(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_reports_missing_fields() {
        let err = AppState::builder()
            .config(Arc::new(Config::default()))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, OnAirError::Configuration(ref m) if m.contains("station")));
    }

    #[tokio::test]
    async fn bind_falls_back_to_port_range() {
        let (port, _listener) = bind(0).await.unwrap();
        assert!((PORT_RANGE_START..=PORT_RANGE_END).contains(&port));
    }
}
