//! The station task: single owner of store, scheduler and playback.
//!
//! Presenters hold a [`StationHandle`]. They read snapshots published over a
//! `watch` channel and send [`Intent`]s; the task processes one event at a
//! time (intent, surface report, poll timer, focus timer, fetch completion)
//! so no state is ever shared mutably.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::constants::{INTENT_CHANNEL_CAPACITY, SKIP_STEP_SECS, SURFACE_EVENT_CHANNEL_CAPACITY};
use crate::context::{StationContext, StationSnapshot};
use crate::error::{OnAirError, OnAirResult};
use crate::feed::{FeedOutcome, FetchResult};
use crate::playback::SurfaceEvent;
use crate::runtime::TaskSpawner;

// ─────────────────────────────────────────────────────────────────────────────
// Intents
// ─────────────────────────────────────────────────────────────────────────────

fn default_skip_step() -> f64 {
    SKIP_STEP_SECS
}

/// Requests presenters and media controls may send to the station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Intent {
    /// Play today's broadcast for a slot.
    Play { slot: String },
    Toggle,
    Pause,
    Resume,
    Stop,
    /// Move by `seconds`; negative values rewind.
    Skip {
        #[serde(default = "default_skip_step")]
        seconds: f64,
    },
    /// Jump to an absolute position in seconds.
    Seek { position: f64 },
    /// Fetch now, bypassing caches.
    Refresh,
}

type Reply = oneshot::Sender<OnAirResult<()>>;

struct StationCommand {
    intent: Intent,
    reply: Option<Reply>,
}

/// Fire-and-forget intent channel, handed to platform media controls.
#[derive(Clone)]
pub struct IntentSender {
    tx: mpsc::Sender<StationCommand>,
}

impl IntentSender {
    /// Queues an intent without waiting for its outcome.
    ///
    /// Returns false if the station is gone or its queue is full.
    pub fn send(&self, intent: Intent) -> bool {
        match self.tx.try_send(StationCommand {
            intent,
            reply: None,
        }) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("[Station] Dropping intent: {}", e);
                false
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Cloneable presenter-side handle to the station task.
#[derive(Clone)]
pub struct StationHandle {
    intents: IntentSender,
    surface_tx: mpsc::Sender<SurfaceEvent>,
    snapshots: watch::Receiver<StationSnapshot>,
}

impl StationHandle {
    /// Sends an intent and waits for its outcome.
    ///
    /// A `Refresh` completes when the fetch it triggered (or joined) ends.
    ///
    /// # Errors
    ///
    /// The intent's own failure, or [`OnAirError::StationUnavailable`] if the
    /// station task has stopped.
    pub async fn dispatch(&self, intent: Intent) -> OnAirResult<()> {
        let (reply, outcome) = oneshot::channel();
        self.intents
            .tx
            .send(StationCommand {
                intent,
                reply: Some(reply),
            })
            .await
            .map_err(|_| OnAirError::StationUnavailable("station stopped".to_string()))?;
        outcome.await.map_err(|_| {
            OnAirError::StationUnavailable("station dropped the request".to_string())
        })?
    }

    /// Returns a fire-and-forget sender for the same station.
    #[must_use]
    pub fn intent_sender(&self) -> IntentSender {
        self.intents.clone()
    }

    /// Forwards an audio surface report to the station.
    ///
    /// # Errors
    ///
    /// [`OnAirError::StationUnavailable`] if the station task has stopped.
    pub async fn report_surface(&self, event: SurfaceEvent) -> OnAirResult<()> {
        self.surface_tx
            .send(event)
            .await
            .map_err(|_| OnAirError::StationUnavailable("station stopped".to_string()))
    }

    /// Returns the latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> StationSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Returns a receiver that observes every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StationSnapshot> {
        self.snapshots.clone()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

struct InFlight {
    forced: bool,
    fetch: BoxFuture<'static, FetchResult<FeedOutcome>>,
}

/// Resolves when the in-flight fetch completes; pending forever without one.
async fn fetch_completion(in_flight: &mut Option<InFlight>) -> FetchResult<FeedOutcome> {
    match in_flight {
        Some(f) => (&mut f.fetch).await,
        None => std::future::pending().await,
    }
}

/// The station task.
pub struct StationService {
    ctx: StationContext,
    commands: mpsc::Receiver<StationCommand>,
    surface_events: mpsc::Receiver<SurfaceEvent>,
    snapshots: watch::Sender<StationSnapshot>,
    cancel: CancellationToken,
    in_flight: Option<InFlight>,
    /// Refresh callers waiting on the in-flight fetch.
    pending_refresh: Vec<Reply>,
}

impl StationService {
    /// Creates the service and the handle presenters use to reach it.
    pub fn new(ctx: StationContext, cancel: CancellationToken) -> (Self, StationHandle) {
        let (command_tx, commands) = mpsc::channel(INTENT_CHANNEL_CAPACITY);
        let (surface_tx, surface_events) = mpsc::channel(SURFACE_EVENT_CHANNEL_CAPACITY);
        let (snapshots, snapshot_rx) = watch::channel(ctx.snapshot(false));

        let handle = StationHandle {
            intents: IntentSender { tx: command_tx },
            surface_tx,
            snapshots: snapshot_rx,
        };
        let service = Self {
            ctx,
            commands,
            surface_events,
            snapshots,
            cancel,
            in_flight: None,
            pending_refresh: Vec::new(),
        };
        (service, handle)
    }

    /// Runs the station on the given spawner.
    pub fn spawn<S: TaskSpawner>(self, spawner: &S) {
        spawner.spawn(self.run());
    }

    /// Runs the station loop until cancelled or every handle is dropped.
    pub async fn run(mut self) {
        log::info!("[Station] Started for {}", self.ctx.store.date());
        self.start_fetch(false);
        self.publish();

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    log::info!("[Station] Cancellation requested");
                    break;
                }

                // Reports queued ahead of an intent predate it.
                Some(event) = self.surface_events.recv() => {
                    self.ctx.controller.handle_surface_event(event).await;
                }

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        log::info!("[Station] All handles dropped");
                        break;
                    }
                },

                result = fetch_completion(&mut self.in_flight) => self.finish_fetch(result),

                () = self.ctx.controller.focus_timer_fired() => {
                    self.ctx.controller.release_after_focus_timeout();
                }

                () = self.ctx.scheduler.fired(), if self.in_flight.is_none() => {
                    self.start_fetch(false);
                }
            }

            self.publish();
        }

        self.shutdown();
    }

    async fn handle_command(&mut self, command: StationCommand) {
        let StationCommand { intent, reply } = command;
        log::debug!("[Station] Intent {:?}", intent);

        let ctx = &mut self.ctx;
        let result = match intent {
            Intent::Refresh => {
                self.request_refresh(reply);
                return;
            }
            Intent::Play { slot } => ctx
                .controller
                .play(&ctx.store, &slot)
                .await
                .map_err(OnAirError::from),
            Intent::Toggle => ctx
                .controller
                .toggle(&ctx.store)
                .await
                .map_err(OnAirError::from),
            Intent::Pause => {
                ctx.controller.pause().await;
                Ok(())
            }
            Intent::Resume => ctx.controller.resume().await.map_err(OnAirError::from),
            Intent::Stop => {
                ctx.controller.stop();
                Ok(())
            }
            Intent::Skip { seconds } if seconds.is_finite() => {
                ctx.controller.skip(seconds);
                Ok(())
            }
            Intent::Seek { position } if position.is_finite() => {
                ctx.controller.seek(position);
                Ok(())
            }
            Intent::Skip { .. } | Intent::Seek { .. } => Err(OnAirError::InvalidRequest(
                "position must be a finite number".to_string(),
            )),
        };

        self.publish();
        if let Some(reply) = reply {
            let _ = reply.send(result);
        }
    }

    fn request_refresh(&mut self, reply: Option<Reply>) {
        if let Some(reply) = reply {
            self.pending_refresh.push(reply);
        }
        if self.in_flight.is_some() {
            log::debug!("[Station] Refresh joins the fetch already in flight");
            return;
        }
        self.start_fetch(true);
    }

    /// Opens a fetch cycle: day check, then the fetch itself.
    fn start_fetch(&mut self, force: bool) {
        let day_changed = self.ctx.begin_cycle();
        let forced = force || day_changed;

        // No poll timer while a fetch is in flight.
        self.ctx.scheduler.cancel();

        let feed = Arc::clone(&self.ctx.feed);
        let tokens = self.ctx.scheduler.cache_tokens().clone();
        log::debug!("[Station] Fetching (forced: {})", forced);

        self.in_flight = Some(InFlight {
            forced,
            fetch: Box::pin(async move { feed.fetch(&tokens, forced).await }),
        });
    }

    fn finish_fetch(&mut self, result: FetchResult<FeedOutcome>) {
        let forced = self.in_flight.take().is_some_and(|f| f.forced);
        let outcome = self.ctx.apply_fetch(result, forced);
        self.ctx.reschedule();

        self.publish();
        for reply in self.pending_refresh.drain(..) {
            let _ = reply.send(outcome.clone().map_err(OnAirError::from));
        }
    }

    fn publish(&self) {
        self.snapshots
            .send_replace(self.ctx.snapshot(self.in_flight.is_some()));
    }

    fn shutdown(&mut self) {
        self.ctx.scheduler.cancel();
        self.in_flight = None;
        self.ctx.controller.stop();
        for reply in self.pending_refresh.drain(..) {
            let _ = reply.send(Err(OnAirError::StationUnavailable(
                "station stopped".to_string(),
            )));
        }
        self.publish();
        log::info!("[Station] Stopped");
    }
}
