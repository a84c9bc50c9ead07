//! Station context: the single owner of all mutable core state.
//!
//! [`StationContext`] bundles the broadcast store, the poll scheduler and the
//! playback controller with the collaborators they need. The station task
//! owns exactly one context and is the only code that mutates it; presenters
//! only ever see [`StationSnapshot`]s.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clock::TimeSource;
use crate::events::{EventEmitter, StoreEvent};
use crate::feed::{broadcasts_for_day, FeedClient, FeedOutcome, FetchError, FetchResult};
use crate::playback::{PlaybackController, PlaybackSnapshot};
use crate::scheduler::{PollScheduler, PollTier};
use crate::slots::Slot;
use crate::store::{BroadcastStore, StoreSnapshot};
use crate::utils::now_millis;

/// How the last fetch cycle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum FetchStatus {
    /// New content arrived; `changed` slots were written.
    Fresh { changed: usize },
    NotModified,
    Failed { error: String },
}

/// Time and outcome of the last fetch cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchReport {
    pub at: DateTime<Utc>,
    /// Whether caches were bypassed.
    pub forced: bool,
    #[serde(flatten)]
    pub status: FetchStatus,
}

/// Everything a presenter needs to render the station.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationSnapshot {
    pub store: StoreSnapshot,
    pub playback: PlaybackSnapshot,
    /// Seconds until the next scheduled poll, as of publication.
    pub next_poll_in_secs: Option<u64>,
    pub poll_tier: Option<PollTier>,
    pub fetch_in_flight: bool,
    pub last_fetch: Option<FetchReport>,
}

/// Store, scheduler and controller plus their collaborators.
pub struct StationContext {
    pub store: BroadcastStore,
    pub scheduler: PollScheduler,
    pub controller: PlaybackController,
    pub feed: Arc<dyn FeedClient>,
    pub clock: Arc<dyn TimeSource>,
    pub emitter: Arc<dyn EventEmitter>,
    last_fetch: Option<FetchReport>,
}

impl StationContext {
    /// Creates a context with an empty store for the clock's current day.
    pub fn new(
        slots: Vec<Slot>,
        controller: PlaybackController,
        feed: Arc<dyn FeedClient>,
        clock: Arc<dyn TimeSource>,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        let today = clock.now().date;
        Self {
            store: BroadcastStore::new(today, slots),
            scheduler: PollScheduler::new(),
            controller,
            feed,
            clock,
            emitter,
            last_fetch: None,
        }
    }

    /// Runs the day check that opens every fetch cycle.
    ///
    /// Returns true if the day rolled over, in which case the store is empty
    /// and playback has been stopped.
    pub fn begin_cycle(&mut self) -> bool {
        let today = self.clock.now().date;
        let reset = self.store.reset_if_day_changed(today, &mut self.controller);
        if reset {
            self.emitter.emit_store(StoreEvent::DayReset {
                date: today,
                timestamp: now_millis(),
            });
        }
        reset
    }

    /// Applies the result of a fetch to the store.
    ///
    /// Fresh content is filtered to the store's day and merged; `NotModified`
    /// and failures leave the store untouched.
    ///
    /// # Errors
    ///
    /// Passes the fetch error through after logging and emitting it.
    pub fn apply_fetch(&mut self, result: FetchResult<FeedOutcome>, forced: bool) -> FetchResult<()> {
        let (status, outcome) = match result {
            Ok(FeedOutcome::Fresh { items, tokens }) => {
                self.scheduler.set_cache_tokens(tokens);
                let broadcasts = broadcasts_for_day(
                    &items,
                    self.store.slots(),
                    self.store.date(),
                    self.clock.offset(),
                );
                let changed = self.store.merge(broadcasts);
                if changed > 0 {
                    log::info!(
                        "[Station] {} slot(s) updated, {} of {} known",
                        changed,
                        self.store.len(),
                        self.store.slots().len()
                    );
                    self.emit_store_updated();
                }
                (FetchStatus::Fresh { changed }, Ok(()))
            }
            Ok(FeedOutcome::NotModified) => (FetchStatus::NotModified, Ok(())),
            Err(e) => {
                log::warn!("[Station] Fetch failed: {}", e);
                self.emitter.emit_store(StoreEvent::FetchFailed {
                    error: e.clone(),
                    timestamp: now_millis(),
                });
                (
                    FetchStatus::Failed {
                        error: e.to_string(),
                    },
                    Err::<(), FetchError>(e),
                )
            }
        };

        self.last_fetch = Some(FetchReport {
            at: Utc::now(),
            forced,
            status,
        });
        outcome
    }

    /// Arms the poll timer for the next cycle and announces it.
    pub fn reschedule(&mut self) {
        let now = self.clock.now();
        let interval = self.scheduler.schedule(&now, &self.store);
        let decision = self.scheduler.last_decision().cloned();
        self.emitter.emit_store(StoreEvent::PollScheduled {
            tier: decision.as_ref().map_or(PollTier::Idle, |d| d.tier),
            in_secs: interval.as_secs(),
            slot: decision.and_then(|d| d.slot),
            timestamp: now_millis(),
        });
    }

    #[must_use]
    pub fn last_fetch(&self) -> Option<&FetchReport> {
        self.last_fetch.as_ref()
    }

    /// Builds the presenter snapshot.
    #[must_use]
    pub fn snapshot(&self, fetch_in_flight: bool) -> StationSnapshot {
        StationSnapshot {
            store: self.store.snapshot(),
            playback: self.controller.snapshot(),
            next_poll_in_secs: self.scheduler.next_poll_in().map(|d| d.as_secs()),
            poll_tier: self.scheduler.last_decision().map(|d| d.tier),
            fetch_in_flight,
            last_fetch: self.last_fetch.clone(),
        }
    }

    fn emit_store_updated(&self) {
        let snapshot = self.store.snapshot();
        self.emitter.emit_store(StoreEvent::Updated {
            date: snapshot.date,
            slots: snapshot
                .broadcasts
                .into_iter()
                .map(|b| b.slot_label)
                .collect(),
            latest: snapshot.latest,
            timestamp: now_millis(),
        });
    }
}
