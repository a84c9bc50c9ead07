//! Adaptive poll scheduling.
//!
//! Polls aggressively right after a missing slot's expected publish time and
//! backs off as the window ages. Once every due slot is present (or none is
//! due) the scheduler idles.

use std::time::Duration;

use serde::Serialize;

use crate::clock::LocalTime;
use crate::constants::{
    ACTIVE_POLL_INTERVAL, ACTIVE_WINDOW_MINS, EXTENDED_POLL_INTERVAL, EXTENDED_WINDOW_MINS,
    IDLE_POLL_INTERVAL,
};
use crate::feed::CacheTokens;
use crate::store::BroadcastStore;
use crate::timer::OneShotTimer;

/// Poll aggressiveness tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PollTier {
    Active,
    Extended,
    Idle,
}

impl PollTier {
    /// Interval associated with the tier.
    #[must_use]
    pub fn interval(self) -> Duration {
        match self {
            Self::Active => ACTIVE_POLL_INTERVAL,
            Self::Extended => EXTENDED_POLL_INTERVAL,
            Self::Idle => IDLE_POLL_INTERVAL,
        }
    }
}

/// Outcome of an interval computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollDecision {
    pub tier: PollTier,
    /// Slot whose window decided the tier; `None` when idle.
    pub slot: Option<String>,
}

impl PollDecision {
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.tier.interval()
    }
}

/// Computes the next poll interval.
///
/// Slots already in the store are skipped. The first absent slot whose poll
/// window contains `now` decides the tier; later slots are not considered.
#[must_use]
pub fn compute_interval(now: &LocalTime, store: &BroadcastStore) -> PollDecision {
    let now_minutes = now.minutes_of_day();

    for slot in store.slots() {
        if store.contains(&slot.label) {
            continue;
        }
        let diff = now_minutes - slot.poll_start_minutes();
        let tier = if (0..=ACTIVE_WINDOW_MINS).contains(&diff) {
            PollTier::Active
        } else if diff > ACTIVE_WINDOW_MINS && diff <= EXTENDED_WINDOW_MINS {
            PollTier::Extended
        } else {
            continue;
        };
        return PollDecision {
            tier,
            slot: Some(slot.label.clone()),
        };
    }

    PollDecision {
        tier: PollTier::Idle,
        slot: None,
    }
}

/// Owns the poll timer and the feed validators carried between cycles.
#[derive(Debug, Default)]
pub struct PollScheduler {
    timer: OneShotTimer,
    last_decision: Option<PollDecision>,
    tokens: CacheTokens,
}

impl PollScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-arms the poll timer from the current time and store contents.
    ///
    /// Any pending timer is replaced. Returns the chosen interval.
    pub fn schedule(&mut self, now: &LocalTime, store: &BroadcastStore) -> Duration {
        let decision = compute_interval(now, store);
        let interval = decision.interval();
        self.timer.arm(interval);

        log::debug!(
            "[Scheduler] Next poll in {}s ({:?}{})",
            interval.as_secs(),
            decision.tier,
            decision
                .slot
                .as_deref()
                .map(|s| format!(", waiting for {s}"))
                .unwrap_or_default()
        );

        self.last_decision = Some(decision);
        interval
    }

    /// Disarms the poll timer.
    pub fn cancel(&mut self) {
        self.timer.cancel();
    }

    /// Completes when the poll timer fires. Pending forever while disarmed.
    pub async fn fired(&mut self) {
        self.timer.expired().await;
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.timer.is_armed()
    }

    /// Time until the next poll, if one is scheduled.
    #[must_use]
    pub fn next_poll_in(&self) -> Option<Duration> {
        self.timer.remaining()
    }

    /// The most recent scheduling decision.
    #[must_use]
    pub fn last_decision(&self) -> Option<&PollDecision> {
        self.last_decision.as_ref()
    }

    /// Validators to send with the next fetch.
    #[must_use]
    pub fn cache_tokens(&self) -> &CacheTokens {
        &self.tokens
    }

    /// Stores validators returned by a fresh fetch.
    pub fn set_cache_tokens(&mut self, tokens: CacheTokens) {
        self.tokens = tokens;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::default_slots;
    use crate::store::tests::{broadcast, day};

    fn at(hour: u32, minute: u32) -> LocalTime {
        LocalTime::new(day(16), hour, minute)
    }

    fn empty_store() -> BroadcastStore {
        BroadcastStore::new(day(16), default_slots())
    }

    #[test]
    fn tiers_follow_window_age() {
        let store = empty_store();
        assert_eq!(compute_interval(&at(8, 25), &store).tier, PollTier::Active);
        assert_eq!(compute_interval(&at(8, 35), &store).tier, PollTier::Extended);
        assert_eq!(compute_interval(&at(8, 55), &store).tier, PollTier::Idle);
    }

    #[test]
    fn window_edges_are_inclusive() {
        let store = empty_store();
        assert_eq!(compute_interval(&at(8, 20), &store).tier, PollTier::Active);
        assert_eq!(compute_interval(&at(8, 30), &store).tier, PollTier::Active);
        assert_eq!(compute_interval(&at(8, 31), &store).tier, PollTier::Extended);
        assert_eq!(compute_interval(&at(8, 50), &store).tier, PollTier::Extended);
        assert_eq!(compute_interval(&at(8, 51), &store).tier, PollTier::Idle);
        assert_eq!(compute_interval(&at(8, 19), &store).tier, PollTier::Idle);
    }

    #[test]
    fn present_slots_are_skipped() {
        let mut store = empty_store();
        assert_eq!(
            compute_interval(&at(12, 55), &store).slot.as_deref(),
            Some("12:30")
        );

        store.merge([broadcast("12:30", 1)]);
        let decision = compute_interval(&at(12, 55), &store);
        assert_eq!(decision.tier, PollTier::Idle);
        assert!(decision.slot.is_none());
    }

    #[test]
    fn intervals_match_tiers() {
        assert_eq!(PollTier::Active.interval(), Duration::from_secs(60));
        assert_eq!(PollTier::Extended.interval(), Duration::from_secs(300));
        assert_eq!(PollTier::Idle.interval(), Duration::from_secs(1800));
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_rearms_single_timer() {
        let mut scheduler = PollScheduler::new();
        let store = empty_store();

        assert_eq!(
            scheduler.schedule(&at(8, 25), &store),
            Duration::from_secs(60)
        );
        assert_eq!(
            scheduler.schedule(&at(10, 0), &store),
            Duration::from_secs(1800)
        );
        assert_eq!(scheduler.next_poll_in(), Some(Duration::from_secs(1800)));
        assert_eq!(scheduler.last_decision().unwrap().tier, PollTier::Idle);

        let started = tokio::time::Instant::now();
        scheduler.fired().await;
        assert_eq!(started.elapsed(), Duration::from_secs(1800));
        assert!(!scheduler.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_disarms_timer() {
        let mut scheduler = PollScheduler::new();
        scheduler.schedule(&at(8, 25), &empty_store());
        scheduler.cancel();
        assert!(!scheduler.is_armed());
        let fired = tokio::time::timeout(Duration::from_secs(7200), scheduler.fired()).await;
        assert!(fired.is_err());
    }

    #[test]
    fn cache_tokens_are_retained() {
        let mut scheduler = PollScheduler::new();
        assert!(scheduler.cache_tokens().is_empty());
        scheduler.set_cache_tokens(CacheTokens {
            etag: Some("\"abc\"".into()),
            last_modified: None,
        });
        assert_eq!(scheduler.cache_tokens().etag.as_deref(), Some("\"abc\""));
    }
}
