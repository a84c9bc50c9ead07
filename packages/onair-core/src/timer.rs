//! Single-instance cancellable one-shot timer.
//!
//! Owned by whichever component needs it (poll scheduler, playback
//! controller) and polled from the station loop. Arming always replaces the
//! previous instance, so at most one deadline exists per timer.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep};

/// One-shot timer that can be re-armed and cancelled.
#[derive(Debug, Default)]
pub struct OneShotTimer {
    deadline: Option<Pin<Box<Sleep>>>,
}

impl OneShotTimer {
    /// Creates a disarmed timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer to fire after `after`, replacing any pending deadline.
    pub fn arm(&mut self, after: Duration) {
        self.deadline = Some(Box::pin(tokio::time::sleep(after)));
    }

    /// Disarms the timer. No-op when already disarmed.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Returns true while a deadline is pending.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left until the deadline, if armed.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .as_ref()
            .map(|sleep| sleep.deadline().saturating_duration_since(Instant::now()))
    }

    /// Completes when the armed deadline passes, then disarms the timer.
    ///
    /// Stays pending forever while disarmed, which makes it safe to use as a
    /// `tokio::select!` branch. Cancel-safe: dropping the future before it
    /// completes leaves the deadline armed.
    pub async fn expired(&mut self) {
        match self.deadline.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.deadline = None;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
