//! Playback state machine.
//!
//! `Stopped -> Playing <-> Paused -> Stopped`. While paused, a silent focus
//! surface keeps the host's audio focus and a one-shot timer bounds how long
//! that lasts; the timer and `Playing` are never active together.

use std::sync::Arc;
use std::time::Duration;

use super::{
    AudioFocusSurface, AudioSurface, MediaMetadata, PlatformMediaControls, PlaybackError,
    PlaybackResult, PlaybackSnapshot, PlaybackStatus, SurfaceError, SurfaceEvent,
};
use crate::constants::AUDIO_FOCUS_TIMEOUT;
use crate::events::{EventEmitter, PlaybackEvent};
use crate::store::{BroadcastStore, DayResetListener};
use crate::timer::OneShotTimer;
use crate::utils::{clamp_position, now_millis};

/// Owns the playback session: status, current slot and the focus timer.
pub struct PlaybackController {
    audio: Arc<dyn AudioSurface>,
    focus: Arc<dyn AudioFocusSurface>,
    controls: Arc<dyn PlatformMediaControls>,
    emitter: Arc<dyn EventEmitter>,
    focus_source_url: String,
    focus_loaded: bool,
    focus_timeout: Duration,
    focus_timer: OneShotTimer,
    status: PlaybackStatus,
    current_slot: Option<String>,
    /// Last (status, slot) pair announced to presenters.
    announced: (PlaybackStatus, Option<String>),
}

impl PlaybackController {
    /// Creates a stopped controller.
    ///
    /// `focus_source_url` is the silent source loaded into the focus surface
    /// the first time a pause needs it.
    pub fn new(
        audio: Arc<dyn AudioSurface>,
        focus: Arc<dyn AudioFocusSurface>,
        controls: Arc<dyn PlatformMediaControls>,
        emitter: Arc<dyn EventEmitter>,
        focus_source_url: String,
    ) -> Self {
        Self {
            audio,
            focus,
            controls,
            emitter,
            focus_source_url,
            focus_loaded: false,
            focus_timeout: AUDIO_FOCUS_TIMEOUT,
            focus_timer: OneShotTimer::new(),
            status: PlaybackStatus::Stopped,
            current_slot: None,
            announced: (PlaybackStatus::Stopped, None),
        }
    }

    /// Overrides how long a pause may hold audio focus.
    #[must_use]
    pub fn with_focus_timeout(mut self, timeout: Duration) -> Self {
        self.focus_timeout = timeout;
        self
    }

    #[must_use]
    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    #[must_use]
    pub fn current_slot(&self) -> Option<&str> {
        self.current_slot.as_deref()
    }

    #[must_use]
    pub fn focus_timer_armed(&self) -> bool {
        self.focus_timer.is_armed()
    }

    #[must_use]
    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            status: self.status,
            current_slot: self.current_slot.clone(),
            position: self.audio.position(),
            duration: self.audio.duration(),
            focus_timer_armed: self.focus_timer.is_armed(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Starts playing today's broadcast for `slot`.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::NoBroadcast`] if the slot has nothing playable (state
    /// untouched); [`PlaybackError::Rejected`] or
    /// [`PlaybackError::Unavailable`] if the surface refuses, in which case the
    /// controller ends up stopped.
    pub async fn play(&mut self, store: &BroadcastStore, slot: &str) -> PlaybackResult<()> {
        let Some(broadcast) = store.get(slot).filter(|b| b.is_playable()) else {
            return Err(self.report(PlaybackError::NoBroadcast(slot.to_string())));
        };
        let metadata = MediaMetadata {
            title: broadcast.title.clone(),
            slot_label: broadcast.slot_label.clone(),
        };

        self.release_focus();
        self.current_slot = Some(slot.to_string());
        self.audio.load(&broadcast.audio_url);

        match self.audio.play().await {
            Ok(()) => {
                log::info!("[Playback] Playing {} ({})", slot, metadata.title);
                self.controls.set_metadata(&metadata);
                self.transition(PlaybackStatus::Playing);
                Ok(())
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    /// Pauses playback and starts holding audio focus. No-op unless playing.
    pub async fn pause(&mut self) {
        if self.status != PlaybackStatus::Playing {
            return;
        }
        self.audio.pause();
        self.transition(PlaybackStatus::Paused);
        self.hold_focus().await;
        log::info!(
            "[Playback] Paused, holding audio focus for {}s",
            self.focus_timeout.as_secs()
        );
    }

    /// Resumes a paused broadcast. No-op unless paused.
    ///
    /// # Errors
    ///
    /// Fails like [`play`](Self::play) when the surface refuses.
    pub async fn resume(&mut self) -> PlaybackResult<()> {
        if self.status != PlaybackStatus::Paused {
            return Ok(());
        }
        self.release_focus();
        match self.audio.play().await {
            Ok(()) => {
                self.transition(PlaybackStatus::Playing);
                Ok(())
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    /// Stops playback and releases everything. Valid in any state.
    pub fn stop(&mut self) {
        self.release_focus();
        self.audio.clear();
        self.current_slot = None;
        self.controls.clear();
        self.transition(PlaybackStatus::Stopped);
    }

    /// Play/pause toggle.
    ///
    /// From `Stopped` this plays the most recent broadcast of the day.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::NoBroadcastsYet`] when stopped with an empty store;
    /// otherwise as [`play`](Self::play) and [`resume`](Self::resume).
    pub async fn toggle(&mut self, store: &BroadcastStore) -> PlaybackResult<()> {
        match self.status {
            PlaybackStatus::Playing => {
                self.pause().await;
                Ok(())
            }
            PlaybackStatus::Paused => self.resume().await,
            PlaybackStatus::Stopped => {
                let Some(latest) = store.find_latest().map(str::to_owned) else {
                    return Err(self.report(PlaybackError::NoBroadcastsYet));
                };
                self.play(store, &latest).await
            }
        }
    }

    /// Moves the position by `delta` seconds. No-op without a source.
    pub fn skip(&mut self, delta: f64) {
        if !self.audio.has_source() {
            return;
        }
        let duration = self.audio.duration();
        let position = clamp_position(self.audio.position() + delta, duration);
        self.audio.set_position(position);
        self.controls.set_position(position, duration);
    }

    /// Jumps to `position` seconds. No-op until the duration is known.
    pub fn seek(&mut self, position: f64) {
        if !self.audio.has_source() {
            return;
        }
        let Some(duration) = self.audio.duration() else {
            return;
        };
        let position = clamp_position(position, Some(duration));
        self.audio.set_position(position);
        self.controls.set_position(position, Some(duration));
    }

    /// Keeps the session in sync with what the surface reports.
    pub async fn handle_surface_event(&mut self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::Play => {
                if self.status == PlaybackStatus::Paused {
                    self.release_focus();
                    self.transition(PlaybackStatus::Playing);
                }
            }
            SurfaceEvent::Pause => self.pause().await,
            SurfaceEvent::Ended => {
                if self.status != PlaybackStatus::Stopped || self.current_slot.is_some() {
                    log::info!("[Playback] Broadcast ended");
                    self.release_focus();
                    self.current_slot = None;
                    self.transition(PlaybackStatus::Stopped);
                }
            }
            SurfaceEvent::Error { message } => {
                if self.status != PlaybackStatus::Stopped || self.audio.has_source() {
                    self.reject(SurfaceError::Rejected(message));
                }
            }
            SurfaceEvent::TimeUpdate { position } => {
                self.controls.set_position(position, self.audio.duration());
            }
            SurfaceEvent::LoadedMetadata { duration } => {
                self.controls.set_position(self.audio.position(), Some(duration));
            }
        }
    }

    /// Completes when the focus timer expires. Pending forever while disarmed.
    pub async fn focus_timer_fired(&mut self) {
        self.focus_timer.expired().await;
    }

    /// Releases a pause that held focus for the full timeout.
    pub fn release_after_focus_timeout(&mut self) {
        if self.status != PlaybackStatus::Paused {
            return;
        }
        log::info!("[Playback] Audio focus timeout reached, stopping");
        self.stop();
        self.emitter.emit_playback(PlaybackEvent::FocusReleased {
            timestamp: now_millis(),
        });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    async fn hold_focus(&mut self) {
        if !self.focus_loaded {
            self.focus.load(&self.focus_source_url);
            self.focus_loaded = true;
        }
        if let Err(e) = self.focus.play().await {
            log::warn!("[Playback] Focus surface did not start: {}", e);
        }
        self.focus_timer.arm(self.focus_timeout);
    }

    fn release_focus(&mut self) {
        self.focus_timer.cancel();
        self.focus.pause();
    }

    /// Forces `Stopped` after a surface failure and reports it.
    fn reject(&mut self, err: SurfaceError) -> PlaybackError {
        log::warn!("[Playback] Surface refused playback: {}", err);
        self.release_focus();
        self.audio.clear();
        self.current_slot = None;
        self.controls.clear();
        self.transition(PlaybackStatus::Stopped);
        self.report(err.into())
    }

    fn report(&self, err: PlaybackError) -> PlaybackError {
        self.emitter.emit_playback(PlaybackEvent::Failed {
            message: err.to_string(),
            error: err.clone(),
            timestamp: now_millis(),
        });
        err
    }

    fn transition(&mut self, status: PlaybackStatus) {
        self.status = status;
        self.controls.set_playback_state(status);

        let next = (status, self.current_slot.clone());
        if self.announced != next {
            self.announced = next;
            self.emitter.emit_playback(PlaybackEvent::StatusChanged {
                status,
                slot: self.current_slot.clone(),
                timestamp: now_millis(),
            });
        }
    }
}

impl DayResetListener for PlaybackController {
    fn on_day_reset(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::test_fixtures::{MockAudioSurface, Rig};
    use crate::slots::default_slots;
    use crate::store::tests::{broadcast, day};

    fn stocked_store() -> BroadcastStore {
        let mut store = BroadcastStore::new(day(16), default_slots());
        store.merge([broadcast("08:00", 100), broadcast("12:30", 200)]);
        store
    }

    #[tokio::test]
    async fn play_loads_and_starts_broadcast() {
        let mut rig = Rig::new();
        let store = stocked_store();

        rig.controller.play(&store, "08:00").await.unwrap();

        assert_eq!(rig.controller.status(), PlaybackStatus::Playing);
        assert_eq!(rig.controller.current_slot(), Some("08:00"));
        assert_eq!(
            rig.audio.source.lock().as_deref(),
            Some("https://cdn.example/0800.mp3")
        );
        assert!(rig.audio.is_playing());
        assert_eq!(
            rig.controls.metadata.lock().as_ref().unwrap().slot_label,
            "08:00"
        );
        assert_eq!(
            rig.controls.states.lock().last(),
            Some(&PlaybackStatus::Playing)
        );
    }

    #[tokio::test]
    async fn play_without_audio_url_is_no_broadcast() {
        let mut rig = Rig::new();
        let mut store = stocked_store();
        let mut silent = broadcast("18:00", 300);
        silent.audio_url.clear();
        store.merge([silent]);

        let err = rig.controller.play(&store, "18:00").await.unwrap_err();
        assert_eq!(err, PlaybackError::NoBroadcast("18:00".into()));
        assert_eq!(rig.controller.status(), PlaybackStatus::Stopped);
        assert!(rig.controller.current_slot().is_none());
        assert!(!rig.audio.has_source());

        let err = rig.controller.play(&store, "22:00").await.unwrap_err();
        assert_eq!(err, PlaybackError::NoBroadcast("22:00".into()));
        assert!(matches!(
            rig.emitter.playback_events().last(),
            Some(PlaybackEvent::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn rejected_play_forces_stopped() {
        let mut rig = Rig::with_audio(MockAudioSurface::rejecting(SurfaceError::Rejected(
            "autoplay blocked".into(),
        )));
        let store = stocked_store();

        let err = rig.controller.play(&store, "12:30").await.unwrap_err();
        assert!(matches!(err, PlaybackError::Rejected(_)));
        assert_eq!(rig.controller.status(), PlaybackStatus::Stopped);
        assert!(rig.controller.current_slot().is_none());
        assert!(!rig.audio.has_source());
    }

    #[tokio::test]
    async fn missing_output_reports_unavailable() {
        let mut rig = Rig::with_audio(MockAudioSurface::rejecting(SurfaceError::Unavailable));
        let err = rig
            .controller
            .play(&stocked_store(), "08:00")
            .await
            .unwrap_err();
        assert_eq!(err, PlaybackError::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_arms_focus_timer_and_resume_cancels_it() {
        let mut rig = Rig::new();
        let store = stocked_store();
        rig.controller.play(&store, "08:00").await.unwrap();

        rig.controller.pause().await;
        assert_eq!(rig.controller.status(), PlaybackStatus::Paused);
        assert!(rig.controller.focus_timer_armed());
        assert!(rig.focus.is_active());
        assert_eq!(rig.focus.loaded.lock().as_deref(), Some("/silence.mp3"));
        assert!(!rig.audio.is_playing());

        tokio::time::advance(Duration::from_secs(14 * 60)).await;
        rig.controller.resume().await.unwrap();

        assert_eq!(rig.controller.status(), PlaybackStatus::Playing);
        assert!(!rig.controller.focus_timer_armed());
        assert!(!rig.focus.is_active());
        assert!(rig.audio.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn unattended_pause_stops_after_focus_timeout() {
        let mut rig = Rig::new();
        let store = stocked_store();
        rig.controller.play(&store, "12:30").await.unwrap();
        rig.controller.pause().await;

        let started = tokio::time::Instant::now();
        rig.controller.focus_timer_fired().await;
        rig.controller.release_after_focus_timeout();

        assert_eq!(started.elapsed(), AUDIO_FOCUS_TIMEOUT);
        assert_eq!(rig.controller.status(), PlaybackStatus::Stopped);
        assert!(rig.controller.current_slot().is_none());
        assert!(!rig.audio.has_source());
        assert!(!rig.focus.is_active());
        assert!(matches!(
            rig.emitter.playback_events().last(),
            Some(PlaybackEvent::FocusReleased { .. })
        ));
    }

    #[tokio::test]
    async fn pause_and_resume_are_noops_in_wrong_state() {
        let mut rig = Rig::new();
        rig.controller.pause().await;
        assert_eq!(rig.controller.status(), PlaybackStatus::Stopped);
        assert!(!rig.controller.focus_timer_armed());

        rig.controller.resume().await.unwrap();
        assert_eq!(rig.controller.status(), PlaybackStatus::Stopped);
        assert_eq!(*rig.audio.play_calls.lock(), 0);
    }

    #[tokio::test]
    async fn stop_clears_everything() {
        let mut rig = Rig::new();
        let store = stocked_store();
        rig.controller.play(&store, "08:00").await.unwrap();
        rig.controller.pause().await;

        rig.controller.stop();
        assert_eq!(rig.controller.status(), PlaybackStatus::Stopped);
        assert!(rig.controller.current_slot().is_none());
        assert!(!rig.controller.focus_timer_armed());
        assert!(!rig.audio.has_source());
        assert!(*rig.controls.clears.lock() >= 1);
        assert!(store.contains("08:00"));
    }

    #[tokio::test]
    async fn toggle_with_empty_store_reports_no_broadcasts() {
        let mut rig = Rig::new();
        let store = BroadcastStore::new(day(16), default_slots());

        let err = rig.controller.toggle(&store).await.unwrap_err();
        assert_eq!(err, PlaybackError::NoBroadcastsYet);
        assert_eq!(rig.controller.status(), PlaybackStatus::Stopped);
        assert_eq!(*rig.audio.play_calls.lock(), 0);
    }

    #[tokio::test]
    async fn toggle_cycles_latest_through_pause_and_resume() {
        let mut rig = Rig::new();
        let store = stocked_store();

        rig.controller.toggle(&store).await.unwrap();
        assert_eq!(rig.controller.status(), PlaybackStatus::Playing);
        assert_eq!(rig.controller.current_slot(), Some("12:30"));

        rig.controller.toggle(&store).await.unwrap();
        assert_eq!(rig.controller.status(), PlaybackStatus::Paused);

        rig.controller.toggle(&store).await.unwrap();
        assert_eq!(rig.controller.status(), PlaybackStatus::Playing);
        assert_eq!(rig.controller.current_slot(), Some("12:30"));
    }

    #[tokio::test]
    async fn skip_and_seek_clamp_to_duration() {
        let mut rig = Rig::new();
        rig.controller.skip(15.0);
        assert_eq!(rig.audio.position(), 0.0);

        rig.controller.play(&stocked_store(), "08:00").await.unwrap();
        rig.controller.seek(30.0);
        assert_eq!(rig.audio.position(), 0.0, "seek waits for a known duration");

        rig.controller.skip(20.0);
        assert_eq!(rig.audio.position(), 20.0);

        *rig.audio.duration.lock() = Some(100.0);
        rig.controller.skip(-45.0);
        assert_eq!(rig.audio.position(), 0.0);
        rig.controller.skip(500.0);
        assert_eq!(rig.audio.position(), 100.0);

        rig.controller.seek(42.0);
        assert_eq!(rig.audio.position(), 42.0);
        rig.controller.seek(-3.0);
        assert_eq!(rig.audio.position(), 0.0);
    }

    #[tokio::test]
    async fn ended_stops_but_keeps_broadcast() {
        let mut rig = Rig::new();
        let store = stocked_store();
        rig.controller.play(&store, "08:00").await.unwrap();

        rig.controller.handle_surface_event(SurfaceEvent::Ended).await;
        assert_eq!(rig.controller.status(), PlaybackStatus::Stopped);
        assert!(rig.controller.current_slot().is_none());
        assert!(store.get("08:00").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn external_pause_and_play_stay_in_sync() {
        let mut rig = Rig::new();
        let store = stocked_store();
        rig.controller.play(&store, "08:00").await.unwrap();

        rig.controller
            .handle_surface_event(SurfaceEvent::Pause)
            .await;
        assert_eq!(rig.controller.status(), PlaybackStatus::Paused);
        assert!(rig.controller.focus_timer_armed());

        rig.controller.handle_surface_event(SurfaceEvent::Play).await;
        assert_eq!(rig.controller.status(), PlaybackStatus::Playing);
        assert!(!rig.controller.focus_timer_armed());
        assert!(!rig.focus.is_active());
    }

    #[tokio::test]
    async fn surface_error_forces_stopped() {
        let mut rig = Rig::new();
        rig.controller.play(&stocked_store(), "08:00").await.unwrap();

        rig.controller
            .handle_surface_event(SurfaceEvent::Error {
                message: "network".into(),
            })
            .await;
        assert_eq!(rig.controller.status(), PlaybackStatus::Stopped);
        assert!(!rig.audio.has_source());
        assert!(matches!(
            rig.emitter.playback_events().last(),
            Some(PlaybackEvent::Failed {
                error: PlaybackError::Rejected(_),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn position_reports_reach_media_controls() {
        let mut rig = Rig::new();
        *rig.audio.duration.lock() = Some(600.0);
        rig.controller
            .handle_surface_event(SurfaceEvent::TimeUpdate { position: 5.0 })
            .await;
        rig.controller
            .handle_surface_event(SurfaceEvent::LoadedMetadata { duration: 600.0 })
            .await;
        assert_eq!(
            *rig.controls.positions.lock(),
            vec![(5.0, Some(600.0)), (0.0, Some(600.0))]
        );
    }

    #[tokio::test]
    async fn day_reset_stops_playback() {
        let mut rig = Rig::new();
        let mut store = stocked_store();
        rig.controller.play(&store, "12:30").await.unwrap();

        assert!(store.reset_if_day_changed(day(17), &mut rig.controller));
        assert!(store.is_empty());
        assert_eq!(rig.controller.status(), PlaybackStatus::Stopped);
        assert!(rig.controller.current_slot().is_none());
    }

    #[tokio::test]
    async fn status_changes_are_announced_once() {
        let mut rig = Rig::new();
        rig.controller.stop();
        rig.controller.stop();
        assert!(rig.emitter.playback_events().is_empty());

        rig.controller.play(&stocked_store(), "08:00").await.unwrap();
        rig.controller.play(&stocked_store(), "12:30").await.unwrap();
        let changes = rig
            .emitter
            .playback_events()
            .into_iter()
            .filter(|e| matches!(e, PlaybackEvent::StatusChanged { .. }))
            .count();
        assert_eq!(changes, 2);
    }
}
