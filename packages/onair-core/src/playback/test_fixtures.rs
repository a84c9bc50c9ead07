//! Scripted surfaces and recorders shared by playback and station tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    AudioFocusSurface, AudioSurface, MediaMetadata, PlatformMediaControls, PlaybackController,
    PlaybackStatus, SurfaceError,
};
use crate::events::{BroadcastEvent, EventEmitter, PlaybackEvent, StoreEvent};
use crate::services::IntentSender;

/// In-memory audio element.
#[derive(Default)]
pub struct MockAudioSurface {
    pub source: Mutex<Option<String>>,
    pub playing: Mutex<bool>,
    pub position: Mutex<f64>,
    pub duration: Mutex<Option<f64>>,
    /// When set, `play()` fails with this error.
    pub reject_with: Mutex<Option<SurfaceError>>,
    pub play_calls: Mutex<usize>,
}

impl MockAudioSurface {
    pub fn rejecting(err: SurfaceError) -> Self {
        let surface = Self::default();
        *surface.reject_with.lock() = Some(err);
        surface
    }

    pub fn is_playing(&self) -> bool {
        *self.playing.lock()
    }
}

#[async_trait]
impl AudioSurface for MockAudioSurface {
    fn load(&self, url: &str) {
        *self.source.lock() = Some(url.to_string());
        *self.position.lock() = 0.0;
        *self.duration.lock() = None;
    }

    async fn play(&self) -> Result<(), SurfaceError> {
        *self.play_calls.lock() += 1;
        if let Some(err) = self.reject_with.lock().clone() {
            return Err(err);
        }
        *self.playing.lock() = true;
        Ok(())
    }

    fn pause(&self) {
        *self.playing.lock() = false;
    }

    fn clear(&self) {
        *self.source.lock() = None;
        *self.playing.lock() = false;
        *self.position.lock() = 0.0;
        *self.duration.lock() = None;
    }

    fn has_source(&self) -> bool {
        self.source.lock().is_some()
    }

    fn position(&self) -> f64 {
        *self.position.lock()
    }

    fn set_position(&self, secs: f64) {
        *self.position.lock() = secs;
    }

    fn duration(&self) -> Option<f64> {
        *self.duration.lock()
    }
}

/// In-memory silent focus channel.
#[derive(Default)]
pub struct MockFocusSurface {
    pub loaded: Mutex<Option<String>>,
    pub active: Mutex<bool>,
    pub starts: Mutex<usize>,
}

impl MockFocusSurface {
    pub fn is_active(&self) -> bool {
        *self.active.lock()
    }
}

#[async_trait]
impl AudioFocusSurface for MockFocusSurface {
    fn load(&self, url: &str) {
        *self.loaded.lock() = Some(url.to_string());
    }

    async fn play(&self) -> Result<(), SurfaceError> {
        *self.starts.lock() += 1;
        *self.active.lock() = true;
        Ok(())
    }

    fn pause(&self) {
        *self.active.lock() = false;
    }
}

/// Media controls that remember what they were told.
#[derive(Default)]
pub struct RecordingMediaControls {
    pub registered: Mutex<Option<IntentSender>>,
    pub metadata: Mutex<Option<MediaMetadata>>,
    pub states: Mutex<Vec<PlaybackStatus>>,
    pub positions: Mutex<Vec<(f64, Option<f64>)>>,
    pub clears: Mutex<usize>,
}

impl PlatformMediaControls for RecordingMediaControls {
    fn register(&self, intents: IntentSender) {
        *self.registered.lock() = Some(intents);
    }

    fn set_metadata(&self, metadata: &MediaMetadata) {
        *self.metadata.lock() = Some(metadata.clone());
    }

    fn set_position(&self, position: f64, duration: Option<f64>) {
        self.positions.lock().push((position, duration));
    }

    fn set_playback_state(&self, status: PlaybackStatus) {
        self.states.lock().push(status);
    }

    fn clear(&self) {
        *self.clears.lock() += 1;
        *self.metadata.lock() = None;
    }
}

/// Emitter that keeps every event.
#[derive(Default)]
pub struct RecordingEmitter {
    pub events: Mutex<Vec<BroadcastEvent>>,
}

impl RecordingEmitter {
    pub fn playback_events(&self) -> Vec<PlaybackEvent> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                BroadcastEvent::Playback(p) => Some(p.clone()),
                BroadcastEvent::Store(_) => None,
            })
            .collect()
    }

    pub fn store_events(&self) -> Vec<StoreEvent> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                BroadcastEvent::Store(s) => Some(s.clone()),
                BroadcastEvent::Playback(_) => None,
            })
            .collect()
    }
}

impl EventEmitter for RecordingEmitter {
    fn emit_store(&self, event: StoreEvent) {
        self.events.lock().push(event.into());
    }

    fn emit_playback(&self, event: PlaybackEvent) {
        self.events.lock().push(event.into());
    }
}

/// A controller wired to fresh mocks.
pub struct Rig {
    pub audio: Arc<MockAudioSurface>,
    pub focus: Arc<MockFocusSurface>,
    pub controls: Arc<RecordingMediaControls>,
    pub emitter: Arc<RecordingEmitter>,
    pub controller: PlaybackController,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_audio(MockAudioSurface::default())
    }

    pub fn with_audio(audio: MockAudioSurface) -> Self {
        let audio = Arc::new(audio);
        let focus = Arc::new(MockFocusSurface::default());
        let controls = Arc::new(RecordingMediaControls::default());
        let emitter = Arc::new(RecordingEmitter::default());
        let controller = PlaybackController::new(
            audio.clone(),
            focus.clone(),
            controls.clone(),
            emitter.clone(),
            "/silence.mp3".to_string(),
        );
        Self {
            audio,
            focus,
            controls,
            emitter,
            controller,
        }
    }
}
