//! Event emitter abstraction for decoupling the station from transport.
//!
//! The station and playback controller depend on the [`EventEmitter`] trait
//! rather than concrete broadcast channels, enabling testing and alternative
//! transport implementations.

use super::{PlaybackEvent, StoreEvent};

/// Trait for emitting domain events without knowledge of transport.
pub trait EventEmitter: Send + Sync {
    /// Emits a broadcast store or poll cycle event.
    fn emit_store(&self, event: StoreEvent);

    /// Emits a playback state event.
    fn emit_playback(&self, event: PlaybackEvent);
}

/// No-op emitter for embedding or testing.
///
/// Events are silently discarded.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_store(&self, _event: StoreEvent) {}

    fn emit_playback(&self, _event: PlaybackEvent) {}
}

/// Logging emitter for debugging and development.
///
/// Logs all events at debug level.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_store(&self, event: StoreEvent) {
        tracing::debug!(?event, "store_event");
    }

    fn emit_playback(&self, event: PlaybackEvent) {
        tracing::debug!(?event, "playback_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Test emitter that counts events.
    struct CountingEventEmitter {
        store_count: AtomicUsize,
        playback_count: AtomicUsize,
    }

    impl CountingEventEmitter {
        fn new() -> Self {
            Self {
                store_count: AtomicUsize::new(0),
                playback_count: AtomicUsize::new(0),
            }
        }
    }

    impl EventEmitter for CountingEventEmitter {
        fn emit_store(&self, _event: StoreEvent) {
            self.store_count.fetch_add(1, Ordering::SeqCst);
        }

        fn emit_playback(&self, _event: PlaybackEvent) {
            self.playback_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn counting_emitter_tracks_events() {
        let emitter = Arc::new(CountingEventEmitter::new());

        emitter.emit_playback(PlaybackEvent::FocusReleased { timestamp: 0 });
        emitter.emit_playback(PlaybackEvent::FocusReleased { timestamp: 1 });
        emitter.emit_store(StoreEvent::DayReset {
            date: chrono::NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
            timestamp: 0,
        });

        assert_eq!(emitter.playback_count.load(Ordering::SeqCst), 2);
        assert_eq!(emitter.store_count.load(Ordering::SeqCst), 1);
    }

    /// `log` backend that keeps every message.
    struct Recorder(parking_lot::Mutex<Vec<String>>);

    impl log::Log for Recorder {
        fn enabled(&self, _: &log::Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &log::Record<'_>) {
            self.0.lock().push(record.args().to_string());
        }

        fn flush(&self) {}
    }

    static RECORDER: Recorder = Recorder(parking_lot::const_mutex(Vec::new()));

    #[test]
    fn noop_emitter_accepts_events() {
        NoopEventEmitter.emit_playback(PlaybackEvent::FocusReleased { timestamp: 0 });
    }

    #[test]
    fn logging_emitter_reaches_the_log_backend() {
        let _ = log::set_logger(&RECORDER);
        log::set_max_level(log::LevelFilter::Trace);

        LoggingEventEmitter.emit_playback(PlaybackEvent::FocusReleased { timestamp: 424242 });

        let lines = RECORDER.0.lock();
        assert!(lines
            .iter()
            .any(|line| line.contains("playback_event") && line.contains("424242")));
    }
}
