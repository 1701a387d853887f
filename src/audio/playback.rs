//! Scheduled playback of inbound agent audio.
//!
//! A single monotonic cursor tracks the next free start time on the output
//! engine. Every inbound frame is scheduled at `max(engine now, cursor)` and
//! the cursor advances by the frame's duration, which yields strictly
//! sequential, gap-free, non-overlapping playback no matter how jittery the
//! arrival times are. If the remote pushes audio persistently faster than
//! real time the cursor runs away from the clock; that growth is unbounded
//! and only observed, not limited.

use std::sync::Arc;
use std::time::Instant;

use crate::audio::codec;
use crate::error::CallError;

/// One playable mono buffer.
#[derive(Debug, Clone)]
pub struct PlaybackBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl PlaybackBuffer {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// The audio output engine the scheduler drives.
///
/// `now()` is the engine's monotonic clock in seconds; `schedule` queues a
/// buffer to begin at an absolute engine time.
pub trait PlaybackEngine: Send + Sync {
    fn now(&self) -> f64;
    fn schedule(&self, buffer: PlaybackBuffer, start: f64);
    fn close(&self);
}

/// Cursor-based scheduler for one call.
pub struct PlaybackScheduler {
    engine: Arc<dyn PlaybackEngine>,
    cursor: f64,
    sample_rate: u32,
}

impl PlaybackScheduler {
    /// The cursor starts at the engine's current time reference.
    pub fn new(engine: Arc<dyn PlaybackEngine>, sample_rate: u32) -> Self {
        let cursor = engine.now();
        Self {
            engine,
            cursor,
            sample_rate,
        }
    }

    /// Decode one wire-form audio payload and schedule it.
    ///
    /// Returns the scheduled start time. Malformed payloads are a
    /// `CallError::Protocol`; the caller logs and moves on.
    pub fn handle_audio(&mut self, encoded: &str) -> Result<f64, CallError> {
        let pcm = codec::decode_frame(encoded)?;
        if pcm.is_empty() {
            return Ok(self.cursor);
        }

        let buffer = PlaybackBuffer {
            samples: pcm.iter().map(|&s| codec::sample_to_f32(s)).collect(),
            sample_rate: self.sample_rate,
        };
        let duration = buffer.duration_secs();

        let now = self.engine.now();
        let start = now.max(self.cursor);
        let backlog = start - now;
        if backlog > 2.0 {
            tracing::warn!(backlog_secs = backlog, "playback queue running ahead of real time");
        }

        self.engine.schedule(buffer, start);
        self.cursor = start + duration;
        Ok(start)
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }
}

/// Output engine for the headless client: keeps a wall-clock time reference
/// and reports what would be played instead of driving a speaker.
pub struct MonitorPlaybackEngine {
    epoch: Instant,
}

impl MonitorPlaybackEngine {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonitorPlaybackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackEngine for MonitorPlaybackEngine {
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn schedule(&self, buffer: PlaybackBuffer, start: f64) {
        tracing::debug!(
            samples = buffer.samples.len(),
            sample_rate = buffer.sample_rate,
            start_secs = start,
            "agent audio scheduled"
        );
    }

    fn close(&self) {
        tracing::debug!("playback engine closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::codec::encode_pcm16;
    use std::sync::Mutex;

    /// Engine with a hand-advanced clock that records every schedule call.
    struct FakeEngine {
        clock: Mutex<f64>,
        scheduled: Mutex<Vec<(usize, f64)>>,
    }

    impl FakeEngine {
        fn new(clock: f64) -> Self {
            Self {
                clock: Mutex::new(clock),
                scheduled: Mutex::new(Vec::new()),
            }
        }

        fn set_clock(&self, t: f64) {
            *self.clock.lock().unwrap() = t;
        }

        fn starts(&self) -> Vec<f64> {
            self.scheduled.lock().unwrap().iter().map(|&(_, s)| s).collect()
        }
    }

    impl PlaybackEngine for FakeEngine {
        fn now(&self) -> f64 {
            *self.clock.lock().unwrap()
        }

        fn schedule(&self, buffer: PlaybackBuffer, start: f64) {
            self.scheduled.lock().unwrap().push((buffer.samples.len(), start));
        }

        fn close(&self) {}
    }

    fn frame(samples: usize) -> String {
        encode_pcm16(&vec![1000i16; samples])
    }

    #[test]
    fn back_to_back_frames_are_contiguous() {
        let engine = Arc::new(FakeEngine::new(10.0));
        let mut scheduler = PlaybackScheduler::new(engine.clone(), 1000);

        // Three 500-sample frames at 1 kHz: 0.5 s each, arriving instantly.
        for _ in 0..3 {
            scheduler.handle_audio(&frame(500)).unwrap();
        }

        assert_eq!(engine.starts(), vec![10.0, 10.5, 11.0]);
        assert!((scheduler.cursor() - 11.5).abs() < 1e-9);
    }

    #[test]
    fn late_arrival_restarts_at_engine_clock() {
        let engine = Arc::new(FakeEngine::new(0.0));
        let mut scheduler = PlaybackScheduler::new(engine.clone(), 1000);

        scheduler.handle_audio(&frame(100)).unwrap(); // plays 0.0..0.1
        // A long network stall: the clock passes the cursor.
        engine.set_clock(5.0);
        let start = scheduler.handle_audio(&frame(100)).unwrap();

        assert_eq!(start, 5.0);
        assert!((scheduler.cursor() - 5.1).abs() < 1e-9);
    }

    #[test]
    fn start_times_never_decrease_under_jitter() {
        let engine = Arc::new(FakeEngine::new(0.0));
        let mut scheduler = PlaybackScheduler::new(engine.clone(), 8000);

        let clock_steps = [0.0, 0.0, 0.3, 0.3, 0.31, 1.5, 1.5, 1.51];
        for t in clock_steps {
            engine.set_clock(t);
            scheduler.handle_audio(&frame(800)).unwrap(); // 0.1 s each
        }

        let starts = engine.starts();
        for pair in starts.windows(2) {
            assert!(pair[1] >= pair[0], "start times regressed: {:?}", starts);
            // No overlap: each frame is 0.1 s long.
            assert!(pair[1] - pair[0] >= 0.1 - 1e-9);
        }
    }

    #[test]
    fn malformed_audio_does_not_advance_cursor() {
        let engine = Arc::new(FakeEngine::new(2.0));
        let mut scheduler = PlaybackScheduler::new(engine.clone(), 8000);

        assert!(scheduler.handle_audio("###").is_err());
        assert_eq!(scheduler.cursor(), 2.0);
        assert!(engine.starts().is_empty());
    }

    #[test]
    fn empty_payload_is_a_no_op() {
        let engine = Arc::new(FakeEngine::new(1.0));
        let mut scheduler = PlaybackScheduler::new(engine.clone(), 8000);
        scheduler.handle_audio("").unwrap();
        assert_eq!(scheduler.cursor(), 1.0);
        assert!(engine.starts().is_empty());
    }
}
