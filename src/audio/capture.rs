//! Microphone capture and outbound frame encoding.
//!
//! The capture task runs for the lifetime of one call, pulling float frames
//! from the device at its own cadence and pushing encoded messages at the
//! transport. Frames are dropped — never buffered or retried — while the
//! session is muted or the link is not open; capture is lossy by design to
//! keep real-time latency ahead of completeness.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::audio::codec;
use crate::error::CallError;
use crate::protocol;
use crate::transport::TransportCommand;

/// A stream of captured float frames in [-1, 1].
#[async_trait]
pub trait CaptureSource: Send {
    /// Next frame, or `None` once the device is exhausted/closed.
    async fn next_frame(&mut self) -> Option<Vec<f32>>;
}

/// A capture device that can be acquired at a negotiated sample rate.
///
/// Acquisition is the step that can fail with a permission error; the
/// session surfaces that and returns to idle.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn open(
        &self,
        sample_rate: u32,
        frame_samples: usize,
    ) -> Result<Box<dyn CaptureSource>, CallError>;
}

/// Per-frame gate and encoder for outbound audio.
///
/// `muted` and `link_open` are owned by the session controller and read
/// here atomically, so a mute toggle is visible on the very next frame.
pub struct CaptureEncoder {
    muted: Arc<AtomicBool>,
    link_open: Arc<AtomicBool>,
    sample_rate: u32,
}

impl CaptureEncoder {
    pub fn new(muted: Arc<AtomicBool>, link_open: Arc<AtomicBool>, sample_rate: u32) -> Self {
        Self {
            muted,
            link_open,
            sample_rate,
        }
    }

    /// Encode one captured frame into its outbound message text, or `None`
    /// when the frame must be dropped (muted, or link not open).
    pub fn encode(&self, samples: &[f32]) -> Option<String> {
        if self.muted.load(Ordering::Relaxed) || !self.link_open.load(Ordering::Relaxed) {
            return None;
        }
        Some(protocol::audio_message(
            &codec::encode_frame(samples),
            self.sample_rate,
        ))
    }
}

/// Pump the capture source into the transport until stopped.
pub fn spawn_capture(
    mut source: Box<dyn CaptureSource>,
    encoder: CaptureEncoder,
    commands: mpsc::Sender<TransportCommand>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let Some(frame) = source.next_frame().await else {
                break;
            };
            if stop.load(Ordering::Relaxed) {
                break;
            }
            let Some(message) = encoder.encode(&frame) else {
                continue;
            };
            if commands
                .send(TransportCommand::SendText(message))
                .await
                .is_err()
            {
                // Transport gone; the session is tearing down.
                break;
            }
        }
        tracing::debug!("capture task stopped");
    })
}

/// Built-in capture device for the headless client: a steady test tone at
/// real-time cadence. Stands in where a hardware microphone would sit.
pub struct ToneCaptureDevice {
    pub frequency_hz: f32,
}

impl Default for ToneCaptureDevice {
    fn default() -> Self {
        Self { frequency_hz: 440.0 }
    }
}

#[async_trait]
impl CaptureDevice for ToneCaptureDevice {
    async fn open(
        &self,
        sample_rate: u32,
        frame_samples: usize,
    ) -> Result<Box<dyn CaptureSource>, CallError> {
        tracing::info!(sample_rate, frame_samples, "opening tone capture source");
        Ok(Box::new(ToneSource {
            frequency_hz: self.frequency_hz,
            sample_rate,
            frame_samples,
            phase: 0.0,
        }))
    }
}

struct ToneSource {
    frequency_hz: f32,
    sample_rate: u32,
    frame_samples: usize,
    phase: f32,
}

#[async_trait]
impl CaptureSource for ToneSource {
    async fn next_frame(&mut self) -> Option<Vec<f32>> {
        // Hold to real-time cadence like a hardware callback would.
        let frame_secs = self.frame_samples as f64 / self.sample_rate as f64;
        tokio::time::sleep(std::time::Duration::from_secs_f64(frame_secs)).await;

        let step = 2.0 * std::f32::consts::PI * self.frequency_hz / self.sample_rate as f32;
        let mut frame = Vec::with_capacity(self.frame_samples);
        for _ in 0..self.frame_samples {
            frame.push(self.phase.sin() * 0.2);
            self.phase += step;
        }
        self.phase %= 2.0 * std::f32::consts::PI;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder(muted: bool, open: bool) -> (CaptureEncoder, Arc<AtomicBool>, Arc<AtomicBool>) {
        let muted = Arc::new(AtomicBool::new(muted));
        let link_open = Arc::new(AtomicBool::new(open));
        (
            CaptureEncoder::new(muted.clone(), link_open.clone(), 24000),
            muted,
            link_open,
        )
    }

    #[test]
    fn muted_frames_are_dropped_then_flow_after_unmute() {
        let (enc, muted, _open) = encoder(true, true);
        let frame = vec![0.5f32; 64];

        for _ in 0..3 {
            assert!(enc.encode(&frame).is_none());
        }

        muted.store(false, Ordering::Relaxed);
        let sent: Vec<_> = std::iter::once(enc.encode(&frame)).flatten().collect();
        assert_eq!(sent.len(), 1);
    }

    #[test]
    fn closed_link_drops_frames() {
        let (enc, _muted, open) = encoder(false, false);
        assert!(enc.encode(&[0.1, 0.2]).is_none());
        open.store(true, Ordering::Relaxed);
        assert!(enc.encode(&[0.1, 0.2]).is_some());
    }

    #[test]
    fn encoded_frame_carries_sample_rate() {
        let (enc, _muted, _open) = encoder(false, true);
        let message = enc.encode(&[0.0; 8]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&message).unwrap();
        assert_eq!(value["type"], "audio");
        assert_eq!(value["sampleRate"], 24000);
    }

    struct ScriptedSource {
        frames: Vec<Vec<f32>>,
    }

    #[async_trait]
    impl CaptureSource for ScriptedSource {
        async fn next_frame(&mut self) -> Option<Vec<f32>> {
            if self.frames.is_empty() {
                None
            } else {
                Some(self.frames.remove(0))
            }
        }
    }

    #[tokio::test]
    async fn capture_task_forwards_unmuted_frames_only() {
        let muted = Arc::new(AtomicBool::new(false));
        let link_open = Arc::new(AtomicBool::new(true));
        let enc = CaptureEncoder::new(muted.clone(), link_open.clone(), 16000);
        let (tx, mut rx) = mpsc::channel(16);
        let stop = Arc::new(AtomicBool::new(false));

        let source = ScriptedSource {
            frames: vec![vec![0.1; 4], vec![0.2; 4], vec![0.3; 4]],
        };
        // Mute kicks in after the first frame is already queued.
        let handle = spawn_capture(Box::new(source), enc, tx, stop);
        let first = rx.recv().await;
        assert!(first.is_some());
        muted.store(true, Ordering::Relaxed);
        handle.await.unwrap();

        let mut remaining = 0;
        while rx.try_recv().is_ok() {
            remaining += 1;
        }
        // At most the frames that raced the mute flag; never all of them
        // once the mute is observed.
        assert!(remaining <= 2);
    }
}
