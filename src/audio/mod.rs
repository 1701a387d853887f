//! Audio path: PCM16 wire codec, microphone capture/encode, and scheduled
//! playback of inbound agent audio.

pub mod capture;
pub mod codec;
pub mod playback;

pub use capture::{CaptureDevice, CaptureEncoder, CaptureSource, ToneCaptureDevice};
pub use playback::{MonitorPlaybackEngine, PlaybackEngine, PlaybackScheduler};
