use serde::{Deserialize, Serialize};

/// Runtime configuration for the outreach call client.
///
/// Defaults match the production deployment; every field can be overridden
/// through a `VOICE_*` environment variable.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Session negotiation endpoint (POST {"agentId": ...}).
    pub signaling_url: String,
    /// Identifier of the conversational agent to dial.
    pub agent_id: String,
    /// Samples per capture frame handed to the encoder.
    pub capture_frame_samples: usize,
    /// Fallback sample rate when signaling omits audioConfig.
    pub default_sample_rate: u32,
    /// Bound for the mpsc channels between components.
    pub channel_capacity: usize,
    /// Where the binary appends finished call records (one JSON per line).
    pub call_log_path: String,
}

impl Config {
    /// Load defaults, then apply any environment overrides.
    pub fn load() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("VOICE_SIGNALING_URL") {
            config.signaling_url = v;
        }
        if let Ok(v) = std::env::var("VOICE_AGENT_ID") {
            config.agent_id = v;
        }
        if let Ok(v) = std::env::var("VOICE_FRAME_SAMPLES") {
            if let Ok(n) = v.parse() {
                config.capture_frame_samples = n;
            }
        }
        if let Ok(v) = std::env::var("VOICE_SAMPLE_RATE") {
            if let Ok(n) = v.parse() {
                config.default_sample_rate = n;
            }
        }
        if let Ok(v) = std::env::var("VOICE_CALL_LOG_PATH") {
            config.call_log_path = v;
        }
        config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            signaling_url: "https://voice-sip.studio.lyzr.ai/session/start".to_string(),
            agent_id: "voice-outreach".to_string(),
            capture_frame_samples: 4096,
            default_sample_rate: 24000,
            channel_capacity: 100,
            call_log_path: "call_log.jsonl".to_string(),
        }
    }
}
