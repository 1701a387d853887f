//! Wire messages exchanged with the voice agent over the transport channel.
//!
//! Outbound: JSON `{"type":"audio","audio":<base64 PCM16>,"sampleRate":N}`.
//! Inbound: JSON objects discriminated by `type`; unrecognized types are
//! ignored without error so the channel stays usable across protocol drift.

use serde::{Deserialize, Serialize};

use crate::error::CallError;

/// Outbound microphone frame.
#[derive(Serialize)]
struct OutboundAudio<'a> {
    #[serde(rename = "type")]
    msg_type: &'static str,
    audio: &'a str,
    #[serde(rename = "sampleRate")]
    sample_rate: u32,
}

/// Serialize one encoded capture frame into its outbound message text.
pub fn audio_message(encoded: &str, sample_rate: u32) -> String {
    // Serialization of this struct cannot fail.
    serde_json::to_string(&OutboundAudio {
        msg_type: "audio",
        audio: encoded,
        sample_rate,
    })
    .unwrap_or_default()
}

/// Raw inbound message as it appears on the wire.
#[derive(Debug, Deserialize)]
struct RawInbound {
    #[serde(rename = "type")]
    msg_type: String,
    audio: Option<String>,
    text: Option<String>,
    transcript: Option<String>,
    message: Option<String>,
}

/// Parsed inbound event. Immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Base64-encoded PCM16 frame, still in wire form.
    Audio(String),
    /// A finished transcript line (agent or caller).
    Transcript(String),
    /// The agent started composing a response.
    Thinking,
    /// Clear the composing indicator.
    Clear,
    /// Agent-side error surfaced over the channel.
    Error(String),
    /// Recognized JSON with an unknown or incomplete `type`; dropped.
    Ignored,
}

/// Parse one inbound message.
///
/// Returns `CallError::Protocol` only when the text is not valid JSON at
/// all; a known shape with an unexpected `type` parses to `Ignored`.
pub fn parse_inbound(text: &str) -> Result<InboundEvent, CallError> {
    let raw: RawInbound =
        serde_json::from_str(text).map_err(|e| CallError::Protocol(e.to_string()))?;

    let event = match raw.msg_type.as_str() {
        "audio" => match raw.audio {
            Some(audio) => InboundEvent::Audio(audio),
            None => InboundEvent::Ignored,
        },
        "transcript" => {
            // Servers have shipped both field names for the line text.
            InboundEvent::Transcript(raw.text.or(raw.transcript).unwrap_or_default())
        }
        "thinking" => InboundEvent::Thinking,
        "clear" => InboundEvent::Clear,
        "error" => InboundEvent::Error(raw.message.unwrap_or_else(|| "Voice error".to_string())),
        _ => InboundEvent::Ignored,
    };
    Ok(event)
}
