//! Session negotiation against the voice SIP gateway.
//!
//! One-shot request: POST the agent id, get back a live WebSocket endpoint
//! and the audio configuration to run the call at.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::CallError;

/// What a successful negotiation yields.
#[derive(Debug, Clone)]
pub struct SessionDescriptor {
    pub ws_url: String,
    pub sample_rate: u32,
}

/// Boundary to the session-negotiation service.
#[async_trait]
pub trait Signaling: Send + Sync {
    async fn start_session(&self, agent_id: &str) -> Result<SessionDescriptor, CallError>;
}

#[derive(Debug, Deserialize)]
struct StartSessionResponse {
    #[serde(rename = "wsUrl")]
    ws_url: Option<String>,
    #[serde(rename = "audioConfig")]
    audio_config: Option<AudioConfigPayload>,
}

#[derive(Debug, Deserialize)]
struct AudioConfigPayload {
    #[serde(rename = "sampleRate")]
    sample_rate: Option<u32>,
}

/// HTTP signaling client.
pub struct HttpSignaling {
    client: Client,
    endpoint: String,
    default_sample_rate: u32,
}

impl HttpSignaling {
    pub fn new(endpoint: impl Into<String>, default_sample_rate: u32) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            default_sample_rate,
        }
    }
}

#[async_trait]
impl Signaling for HttpSignaling {
    async fn start_session(&self, agent_id: &str) -> Result<SessionDescriptor, CallError> {
        tracing::info!(endpoint = %self.endpoint, agent_id, "starting voice session");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "agentId": agent_id }))
            .send()
            .await
            .map_err(|e| {
                CallError::Signaling(format!("Failed to start voice session: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = if body.is_empty() {
                "Unknown error".to_string()
            } else {
                body
            };
            return Err(CallError::Signaling(format!(
                "Failed to start voice session ({}): {}",
                status.as_u16(),
                detail
            )));
        }

        let payload: StartSessionResponse = response
            .json()
            .await
            .map_err(|e| CallError::Signaling(format!("Invalid signaling response: {}", e)))?;

        let ws_url = payload
            .ws_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| CallError::Signaling("No WebSocket URL returned".to_string()))?;

        let sample_rate = payload
            .audio_config
            .and_then(|c| c.sample_rate)
            .unwrap_or(self.default_sample_rate);

        tracing::info!(%ws_url, sample_rate, "voice session negotiated");
        Ok(SessionDescriptor {
            ws_url,
            sample_rate,
        })
    }
}
