use std::sync::Arc;

use tokio::signal;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use voice_outreach_rs::audio::{MonitorPlaybackEngine, ToneCaptureDevice};
use voice_outreach_rs::call_log::{JsonlOutreachLog, TranscriptLengthPolicy};
use voice_outreach_rs::config::Config;
use voice_outreach_rs::controller::{CallSessionController, CallState};
use voice_outreach_rs::signaling::HttpSignaling;
use voice_outreach_rs::transport::TransportEvent;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load();
    let lead_name = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Unknown Lead".to_string());

    // Channels feeding the session event loop.
    let (event_tx, mut event_rx) = mpsc::channel::<TransportEvent>(config.channel_capacity);
    let (tick_tx, mut tick_rx) = mpsc::channel::<()>(config.channel_capacity);

    let signaling = Arc::new(HttpSignaling::new(
        config.signaling_url.clone(),
        config.default_sample_rate,
    ));
    let mut session = CallSessionController::new(
        config.clone(),
        signaling,
        Arc::new(ToneCaptureDevice::default()),
        Arc::new(MonitorPlaybackEngine::new()),
        Arc::new(JsonlOutreachLog::new(config.call_log_path.clone())),
        Arc::new(TranscriptLengthPolicy::default()),
        event_tx,
        tick_tx,
    );

    tracing::info!(lead = %lead_name, agent = %config.agent_id, "dialing");
    if let Err(e) = session.start(&lead_name).await {
        tracing::error!(error = %e, "call did not start");
        anyhow::bail!("{}", e);
    }

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                tracing::info!("hanging up");
                session.end().await;
                break;
            }
            Some(event) = event_rx.recv() => {
                session.handle_transport_event(event).await;
                if session.state() == CallState::Ended {
                    break;
                }
            }
            Some(()) = tick_rx.recv() => {
                session.handle_tick();
            }
        }
    }

    if let Some(message) = session.error_message() {
        tracing::warn!(%message, "call finished with error");
    }
    for line in session.transcript_lines() {
        println!("{}", line);
    }
    Ok(())
}
