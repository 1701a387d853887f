//! The call session state machine and resource owner.
//!
//! Owns every mutable piece of session state and all acquired resources
//! (transport, capture task, playback path, duration ticker). Driven from
//! a single event loop: transport events and ticker events arrive over mpsc
//! channels, so the two concurrent producers (capture task, transport
//! reader) never mutate session state themselves.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::audio::capture::{CaptureDevice, CaptureEncoder, spawn_capture};
use crate::audio::playback::{PlaybackEngine, PlaybackScheduler};
use crate::call_log::{CallLogBuilder, OutcomePolicy, OutreachLog};
use crate::config::Config;
use crate::error::CallError;
use crate::protocol::{self, InboundEvent};
use crate::signaling::Signaling;
use crate::transcript::TranscriptAggregator;
use crate::transport::{CallTransport, TransportCommand, TransportEvent};

/// Session lifecycle. Transitions are monotonic within one call:
/// Idle → Connecting → Active → Ended → (reset) → Idle, with
/// Connecting → Idle on any start failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    Connecting,
    Active,
    Ended,
}

struct TickerHandle {
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

pub struct CallSessionController {
    config: Config,
    signaling: Arc<dyn Signaling>,
    device: Arc<dyn CaptureDevice>,
    engine: Arc<dyn PlaybackEngine>,
    outreach_log: Arc<dyn OutreachLog>,
    outcome: Arc<dyn OutcomePolicy>,
    transport_events: mpsc::Sender<TransportEvent>,
    ticks: mpsc::Sender<()>,

    state: CallState,
    muted: Arc<AtomicBool>,
    link_open: Arc<AtomicBool>,
    sample_rate: u32,
    lead_name: String,
    transcript: TranscriptAggregator,
    scheduler: Option<PlaybackScheduler>,
    duration_secs: u64,
    error_message: Option<String>,
    started_at: Option<Instant>,

    transport: Option<CallTransport>,
    capture_stop: Option<Arc<AtomicBool>>,
    capture_task: Option<JoinHandle<()>>,
    ticker: Option<TickerHandle>,
    logged: bool,
}

impl CallSessionController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        signaling: Arc<dyn Signaling>,
        device: Arc<dyn CaptureDevice>,
        engine: Arc<dyn PlaybackEngine>,
        outreach_log: Arc<dyn OutreachLog>,
        outcome: Arc<dyn OutcomePolicy>,
        transport_events: mpsc::Sender<TransportEvent>,
        ticks: mpsc::Sender<()>,
    ) -> Self {
        let sample_rate = config.default_sample_rate;
        Self {
            config,
            signaling,
            device,
            engine,
            outreach_log,
            outcome,
            transport_events,
            ticks,
            state: CallState::Idle,
            muted: Arc::new(AtomicBool::new(false)),
            link_open: Arc::new(AtomicBool::new(false)),
            sample_rate,
            lead_name: String::new(),
            transcript: TranscriptAggregator::new(),
            scheduler: None,
            duration_secs: 0,
            error_message: None,
            started_at: None,
            transport: None,
            capture_stop: None,
            capture_task: None,
            ticker: None,
            logged: false,
        }
    }

    /// Negotiate, acquire the capture device, open the transport, and go
    /// active. Any failure tears down whatever was acquired, records the
    /// message, and returns the session to `Idle` — never stuck in
    /// `Connecting`.
    pub async fn start(&mut self, lead_name: &str) -> Result<(), CallError> {
        if self.state != CallState::Idle {
            tracing::warn!(state = ?self.state, "start ignored: session already in progress");
            return Ok(());
        }

        self.state = CallState::Connecting;
        self.error_message = None;
        self.transcript.clear();
        self.duration_secs = 0;
        self.lead_name = lead_name.to_string();
        self.muted.store(false, Ordering::Relaxed);
        self.started_at = None;
        self.logged = false;

        let descriptor = match self.signaling.start_session(&self.config.agent_id).await {
            Ok(d) => d,
            Err(e) => return self.fail_connect(e),
        };
        self.sample_rate = descriptor.sample_rate;

        let source = match self
            .device
            .open(self.sample_rate, self.config.capture_frame_samples)
            .await
        {
            Ok(s) => s,
            Err(e) => return self.fail_connect(e),
        };

        let transport = match CallTransport::connect(
            &descriptor.ws_url,
            self.transport_events.clone(),
            self.config.channel_capacity,
        )
        .await
        {
            Ok(t) => t,
            Err(e) => {
                // Capture source never started pumping; dropping it
                // releases the device.
                drop(source);
                return self.fail_connect(e);
            }
        };

        // Transport handshake completed: confirmed open.
        self.link_open.store(true, Ordering::Relaxed);
        let encoder = CaptureEncoder::new(
            self.muted.clone(),
            self.link_open.clone(),
            self.sample_rate,
        );
        let stop = Arc::new(AtomicBool::new(false));
        self.capture_task = Some(spawn_capture(
            source,
            encoder,
            transport.commands.clone(),
            stop.clone(),
        ));
        self.capture_stop = Some(stop);
        self.transport = Some(transport);
        self.scheduler = Some(PlaybackScheduler::new(self.engine.clone(), self.sample_rate));
        self.ticker = Some(self.spawn_ticker());
        self.started_at = Some(Instant::now());
        self.state = CallState::Active;

        tracing::info!(lead = %self.lead_name, sample_rate = self.sample_rate, "call active");
        Ok(())
    }

    fn fail_connect(&mut self, error: CallError) -> Result<(), CallError> {
        tracing::warn!(error = %error, "failed to start call");
        self.error_message = Some(error.to_string());
        self.state = CallState::Idle;
        Err(error)
    }

    /// Flip the mute flag. No state transition; the capture task sees the
    /// new value on its very next frame.
    pub fn toggle_mute(&mut self) -> bool {
        let now_muted = !self.muted.load(Ordering::Relaxed);
        self.muted.store(now_muted, Ordering::Relaxed);
        tracing::info!(muted = now_muted, "mute toggled");
        now_muted
    }

    /// One event from the transport reader. No-ops unless `Active`, so
    /// late messages after teardown are harmless.
    pub async fn handle_transport_event(&mut self, event: TransportEvent) {
        if self.state != CallState::Active {
            return;
        }
        match event {
            TransportEvent::Message(text) => self.dispatch_inbound(&text),
            TransportEvent::Closed => self.finish_call(None).await,
            TransportEvent::Failed(message) => self.finish_call(Some(message)).await,
        }
    }

    fn dispatch_inbound(&mut self, text: &str) {
        let event = match protocol::parse_inbound(text) {
            Ok(event) => event,
            Err(e) => {
                // One bad message never kills the call.
                tracing::warn!(error = %e, "dropping inbound message");
                return;
            }
        };
        match event {
            InboundEvent::Audio(encoded) => {
                if let Some(scheduler) = self.scheduler.as_mut() {
                    if let Err(e) = scheduler.handle_audio(&encoded) {
                        tracing::warn!(error = %e, "dropping inbound audio frame");
                    }
                }
            }
            InboundEvent::Transcript(line) => self.transcript.on_transcript(&line),
            InboundEvent::Thinking => self.transcript.on_thinking(),
            InboundEvent::Clear => self.transcript.on_clear(),
            InboundEvent::Error(message) => {
                tracing::warn!(%message, "agent reported an error");
                self.error_message = Some(message);
            }
            InboundEvent::Ignored => {}
        }
    }

    /// One second of call time, delivered by the ticker task.
    pub fn handle_tick(&mut self) {
        if self.state == CallState::Active {
            self.duration_secs += 1;
        }
    }

    /// End the call: full teardown, then emit the call record (once).
    pub async fn end(&mut self) {
        if self.state == CallState::Idle {
            return;
        }
        self.finish_call(None).await;
    }

    /// Dialog dismissal: same teardown as `end()`, then back to `Idle`.
    pub async fn close(&mut self) {
        if matches!(self.state, CallState::Connecting | CallState::Active) {
            self.finish_call(None).await;
        }
        self.reset();
    }

    /// Ended → Idle, clearing per-call state for the next dial.
    pub fn reset(&mut self) {
        if matches!(self.state, CallState::Ended | CallState::Idle) {
            self.state = CallState::Idle;
            self.transcript.clear();
            self.duration_secs = 0;
            self.error_message = None;
            self.started_at = None;
        }
    }

    async fn finish_call(&mut self, failure: Option<String>) {
        let reached_active = self.started_at.is_some();
        if let Some(message) = failure {
            self.error_message = Some(message);
        }
        self.teardown();
        self.state = CallState::Ended;

        // One record per completed call; connect failures never produced
        // a call, so nothing is logged for them.
        if reached_active && !self.logged {
            self.logged = true;
            let record = CallLogBuilder::build(
                &self.lead_name,
                self.duration_secs,
                self.transcript.snapshot(),
                self.outcome.as_ref(),
            );
            tracing::info!(
                outcome = %record.outcome,
                duration = %record.call_duration,
                lines = record.transcript.len(),
                "call ended"
            );
            self.outreach_log.record(record).await;
        }
    }

    /// Release resources in a fixed order: transport, capture, processing
    /// path, output engine, timer. Every release is guarded on its own so
    /// a failure in one cannot block the rest, and every handle is taken
    /// out of its slot so running this twice is a no-op.
    fn teardown(&mut self) {
        self.link_open.store(false, Ordering::Relaxed);

        if let Some(transport) = self.transport.take() {
            let _ = transport.commands.try_send(TransportCommand::Close);
            transport.task.abort();
        }
        if let Some(stop) = self.capture_stop.take() {
            stop.store(true, Ordering::Relaxed);
        }
        if let Some(task) = self.capture_task.take() {
            // Dropping the task drops the capture source with it.
            task.abort();
        }
        self.scheduler = None;
        self.engine.close();
        if let Some(ticker) = self.ticker.take() {
            // Flag first: the task checks it before every send, so no
            // tick can fire after this point even if abort races.
            ticker.cancelled.store(true, Ordering::Relaxed);
            ticker.task.abort();
        }
    }

    fn spawn_ticker(&self) -> TickerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let ticks = self.ticks.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // First tick completes immediately; consume it.
            interval.tick().await;
            loop {
                interval.tick().await;
                if flag.load(Ordering::Relaxed) {
                    break;
                }
                if ticks.send(()).await.is_err() {
                    break;
                }
            }
        });
        TickerHandle { cancelled, task }
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub fn transcript_lines(&self) -> &[String] {
        self.transcript.lines()
    }

    pub fn thinking(&self) -> bool {
        self.transcript.thinking()
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
