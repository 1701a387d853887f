//! Outreach call record synthesis and handoff.
//!
//! Built exactly once per call that reached `Active`, immutable after
//! construction, then handed to the outreach log collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Classifies the call outcome from the finished transcript.
///
/// Injectable because the shipped heuristic is an acknowledged placeholder,
/// not a dependable measure of how the call went.
pub trait OutcomePolicy: Send + Sync {
    fn classify(&self, transcript: &[String]) -> String;
}

/// Placeholder policy: more than `threshold` transcript lines counts as a
/// real conversation.
pub struct TranscriptLengthPolicy {
    pub threshold: usize,
}

impl Default for TranscriptLengthPolicy {
    fn default() -> Self {
        Self { threshold: 2 }
    }
}

impl OutcomePolicy for TranscriptLengthPolicy {
    fn classify(&self, transcript: &[String]) -> String {
        if transcript.len() > self.threshold {
            "Connected".to_string()
        } else {
            "Short Call".to_string()
        }
    }
}

/// The structured record handed to the outreach log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallLogRecord {
    pub id: String,
    pub lead_name: String,
    /// Elapsed call time as "m:ss".
    pub call_duration: String,
    pub outcome: String,
    pub interest_level: String,
    pub objections_raised: String,
    pub next_steps: String,
    pub demo_requested: String,
    pub notes: String,
    pub transcript: Vec<String>,
    /// ISO-8601 creation time.
    pub timestamp: String,
}

/// Render elapsed seconds as "m:ss".
pub fn format_duration(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

pub struct CallLogBuilder;

impl CallLogBuilder {
    /// Synthesize the record for one finished call.
    ///
    /// Fields not derivable from the session carry fixed placeholder
    /// values until a post-call analysis step exists to fill them.
    pub fn build(
        lead_name: &str,
        duration_secs: u64,
        transcript: Vec<String>,
        policy: &dyn OutcomePolicy,
    ) -> CallLogRecord {
        CallLogRecord {
            id: Uuid::new_v4().to_string(),
            lead_name: lead_name.to_string(),
            call_duration: format_duration(duration_secs),
            outcome: policy.classify(&transcript),
            interest_level: "Unknown".to_string(),
            objections_raised: "N/A".to_string(),
            next_steps: "Review transcript".to_string(),
            demo_requested: "Unknown".to_string(),
            notes: "AI voice call completed".to_string(),
            transcript,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// External outreach-log collaborator boundary.
#[async_trait]
pub trait OutreachLog: Send + Sync {
    async fn record(&self, record: CallLogRecord);
}

/// In-memory sink; the default when no persistent log is wired up.
#[derive(Default)]
pub struct MemoryOutreachLog {
    records: Mutex<Vec<CallLogRecord>>,
}

impl MemoryOutreachLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<CallLogRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl OutreachLog for MemoryOutreachLog {
    async fn record(&self, record: CallLogRecord) {
        self.records.lock().await.push(record);
    }
}

/// File sink: appends one JSON object per line.
pub struct JsonlOutreachLog {
    path: String,
}

impl JsonlOutreachLog {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl OutreachLog for JsonlOutreachLog {
    async fn record(&self, record: CallLogRecord) {
        let Ok(mut line) = serde_json::to_string(&record) else {
            return;
        };
        line.push('\n');
        let result = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await;
        match result {
            Ok(mut file) => {
                if let Err(e) = file.write_all(line.as_bytes()).await {
                    tracing::error!(error = %e, path = %self.path, "failed to append call record");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, path = %self.path, "failed to open call log");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_formats_minutes_and_seconds() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(9), "0:09");
        assert_eq!(format_duration(65), "1:05");
        assert_eq!(format_duration(600), "10:00");
    }

    #[test]
    fn three_lines_classify_as_connected() {
        let transcript = vec![
            "hello".to_string(),
            "how can I help".to_string(),
            "yes I am interested".to_string(),
        ];
        let record = CallLogBuilder::build(
            "Dr. Martinez",
            83,
            transcript,
            &TranscriptLengthPolicy::default(),
        );
        assert_eq!(record.outcome, "Connected");
        assert_eq!(record.call_duration, "1:23");
        assert_eq!(record.transcript.len(), 3);
    }

    #[test]
    fn one_line_classifies_as_short_call() {
        let record = CallLogBuilder::build(
            "Dr. Chen",
            4,
            vec!["hi".to_string()],
            &TranscriptLengthPolicy::default(),
        );
        assert_eq!(record.outcome, "Short Call");
        assert_eq!(record.interest_level, "Unknown");
        assert_eq!(record.objections_raised, "N/A");
        assert_eq!(record.next_steps, "Review transcript");
        assert_eq!(record.demo_requested, "Unknown");
    }

    #[test]
    fn custom_policy_is_honored() {
        struct Always;
        impl OutcomePolicy for Always {
            fn classify(&self, _: &[String]) -> String {
                "Voicemail".to_string()
            }
        }
        let record = CallLogBuilder::build("x", 1, vec![], &Always);
        assert_eq!(record.outcome, "Voicemail");
    }

    #[tokio::test]
    async fn memory_log_accumulates_records() {
        let log = MemoryOutreachLog::new();
        let record =
            CallLogBuilder::build("x", 1, vec![], &TranscriptLengthPolicy::default());
        log.record(record).await;
        assert_eq!(log.records().await.len(), 1);
    }
}
