//! Live transcript aggregation.
//!
//! Transcript lines append in arrival order; the "agent is composing"
//! indicator is pure observability and carries no control-flow meaning.

#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    lines: Vec<String>,
    thinking: bool,
}

impl TranscriptAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A finished line arrived: composing is over, non-empty text appends.
    pub fn on_transcript(&mut self, text: &str) {
        self.thinking = false;
        if !text.is_empty() {
            self.lines.push(text.to_string());
        }
    }

    pub fn on_thinking(&mut self) {
        self.thinking = true;
    }

    pub fn on_clear(&mut self) {
        self.thinking = false;
    }

    pub fn thinking(&self) -> bool {
        self.thinking
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Frozen copy, taken when the call ends.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.clone()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.thinking = false;
    }
}
