//! Carbon copy of the operator dialogue for the loaded shipment.
//!
//! While an order is loaded every line shown to the operator (prompts,
//! confirmations, errors, reports) is also appended here, in display order.
//! On finalize the transcript becomes the audit record verbatim.

use crate::ports::Feedback;

/// Append-only operator log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    lines: Vec<String>,
    active: bool,
}

impl Transcript {
    /// Starts recording, discarding anything from a previous shipment.
    pub fn start(&mut self) {
        self.lines.clear();
        self.active = true;
    }

    /// Stops recording and drops the collected lines.
    pub fn stop(&mut self) {
        self.lines.clear();
        self.active = false;
    }

    /// Records a line if a shipment is loaded. Multi-line text is split so
    /// the record stays one entry per printed line.
    pub fn record(&mut self, text: &str) {
        if self.active {
            self.lines.extend(text.lines().map(str::to_owned));
        }
    }

    /// Shows `text` to the operator and records it.
    pub fn echo(&mut self, feedback: &mut dyn Feedback, text: &str) {
        self.record(text);
        feedback.line(text);
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingFeedback;

    #[test]
    fn test_echo_shows_and_records() {
        let mut feedback = RecordingFeedback::new();
        let mut t = Transcript::default();
        t.start();
        t.echo(&mut feedback, "Carrier POSTE");
        assert_eq!(t.lines(), ["Carrier POSTE"]);
        assert_eq!(feedback.lines(), vec!["Carrier POSTE".to_string()]);
    }

    #[test]
    fn test_records_only_while_active() {
        let mut t = Transcript::default();
        t.record("ignored");
        assert!(t.is_empty());

        t.start();
        t.record("first");
        t.record("second\nthird");
        assert_eq!(t.lines(), ["first", "second", "third"]);

        t.stop();
        assert!(t.is_empty());
        assert!(!t.is_active());
    }

    #[test]
    fn test_start_discards_previous_shipment() {
        let mut t = Transcript::default();
        t.start();
        t.record("old");
        t.start();
        assert!(t.is_empty());
    }
}
