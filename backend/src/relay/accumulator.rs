//! Response accumulation for the persistence branch

use crate::relay::events::StreamEvent;

/// Everything the background branch keeps from a response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseAccumulator {
    text: String,
    title: Option<String>,
}

impl ResponseAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one event
    pub fn observe(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::TextDelta { delta, .. } => self.text.push_str(delta),
            StreamEvent::Title { data } => self.title = Some(data.title.clone()),
            _ => {}
        }
    }

    /// Split into all deltas in arrival order and the last suggested title
    pub fn into_parts(self) -> (String, Option<String>) {
        (self.text, self.title)
    }
}
