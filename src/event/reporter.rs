use crate::collector;

use super::Event;

/// Sink for the outcome of one collection cycle.
///
/// A cycle reports either any number of events or exactly one error, never both.
pub trait Reporter {
    /// Hands an event over to the sink.
    ///
    /// Returns `false` if the sink no longer accepts events.
    fn event(&mut self, event: Event) -> bool;

    /// Reports that the cycle failed.
    fn error(&mut self, err: collector::Error);
}

/// A [`Reporter`] that buffers a single cycle's outcome in memory.
#[derive(Debug, Default)]
pub struct BufferedReporter {
    events: Vec<Event>,
    error: Option<collector::Error>,
}

impl BufferedReporter {
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn reported_error(&self) -> Option<&collector::Error> {
        self.error.as_ref()
    }

    /// Returns the buffered events, or the reported error if the cycle failed.
    pub fn into_result(self) -> Result<Vec<Event>, collector::Error> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.events),
        }
    }
}

impl Reporter for BufferedReporter {
    fn event(&mut self, event: Event) -> bool {
        if self.error.is_some() {
            return false;
        }
        self.events.push(event);
        true
    }

    fn error(&mut self, err: collector::Error) {
        debug_assert!(self.error.is_none(), "cycle reported more than one error");
        self.events.clear();
        self.error = Some(err);
    }
}
