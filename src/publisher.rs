use std::io::Write;

use tokio::sync::mpsc::Receiver;

use crate::error::ResultOkLogExt;
use crate::event::Event;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to serialize event: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to write events: {0}")]
    Write(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Destination for the events of a collection cycle.
pub trait EventPublisher {
    fn publish(&mut self, events: &[Event]) -> Result<()>;
}

/// Writes every event as one line of JSON.
#[derive(Debug)]
pub struct JsonLinesPublisher<W> {
    writer: W,
}

impl<W: Write> JsonLinesPublisher<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> EventPublisher for JsonLinesPublisher<W> {
    /// Writes all events of a cycle and flushes the writer once at the end.
    fn publish(&mut self, events: &[Event]) -> Result<()> {
        for event in events {
            serde_json::to_writer(&mut self.writer, event).map_err(|err| {
                if err.is_io() {
                    Error::Write(err.into())
                } else {
                    Error::Serialize(err)
                }
            })?;
            self.writer.write_all(b"\n").map_err(Error::Write)?;
        }
        self.writer.flush().map_err(Error::Write)
    }
}

/// Publishes every batch received on `rx` until the channel is closed or the
/// output can no longer be written. Must be called from a blocking thread.
///
/// Serialization errors only drop the affected batch. A write error drops the
/// receiver, so the sending side notices that publishing stopped.
///
/// # Errors
///
/// Returns the [`Error::Write`] that ended publishing.
pub fn publish_all<P: EventPublisher>(
    publisher: &mut P,
    mut rx: Receiver<Vec<Event>>,
) -> Result<()> {
    while let Some(events) = rx.blocking_recv() {
        match publisher.publish(&events) {
            Err(err @ Error::Write(_)) => return Err(err),
            result => result.ok_log(),
        };
    }
    Ok(())
}
