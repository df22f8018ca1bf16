//! Drives one collection cycle: fetch, derive, dedot, emit.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::Config;
use crate::dedot;
use crate::docker::{self, DockerClient};
use crate::event::{self, Reporter};
use crate::memory::{self, MemoryMetrics};
use crate::stats::StatsSource;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to docker: {0}")]
    Connect(#[source] docker::Error),
    #[error("failed to get docker stats: {0}")]
    Fetch(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("failed to derive memory metrics: {0}")]
    Normalize(#[source] memory::Error),
    #[error("failed to close connection: {0}")]
    Close(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Collects memory metrics for all running containers of one runtime.
///
/// The collector exclusively owns the connection to the runtime. `fetch` takes
/// `&mut self`, so cycles on one collector never overlap, and `close` consumes
/// it, so the connection is released exactly once.
#[derive(Debug)]
pub struct MemoryCollector<S = DockerClient> {
    source: S,
    timeout: Duration,
    dedot: bool,
}

impl MemoryCollector<DockerClient> {
    /// Connects to the runtime configured in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] if the host is not supported or the runtime
    /// cannot be reached.
    pub async fn new(config: &Config) -> Result<Self> {
        let client = DockerClient::connect(&config.host)
            .await
            .map_err(Error::Connect)?;
        Ok(Self::with_source(client, config.timeout, config.dedot))
    }
}

impl<S: StatsSource> MemoryCollector<S> {
    pub fn with_source(source: S, timeout: Duration, dedot: bool) -> Self {
        Self {
            source,
            timeout,
            dedot,
        }
    }

    /// Runs one collection cycle and reports its outcome to `reporter`.
    ///
    /// A failed cycle reports exactly one error and no events.
    pub async fn fetch<R: Reporter>(&mut self, reporter: &mut R) {
        let before = std::time::Instant::now();
        let snapshot = match self.source.fetch_stats(self.timeout).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                let err = Error::Fetch(Box::new(err));
                log::error!("{err}");
                reporter.error(err);
                return;
            }
        };
        let timestamp = unix_millis();

        let records = match memory::derive_all(&snapshot) {
            Ok(records) => records,
            Err(err) => {
                let err = Error::Normalize(err);
                log::error!("{err}");
                reporter.error(err);
                return;
            }
        };
        drop(snapshot);

        let records = records
            .into_iter()
            .map(|metrics| sanitize(metrics, self.dedot))
            .collect();
        let emitted = event::emit(records, timestamp, reporter);
        log::trace!(
            "fetch() emitted {emitted} events in {} milliseconds",
            before.elapsed().as_millis()
        );
    }

    /// Releases the connection to the runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Close`] if the connection did not shut down cleanly.
    pub async fn close(self) -> Result<()> {
        self.source
            .close()
            .await
            .map_err(|err| Error::Close(Box::new(err)))
    }
}

fn sanitize(metrics: MemoryMetrics, enabled: bool) -> MemoryMetrics {
    MemoryMetrics {
        categories: dedot::apply(metrics.categories, enabled),
        labels: dedot::apply(metrics.labels, enabled),
        ..metrics
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(millis)
        .unwrap_or_default()
}

/// Whole milliseconds of `elapsed`, saturating at `u64::MAX`.
fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
