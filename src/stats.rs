//! Raw per-container statistics as delivered by the container runtime, and the
//! [`StatsSource`] trait through which they are acquired.
//!
//! The memory block mirrors the `memory_stats` object of the Docker Engine API.
//! Which entries appear in [`RawMemoryStats::stats`] depends on the runtime and
//! the cgroup version of the host (`total_rss` and `cache` on cgroup v1, `anon`
//! and `file` on cgroup v2, nothing at all on Windows), so it is kept as an open
//! mapping in the order the runtime reported it.

use std::collections::BTreeMap;
use std::time::Duration;

use indexmap::IndexMap;

/// Memory accounting for a single container.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Deserialize)]
pub struct RawMemoryStats {
    /// Current usage in bytes.
    #[serde(default)]
    pub usage: u64,
    /// Peak usage in bytes (cgroup v1 only).
    #[serde(default)]
    pub max_usage: Option<u64>,
    /// Limit in bytes. `None` or `Some(0)` means no limit is configured.
    #[serde(default)]
    pub limit: Option<u64>,
    /// Number of times the limit was hit (cgroup v1 only).
    #[serde(default)]
    pub failcnt: Option<u64>,
    /// Runtime-defined breakdown of the usage by accounting category.
    #[serde(default)]
    pub stats: IndexMap<String, u64>,
}

/// One container's statistics snapshot for a single collection cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawContainerStats {
    /// Container id exactly as reported by the runtime.
    pub id: String,
    pub name: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub memory: RawMemoryStats,
}

/// A source of per-container statistics snapshots.
///
/// Implementations own their connection to the runtime. [`StatsSource::close`]
/// consumes the source so the connection is released exactly once.
pub trait StatsSource: Sized {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetches one snapshot for every running container.
    ///
    /// Implementations must give up once `timeout` has elapsed.
    fn fetch_stats(
        &mut self,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<RawContainerStats>, Self::Error>> + Send;

    /// Releases the connection to the runtime.
    fn close(self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
