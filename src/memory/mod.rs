//! Derives the memory metrics model from raw runtime statistics.
//!
//! Everything here is pure: the same [`RawContainerStats`] always yields the
//! same [`MemoryMetrics`].
//!
//! # Percentages
//!
//! Usage and RSS percentages are computed against the configured limit. A limit
//! that is absent or reported as zero means no limit is configured, in which case
//! the percentage is left out instead of being reported as `0` or infinity.
//! Percentages are not clamped: the kernel may briefly account more than the
//! limit, so values above `1.0` are valid.
//!
//! # Examples
//!
//! ```rust
//! use docker_memory_monitor::memory;
//! use docker_memory_monitor::stats::{RawContainerStats, RawMemoryStats};
//!
//! let raw = RawContainerStats {
//!     id: "c1".to_owned(),
//!     memory: RawMemoryStats {
//!         usage: 500,
//!         limit: Some(1000),
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! };
//! let metrics = memory::derive(&raw).unwrap();
//! assert_eq!(metrics.usage_pct, Some(0.5));
//! ```

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::container::ContainerID;
use crate::stats::RawContainerStats;

mod error;

pub use error::{Error, Result};

/// `memory.stat` key holding the resident set size on cgroup v1 hosts.
const RSS_KEY_V1: &str = "total_rss";
/// `memory.stat` key holding anonymous memory on cgroup v2 hosts.
const RSS_KEY_V2: &str = "anon";

/// Memory metrics of a single container for one collection cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryMetrics {
    pub container_id: ContainerID,
    pub container_name: Option<String>,
    pub labels: BTreeMap<String, String>,
    /// Current usage in bytes.
    pub usage: u64,
    /// Peak usage in bytes, if the runtime tracks it.
    pub max_usage: Option<u64>,
    /// Limit in bytes as reported by the runtime.
    pub limit: Option<u64>,
    /// `usage / limit`, omitted if there is no limit.
    pub usage_pct: Option<f64>,
    pub fail_count: Option<u64>,
    pub rss: Option<Rss>,
    /// Breakdown by accounting category, keys exactly as reported.
    pub categories: IndexMap<String, u64>,
}

/// Resident set size of a container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rss {
    pub total: u64,
    /// `total / limit`, omitted if there is no limit.
    pub pct: Option<f64>,
}

/// Derives [`MemoryMetrics`] from one container's raw statistics.
///
/// # Errors
///
/// Returns [`Error::Container`] if the raw record does not carry a valid
/// container id.
pub fn derive(raw: &RawContainerStats) -> Result<MemoryMetrics> {
    let container_id = ContainerID::new(&raw.id)?;
    let memory = &raw.memory;

    let usage_pct = ratio(memory.usage, memory.limit);
    let rss = memory
        .stats
        .get(RSS_KEY_V1)
        .or_else(|| memory.stats.get(RSS_KEY_V2))
        .map(|&total| Rss {
            total,
            pct: ratio(total, memory.limit),
        });

    Ok(MemoryMetrics {
        container_id,
        container_name: raw.name.clone(),
        labels: raw.labels.clone(),
        usage: memory.usage,
        max_usage: memory.max_usage,
        limit: memory.limit,
        usage_pct,
        fail_count: memory.failcnt,
        rss,
        categories: memory.stats.clone(),
    })
}

/// Derives [`MemoryMetrics`] for every record of a snapshot, preserving order.
///
/// # Errors
///
/// Fails on the first record without a valid container id, reporting its
/// position in the snapshot.
pub fn derive_all(snapshot: &[RawContainerStats]) -> Result<Vec<MemoryMetrics>> {
    snapshot
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            derive(raw).map_err(|err| match err {
                Error::Container(source) => Error::Record { index, source },
                err => err,
            })
        })
        .collect()
}

fn ratio(value: u64, limit: Option<u64>) -> Option<f64> {
    match limit {
        Some(limit) if limit > 0 => Some(value as f64 / limit as f64),
        _ => None,
    }
}
