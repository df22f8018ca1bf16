//! Subset of the Docker Engine API responses needed for memory metrics.

use std::collections::BTreeMap;

use crate::stats::{RawContainerStats, RawMemoryStats};

/// An entry of `GET /containers/json`.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSummary {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
}

/// Response of `GET /containers/{id}/stats?stream=false`.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct StatsResponse {
    #[serde(default)]
    pub memory_stats: RawMemoryStats,
}

impl ContainerSummary {
    /// The primary container name without the leading `/`.
    pub fn name(&self) -> Option<&str> {
        self.names
            .first()
            .map(|name| name.trim_start_matches('/'))
            .filter(|name| !name.is_empty())
    }

    pub fn into_raw_stats(self, stats: StatsResponse) -> RawContainerStats {
        RawContainerStats {
            name: self.name().map(str::to_owned),
            id: self.id,
            labels: self.labels.unwrap_or_default(),
            memory: stats.memory_stats,
        }
    }
}
