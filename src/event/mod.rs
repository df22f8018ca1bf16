//! Maps derived [`MemoryMetrics`] onto the events handed to a [`Reporter`].
//!
//! An event serializes as:
//!
//! ```json
//! {
//!   "@timestamp": 1700000000000,
//!   "metricset": {"module": "docker", "name": "memory"},
//!   "container": {"id": "3f4e1c2a9b7d", "name": "web", "labels": {}},
//!   "docker": {
//!     "memory": {
//!       "usage": {"total": 500, "pct": 0.5},
//!       "limit": 1000,
//!       "stats": {"rss": 300, "cache": 200}
//!     }
//!   }
//! }
//! ```
//!
//! Values that are not known for a container (percentages without a limit,
//! cgroup v1 only counters on cgroup v2 hosts) are left out rather than
//! reported as `null` or `0`.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::container::ContainerID;
use crate::memory::MemoryMetrics;

mod reporter;

pub use reporter::{BufferedReporter, Reporter};

pub const MODULE_NAME: &str = "docker";
pub const METRICSET_NAME: &str = "memory";

/// Identifies the metricset that produced an event.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MetricSetInfo {
    pub module: &'static str,
    pub name: &'static str,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ContainerInfo {
    pub id: ContainerID,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// One container's memory metrics for one collection cycle.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Event {
    /// Collection time in milliseconds since the UNIX epoch.
    #[serde(rename = "@timestamp")]
    pub timestamp: u64,
    pub metricset: MetricSetInfo,
    pub container: ContainerInfo,
    /// Metric fields, namespaced below the module name.
    #[serde(rename = "docker")]
    pub fields: Map<String, Value>,
}

impl Event {
    /// Builds the event for a single container.
    pub fn from_metrics(metrics: MemoryMetrics, timestamp: u64) -> Self {
        let mut usage = Map::new();
        usage.insert("total".to_owned(), metrics.usage.into());
        if let Some(pct) = metrics.usage_pct {
            usage.insert("pct".to_owned(), pct.into());
        }
        if let Some(max) = metrics.max_usage {
            usage.insert("max".to_owned(), max.into());
        }

        let mut memory = Map::new();
        memory.insert("usage".to_owned(), Value::Object(usage));
        if let Some(limit) = metrics.limit {
            memory.insert("limit".to_owned(), limit.into());
        }
        if let Some(count) = metrics.fail_count {
            memory.insert("fail".to_owned(), serde_json::json!({ "count": count }));
        }
        if let Some(rss) = metrics.rss {
            let mut fields = Map::new();
            fields.insert("total".to_owned(), rss.total.into());
            if let Some(pct) = rss.pct {
                fields.insert("pct".to_owned(), pct.into());
            }
            memory.insert("rss".to_owned(), Value::Object(fields));
        }
        let stats: Map<String, Value> = metrics
            .categories
            .into_iter()
            .map(|(key, value)| (key, value.into()))
            .collect();
        memory.insert("stats".to_owned(), Value::Object(stats));

        let mut fields = Map::new();
        fields.insert(METRICSET_NAME.to_owned(), Value::Object(memory));

        Self {
            timestamp,
            metricset: MetricSetInfo {
                module: MODULE_NAME,
                name: METRICSET_NAME,
            },
            container: ContainerInfo {
                id: metrics.container_id,
                name: metrics.container_name,
                labels: metrics.labels,
            },
            fields,
        }
    }

    /// Looks up a metric field by its dotted path below the module namespace,
    /// e.g. `memory.usage.pct`.
    ///
    /// Keys that themselves contain a `.` cannot be addressed this way.
    pub fn field(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut value = self.fields.get(parts.next()?)?;
        for part in parts {
            value = value.as_object()?.get(part)?;
        }
        Some(value)
    }
}

/// Emits one event per record, in order, and returns how many the reporter
/// accepted. Stops early if the reporter no longer accepts events.
pub fn emit<R: Reporter>(records: Vec<MemoryMetrics>, timestamp: u64, reporter: &mut R) -> usize {
    let mut emitted = 0;
    for metrics in records {
        let container_id = metrics.container_id.clone();
        if !reporter.event(Event::from_metrics(metrics, timestamp)) {
            log::debug!("reporter closed, dropping remaining events after container `{container_id}`");
            break;
        }
        emitted += 1;
    }
    emitted
}
