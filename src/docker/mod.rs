//! Docker Engine API client used as the [`StatsSource`] of the collector.
//!
//! The client talks HTTP/1.1 to the daemon over its Unix socket. Container
//! listing goes over one connection that is kept open across collection cycles
//! and re-established if the daemon closes it (e.g. after a restart).
//!
//! Stats are sampled concurrently, each request on its own short-lived
//! connection, so one cycle takes about as long as the slowest container.
//!
//! # Endpoints
//!
//! - `GET /containers/json` lists the running containers.
//! - `GET /containers/{id}/stats?stream=false&one-shot=true` returns one stats
//!   sample without waiting for a second sample to compute CPU deltas.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::task::JoinSet;

use crate::error::ResultOkLogExt;
use crate::stats::{RawContainerStats, StatsSource};

mod connection;
mod error;
mod models;

use connection::Connection;
pub use error::{Error, Result};
pub use models::{ContainerSummary, StatsResponse};

const UNIX_SCHEME: &str = "unix://";

/// Client for a Docker daemon listening on a Unix socket.
#[derive(Debug)]
pub struct DockerClient {
    socket_path: PathBuf,
    connection: Option<Connection>,
}

impl DockerClient {
    /// Connects to the daemon at `host`, e.g. `unix:///var/run/docker.sock`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedHost`] for anything but a `unix://` host, and a
    /// connection error if the socket cannot be reached.
    pub async fn connect(host: &str) -> Result<Self> {
        let socket_path = socket_path(host)?;
        let connection = Connection::open(&socket_path).await?;
        Ok(Self {
            socket_path,
            connection: Some(connection),
        })
    }

    /// Lists all running containers.
    pub async fn list_containers(&mut self) -> Result<Vec<ContainerSummary>> {
        self.connection()
            .await?
            .get_json("/containers/json")
            .await
    }

    /// Fetches a single stats sample for the container `id`.
    pub async fn container_stats(&mut self, id: &str) -> Result<StatsResponse> {
        self.connection().await?.get_json(&stats_path(id)).await
    }

    /// Samples all running containers concurrently. Containers that are gone
    /// by the time they are sampled are skipped, any other failure fails the
    /// whole cycle. Results keep the order of the listing.
    async fn collect_stats(&mut self) -> Result<Vec<RawContainerStats>> {
        let containers = self.list_containers().await?;
        log::trace!("Found {} running containers", containers.len());

        // Dropping the set aborts requests that are still running.
        let mut requests = JoinSet::new();
        for (index, container) in containers.iter().enumerate() {
            let socket_path = self.socket_path.clone();
            let path = stats_path(&container.id);
            requests.spawn(async move {
                let stats = get_json_once::<StatsResponse>(&socket_path, &path).await;
                (index, stats)
            });
        }

        let mut samples: Vec<Option<StatsResponse>> =
            std::iter::repeat_with(|| None).take(containers.len()).collect();
        while let Some(joined) = requests.join_next().await {
            let (index, result) = joined.map_err(Error::ConnectionTask)?;
            match result {
                Ok(stats) => samples[index] = Some(stats),
                Err(err) if err.is_not_found() => {
                    log::warn!(
                        "skipping container `{}` that is gone: {}",
                        containers[index].id,
                        err
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Ok(containers
            .into_iter()
            .zip(samples)
            .filter_map(|(container, stats)| stats.map(|stats| container.into_raw_stats(stats)))
            .collect())
    }

    async fn connection(&mut self) -> Result<&mut Connection> {
        let connection = match self.connection.take() {
            Some(connection) if !connection.is_closed() => connection,
            stale => {
                if let Some(stale) = stale {
                    log::debug!(
                        "Connection to {} was closed, reconnecting",
                        self.socket_path.display()
                    );
                    stale.close().await.ok_log();
                }
                Connection::open(&self.socket_path).await?
            }
        };

        Ok(self.connection.insert(connection))
    }
}

impl StatsSource for DockerClient {
    type Error = Error;

    async fn fetch_stats(&mut self, timeout: Duration) -> Result<Vec<RawContainerStats>> {
        match tokio::time::timeout(timeout, self.collect_stats()).await {
            Ok(result) => result,
            Err(_) => {
                // A request may be in flight; the connection cannot be reused.
                if let Some(connection) = self.connection.take() {
                    connection.abort();
                }
                Err(Error::Timeout(timeout))
            }
        }
    }

    async fn close(mut self) -> Result<()> {
        log::debug!("Closing connection to {}", self.socket_path.display());
        match self.connection.take() {
            Some(connection) => connection.close().await,
            None => Ok(()),
        }
    }
}

fn stats_path(id: &str) -> String {
    format!("/containers/{id}/stats?stream=false&one-shot=true")
}

/// Sends a single request on a connection of its own.
async fn get_json_once<T: DeserializeOwned>(socket_path: &Path, path: &str) -> Result<T> {
    let mut connection = Connection::open(socket_path).await?;
    let result = connection.get_json(path).await;
    connection.close().await.ok_log();
    result
}

/// Extracts the socket path from a `unix://` host.
fn socket_path(host: &str) -> Result<PathBuf> {
    match host.strip_prefix(UNIX_SCHEME) {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Err(Error::UnsupportedHost(host.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{UnixListener, UnixStream};

    use super::*;

    /// How the fake daemon answers besides its routing table.
    #[derive(Debug, Clone, Copy, Default)]
    struct Behavior {
        /// Delay before answering a stats request.
        stats_delay: Duration,
        /// Close the connection after every response.
        close_after_response: bool,
    }

    /// Minimal stand-in for the Docker daemon: answers `GET` requests from a
    /// fixed routing table. Requests to unknown paths are never answered.
    struct FakeEngine {
        _dir: tempfile::TempDir,
        host: String,
        connections: Arc<AtomicUsize>,
    }

    impl FakeEngine {
        fn start(routes: &[(&str, u16, &str)]) -> Self {
            Self::with_behavior(routes, Behavior::default())
        }

        fn with_behavior(routes: &[(&str, u16, &str)], behavior: Behavior) -> Self {
            let dir = tempfile::tempdir().expect("failed to create temp dir");
            let path = dir.path().join("docker.sock");
            let listener = UnixListener::bind(&path).expect("failed to bind socket");
            let routes: Arc<HashMap<String, (u16, String)>> = Arc::new(
                routes
                    .iter()
                    .map(|(path, status, body)| (path.to_string(), (*status, body.to_string())))
                    .collect(),
            );
            let connections = Arc::new(AtomicUsize::new(0));
            let accepted = Arc::clone(&connections);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    accepted.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve(stream, Arc::clone(&routes), behavior));
                }
            });

            Self {
                host: format!("unix://{}", path.display()),
                _dir: dir,
                connections,
            }
        }

        fn connections(&self) -> usize {
            self.connections.load(Ordering::SeqCst)
        }
    }

    async fn serve(
        mut stream: UnixStream,
        routes: Arc<HashMap<String, (u16, String)>>,
        behavior: Behavior,
    ) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                match stream.read(&mut chunk).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => buf.extend_from_slice(&chunk[..n]),
                }
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).into_owned();
            buf = buf.split_off(end + 4);

            let path = head.split_whitespace().nth(1).unwrap_or_default();
            let Some((status, body)) = routes.get(path) else {
                // Hold the connection open without answering.
                let _ = stream.read(&mut chunk).await;
                return;
            };
            if path.contains("/stats") {
                tokio::time::sleep(behavior.stats_delay).await;
            }
            let reason = match status {
                200 => "OK",
                404 => "Not Found",
                _ => "Internal Server Error",
            };
            let response = format!(
                "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
                body.len()
            );
            let written = stream.write_all(response.as_bytes()).await;
            if written.is_err() || behavior.close_after_response {
                return;
            }
        }
    }

    const CONTAINERS: &str = r#"[
        {"Id": "c1", "Names": ["/web"], "Labels": {"com.example.tier": "frontend"}},
        {"Id": "c2", "Names": ["/gone"], "Labels": {}},
        {"Id": "c3", "Names": ["/db"], "Labels": null}
    ]"#;
    const C1_STATS: &str = r#"{"memory_stats": {"usage": 500, "limit": 1000, "stats": {"rss": 300, "cache": 200}}}"#;
    const C3_STATS: &str = r#"{"memory_stats": {"usage": 700}}"#;

    #[test]
    fn test_socket_path() {
        assert_eq!(
            socket_path("unix:///var/run/docker.sock").unwrap(),
            PathBuf::from("/var/run/docker.sock")
        );
        assert!(matches!(
            socket_path("tcp://localhost:2375"),
            Err(Error::UnsupportedHost(_))
        ));
        assert!(matches!(socket_path("unix://"), Err(Error::UnsupportedHost(_))));
    }

    #[tokio::test]
    async fn test_connect_missing_socket() {
        let dir = tempfile::tempdir().unwrap();
        let host = format!("unix://{}", dir.path().join("missing.sock").display());
        let err = DockerClient::connect(&host).await.unwrap_err();
        assert!(matches!(err, Error::SocketConnect { .. }));
    }

    #[tokio::test]
    async fn test_fetch_stats() {
        let engine = FakeEngine::start(&[
            ("/containers/json", 200, CONTAINERS),
            ("/containers/c1/stats?stream=false&one-shot=true", 200, C1_STATS),
            ("/containers/c2/stats?stream=false&one-shot=true", 404, r#"{"message": "No such container: c2"}"#),
            ("/containers/c3/stats?stream=false&one-shot=true", 200, C3_STATS),
        ]);
        let mut client = DockerClient::connect(&engine.host).await.unwrap();

        let stats = client.fetch_stats(Duration::from_secs(5)).await.unwrap();

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].id, "c1");
        assert_eq!(stats[0].name.as_deref(), Some("web"));
        assert_eq!(
            stats[0].labels.get("com.example.tier").map(String::as_str),
            Some("frontend")
        );
        assert_eq!(stats[0].memory.usage, 500);
        assert_eq!(stats[0].memory.limit, Some(1000));
        let keys: Vec<&str> = stats[0].memory.stats.keys().map(String::as_str).collect();
        assert_eq!(keys, ["rss", "cache"]);
        assert_eq!(stats[1].id, "c3");
        assert_eq!(stats[1].memory.usage, 700);
        assert_eq!(stats[1].memory.limit, None);

        // The connection is reused for the next cycle.
        assert_eq!(client.fetch_stats(Duration::from_secs(5)).await.unwrap().len(), 2);
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_stats_error_status() {
        let engine = FakeEngine::start(&[(
            "/containers/json",
            500,
            r#"{"message": "internal error"}"#,
        )]);
        let mut client = DockerClient::connect(&engine.host).await.unwrap();

        let err = client.fetch_stats(Duration::from_secs(5)).await.unwrap_err();

        match err {
            Error::Status { path, status, body } => {
                assert_eq!(path, "/containers/json");
                assert_eq!(status, hyper::StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, r#"{"message": "internal error"}"#);
            }
            err => panic!("Expected Status error, got {err:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_stats_invalid_body() {
        let engine = FakeEngine::start(&[("/containers/json", 200, "not json")]);
        let mut client = DockerClient::connect(&engine.host).await.unwrap();

        let err = client.fetch_stats(Duration::from_secs(5)).await.unwrap_err();

        assert!(matches!(err, Error::Decode { .. }));
    }

    #[tokio::test]
    async fn test_fetch_stats_timeout() {
        let engine = FakeEngine::start(&[(
            "/containers/json",
            200,
            r#"[{"Id": "slow", "Names": ["/slow"]}]"#,
        )]);
        let mut client = DockerClient::connect(&engine.host).await.unwrap();

        let err = client
            .fetch_stats(Duration::from_millis(200))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout(timeout) if timeout == Duration::from_millis(200)));
        // A fresh connection is opened for the next cycle.
        let err = client
            .fetch_stats(Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_stats_samples_containers_concurrently() {
        let ids = ["c1", "c2", "c3", "c4", "c5"];
        let containers = format!(
            "[{}]",
            ids.map(|id| format!(r#"{{"Id": "{id}", "Names": ["/{id}"]}}"#))
                .join(", ")
        );
        let stats_paths = ids.map(stats_path);
        let mut routes = vec![("/containers/json", 200, containers.as_str())];
        routes.extend(stats_paths.iter().map(|path| (path.as_str(), 200, C3_STATS)));
        let engine = FakeEngine::with_behavior(
            &routes,
            Behavior {
                stats_delay: Duration::from_millis(300),
                ..Behavior::default()
            },
        );
        let mut client = DockerClient::connect(&engine.host).await.unwrap();

        let stats = client.fetch_stats(Duration::from_secs(1)).await.unwrap();

        let fetched: Vec<&str> = stats.iter().map(|stats| stats.id.as_str()).collect();
        assert_eq!(fetched, ids);
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_stats_failure_fails_cycle() {
        let engine = FakeEngine::start(&[
            ("/containers/json", 200, CONTAINERS),
            ("/containers/c1/stats?stream=false&one-shot=true", 200, C1_STATS),
            ("/containers/c2/stats?stream=false&one-shot=true", 500, r#"{"message": "boom"}"#),
            ("/containers/c3/stats?stream=false&one-shot=true", 200, C3_STATS),
        ]);
        let mut client = DockerClient::connect(&engine.host).await.unwrap();

        let err = client.fetch_stats(Duration::from_secs(5)).await.unwrap_err();

        assert!(matches!(err, Error::Status { ref path, .. } if path.starts_with("/containers/c2/")));
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_stats_reconnects_after_daemon_closed_connection() {
        let engine = FakeEngine::with_behavior(
            &[
                ("/containers/json", 200, r#"[{"Id": "c3", "Names": ["/db"]}]"#),
                ("/containers/c3/stats?stream=false&one-shot=true", 200, C3_STATS),
            ],
            Behavior {
                close_after_response: true,
                ..Behavior::default()
            },
        );
        let mut client = DockerClient::connect(&engine.host).await.unwrap();

        assert_eq!(client.fetch_stats(Duration::from_secs(5)).await.unwrap().len(), 1);
        assert_eq!(engine.connections(), 2);

        // Give the connection driver time to observe the closed socket.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(client.connection.as_ref().is_some_and(Connection::is_closed));

        let stats = client.fetch_stats(Duration::from_secs(5)).await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].id, "c3");
        // One new connection for the listing, one for the stats sample.
        assert_eq!(engine.connections(), 4);
        client.close().await.unwrap();
    }
}
