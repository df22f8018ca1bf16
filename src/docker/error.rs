use std::path::PathBuf;
use std::time::Duration;

use hyper::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported docker host `{0}`: only `unix://` sockets are supported")]
    UnsupportedHost(String),
    #[error("failed to connect to socket `{path}`: {source}")]
    SocketConnect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP handshake on socket `{path}` failed: {source}")]
    Handshake {
        path: PathBuf,
        #[source]
        source: hyper::Error,
    },
    #[error("failed to build request for `{path}`: {source}")]
    InvalidRequest {
        path: String,
        #[source]
        source: hyper::http::Error,
    },
    #[error("request `{path}` failed: {source}")]
    Request {
        path: String,
        #[source]
        source: hyper::Error,
    },
    #[error("request `{path}` returned {status}: {body}")]
    Status {
        path: String,
        status: StatusCode,
        body: String,
    },
    #[error("failed to decode response of `{path}`: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection task failed: {0}")]
    ConnectionTask(#[source] tokio::task::JoinError),
}

impl Error {
    /// Returns `true` if the daemon answered with `404 Not Found`, e.g. because
    /// the container exited after it was listed.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
