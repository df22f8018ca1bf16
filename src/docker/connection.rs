use std::path::Path;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use serde::de::DeserializeOwned;
use hyper::client::conn::http1::{self, SendRequest};
use hyper::{Method, Request, StatusCode, header};
use hyper_util::rt::TokioIo;

use super::{Error, Result};

/// An HTTP/1.1 connection to the Docker daemon over its Unix socket.
///
/// Requests are sent one at a time. The connection itself is driven by a
/// background task that ends once the connection is dropped or closed.
#[derive(Debug)]
pub(super) struct Connection {
    sender: SendRequest<Empty<Bytes>>,
    driver: tokio::task::JoinHandle<()>,
}

impl Connection {
    pub(super) async fn open(path: &Path) -> Result<Self> {
        log::debug!("Connecting to {}...", path.display());
        let stream = tokio::net::UnixStream::connect(path)
            .await
            .map_err(|source| Error::SocketConnect {
                path: path.to_path_buf(),
                source,
            })?;
        let (sender, connection) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|source| Error::Handshake {
                path: path.to_path_buf(),
                source,
            })?;
        let driver = tokio::spawn(async move {
            if let Err(err) = connection.await {
                log::error!("docker connection failed: {err}");
            }
        });
        log::debug!("Connected to {}.", path.display());

        Ok(Self { sender, driver })
    }

    /// Returns `true` once the daemon or the driver task has closed the connection.
    pub(super) fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Sends a `GET` request for `path` and returns the status and full body.
    pub(super) async fn get(&mut self, path: &str) -> Result<(StatusCode, Bytes)> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(path)
            .header(header::HOST, "docker")
            .header(header::ACCEPT, "application/json")
            .body(Empty::<Bytes>::new())
            .map_err(|source| Error::InvalidRequest {
                path: path.to_owned(),
                source,
            })?;

        let request_error = |source: hyper::Error| Error::Request {
            path: path.to_owned(),
            source,
        };
        self.sender.ready().await.map_err(request_error)?;
        let response = self
            .sender
            .send_request(request)
            .await
            .map_err(request_error)?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(request_error)?
            .to_bytes();
        log::trace!("GET {path} -> {status} ({} bytes)", body.len());

        Ok((status, body))
    }

    /// Sends a `GET` request for `path` and decodes a successful JSON response.
    pub(super) async fn get_json<T: DeserializeOwned>(&mut self, path: &str) -> Result<T> {
        let (status, body) = self.get(path).await?;
        if !status.is_success() {
            return Err(Error::Status {
                path: path.to_owned(),
                status,
                body: String::from_utf8_lossy(&body).trim().to_owned(),
            });
        }

        serde_json::from_slice(&body).map_err(|source| Error::Decode {
            path: path.to_owned(),
            source,
        })
    }

    /// Closes the connection and waits for the driver task to finish.
    pub(super) async fn close(self) -> Result<()> {
        drop(self.sender);
        self.driver.await.map_err(Error::ConnectionTask)
    }

    /// Tears the connection down without waiting, e.g. after a request was
    /// abandoned halfway.
    pub(super) fn abort(self) {
        self.driver.abort();
    }
}
