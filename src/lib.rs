//! Docker Memory Monitor: periodically collects memory metrics of all running
//! Docker containers and publishes them as JSON events.
//!
//! Each cycle fetches one stats sample per container from the Docker Engine API,
//! derives usage, limit and percentages, sanitizes field names and hands one
//! event per container to the publisher.

use collector::MemoryCollector;
use config::Config;
use event::BufferedReporter;
use publisher::JsonLinesPublisher;
use tokio::signal::unix::{SignalKind, signal};

pub mod collector;
pub mod config;
pub mod container;
pub mod dedot;
pub mod docker;
pub mod error;
pub mod event;
pub mod memory;
pub mod publisher;
pub mod stats;

use error::ResultOkLogExt;

/// Runs the Docker Memory Monitor until Ctrl-C or SIGTERM is received, or until
/// events can no longer be written to stdout.
///
/// # Errors
///
/// Possible errors include:
/// - Invalid configuration in the environment (see [`config`]).
/// - Failure to connect to the Docker daemon.
/// - Failure to close the connection on shutdown.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    log::debug!("Final config: {config:?}");

    let mut collector = MemoryCollector::new(&config).await?;
    log::info!(
        "Collecting memory metrics from `{}` every {:?}",
        config.host,
        config.period
    );

    let (tx, rx) = tokio::sync::mpsc::channel::<Vec<event::Event>>(10);
    let publisher = tokio::task::spawn_blocking(move || {
        let mut publisher = JsonLinesPublisher::new(std::io::stdout().lock());
        publisher::publish_all(&mut publisher, rx).ok_log();
    });

    let mut interval = tokio::time::interval(config.period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let shutdown = shutdown_signal()?;
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            result = &mut shutdown => {
                let received = result?;
                log::info!("Received {received}, shutting down");
                break;
            }
        }

        let mut reporter = BufferedReporter::default();
        collector.fetch(&mut reporter).await;
        // Failed cycles were already logged by the collector.
        if let Ok(events) = reporter.into_result() {
            if tx.send(events).await.is_err() {
                log::error!("publisher stopped, shutting down");
                break;
            }
        }
    }

    drop(tx);
    collector.close().await?;
    publisher.await?;

    Ok(())
}

/// Resolves with the name of the first shutdown signal received.
///
/// The SIGTERM handler is installed eagerly so a signal that arrives before
/// the first poll is not lost.
fn shutdown_signal() -> std::io::Result<impl Future<Output = std::io::Result<&'static str>>> {
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|()| "Ctrl-C"),
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    })
}
