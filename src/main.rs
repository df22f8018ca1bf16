/// Entry point for the Docker Memory Monitor.
///
/// Connects to the Docker daemon, collects memory metrics of all running
/// containers on a fixed interval and writes them to stdout as JSON lines.
///
/// # Errors
///
/// Returns an error if initialization fails (e.g., invalid environment
/// variables or an unreachable Docker socket).
///
/// # Examples
///
/// ```bash
/// RUST_LOG=info MEMORY_METRICS_PERIOD=5 cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    docker_memory_monitor::run().await
}
