pub mod builders;
pub mod fake_executor;
pub mod processors;

use std::sync::mpsc;
use std::sync::{Arc, Once};
use std::time::Duration;

use flowdag::data::DataContext;
use flowdag::engine::{ExecuteOptions, GraphManager, RunSummary};
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=flowdag=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_names(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Execute a graph and block until its `done` callback fires.
///
/// Only works with executors that make progress on their own (threads,
/// inline); use the queued executor's `run_all` otherwise.
pub fn run_and_wait(
    manager: &GraphManager,
    options: ExecuteOptions,
    data: Arc<DataContext>,
    cluster: &str,
    graph: &str,
) -> RunSummary {
    let (tx, rx) = mpsc::channel();
    manager
        .execute(options, data, cluster, graph, move |report| {
            let _ = tx.send(report.summary());
        })
        .expect("execute rejected the run");
    rx.recv_timeout(Duration::from_secs(5))
        .expect("graph run did not finish within 5 seconds")
}
