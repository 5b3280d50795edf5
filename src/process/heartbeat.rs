//! Synthetic liveness output for long-running external operations.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::report::RunReport;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Emits `Working... (<elapsed>s)` every ten seconds until dropped.
///
/// Keeps a long-running external operation observably alive to supervising
/// processes that kill silent jobs. Dropping the guard aborts the ticker, so
/// cancellation happens exactly once on every exit path.
#[derive(Debug)]
pub struct Heartbeat {
    ticker: JoinHandle<()>,
}

impl Heartbeat {
    pub fn start(report: RunReport) -> Self {
        let started = Instant::now();
        let ticker = tokio::spawn(async move {
            loop {
                tokio::time::sleep(HEARTBEAT_INTERVAL).await;
                report.log_line(&format!("Working... ({}s)", started.elapsed().as_secs()));
            }
        });
        Self { ticker }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}
