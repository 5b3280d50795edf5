//! Shared run report: the error ledger that drives the process exit code.
//!
//! Almost every failure in the pipeline is recorded here and execution
//! continues, so one target's failure cannot abort its siblings. The binary
//! turns a non-empty ledger into a non-zero exit code at the end of the run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::PipelineError;

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    errors: Arc<AtomicUsize>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit an informational line from a stage or a child process.
    pub fn log_line(&self, line: &str) {
        tracing::info!("{line}");
    }

    /// Emit an error line and flag the run as failed.
    pub fn error_line(&self, line: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        tracing::error!("{line}");
    }

    /// Record a recoverable error without aborting the stage.
    pub fn record(&self, err: &PipelineError) {
        self.error_line(&err.to_string());
    }

    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn exit_code(&self) -> i32 {
        i32::from(self.has_errors())
    }
}
