//! External tool presence checks.

use crate::error::PipelineError;
use crate::report::RunReport;

/// Verify that `command` resolves on PATH.
///
/// A missing tool is recorded as an error and the calling stage is expected
/// to skip its work; the pipeline itself keeps going.
pub fn ensure_command(report: &RunReport, command: &str) -> bool {
    if which::which(command).is_err() {
        report.record(&PipelineError::MissingTool {
            command: command.to_string(),
        });
        return false;
    }
    true
}
