//! External process execution: streaming output, classification, retry.

pub mod classify;
pub mod env;
pub mod heartbeat;
pub mod runner;

pub use classify::{LineClassifier, Severity};
pub use env::ensure_command;
pub use heartbeat::Heartbeat;
pub use runner::{run, run_simple, ExecOptions, ProcessOutput, RetryPolicy, StreamSink};
