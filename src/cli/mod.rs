pub mod commands;
pub mod options;

pub use commands::dispatch;
pub use options::{Cli, ComboArgs, Commands};
