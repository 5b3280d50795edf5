use anyhow::Result;
use clap::Parser;
use shipwright::cli::{self, Cli};
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    debug!("Starting shipwright v{}", env!("CARGO_PKG_VERSION"));

    let exit_code = cli::dispatch(cli).await?;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
