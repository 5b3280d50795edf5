//! Subcommand dispatch.

use std::path::{Path, PathBuf};

use crate::cli::options::{Cli, Commands};
use crate::disk;
use crate::error::Result;
use crate::formatting::{self, FormatOptions};
use crate::layout::RepoLayout;
use crate::pipeline::Pipeline;
use crate::report::RunReport;

/// Run the parsed command line to completion and return the process exit
/// code. Recoverable failures land on the report; only repository discovery
/// and output-tree creation abort early.
pub async fn dispatch(cli: Cli) -> Result<i32> {
    // The size report has no repository dependency at all.
    if let Commands::Disk { path } = &cli.command {
        let root = path.clone().unwrap_or_else(filesystem_root);
        disk::print_sizes(&root);
        return Ok(0);
    }

    let layout = RepoLayout::discover()?;
    let report = RunReport::new();
    let pipeline = Pipeline::new(layout.clone(), report.clone());

    match cli.command {
        Commands::Configure { combo } => {
            pipeline.configure(&combo.to_request()).await?;
        }
        Commands::Build {
            target,
            parallel,
            combo,
        } => {
            pipeline
                .build(&combo.to_request(), target.as_deref(), parallel)
                .await?;
        }
        Commands::HarvestPrebuilt { combo } => {
            pipeline.harvest_prebuilt(&combo.to_request()).await?;
        }
        Commands::Pack { combo } => {
            pipeline.pack(&combo.to_request()).await?;
        }
        Commands::RunAll { parallel, combo } => {
            pipeline.run_all(&combo.to_request(), parallel).await?;
        }
        Commands::Format { validate } => {
            formatting::format_sources(&report, &layout, FormatOptions { validate }).await?;
        }
        Commands::Deploy => {
            pipeline.deploy().await?;
        }
        Commands::Disk { .. } => unreachable!("handled above"),
    }

    Ok(report.exit_code())
}

fn filesystem_root() -> PathBuf {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| cwd.ancestors().last().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("/"))
}
