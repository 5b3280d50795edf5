use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::combo::ComboRequest;

/// Release pipeline driver for the Helio engine.
#[derive(Parser)]
#[command(name = "shipwright")]
#[command(about = "Configure, build, bundle, and package Helio engine builds")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Combo-override flags shared by every stage subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ComboArgs {
    /// Build alias (windows|linux|macos|web|release); defaults to the host
    #[arg(long)]
    pub alias: Option<String>,

    /// Toolchain override
    #[arg(long)]
    pub toolchain: Option<String>,

    /// Platform override
    #[arg(long)]
    pub platform: Option<String>,

    /// Architecture override
    #[arg(long)]
    pub architecture: Option<String>,

    /// Build configuration override
    #[arg(long)]
    pub configuration: Option<String>,

    /// Skip bundling the virtual file system into built executables
    #[arg(long)]
    pub no_vfs: bool,

    /// Extra generator defines, key=value
    #[arg(short = 'D', long = "define", value_name = "KEY=VALUE", value_parser = parse_define)]
    pub defines: Vec<(String, String)>,
}

impl ComboArgs {
    pub fn to_request(&self) -> ComboRequest {
        ComboRequest {
            alias: self.alias.clone(),
            toolchain: self.toolchain.clone(),
            platform: self.platform.clone(),
            architecture: self.architecture.clone(),
            configuration: self.configuration.clone(),
            vfs: !self.no_vfs,
            extra_defines: self.defines.clone(),
        }
    }
}

fn parse_define(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, val)) if !key.is_empty() => Ok((key.to_string(), val.to_string())),
        _ => Err(format!("invalid define '{value}', expected key=value")),
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate the build system for a combo
    Configure {
        #[command(flatten)]
        combo: ComboArgs,
    },

    /// Build the active combo with the compiler toolchain
    Build {
        /// Build only this generator target
        #[arg(long)]
        target: Option<String>,

        /// Parallel job count; defaults to the host CPU count
        #[arg(long)]
        parallel: Option<usize>,

        #[command(flatten)]
        combo: ComboArgs,
    },

    /// Fetch prebuilt runtime content using the built executables
    HarvestPrebuilt {
        #[command(flatten)]
        combo: ComboArgs,
    },

    /// Package everything into standalone installable archives
    Pack {
        #[command(flatten)]
        combo: ComboArgs,
    },

    /// Run the full sequence: configure, build, harvest, build, pack, pack
    RunAll {
        /// Parallel job count; defaults to the host CPU count
        #[arg(long)]
        parallel: Option<usize>,

        #[command(flatten)]
        combo: ComboArgs,
    },

    /// Format sources with the external formatter and the house style
    Format {
        /// Report divergent files as errors instead of rewriting them
        #[arg(long)]
        validate: bool,
    },

    /// Print the approximate size of every large directory
    Disk {
        /// Directory to measure; defaults to the filesystem root
        path: Option<PathBuf>,
    },

    /// Publish the page tree
    Deploy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defines_require_key_value_shape() {
        assert_eq!(
            parse_define("HELIO_EXPERIMENTAL=1").unwrap(),
            ("HELIO_EXPERIMENTAL".to_string(), "1".to_string())
        );
        assert!(parse_define("novalue").is_err());
        assert!(parse_define("=orphan").is_err());
    }

    #[test]
    fn combo_args_round_trip_into_a_request() {
        let args = ComboArgs {
            alias: Some("web".to_string()),
            no_vfs: true,
            ..ComboArgs::default()
        };
        let request = args.to_request();
        assert_eq!(request.alias.as_deref(), Some("web"));
        assert!(!request.vfs);
        assert!(!request.is_unspecified());
    }
}
