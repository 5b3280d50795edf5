//! Archive operations: creation through the external archiver, extraction
//! in-process.
//!
//! Creation goes through the `7z` utility so the pipeline and the runtime
//! agree on one producer for the zip contract: relative input paths keep
//! their directory structure, absolute input paths add basenames only.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tokio::task;
use zip::ZipArchive;

use crate::error::{PipelineError, Result};
use crate::process::ensure_command;
use crate::process::runner::{run, ExecOptions};
use crate::report::RunReport;

pub const ARCHIVER: &str = "7z";

/// Add files to `output_zip`, creating it when absent.
///
/// A missing or failing archiver is recorded on the report (its output lands
/// there as error lines) and is not an `Err`; the caller carries on with its
/// remaining targets.
pub async fn zip_add(
    report: &RunReport,
    cwd: &Path,
    output_zip: &Path,
    files: &[PathBuf],
) -> Result<()> {
    if files.is_empty() {
        return Ok(());
    }
    if !ensure_command(report, ARCHIVER) {
        return Ok(());
    }

    let mut args = vec![
        "a".to_string(),
        "-tzip".to_string(),
        "-mx=9".to_string(),
        "-mfb=128".to_string(),
        "-mpass=10".to_string(),
        output_zip.display().to_string(),
    ];
    args.extend(files.iter().map(|file| file.display().to_string()));
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let options = ExecOptions {
        cwd: Some(cwd.to_path_buf()),
        ..ExecOptions::default()
    };
    let output = run(report, ARCHIVER, &args, &options).await?;
    if output.exit_failed {
        report.record(&PipelineError::Subprocess {
            command: ARCHIVER.to_string(),
        });
    }
    Ok(())
}

/// Extract `archive` into `dest`, creating the destination as needed.
/// Entries with unsafe (escaping) paths are skipped with a warning.
pub async fn zip_extract(archive: &Path, dest: &Path) -> Result<()> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    task::spawn_blocking(move || extract_sync(&archive, &dest))
        .await
        .map_err(|err| PipelineError::Io(std::io::Error::other(err)))?
}

fn extract_sync(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path).map_err(|_| PipelineError::MissingArtifact {
        path: archive_path.to_path_buf(),
    })?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    std::fs::create_dir_all(dest)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let relative = match entry.enclosed_name() {
            Some(path) => path.to_path_buf(),
            None => {
                tracing::warn!("Skipping entry with unsafe path: {}", entry.name());
                continue;
            }
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out_file = File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out_file)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode))?;
            }
        }
    }
    Ok(())
}
