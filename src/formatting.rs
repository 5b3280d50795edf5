//! Source formatting: the external formatter plus the repository house style.
//!
//! In fix mode files are rewritten in place; in validate mode a divergent
//! file is recorded as an error and left untouched.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use futures::stream::{self, StreamExt};
use regex::Regex;
use walkdir::WalkDir;

use crate::error::Result;
use crate::layout::RepoLayout;
use crate::process::runner::{run, ExecOptions, StreamSink};
use crate::process::ensure_command;
use crate::report::RunReport;

/// Header every first-party source file starts with.
pub const LICENSE_HEADER: &str = "// MIT Licensed (see LICENSE.md).";

/// Marker exempting vendored third-party sources from formatting.
const EXTERNAL_MARKER: &str = "// External.";

const NATIVE_EXTENSIONS: &[&str] = &["c", "cc", "cxx", "cpp", "h", "hxx", "hpp", "inl"];
const SCRIPT_EXTENSIONS: &[&str] = &["hscript", "hfrag"];

const FORMAT_PARALLELISM: usize = 8;

#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    pub validate: bool,
}

pub async fn format_sources(
    report: &RunReport,
    layout: &RepoLayout,
    options: FormatOptions,
) -> Result<()> {
    report.log_line("Formatting");

    let native = gather_source_files(&layout.libraries, NATIVE_EXTENSIONS);
    run_clang_format(report, &native, options).await;

    let mut all = native;
    all.extend(gather_source_files(&layout.resources, SCRIPT_EXTENSIONS));
    apply_house_style(report, &all, options)?;

    report.log_line("Formatted");
    Ok(())
}

/// Collect first-party sources under `root` matching the extension set.
pub fn gather_source_files(root: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .is_some_and(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)));
        if !matches {
            continue;
        }
        match std::fs::read_to_string(path) {
            Ok(code) if !code.starts_with(EXTERNAL_MARKER) => files.push(path.to_path_buf()),
            _ => {}
        }
    }
    files.sort();
    files
}

async fn run_clang_format(report: &RunReport, files: &[PathBuf], options: FormatOptions) {
    report.log_line("Running clang-format");
    if !ensure_command(report, "clang-format") {
        return;
    }

    let jobs = files.iter().map(|file| {
        let file = file.clone();
        let report = report.clone();
        async move {
            let path = file.display().to_string();
            let exec = ExecOptions {
                stdout: StreamSink::Ignore,
                stderr: StreamSink::Ignore,
                ..ExecOptions::default()
            };
            let output = match run(&report, "clang-format", &[path.as_str()], &exec).await {
                Ok(output) if !output.exit_failed => output,
                _ => return,
            };

            let Ok(old_code) = std::fs::read_to_string(&file) else {
                return;
            };
            if old_code == output.stdout {
                return;
            }
            if options.validate {
                report.error_line(&format!("File '{path}' was not clang-formatted"));
            } else if let Err(err) = std::fs::write(&file, &output.stdout) {
                report.error_line(&format!("Failed to rewrite '{path}': {err}"));
            }
        }
    });

    stream::iter(jobs)
        .buffer_unordered(FORMAT_PARALLELISM)
        .collect::<Vec<_>>()
        .await;
}

fn apply_house_style(report: &RunReport, files: &[PathBuf], options: FormatOptions) -> Result<()> {
    report.log_line("Applying house style");
    for file in files {
        let old_code = match std::fs::read_to_string(file) {
            Ok(code) => code,
            Err(_) => continue,
        };
        let new_code = house_style(&old_code);
        if old_code == new_code {
            continue;
        }
        if options.validate {
            report.error_line(&format!("File '{}' must be house-formatted", file.display()));
        } else {
            std::fs::write(file, new_code)?;
        }
    }
    Ok(())
}

/// Normalize a source file to the house style: a single standard header,
/// no leading comment run, no bar comments, UNIX newlines, one trailing
/// newline.
pub fn house_style(code: &str) -> String {
    static LEADING_COMMENT: OnceLock<Regex> = OnceLock::new();
    static BAR_COMMENT: OnceLock<Regex> = OnceLock::new();
    let leading = LEADING_COMMENT
        .get_or_init(|| Regex::new(r"^[ \t]*[-/*=\\]+").expect("leading pattern compiles"));
    let bar = BAR_COMMENT
        .get_or_init(|| Regex::new(r"^[ \t]*[-/*=\\]{40}").expect("bar pattern compiles"));

    let mut lines: Vec<&str> = code
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    // The standard header is re-inserted below, so the whole leading comment
    // run goes, whatever it currently says.
    while let Some(first) = lines.first() {
        if leading.is_match(first) {
            lines.remove(0);
        } else {
            break;
        }
    }

    lines.retain(|line| !bar.is_match(line));
    lines.insert(0, LICENSE_HEADER);

    let mut result = lines.join("\n");
    if !result.ends_with('\n') {
        result.push('\n');
    }
    result
}
