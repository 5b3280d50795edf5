//! Versioned packaging of built targets.

pub mod identity;

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};

use crate::archive;
use crate::bundle;
use crate::combo::BuildContext;
use crate::error::{PipelineError, Result};
use crate::layout::{self, RepoLayout};
use crate::metadata::MetadataRecord;
use crate::report::RunReport;
use crate::targets::TargetSpec;

pub use identity::PackageIdentity;

/// Build byproducts excluded from packages, by extension or exact name.
pub const OUTPUT_DENYLIST: &[&str] = &[
    ".pdb",
    ".ilk",
    ".exp",
    ".lib",
    ".wast",
    ".cmake",
    "CMakeFiles",
    bundle::BUNDLE_ARCHIVE,
    bundle::FRAGMENT_FILE,
];

/// Concurrent per-file copies while mirroring into the publish tree.
const MIRROR_PARALLELISM: usize = 8;

/// Locate the built output directory for a target, preferring the
/// configuration-qualified subdirectory generators create on some platforms.
pub fn find_output_dir(context: &BuildContext, target: &TargetSpec) -> Option<PathBuf> {
    let base = context.build_dir.join("Code").join(target.dir).join(target.name);
    let qualified = base.join(context.combo.configuration.as_str());
    [qualified, base].into_iter().find(|dir| dir.exists())
}

/// Locate the built executable itself, probing the bare name first and the
/// `.exe`-suffixed one for toolchains that append it.
pub fn find_executable(context: &BuildContext, target: &TargetSpec) -> Option<PathBuf> {
    let dir = find_output_dir(context, target)?;
    let plain = dir.join(target.name);
    if plain.is_file() {
        return Some(plain);
    }
    let suffixed = dir.join(format!("{}.exe", target.name));
    suffixed.is_file().then_some(suffixed)
}

fn denied(path: &Path) -> bool {
    let by_extension = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .is_some_and(|ext| OUTPUT_DENYLIST.contains(&ext.as_str()));
    let by_name = path
        .file_name()
        .map(|name| name.to_string_lossy())
        .is_some_and(|name| OUTPUT_DENYLIST.contains(&name.as_ref()));
    by_extension || by_name
}

/// Enumerate a target's distributable output files, denylist applied.
pub fn enumerate_output_files(output_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(output_dir)? {
        let path = entry?.path();
        if !denied(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Package one target into the canonical archive, stage it for inclusion in
/// other builds when requested, and mirror its raw files into the publish
/// tree. Returns the package path.
pub async fn pack_target(
    report: &RunReport,
    layout: &RepoLayout,
    context: &BuildContext,
    metadata: &MetadataRecord,
    target: &TargetSpec,
) -> Result<PathBuf> {
    report.log_line(&format!("Packaging {}", target.name));

    let output_dir = find_output_dir(context, target).ok_or_else(|| {
        PipelineError::MissingArtifact {
            path: context
                .build_dir
                .join("Code")
                .join(target.dir)
                .join(target.name),
        }
    })?;
    let files = enumerate_output_files(&output_dir)?;

    let identity = PackageIdentity::from_metadata(target.name, metadata, &context.combo);
    let package_path = layout.packages.join(identity.file_name());

    // Overwrite by identity: the previous archive at this exact path is the
    // same package and is replaced, never appended to.
    layout::try_remove_file(&package_path);

    if context.combo.vfs {
        // Everything else ships inside the executable's embedded bundle;
        // only the pre-mount subset rides along on disk.
        let vfs_only: Vec<PathBuf> = target.vfs_only.iter().map(PathBuf::from).collect();
        archive::zip_add(report, &layout.repo, &package_path, &vfs_only).await?;
    } else {
        let manifest = bundle::assemble_manifest(layout, Some(metadata), target);
        let relative = bundle::relative_to_repo(&layout.repo, &manifest);
        archive::zip_add(report, &layout.repo, &package_path, &relative).await?;
    }

    // Absolute paths: the archiver stores basenames only.
    archive::zip_add(report, &layout.repo, &package_path, &files).await?;

    if target.copy_to_included_builds && package_path.is_file() {
        let staged = layout.included_builds.join(identity.file_name());
        archive::zip_extract(&package_path, &staged).await?;
    }

    mirror_to_page(layout, target, &files).await?;
    Ok(package_path)
}

/// Mirror raw output files into `Page/<target>/` for static hosting.
async fn mirror_to_page(layout: &RepoLayout, target: &TargetSpec, files: &[PathBuf]) -> Result<()> {
    let page_dir = layout.page.join(target.name);
    tokio::fs::create_dir_all(&page_dir).await?;

    let copies = files
        .iter()
        .filter(|file| file.is_file())
        .map(|file| {
            let destination = file
                .file_name()
                .map(|name| page_dir.join(name))
                .unwrap_or_else(|| page_dir.join("unnamed"));
            let source = file.clone();
            async move {
                tokio::fs::copy(&source, &destination).await?;
                Ok::<(), std::io::Error>(())
            }
        });

    let results: Vec<_> = stream::iter(copies)
        .buffer_unordered(MIRROR_PARALLELISM)
        .collect()
        .await;
    for result in results {
        result?;
    }
    Ok(())
}
