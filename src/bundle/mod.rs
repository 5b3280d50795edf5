//! The embedded content bundle: manifest assembly, archiving, and the
//! generated fragment handed off to the compiler toolchain.

pub mod fragment;

use std::path::{Path, PathBuf};

use crate::archive;
use crate::combo::BuildContext;
use crate::error::{PipelineError, Result};
use crate::layout::{self, RepoLayout};
use crate::metadata::MetadataRecord;
use crate::report::RunReport;
use crate::targets::{TargetSpec, BUNDLE_ID};

pub use fragment::{render_fragment, write_if_changed};

/// Name of the intermediate archive written next to the generated fragment.
pub const BUNDLE_ARCHIVE: &str = "FileSystem.zip";
/// Name of the generated fragment the target compiles in.
pub const FRAGMENT_FILE: &str = "VirtualFileSystem.cpp";

/// Assemble the bundle manifest for one target.
///
/// Non-resource dependencies are included unconditionally; each resource
/// library contributes its live directory when present and, when metadata is
/// supplied, its version-keyed prebuilt directory when present. Prebuilt
/// content is an enhancement layer: anything missing on disk is skipped with
/// a warning, never an error.
pub fn assemble_manifest(
    layout: &RepoLayout,
    metadata: Option<&MetadataRecord>,
    target: &TargetSpec,
) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = target
        .non_resource_dependencies
        .iter()
        .map(|dep| layout.repo.join(dep))
        .collect();

    let prebuilt_root = metadata.map(|record| layout.prebuilt_content.join(record.version_key()));

    for library in target.resource_libraries {
        let live = layout.resources.join(library);
        if live.exists() {
            files.push(live);
        } else {
            tracing::warn!("Skipping resource library for {library}");
        }

        if let Some(prebuilt_root) = &prebuilt_root {
            let prebuilt = prebuilt_root.join(library);
            if prebuilt.exists() {
                files.push(prebuilt);
            } else {
                tracing::warn!("Skipping prebuilt content for {library}");
            }
        }
    }
    files
}

/// Convert manifest paths to repository-relative form so the archiver
/// preserves their directory structure.
pub fn relative_to_repo(repo: &Path, files: &[PathBuf]) -> Vec<PathBuf> {
    files
        .iter()
        .map(|file| {
            file.strip_prefix(repo)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| file.clone())
        })
        .collect()
}

/// Directory holding a target's generated bundle artifacts.
pub fn fragment_dir(context: &BuildContext, target: &TargetSpec) -> PathBuf {
    context
        .build_dir
        .join("Code")
        .join(target.dir)
        .join(target.name)
}

/// Build the archive for one target and emit it as the generated fragment.
///
/// The previous archive is deleted first, so a retried or re-entered run
/// always produces a fresh archive rather than appending to a partial one.
/// The fragment write is diff-gated.
pub async fn write_target_bundle(
    report: &RunReport,
    layout: &RepoLayout,
    context: &BuildContext,
    metadata: Option<&MetadataRecord>,
    target: &TargetSpec,
) -> Result<()> {
    report.log_line(&format!("Building virtual file system for {}", target.name));

    let fragment_dir = fragment_dir(context, target);
    tokio::fs::create_dir_all(&fragment_dir).await?;

    let bytes = if context.combo.vfs {
        let archive_path = fragment_dir.join(BUNDLE_ARCHIVE);
        layout::try_remove_file(&archive_path);

        let manifest = assemble_manifest(layout, metadata, target);
        let relative = relative_to_repo(&layout.repo, &manifest);
        archive::zip_add(report, &layout.repo, &archive_path, &relative).await?;

        match tokio::fs::read(&archive_path).await {
            Ok(bytes) => bytes,
            Err(_) => {
                // The archiver failed or was unavailable; its output already
                // reached the ledger. Leave the previous fragment in place.
                report.record(&PipelineError::MissingArtifact { path: archive_path });
                return Ok(());
            }
        }
    } else {
        vec![0]
    };

    let fragment = render_fragment(BUNDLE_ID, &bytes);
    write_if_changed(&fragment_dir.join(FRAGMENT_FILE), &fragment)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_layout() -> (tempfile::TempDir, RepoLayout) {
        let temp = tempfile::tempdir().unwrap();
        let layout = RepoLayout::from_root(temp.path().to_path_buf());
        (temp, layout)
    }

    const TARGET: TargetSpec = TargetSpec {
        name: "HelioEditor",
        dir: "Editor",
        prebuild: true,
        copy_to_included_builds: true,
        non_resource_dependencies: &["Data", ".helio"],
        resource_libraries: &["Core", "Phantom"],
        vfs_only: &["Templates"],
    };

    #[test]
    fn manifest_skips_missing_resource_libraries() {
        let (_temp, layout) = scratch_layout();
        fs::create_dir_all(layout.resources.join("Core")).unwrap();

        let manifest = assemble_manifest(&layout, None, &TARGET);
        assert!(manifest.contains(&layout.repo.join("Data")));
        assert!(manifest.contains(&layout.resources.join("Core")));
        assert!(!manifest.iter().any(|path| path.ends_with("Phantom")));
    }

    #[test]
    fn manifest_includes_prebuilt_content_only_when_keyed_dir_exists() {
        let (_temp, layout) = scratch_layout();
        fs::create_dir_all(layout.resources.join("Core")).unwrap();

        let record = MetadataRecord::parse(
            "HELIO_REVISION:UNINITIALIZED=7\nHELIO_CHANGESET:UNINITIALIZED=abcd\n",
        );
        let prebuilt_core = layout
            .prebuilt_content
            .join(record.version_key())
            .join("Core");
        fs::create_dir_all(&prebuilt_core).unwrap();

        let manifest = assemble_manifest(&layout, Some(&record), &TARGET);
        assert!(manifest.contains(&prebuilt_core));
        // Phantom has neither a live nor a prebuilt directory.
        assert_eq!(
            manifest.iter().filter(|p| p.ends_with("Phantom")).count(),
            0
        );
    }

    #[test]
    fn relative_conversion_keeps_paths_inside_the_repo() {
        let (_temp, layout) = scratch_layout();
        let inside = layout.resources.join("Core");
        let outside = PathBuf::from("/somewhere/else");

        let relative = relative_to_repo(&layout.repo, &[inside, outside.clone()]);
        assert_eq!(relative[0], PathBuf::from("Resources/Core"));
        assert_eq!(relative[1], outside);
    }

    #[tokio::test]
    async fn disabled_vfs_emits_the_placeholder_fragment() {
        let (_temp, layout) = scratch_layout();
        let report = RunReport::new();
        let combo = crate::combo::BuildCombo::resolve(&crate::combo::ComboRequest {
            alias: Some("linux".to_string()),
            vfs: false,
            ..crate::combo::ComboRequest::new()
        })
        .unwrap();
        let context = crate::combo::activate(&layout, &combo).unwrap();

        write_target_bundle(&report, &layout, &context, None, &TARGET)
            .await
            .unwrap();

        let fragment = fs::read_to_string(fragment_dir(&context, &TARGET).join(FRAGMENT_FILE)).unwrap();
        assert_eq!(fragment, render_fragment(BUNDLE_ID, &[0]));
        assert_eq!(report.error_count(), 0);
    }
}
