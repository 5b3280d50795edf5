//! End-to-end stage behavior against a scratch repository.

use std::fs;
use std::path::Path;

use shipwright::combo::{activate, BuildCombo, ComboRequest};
use shipwright::layout::{RepoLayout, REPO_MARKER};
use shipwright::metadata::CACHE_FILE;
use shipwright::pipeline::Pipeline;
use shipwright::report::RunReport;
use shipwright::targets::TargetSpec;

const EDITOR: TargetSpec = TargetSpec {
    name: "HelioEditor",
    dir: "Editor",
    prebuild: true,
    copy_to_included_builds: false,
    non_resource_dependencies: &["Data"],
    resource_libraries: &["Core"],
    vfs_only: &[],
};

const LAUNCHER: TargetSpec = TargetSpec {
    name: "HelioLauncher",
    dir: "Launcher",
    prebuild: false,
    copy_to_included_builds: false,
    non_resource_dependencies: &[],
    resource_libraries: &[],
    vfs_only: &[],
};

const TEST_TARGETS: &[TargetSpec] = &[EDITOR, LAUNCHER];

fn scratch_repo() -> (tempfile::TempDir, RepoLayout) {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path().to_path_buf();
    fs::write(root.join(REPO_MARKER), "").unwrap();
    fs::create_dir_all(root.join("Code")).unwrap();
    fs::create_dir_all(root.join("Resources").join("Core")).unwrap();
    fs::create_dir_all(root.join("Data")).unwrap();
    let layout = RepoLayout::from_root(root);
    (temp, layout)
}

fn linux_request() -> ComboRequest {
    ComboRequest {
        alias: Some("linux".to_string()),
        ..ComboRequest::new()
    }
}

fn write_cache(build_dir: &Path) {
    fs::write(
        build_dir.join(CACHE_FILE),
        "\
HELIO_BRANCH:UNINITIALIZED=main
HELIO_REVISION:UNINITIALIZED=450
HELIO_SHORT_CHANGESET:UNINITIALIZED=abc123def456
HELIO_CHANGESET:UNINITIALIZED=abc123def4567890
HELIO_MAJOR_VERSION:UNINITIALIZED=1
HELIO_MINOR_VERSION:UNINITIALIZED=2
HELIO_PATCH_VERSION:UNINITIALIZED=3
HELIO_CONFIG:UNINITIALIZED=Release
HELIO_MS_SINCE_EPOCH:UNINITIALIZED=1700000000000
",
    )
    .unwrap();
}

mod harvest {
    use super::*;

    #[tokio::test]
    async fn missing_executable_leaves_prebuilt_content_untouched() {
        let (_temp, layout) = scratch_repo();

        // Pre-existing harvested content from an earlier run.
        let stale = layout.prebuilt_content.join("Version-1-aaaa");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("Core.bin"), "previous harvest").unwrap();

        let report = RunReport::new();
        let pipeline = Pipeline::with_targets(layout.clone(), report.clone(), TEST_TARGETS);
        pipeline.harvest_prebuilt(&linux_request()).await.unwrap();

        assert!(report.has_errors());
        assert_eq!(
            fs::read_to_string(stale.join("Core.bin")).unwrap(),
            "previous harvest"
        );
    }

    #[tokio::test]
    async fn only_prebuild_targets_are_expected_to_exist() {
        let (_temp, layout) = scratch_repo();
        let report = RunReport::new();
        let pipeline = Pipeline::with_targets(layout, report.clone(), TEST_TARGETS);
        pipeline.harvest_prebuilt(&linux_request()).await.unwrap();

        // Exactly one missing artifact: the launcher is not prebuild-capable.
        assert_eq!(report.error_count(), 1);
    }
}

mod pack {
    use super::*;

    #[tokio::test]
    async fn missing_cache_skips_packaging_entirely() {
        let (_temp, layout) = scratch_repo();
        let report = RunReport::new();
        let pipeline = Pipeline::with_targets(layout.clone(), report.clone(), TEST_TARGETS);

        pipeline.pack(&linux_request()).await.unwrap();

        assert!(report.has_errors());
        assert!(!layout.page.exists());
        assert!(!layout.packages.exists());
    }

    #[tokio::test]
    async fn one_missing_target_does_not_abort_the_others() {
        let (_temp, layout) = scratch_repo();
        let report = RunReport::new();
        let pipeline = Pipeline::with_targets(layout.clone(), report.clone(), TEST_TARGETS);

        // Only the launcher has build output; the editor is missing and is
        // deliberately first in the target table.
        let combo = BuildCombo::resolve(&linux_request()).unwrap();
        let context = activate(&layout, &combo).unwrap();
        write_cache(&context.build_dir);
        let launcher_out = context
            .build_dir
            .join("Code")
            .join("Launcher")
            .join("HelioLauncher");
        fs::create_dir_all(&launcher_out).unwrap();
        fs::write(launcher_out.join("HelioLauncher.js"), "bundle").unwrap();
        fs::write(launcher_out.join("HelioLauncher.pdb"), "symbols").unwrap();

        pipeline.pack(&linux_request()).await.unwrap();

        // The editor's absence was recorded, the launcher still published.
        assert!(report.has_errors());
        let mirrored = layout.page.join("HelioLauncher").join("HelioLauncher.js");
        assert_eq!(fs::read_to_string(mirrored).unwrap(), "bundle");
        // Denylisted byproducts stay out of the publish tree.
        assert!(!layout.page.join("HelioLauncher").join("HelioLauncher.pdb").exists());
        assert!(layout.page.join(".nojekyll").exists());
    }

    #[tokio::test]
    async fn packing_reuses_the_active_context_when_unspecified() {
        let (_temp, layout) = scratch_repo();
        let report = RunReport::new();
        let pipeline = Pipeline::with_targets(layout.clone(), report.clone(), TEST_TARGETS);

        // Activate a non-default combo, then pack with no combo flags.
        let combo = BuildCombo::resolve(&ComboRequest {
            alias: Some("web".to_string()),
            ..ComboRequest::new()
        })
        .unwrap();
        let context = activate(&layout, &combo).unwrap();
        write_cache(&context.build_dir);

        pipeline.pack(&ComboRequest::new()).await.unwrap();

        // Metadata was found in the web build tree, so packaging proceeded
        // past the cache check into the output tree.
        assert!(layout.page.exists());
    }
}

mod activation {
    use super::*;

    #[test]
    fn repeated_activation_is_stable() {
        let (_temp, layout) = scratch_repo();
        let combo = BuildCombo::resolve(&linux_request()).unwrap();

        let first = activate(&layout, &combo).unwrap();
        let second = activate(&layout, &combo).unwrap();
        assert_eq!(first.build_dir, second.build_dir);
        assert!(second.build_dir.is_dir());
    }
}
