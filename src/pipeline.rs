//! Stage orchestration: configure, build, harvest, pack.
//!
//! Stages run strictly in sequence and every stage is safe to re-run on its
//! own: directory creation is idempotent, packaging overwrites by identity,
//! and the embedded fragment is diff-gated. A partial failure is resumed by
//! re-invoking the failed stage, not by replaying the whole pipeline.

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::archive;
use crate::bundle;
use crate::combo::{self, BuildCombo, BuildContext, ComboRequest};
use crate::error::{PipelineError, Result};
use crate::layout::{self, RepoLayout};
use crate::metadata::MetadataRecord;
use crate::package;
use crate::process::classify::LineClassifier;
use crate::process::runner::{run, ExecOptions, RetryPolicy, StreamSink};
use crate::process::{ensure_command, Heartbeat};
use crate::report::RunReport;
use crate::targets::{TargetSpec, TARGETS};
use crate::vcs;

/// Retry shape for the content fetch performed by the built executable.
/// Fetches hit remote storage and are the one flaky step of the pipeline.
const HARVEST_RETRY: RetryPolicy = RetryPolicy {
    attempts: 3,
    backoff: Duration::from_secs(10),
};

pub struct Pipeline {
    layout: RepoLayout,
    report: RunReport,
    targets: &'static [TargetSpec],
}

impl Pipeline {
    pub fn new(layout: RepoLayout, report: RunReport) -> Self {
        Self::with_targets(layout, report, TARGETS)
    }

    pub fn with_targets(
        layout: RepoLayout,
        report: RunReport,
        targets: &'static [TargetSpec],
    ) -> Self {
        Self {
            layout,
            report,
            targets,
        }
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Resolve and activate the requested combo. An unspecified request
    /// reuses the most recently activated context instead of re-deriving,
    /// so a bare `pack` after an earlier `configure` addresses the same tree.
    fn resolve_context(&self, request: &ComboRequest) -> Result<BuildContext> {
        if request.is_unspecified() {
            if let Some(active) = combo::load_active(&self.layout)? {
                return combo::activate(&self.layout, &active.combo);
            }
        }
        let resolved = BuildCombo::resolve(request)?;
        combo::activate(&self.layout, &resolved)
    }

    /// Generate the build system for the requested combo.
    pub async fn configure(&self, request: &ComboRequest) -> Result<Option<BuildContext>> {
        self.report.log_line("Configuring");
        if !ensure_command(&self.report, "cmake") || !ensure_command(&self.report, "git") {
            return Ok(None);
        }

        let revision = vcs::query(&self.report, &self.layout.repo).await;
        let combo = BuildCombo::resolve(request)?;
        let context = combo::activate(&self.layout, &combo)?;

        // Seed the fragment from live resources only; prebuilt content is
        // folded in by the build stage once metadata exists.
        for target in self.targets {
            bundle::write_target_bundle(&self.report, &self.layout, &context, None, target).await?;
        }

        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();

        let mut args = vec![
            format!("-DHELIO_MS_SINCE_EPOCH={now_ms}"),
            format!("-DHELIO_BRANCH={}", revision.branch),
            format!("-DHELIO_REVISION={}", revision.revision),
            format!("-DHELIO_SHORT_CHANGESET={}", revision.short_changeset),
            format!("-DHELIO_CHANGESET={}", revision.changeset),
            format!("-DHELIO_CHANGESET_DATE={}", revision.changeset_date),
            format!("-DHELIO_MAJOR_VERSION={}", revision.major),
            format!("-DHELIO_MINOR_VERSION={}", revision.minor),
            format!("-DHELIO_PATCH_VERSION={}", revision.patch),
            format!("-DHELIO_CONFIG={}", context.combo.configuration),
            "-GNinja".to_string(),
            format!("-DCMAKE_BUILD_TYPE={}", context.combo.configuration),
            "-DCMAKE_EXPORT_COMPILE_COMMANDS=1".to_string(),
        ];
        for (key, value) in &context.combo.extra_defines {
            args.push(format!("-D{key}={value}"));
        }
        args.push(self.layout.repo.display().to_string());

        for arg in &args {
            self.report.log_line(arg);
        }

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let options = ExecOptions {
            cwd: Some(context.build_dir.clone()),
            ..ExecOptions::default()
        };
        run(&self.report, "cmake", &args, &options).await?;

        self.report.log_line("Configured");
        Ok(Some(context))
    }

    /// Drive the compiler toolchain for the active combo.
    pub async fn build(
        &self,
        request: &ComboRequest,
        target: Option<&str>,
        parallel: Option<usize>,
    ) -> Result<()> {
        self.report.log_line("Building");
        if !ensure_command(&self.report, "cmake") {
            return Ok(());
        }

        let context = self.resolve_context(request)?;

        // Fold prebuilt content into the bundle when the cache already
        // exists; on a first build it simply is not there yet.
        let metadata = match MetadataRecord::read(&context.build_dir) {
            Ok(record) => Some(record),
            Err(PipelineError::MissingCache { path }) => {
                tracing::warn!("No build cache yet at {}", path.display());
                None
            }
            Err(err) => return Err(err),
        };
        for spec in self.targets {
            bundle::write_target_bundle(
                &self.report,
                &self.layout,
                &context,
                metadata.as_ref(),
                spec,
            )
            .await?;
        }

        let parallel = parallel.unwrap_or_else(num_cpus::get).to_string();
        let configuration = context.combo.configuration.as_str();
        let mut args = vec!["--build", ".", "--config", configuration];
        if let Some(target) = target {
            args.extend(["--target", target]);
        }
        args.extend(["--parallel", &parallel]);

        let options = ExecOptions {
            cwd: Some(context.build_dir.clone()),
            stdout: StreamSink::Classify(LineClassifier::build_output()),
            heartbeat: true,
            ..ExecOptions::default()
        };
        run(&self.report, "cmake", &args, &options).await?;

        self.report.log_line("Built");
        Ok(())
    }

    /// Run each prebuild-capable executable so it fetches versioned runtime
    /// content, then fold the downloads into the prebuilt-content cache.
    pub async fn harvest_prebuilt(&self, request: &ComboRequest) -> Result<()> {
        self.report.log_line("Copying prebuilt content");
        let _heartbeat = Heartbeat::start(self.report.clone());

        let context = self.resolve_context(request)?;

        // Locate every executable before touching the cache: a missing
        // artifact must leave the existing prebuilt tree intact.
        let mut runnable = Vec::new();
        for spec in self.targets.iter().filter(|spec| spec.prebuild) {
            match package::find_executable(&context, spec) {
                Some(executable) => runnable.push(executable),
                None => {
                    self.report.record(&PipelineError::MissingArtifact {
                        path: context
                            .build_dir
                            .join("Code")
                            .join(spec.dir)
                            .join(spec.name),
                    });
                }
            }
        }
        if runnable.is_empty() {
            return Ok(());
        }

        layout::clear_create_dir(&self.layout.prebuilt_content)?;

        for executable in runnable {
            // Fresh scratch area per attempt so a retried fetch never sees
            // a partial download.
            layout::clear_create_dir(&self.layout.downloads)?;

            let options = ExecOptions {
                cwd: Some(context.build_dir.clone()),
                stdout: StreamSink::Log,
                stderr: StreamSink::Log,
                retry: Some(HARVEST_RETRY),
                ..ExecOptions::default()
            };
            let command = executable.display().to_string();
            match run(
                &self.report,
                &command,
                &["-CopyPrebuiltContent", "-Exit"],
                &options,
            )
            .await
            {
                Ok(_) => self.extract_downloads().await?,
                // A target whose executable cannot launch skips its harvest
                // without aborting the others.
                Err(err) => self.report.record(&err),
            }
        }

        if self.layout.downloads.exists() {
            std::fs::remove_dir_all(&self.layout.downloads)?;
        }
        if !dir_is_populated(&self.layout.prebuilt_content) {
            self.report
                .log_line("Prebuilt content directory did not exist or was empty");
        }
        self.report.log_line("Copied prebuilt content");
        Ok(())
    }

    async fn extract_downloads(&self) -> Result<()> {
        let entries = match std::fs::read_dir(&self.layout.downloads) {
            Ok(entries) => entries,
            Err(_) => return Ok(()),
        };
        for entry in entries {
            let path = entry?.path();
            let is_zip = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
            if !is_zip {
                continue;
            }
            self.report
                .log_line(&format!("Extracting download {}", path.display()));
            archive::zip_extract(&path, &self.layout.prebuilt_content).await?;
        }
        Ok(())
    }

    /// Package every target for the active combo.
    pub async fn pack(&self, request: &ComboRequest) -> Result<()> {
        self.report.log_line("Packing");
        let context = self.resolve_context(request)?;

        let metadata = match MetadataRecord::read(&context.build_dir) {
            Ok(record) => record,
            Err(err @ PipelineError::MissingCache { .. }) => {
                // Nothing downstream can be named without metadata.
                self.report.record(&err);
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        // Output tree creation is the one fatal packaging step.
        layout::clear_create_dir(&self.layout.page)?;
        std::fs::write(self.layout.page.join(".nojekyll"), "")?;
        std::fs::create_dir_all(&self.layout.packages)?;
        if self.layout.included_builds.exists() {
            std::fs::remove_dir_all(&self.layout.included_builds)?;
        }

        for spec in self.targets {
            match package::pack_target(&self.report, &self.layout, &context, &metadata, spec).await
            {
                Ok(package_path) => self
                    .report
                    .log_line(&format!("Packaged {}", package_path.display())),
                // One target's failure never aborts its siblings.
                Err(err) => self.report.record(&err),
            }
        }
        self.report.log_line("Packed");
        Ok(())
    }

    /// The full release sequence.
    ///
    /// Build runs twice: the first build produces an executable able to
    /// fetch prebuilt content, the second embeds that content in its bundle.
    /// Pack runs twice so the second pass picks up the included builds the
    /// first pass staged.
    pub async fn run_all(&self, request: &ComboRequest, parallel: Option<usize>) -> Result<()> {
        self.configure(request).await?;
        self.build(request, None, parallel).await?;
        self.harvest_prebuilt(request).await?;
        self.build(request, None, parallel).await?;
        self.pack(request).await?;
        self.pack(request).await?;
        Ok(())
    }

    /// Publish the page tree through the external publisher.
    pub async fn deploy(&self) -> Result<()> {
        self.report.log_line("Deploying");
        if !self.layout.page.is_dir() {
            self.report.log_line("Nothing to deploy: page tree missing");
            return Ok(());
        }
        if !ensure_command(&self.report, "npm") {
            return Ok(());
        }
        let options = ExecOptions {
            cwd: Some(self.layout.repo.clone()),
            ..ExecOptions::default()
        };
        run(&self.report, "npm", &["run", "deploy-gh-pages"], &options).await?;
        self.report.log_line("Deployed");
        Ok(())
    }

    pub fn layout(&self) -> &RepoLayout {
        &self.layout
    }
}

/// True when `path` contains at least one entry.
pub fn dir_is_populated(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
