//! Repository layout: root discovery and the fixed output subtree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

/// Marker file identifying the repository root.
pub const REPO_MARKER: &str = ".helio";

/// Resolved directory tree of a Helio repository.
///
/// Everything the pipeline produces lives under `Build/`; the source side is
/// `Code/` (compiled libraries) and `Resources/` (runtime resource libraries).
#[derive(Debug, Clone)]
pub struct RepoLayout {
    pub repo: PathBuf,
    pub libraries: PathBuf,
    pub resources: PathBuf,
    pub build: PathBuf,
    pub prebuilt_content: PathBuf,
    pub included_builds: PathBuf,
    pub packages: PathBuf,
    pub page: PathBuf,
    pub downloads: PathBuf,
}

impl RepoLayout {
    /// Locate the repository root by walking upward from the working
    /// directory until the marker file is found.
    pub fn discover() -> Result<Self> {
        Self::discover_from(std::env::current_dir()?)
    }

    pub fn discover_from(start: PathBuf) -> Result<Self> {
        let mut dir: &Path = &start;
        loop {
            if dir.join(REPO_MARKER).is_file() {
                return Ok(Self::from_root(dir.to_path_buf()));
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => {
                    return Err(PipelineError::RepoRootNotFound {
                        marker: REPO_MARKER,
                        start,
                    })
                }
            }
        }
    }

    pub fn from_root(repo: PathBuf) -> Self {
        let build = repo.join("Build");
        Self {
            libraries: repo.join("Code"),
            resources: repo.join("Resources"),
            prebuilt_content: build.join("PrebuiltContent"),
            included_builds: build.join("IncludedBuilds"),
            packages: build.join("Packages"),
            page: build.join("Page"),
            downloads: build.join("Downloads"),
            build,
            repo,
        }
    }

    /// Pointer file recording the most recently activated build directory.
    pub fn active_pointer(&self) -> PathBuf {
        self.build.join("active.json")
    }
}

/// Remove a directory tree if present, then recreate it empty.
pub fn clear_create_dir(dir: &Path) -> io::Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)
}

/// Remove a file, reporting whether it existed.
pub fn try_remove_file(path: &Path) -> bool {
    fs::remove_file(path).is_ok()
}
