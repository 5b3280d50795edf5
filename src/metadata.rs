//! Persisted build metadata, read back from the generator's cache.
//!
//! The cache carries hundreds of `name:TYPE=value` records; only the keys the
//! pipeline itself defined at configure time are kept. A record is re-derived
//! fresh on every read and never merged with an earlier one.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{PipelineError, Result};

pub const CACHE_FILE: &str = "CMakeCache.txt";

/// Typed view of the pipeline-owned cache keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    pub branch: String,
    pub revision: u32,
    pub short_changeset: String,
    pub changeset: String,
    pub changeset_date: String,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub configuration: String,
    pub timestamp_ms: u64,
}

impl MetadataRecord {
    /// Read and parse the cache under `build_dir`.
    ///
    /// A missing cache is fatal to any stage depending on metadata; callers
    /// that can proceed without it treat the error as a recorded skip.
    pub fn read(build_dir: &Path) -> Result<Self> {
        let path = build_dir.join(CACHE_FILE);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::MissingCache { path })
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Self::parse(&contents))
    }

    pub fn parse(contents: &str) -> Self {
        let mut values = HashMap::new();
        for captures in record_pattern().captures_iter(contents) {
            values.insert(captures["name"].to_string(), captures["value"].to_string());
        }

        let text = |key: &str| values.get(key).cloned().unwrap_or_default();
        let number = |key: &str| -> u64 { text(key).parse().unwrap_or_default() };

        Self {
            branch: text("HELIO_BRANCH"),
            revision: number("HELIO_REVISION") as u32,
            short_changeset: text("HELIO_SHORT_CHANGESET"),
            changeset: text("HELIO_CHANGESET"),
            changeset_date: text("HELIO_CHANGESET_DATE"),
            major: number("HELIO_MAJOR_VERSION") as u32,
            minor: number("HELIO_MINOR_VERSION") as u32,
            patch: number("HELIO_PATCH_VERSION") as u32,
            configuration: text("HELIO_CONFIG"),
            timestamp_ms: number("HELIO_MS_SINCE_EPOCH"),
        }
    }

    /// Versioned key naming the prebuilt-content directory for this build.
    /// Must match the name the runtime derives for its own content cache.
    pub fn version_key(&self) -> String {
        format!("Version-{}-{}", self.revision, self.changeset)
    }
}

fn record_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^(?P<name>[A-Za-z0-9_-]+):(?P<type>[A-Z]+)=(?P<value>.*)$")
            .expect("record pattern compiles")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# This is the CMakeCache file.
CMAKE_BUILD_TYPE:STRING=Release
CMAKE_CXX_COMPILER:FILEPATH=/usr/bin/clang++
HELIO_BRANCH:UNINITIALIZED=main
HELIO_REVISION:UNINITIALIZED=450
HELIO_SHORT_CHANGESET:UNINITIALIZED=abc123def456
HELIO_CHANGESET:UNINITIALIZED=abc123def4567890abc123def4567890abc123de
HELIO_CHANGESET_DATE:UNINITIALIZED=\"2023-11-14\"
HELIO_MAJOR_VERSION:UNINITIALIZED=1
HELIO_MINOR_VERSION:UNINITIALIZED=2
HELIO_PATCH_VERSION:UNINITIALIZED=3
HELIO_CONFIG:UNINITIALIZED=Release
HELIO_MS_SINCE_EPOCH:UNINITIALIZED=1700000000000
//comment line that is not a record
NOT A RECORD
";

    #[test]
    fn parses_known_keys_and_ignores_the_rest() {
        let record = MetadataRecord::parse(SAMPLE);
        assert_eq!(record.branch, "main");
        assert_eq!(record.revision, 450);
        assert_eq!(record.short_changeset, "abc123def456");
        assert_eq!(record.changeset_date, "\"2023-11-14\"");
        assert_eq!((record.major, record.minor, record.patch), (1, 2, 3));
        assert_eq!(record.configuration, "Release");
        assert_eq!(record.timestamp_ms, 1_700_000_000_000);
    }

    #[test]
    fn missing_keys_degrade_to_defaults() {
        let record = MetadataRecord::parse("CMAKE_BUILD_TYPE:STRING=Release\n");
        assert_eq!(record.branch, "");
        assert_eq!(record.revision, 0);
        assert_eq!(record.timestamp_ms, 0);
    }

    #[test]
    fn version_key_matches_the_runtime_derivation() {
        let record = MetadataRecord::parse(SAMPLE);
        assert_eq!(
            record.version_key(),
            "Version-450-abc123def4567890abc123def4567890abc123de"
        );
    }

    #[test]
    fn absent_cache_is_a_missing_cache_error() {
        let temp = tempfile::tempdir().unwrap();
        let result = MetadataRecord::read(temp.path());
        assert!(matches!(result, Err(PipelineError::MissingCache { .. })));
    }

    #[test]
    fn read_round_trips_through_the_filesystem() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join(CACHE_FILE), SAMPLE).unwrap();
        let record = MetadataRecord::read(temp.path()).unwrap();
        assert_eq!(record.revision, 450);
    }
}
