//! Read-only version-control metadata, queried from the git CLI.
//!
//! Every query degrades to an empty value on failure; a repository without
//! history still configures, it just stamps zeroed identity fields.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::process::runner::run_simple;
use crate::report::RunReport;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevisionInfo {
    pub branch: String,
    /// Commit count on the current head.
    pub revision: String,
    pub short_changeset: String,
    pub changeset: String,
    /// `YYYY-MM-DD`, quoted for embedding as a string define.
    pub changeset_date: String,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

pub async fn query(report: &RunReport, repo: &Path) -> RevisionInfo {
    let git = |args: &'static [&'static str]| run_simple(report, "git", args, Some(repo));

    let branch = git(&["rev-parse", "--abbrev-ref", "HEAD"]).await;
    let revision = git(&["rev-list", "--count", "HEAD"]).await;
    let short_changeset = git(&["log", "-1", "--pretty=%h", "--abbrev=12"]).await;
    let changeset = git(&["log", "-1", "--pretty=%H"]).await;
    let date = git(&["log", "-1", "--pretty=%cd", "--date=format:%Y-%m-%d"]).await;
    let tag = git(&["describe", "--tags"]).await;

    let (major, minor, patch) = parse_version_tag(&tag);

    RevisionInfo {
        branch,
        revision,
        short_changeset,
        changeset,
        changeset_date: format!("\"{date}\""),
        major,
        minor,
        patch,
    }
}

/// Extract the semantic version triple from a `v<major>.<minor>.<patch>` tag,
/// zeroed when no such tag describes the head.
pub fn parse_version_tag(tag: &str) -> (u32, u32, u32) {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"v(?P<major>[0-9]+)\.(?P<minor>[0-9]+)\.(?P<patch>[0-9]+)")
            .expect("version pattern compiles")
    });

    let Some(captures) = pattern.captures(tag) else {
        return (0, 0, 0);
    };
    let field = |name: &str| captures[name].parse().unwrap_or_default();
    (field("major"), field("minor"), field("patch"))
}
