//! Canonical package identity and filename rendering.

use crate::combo::BuildCombo;
use crate::metadata::MetadataRecord;

/// The strictly ordered tuple identifying one distributable package.
///
/// The rendered filename must match the compiled artifact's own
/// self-identification, which parses these fields back out of its file name.
/// Two packages with identical tuples are the same package and overwrite one
/// another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIdentity {
    pub product: String,
    pub branch: String,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub revision: u32,
    pub short_changeset: String,
    pub timestamp_ms: u64,
    pub architecture: String,
    pub configuration: String,
}

impl PackageIdentity {
    pub fn from_metadata(product: &str, metadata: &MetadataRecord, combo: &BuildCombo) -> Self {
        Self {
            product: product.to_string(),
            branch: metadata.branch.clone(),
            major: metadata.major,
            minor: metadata.minor,
            patch: metadata.patch,
            revision: metadata.revision,
            short_changeset: metadata.short_changeset.clone(),
            timestamp_ms: metadata.timestamp_ms,
            architecture: combo.architecture.to_string(),
            configuration: metadata.configuration.clone(),
        }
    }

    /// `Name.Branch.Major.Minor.Patch.Revision.ShortChangeset.Timestamp.Architecture.Configuration.zip`
    pub fn file_name(&self) -> String {
        format!(
            "{}.{}.{}.{}.{}.{}.{}.{}.{}.{}.zip",
            self.product,
            self.branch,
            self.major,
            self.minor,
            self.patch,
            self.revision,
            self.short_changeset,
            self.timestamp_ms,
            self.architecture,
            self.configuration,
        )
    }
}
