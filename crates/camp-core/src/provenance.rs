//! Provenance descriptors attached to persisted artifacts.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::{CampError, ErrorInfo};

/// Error code raised when an artifact was written by an incompatible schema.
pub const SCHEMA_MISMATCH: &str = "serde.schema_version";

/// Semantic version describing the schema of serialized payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Major version incremented for breaking changes.
    pub major: u32,
    /// Minor version incremented for additive changes.
    pub minor: u32,
}

impl SchemaVersion {
    /// Version written by this build.
    pub const CURRENT: SchemaVersion = SchemaVersion::new(1, 0);

    /// Creates a new schema version descriptor.
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Returns true when a payload of version `other` can be read by this version.
    pub fn reads(&self, other: &SchemaVersion) -> bool {
        self.major == other.major && self.minor >= other.minor
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// Provenance information recorded alongside stage artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Provenance {
    /// Schema version of the artifact.
    #[serde(default)]
    pub schema_version: SchemaVersion,
    /// Hash of the inputs the artifact was derived from.
    pub input_hash: String,
    /// RFC3339 timestamp recording when the artifact was written.
    pub created_at: String,
    /// Version map for the tools involved.
    #[serde(default)]
    pub tool_versions: BTreeMap<String, String>,
}

impl Provenance {
    /// Stamps a provenance record for `tool` at the current time.
    pub fn now(input_hash: impl Into<String>, tool: &str, version: &str) -> Self {
        let mut tool_versions = BTreeMap::new();
        tool_versions.insert(tool.to_string(), version.to_string());
        Self {
            schema_version: SchemaVersion::default(),
            input_hash: input_hash.into(),
            created_at: Utc::now().to_rfc3339(),
            tool_versions,
        }
    }

    /// Refuses artifacts at `path` whose schema this build cannot read.
    pub fn ensure_readable(&self, path: &Path) -> Result<(), CampError> {
        if SchemaVersion::CURRENT.reads(&self.schema_version) {
            return Ok(());
        }
        let SchemaVersion { major, minor } = self.schema_version;
        Err(CampError::Serde(
            ErrorInfo::new(SCHEMA_MISMATCH, "artifact was written by an incompatible schema")
                .with_context("path", path.display().to_string())
                .with_context("found", format!("{major}.{minor}"))
                .with_context(
                    "supported",
                    format!("{}.{}", SchemaVersion::CURRENT.major, SchemaVersion::CURRENT.minor),
                )
                .with_hint("regenerate the batch with this version of camp"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_schemas_are_refused() {
        let path = Path::new("/b/batch.json");
        let mut provenance = Provenance::now("abc", "camp-core", "0.1.0");
        assert!(provenance.ensure_readable(path).is_ok());

        provenance.schema_version = SchemaVersion::new(1, 3);
        let err = provenance.ensure_readable(path).expect_err("newer minor");
        assert_eq!(err.code(), SCHEMA_MISMATCH);
        assert_eq!(err.info().context.get("found").map(String::as_str), Some("1.3"));

        provenance.schema_version = SchemaVersion::new(2, 0);
        assert!(provenance.ensure_readable(path).is_err());
    }
}
