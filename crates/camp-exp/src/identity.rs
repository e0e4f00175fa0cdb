//! Batch identity manifest (`batch.json`).
//!
//! The manifest pins what a batch directory contains: the identity it was
//! generated from and the ordered experiment list. Later stages read it
//! instead of re-expanding criteria, so the cardinality cannot drift.

use std::path::Path;

use camp_core::serde::{read_json, write_json};
use camp_core::{stable_hash_string, CampError, ErrorInfo, Provenance};
use camp_criteria::{CellIndex, ParamTuple};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::codes;
use crate::layout::BatchLayout;

/// Everything that determines a batch's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchIdentity {
    pub project: String,
    pub template: String,
    pub controller: String,
    pub scenario: String,
    pub criteria: Vec<String>,
    pub platform: String,
    pub n_runs: usize,
    /// `None` when seeds are drawn randomly.
    pub master_seed: Option<u64>,
}

impl BatchIdentity {
    /// Stable hash of the identity.
    pub fn digest(&self) -> Result<String, CampError> {
        stable_hash_string(self)
    }
}

/// One experiment as recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub index: CellIndex,
    pub params: ParamTuple,
}

/// Contents of `batch.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchManifest {
    pub identity: BatchIdentity,
    pub identity_hash: String,
    pub category: String,
    pub param_names: Vec<String>,
    /// Per-dimension cardinalities; one entry for univariate batches.
    pub shape: Vec<usize>,
    pub experiments: Vec<ManifestEntry>,
    pub provenance: Provenance,
}

impl BatchManifest {
    /// Number of experiments.
    pub fn cardinality(&self) -> usize {
        self.experiments.len()
    }

    /// True for two-dimensional batches.
    pub fn is_bivariate(&self) -> bool {
        self.shape.len() == 2
    }

    /// Reads the manifest of the batch at `layout`.
    pub fn load(layout: &BatchLayout) -> Result<Self, CampError> {
        let path = layout.manifest_path();
        let manifest: Self = read_json(&path)?;
        manifest.provenance.ensure_readable(&path)?;
        Ok(manifest)
    }

    /// Writes the manifest to `layout`.
    pub fn store(&self, layout: &BatchLayout) -> Result<(), CampError> {
        write_json(&layout.manifest_path(), self)
    }
}

/// Checks that `identity` may be generated into the batch root of `layout`.
///
/// A missing manifest is always fine. An existing manifest with a different
/// identity is refused. An existing manifest with the same identity is
/// refused unless `overwrite` is set.
pub fn claim_batch(
    layout: &BatchLayout,
    identity: &BatchIdentity,
    overwrite: bool,
) -> Result<(), CampError> {
    let path = layout.manifest_path();
    if !path.exists() {
        return Ok(());
    }
    let existing = BatchManifest::load(layout)?;
    let digest = identity.digest()?;
    if existing.identity_hash != digest {
        return Err(CampError::Experiment(
            identity_error(codes::IDENTITY_MISMATCH, &path, "batch root holds a different batch")
                .with_context("existing", existing.identity_hash)
                .with_context("configured", digest)
                .with_hint("choose a different output root or remove the stale batch"),
        ));
    }
    if !overwrite {
        return Err(CampError::Experiment(
            identity_error(codes::BATCH_EXISTS, &path, "batch already generated")
                .with_hint("rerun with overwrite enabled to regenerate"),
        ));
    }
    warn!(batch = %layout.batch_root().display(), "regenerating existing batch");
    Ok(())
}

fn identity_error(code: &str, path: &Path, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message).with_context("path", path.display().to_string())
}

/// Stamps and stores a manifest; returns it.
pub fn write_manifest(
    layout: &BatchLayout,
    identity: BatchIdentity,
    param_names: Vec<String>,
    shape: Vec<usize>,
    experiments: Vec<ManifestEntry>,
) -> Result<BatchManifest, CampError> {
    let identity_hash = identity.digest()?;
    let manifest = BatchManifest {
        provenance: Provenance::now(identity_hash.clone(), "camp-exp", env!("CARGO_PKG_VERSION")),
        identity,
        identity_hash,
        category: layout.category().to_string(),
        param_names,
        shape,
        experiments,
    };
    manifest.store(layout)?;
    info!(
        batch = %layout.batch_root().display(),
        experiments = manifest.cardinality(),
        "wrote batch manifest"
    );
    Ok(manifest)
}
