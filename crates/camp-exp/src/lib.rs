//! Experiment definitions for camp batches.
//!
//! [`ExperimentBuilder`] turns expanded criteria into one [`Experiment`] per
//! cell, each owning a layered [`ExperimentDefinition`] and its replicate
//! runs. [`BatchLayout`] resolves every on-disk path of a batch and
//! [`claim_batch`] guards batch roots against mismatched regeneration.

mod builder;
mod definition;
pub mod identity;
pub mod layout;

pub use builder::{
    AttrTarget, BatchExperiment, Experiment, ExperimentBuilder, ExperimentalRun, RunSpecialization,
};
pub use definition::{ChangeLayer, ExperimentDefinition, LayeredChange};
pub use identity::{claim_batch, write_manifest, BatchIdentity, BatchManifest, ManifestEntry};
pub use layout::{run_id, BatchCoordinates, BatchLayout};

/// Stable error codes raised by this crate.
pub mod codes {
    /// Batch already generated and overwrite not requested.
    pub const BATCH_EXISTS: &str = "exp.batch_exists";
    /// Batch root manifest records a different identity.
    pub const IDENTITY_MISMATCH: &str = "exp.identity_mismatch";
    /// Zero runs per experiment requested.
    pub const NO_RUNS: &str = "exp.no_runs";
}
