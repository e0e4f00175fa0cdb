//! Stage orchestration for camp experiment campaigns.
//!
//! A batch moves through Generate, Execute, Process, Deliver and Compare.
//! Stages hand over through files only: each stage checks that its
//! producer's artifacts exist before it starts and never re-runs an earlier
//! stage on its own.

pub mod artifacts;
pub mod config;
mod hooks;
mod orchestrator;
pub mod stage;
pub mod stages;

pub use config::{
    CompareConfig, ConfigOverrides, ExecEnvConfig, PipelineConfig, PlatformConfig, SeedConfig,
};
pub use hooks::{NoHooks, StageContext, StageHooks};
pub use orchestrator::{PipelineReport, StageOrchestrator};
pub use stage::Stage;

/// Stable error codes raised by this crate.
pub mod codes {
    pub const INVALID_CONFIG: &str = "config.invalid";
    pub const UNKNOWN_STAGE: &str = "stage.unknown";
    /// A stage's input artifact is absent.
    pub const MISSING_ARTIFACT: &str = "stage.missing_artifact";
    /// A stage's input artifact exists but cannot be read.
    pub const MALFORMED_ARTIFACT: &str = "stage.malformed_artifact";
    /// Generate could not materialize every experiment.
    pub const GENERATE_FAILED: &str = "stage.generate_failed";
}
