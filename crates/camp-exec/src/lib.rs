//! Execution adapter for camp batches.
//!
//! A [`Platform`] knows how to run one experimental run and which
//! [`Paradigm`] its runs are grouped by; an [`ExecEnv`] knows how much
//! parallelism is available. [`ExecutionAdapter`] combines the two into
//! GNU-parallel command files and launches them.

mod adapter;
pub mod commands;
pub mod env;
mod executor;
mod platform;
mod preflight;
pub mod status;

pub use adapter::{ExecOptions, ExecUnit, ExecuteReport, ExecutePlan, ExecutionAdapter};
pub use commands::{write_command_file, ExperimentCommands, RunCommands, RunEntry};
pub use env::{
    expand_hostlist, AdhocEnv, EnvConfig, EnvSource, ExecEnv, ExecEnvRegistry, LocalEnv, PbsEnv,
    ProcessEnv, SlurmEnv,
};
pub use executor::ExecutorConfig;
pub use platform::{Paradigm, Platform, PlatformRegistry, PlatformSpec, Robot, Simulator};
pub use preflight::{find_executable, preflight, PreflightReport};
pub use status::{check_run, ExecStatus, RunState, RunStatus};

/// Stable error codes raised by this crate.
pub mod codes {
    /// A required executable or variable is missing.
    pub const PREFLIGHT: &str = "exec.preflight";
    /// The executor could not be started.
    pub const LAUNCH: &str = "exec.launch";
    pub const UNKNOWN_PLATFORM: &str = "exec.unknown_platform";
    pub const UNKNOWN_ENV: &str = "exec.unknown_env";
}
