use std::path::{Path, PathBuf};

use camp_core::{CampError, ErrorInfo};
use tracing::debug;

use crate::codes;
use crate::env::{EnvSource, ExecEnv};
use crate::executor::ExecutorConfig;
use crate::platform::Platform;

/// What pre-flight found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightReport {
    /// Resolved executables, by name.
    pub executables: Vec<(String, PathBuf)>,
    pub max_parallel: usize,
}

/// Looks `name` up in the `PATH`-style `search_path`.
pub fn find_executable(name: &str, search_path: &str) -> Option<PathBuf> {
    if name.contains('/') {
        let path = Path::new(name);
        return path.is_file().then(|| path.to_path_buf());
    }
    std::env::split_paths(search_path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Verifies that everything the platform, environment and executor need is
/// present before anything is submitted.
pub fn preflight(
    platform: &dyn Platform,
    env: &dyn ExecEnv,
    executor: &ExecutorConfig,
    source: &dyn EnvSource,
) -> Result<PreflightReport, CampError> {
    let missing_vars: Vec<&str> = env
        .required_vars()
        .iter()
        .copied()
        .filter(|key| source.var(key).is_none())
        .collect();

    let mut wanted = vec![executor.program.clone()];
    wanted.extend(env.required_executables());
    wanted.extend(platform.required_executables());
    wanted.sort();
    wanted.dedup();

    let search_path = source.var("PATH").unwrap_or_default();
    let mut executables = Vec::new();
    let mut missing_exes = Vec::new();
    for name in wanted {
        match find_executable(&name, &search_path) {
            Some(path) => executables.push((name, path)),
            None => missing_exes.push(name),
        }
    }

    if !missing_vars.is_empty() || !missing_exes.is_empty() {
        let mut info = ErrorInfo::new(codes::PREFLIGHT, "pre-flight checks failed")
            .with_context("platform", platform.name())
            .with_context("env", env.name());
        if !missing_exes.is_empty() {
            info = info.with_context("missing_executables", missing_exes.join(","));
        }
        if !missing_vars.is_empty() {
            info = info.with_context("missing_variables", missing_vars.join(","));
        }
        return Err(CampError::Exec(info));
    }
    debug!(platform = platform.name(), env = env.name(), "pre-flight passed");
    Ok(PreflightReport {
        executables,
        max_parallel: env.max_parallel(),
    })
}
