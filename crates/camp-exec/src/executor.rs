use std::path::Path;
use std::process::Command;

use camp_core::{CampError, ErrorInfo};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::codes;

/// GNU-parallel style runner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub program: String,
    /// Per-job timeout passed to the runner.
    pub timeout_secs: Option<u64>,
    pub extra_args: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            program: "parallel".into(),
            timeout_secs: None,
            extra_args: Vec::new(),
        }
    }
}

impl ExecutorConfig {
    /// Arguments for running `cmd_file` with `jobs` slots.
    pub fn args(&self, cmd_file: &Path, jobs: usize, env_args: &[String]) -> Vec<String> {
        let mut args = vec![
            "--jobs".to_string(),
            jobs.max(1).to_string(),
            "--joblog".to_string(),
            cmd_file.with_extension("log").display().to_string(),
        ];
        if let Some(timeout) = self.timeout_secs {
            args.push("--timeout".into());
            args.push(timeout.to_string());
        }
        args.extend(env_args.iter().cloned());
        args.extend(self.extra_args.iter().cloned());
        args.push("--arg-file".into());
        args.push(cmd_file.display().to_string());
        args
    }

    /// Runs the executor over `cmd_file` and waits for it.
    ///
    /// Returns the number of failed jobs the runner reported; failures of
    /// individual runs are detected afterwards from their outputs.
    pub fn launch(&self, cmd_file: &Path, jobs: usize, env_args: &[String]) -> Result<i32, CampError> {
        let args = self.args(cmd_file, jobs, env_args);
        info!(program = %self.program, file = %cmd_file.display(), jobs, "launching executor");
        let status = Command::new(&self.program).args(&args).status().map_err(|err| {
            CampError::Exec(
                ErrorInfo::new(codes::LAUNCH, err.to_string())
                    .with_context("program", self.program.clone())
                    .with_context("file", cmd_file.display().to_string()),
            )
        })?;
        let failed = status.code().unwrap_or(-1);
        if failed != 0 {
            warn!(file = %cmd_file.display(), failed, "executor reported failed jobs");
        }
        Ok(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_carry_timeout_and_logins() {
        let config = ExecutorConfig {
            timeout_secs: Some(600),
            ..ExecutorConfig::default()
        };
        let args = config.args(Path::new("/b/scratch/batch.cmds"), 0, &["-S".into(), "2/n1".into()]);
        assert_eq!(
            args,
            vec![
                "--jobs",
                "1",
                "--joblog",
                "/b/scratch/batch.log",
                "--timeout",
                "600",
                "-S",
                "2/n1",
                "--arg-file",
                "/b/scratch/batch.cmds"
            ]
        );
    }
}
