use std::path::Path;

use camp_core::serde::{read_json, write_json};
use camp_core::CampError;
use camp_exp::BatchLayout;
use serde::{Deserialize, Serialize};

/// Outcome of one run, judged from its output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    pub run: String,
    pub state: RunState,
    /// Expected files that were absent.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

/// Contents of `outputs/exec_status.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecStatus {
    pub experiment: String,
    pub runs: Vec<RunStatus>,
}

impl ExecStatus {
    pub fn failed(&self) -> usize {
        self.runs.iter().filter(|r| r.state == RunState::Failed).count()
    }

    pub fn store(&self, layout: &BatchLayout) -> Result<(), CampError> {
        write_json(&layout.exec_status_path(&self.experiment), self)
    }

    pub fn load(layout: &BatchLayout, experiment: &str) -> Result<Self, CampError> {
        read_json(&layout.exec_status_path(experiment))
    }
}

/// Inspects `output_dir`. With no expected files, a non-empty directory
/// counts as complete.
pub fn check_run(run: &str, output_dir: &Path, expected: &[String]) -> RunStatus {
    let missing: Vec<String> = if expected.is_empty() {
        let populated = std::fs::read_dir(output_dir)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false);
        if populated {
            Vec::new()
        } else {
            vec![output_dir.display().to_string()]
        }
    } else {
        expected
            .iter()
            .filter(|file| !output_dir.join(file).is_file())
            .cloned()
            .collect()
    };
    RunStatus {
        run: run.to_string(),
        state: if missing.is_empty() {
            RunState::Complete
        } else {
            RunState::Failed
        },
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completeness_follows_expected_files() {
        let temp = tempfile::tempdir().expect("tmp dir");
        let out = temp.path().join("run_0");
        assert_eq!(check_run("run_0", &out, &[]).state, RunState::Failed);
        std::fs::create_dir_all(&out).expect("mkdir");
        std::fs::write(out.join("a.csv"), "x\n1\n").expect("write");
        assert_eq!(check_run("run_0", &out, &[]).state, RunState::Complete);

        let status = check_run("run_0", &out, &["a.csv".into(), "b.csv".into()]);
        assert_eq!(status.state, RunState::Failed);
        assert_eq!(status.missing, vec!["b.csv"]);
    }
}
