use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Name of the batch identity manifest at the batch root.
pub const MANIFEST_FILE: &str = "batch.json";
/// Serialized experiment, under `inputs/`.
pub const DEFINITION_FILE: &str = "definition.json";
/// Per-experiment run commands, under `inputs/`.
pub const COMMANDS_FILE: &str = "commands.json";
/// Per-experiment execution status, under `outputs/`.
pub const EXEC_STATUS_FILE: &str = "exec_status.json";

/// Components that make up a batch directory identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCoordinates {
    /// Output root all projects live under.
    pub root: PathBuf,
    /// Project name.
    pub project: String,
    /// Template file stem.
    pub template_stem: String,
    /// Controller name.
    pub controller: String,
    /// Scenario name.
    pub scenario: String,
    /// Criteria expressions as written.
    pub criteria: Vec<String>,
    /// Criteria category, e.g. `population_size+noise`.
    pub category: String,
}

/// Resolves every path of a batch.
///
/// `<root>/<project>/<template>-<controller>/<scenario>+<criteria…>` is the
/// batch root; experiments live under `<batch-root>/<category>/<exp>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLayout {
    batch_root: PathBuf,
    category: String,
}

fn sanitize(component: &str) -> String {
    component
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_whitespace() { '_' } else { c })
        .collect()
}

impl BatchLayout {
    /// Layout for the given coordinates.
    pub fn new(coords: &BatchCoordinates) -> Self {
        let mut leaf = sanitize(&coords.scenario);
        for expr in &coords.criteria {
            leaf.push('+');
            leaf.push_str(&sanitize(expr));
        }
        let batch_root = coords
            .root
            .join(sanitize(&coords.project))
            .join(format!(
                "{}-{}",
                sanitize(&coords.template_stem),
                sanitize(&coords.controller)
            ))
            .join(leaf);
        Self {
            batch_root,
            category: coords.category.clone(),
        }
    }

    /// Layout for an existing batch root.
    pub fn at(batch_root: impl Into<PathBuf>, category: impl Into<String>) -> Self {
        Self {
            batch_root: batch_root.into(),
            category: category.into(),
        }
    }

    pub fn batch_root(&self) -> &Path {
        &self.batch_root
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.batch_root.join(MANIFEST_FILE)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.batch_root.join("scratch")
    }

    pub fn statistics_dir(&self) -> PathBuf {
        self.batch_root.join("statistics")
    }

    /// Phase 1 output directory of one experiment.
    pub fn exp_statistics_dir(&self, exp: &str) -> PathBuf {
        self.statistics_dir().join(exp)
    }

    /// Phase 2 output directory.
    pub fn collated_dir(&self) -> PathBuf {
        self.statistics_dir().join("collated")
    }

    pub fn deliverables_dir(&self) -> PathBuf {
        self.batch_root.join("deliverables")
    }

    pub fn exp_dir(&self, exp: &str) -> PathBuf {
        self.batch_root.join(&self.category).join(exp)
    }

    pub fn inputs_dir(&self, exp: &str) -> PathBuf {
        self.exp_dir(exp).join("inputs")
    }

    pub fn outputs_dir(&self, exp: &str) -> PathBuf {
        self.exp_dir(exp).join("outputs")
    }

    pub fn definition_path(&self, exp: &str) -> PathBuf {
        self.inputs_dir(exp).join(DEFINITION_FILE)
    }

    pub fn commands_path(&self, exp: &str) -> PathBuf {
        self.inputs_dir(exp).join(COMMANDS_FILE)
    }

    pub fn exec_status_path(&self, exp: &str) -> PathBuf {
        self.outputs_dir(exp).join(EXEC_STATUS_FILE)
    }

    /// Input directory of run `run` (`inputs/run_<k>`).
    pub fn run_input_dir(&self, exp: &str, run: usize) -> PathBuf {
        self.inputs_dir(exp).join(run_id(run))
    }

    /// Output directory of run `run` (`outputs/run_<k>`).
    pub fn run_output_dir(&self, exp: &str, run: usize) -> PathBuf {
        self.outputs_dir(exp).join(run_id(run))
    }
}

/// Directory name of run `run`.
pub fn run_id(run: usize) -> String {
    format!("run_{run}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_root_combines_identity_components() {
        let layout = BatchLayout::new(&BatchCoordinates {
            root: PathBuf::from("/out"),
            project: "swarm".into(),
            template_stem: "foraging".into(),
            controller: "crw".into(),
            scenario: "SS.16x16".into(),
            criteria: vec!["population_size.Linear100.C4".into(), "noise.C3".into()],
            category: "population_size+noise".into(),
        });
        assert_eq!(
            layout.batch_root(),
            Path::new("/out/swarm/foraging-crw/SS.16x16+population_size.Linear100.C4+noise.C3")
        );
        assert_eq!(
            layout.run_output_dir("c1-exp0+c2-exp1", 2),
            layout
                .batch_root()
                .join("population_size+noise/c1-exp0+c2-exp1/outputs/run_2")
        );
        assert_eq!(layout.collated_dir(), layout.batch_root().join("statistics/collated"));
    }
}
