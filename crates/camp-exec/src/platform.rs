//! Execution platforms and their registry.

use std::collections::BTreeMap;

use camp_core::{CampError, ErrorInfo};
use camp_exp::ExperimentalRun;
use serde::{Deserialize, Serialize};

use crate::codes;
use crate::commands::{shell_quote, RunCommands};

/// How runs are grouped into executor invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Paradigm {
    /// Every run of the batch in one invocation.
    PerBatch,
    /// One invocation per experiment.
    PerExperiment,
    /// One invocation per run, one run at a time.
    PerRun,
}

/// Platform configuration as read from YAML.
///
/// `args`, `pre`, `post` and the transfer commands may use the
/// placeholders `{input}`, `{output}`, `{seed}`, `{run}` and `{threads}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformSpec {
    pub binary: String,
    pub args: Vec<String>,
    pub pre: Vec<String>,
    pub post: Vec<String>,
    /// Files each run must leave in its output directory to count as complete.
    pub expected_outputs: Vec<String>,
    pub required_executables: Vec<String>,
    /// Threads handed to multi-threaded simulators.
    pub threads: usize,
    /// Stages inputs onto a robot (`robot` only).
    pub transfer_in: Option<String>,
    /// Retrieves outputs from a robot (`robot` only).
    pub transfer_out: Option<String>,
}

impl Default for PlatformSpec {
    fn default() -> Self {
        Self {
            binary: "argos3".into(),
            args: vec!["-c".into(), "{input}".into()],
            pre: vec!["mkdir -p {output}".into()],
            post: Vec::new(),
            expected_outputs: Vec::new(),
            required_executables: Vec::new(),
            threads: 1,
            transfer_in: None,
            transfer_out: None,
        }
    }
}

impl PlatformSpec {
    fn substitute(&self, template: &str, run: &ExperimentalRun) -> String {
        template
            .replace("{input}", &shell_quote(&run.input_path.display().to_string()))
            .replace("{output}", &shell_quote(&run.output_dir.display().to_string()))
            .replace("{seed}", &run.seed.to_string())
            .replace("{run}", &shell_quote(&run.id))
            .replace("{threads}", &self.threads.to_string())
    }

    fn exec_line(&self, run: &ExperimentalRun) -> String {
        std::iter::once(self.binary.clone())
            .chain(self.args.iter().map(|arg| self.substitute(arg, run)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn executables(&self) -> Vec<String> {
        let mut names = vec![self.binary.clone()];
        names.extend(self.required_executables.iter().cloned());
        names
    }
}

/// Something that can execute experimental runs.
pub trait Platform: Send + Sync {
    /// Registry name.
    fn name(&self) -> &str;

    fn paradigm(&self) -> Paradigm;

    /// Commands that execute `run`.
    fn run_commands(&self, run: &ExperimentalRun) -> RunCommands;

    /// Files a complete run leaves behind.
    fn expected_outputs(&self) -> &[String];

    /// Executables that must be on `PATH` before submission.
    fn required_executables(&self) -> Vec<String>;

    /// Cores one run occupies.
    fn threads(&self) -> usize {
        1
    }
}

/// Local simulator, single- or multi-threaded.
#[derive(Debug, Clone)]
pub struct Simulator {
    name: String,
    paradigm: Paradigm,
    spec: PlatformSpec,
}

impl Simulator {
    /// `sim`: single-threaded runs packed into one batch-wide invocation.
    pub fn single_threaded(spec: PlatformSpec) -> Self {
        Self {
            name: "sim".into(),
            paradigm: Paradigm::PerBatch,
            spec: PlatformSpec { threads: 1, ..spec },
        }
    }

    /// `sim.threaded`: each run uses `spec.threads` threads, so experiments
    /// are submitted one at a time.
    pub fn threaded(spec: PlatformSpec) -> Self {
        Self {
            name: "sim.threaded".into(),
            paradigm: Paradigm::PerExperiment,
            spec,
        }
    }
}

impl Platform for Simulator {
    fn name(&self) -> &str {
        &self.name
    }

    fn paradigm(&self) -> Paradigm {
        self.paradigm
    }

    fn run_commands(&self, run: &ExperimentalRun) -> RunCommands {
        RunCommands {
            pre: self.spec.pre.iter().map(|cmd| self.spec.substitute(cmd, run)).collect(),
            exec: self.spec.exec_line(run),
            post: self.spec.post.iter().map(|cmd| self.spec.substitute(cmd, run)).collect(),
        }
    }

    fn expected_outputs(&self) -> &[String] {
        &self.spec.expected_outputs
    }

    fn required_executables(&self) -> Vec<String> {
        self.spec.executables()
    }

    fn threads(&self) -> usize {
        self.spec.threads.max(1)
    }
}

/// Physical robots: inputs are pushed before and outputs pulled after each run.
#[derive(Debug, Clone)]
pub struct Robot {
    spec: PlatformSpec,
}

impl Robot {
    pub fn new(spec: PlatformSpec) -> Self {
        Self { spec }
    }
}

impl Platform for Robot {
    fn name(&self) -> &str {
        "robot"
    }

    fn paradigm(&self) -> Paradigm {
        Paradigm::PerRun
    }

    fn run_commands(&self, run: &ExperimentalRun) -> RunCommands {
        let mut pre: Vec<String> = self.spec.pre.iter().map(|cmd| self.spec.substitute(cmd, run)).collect();
        pre.extend(self.spec.transfer_in.iter().map(|cmd| self.spec.substitute(cmd, run)));
        let mut post: Vec<String> = self
            .spec
            .transfer_out
            .iter()
            .map(|cmd| self.spec.substitute(cmd, run))
            .collect();
        post.extend(self.spec.post.iter().map(|cmd| self.spec.substitute(cmd, run)));
        RunCommands {
            pre,
            exec: self.spec.exec_line(run),
            post,
        }
    }

    fn expected_outputs(&self) -> &[String] {
        &self.spec.expected_outputs
    }

    fn required_executables(&self) -> Vec<String> {
        self.spec.executables()
    }
}

type PlatformFactory = fn(PlatformSpec) -> Box<dyn Platform>;

/// Maps configured platform names to implementations.
#[derive(Clone)]
pub struct PlatformRegistry {
    factories: BTreeMap<String, PlatformFactory>,
}

impl PlatformRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// `sim`, `sim.threaded` and `robot`.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("sim", |spec| -> Box<dyn Platform> {
            Box::new(Simulator::single_threaded(spec))
        });
        registry.register("sim.threaded", |spec| -> Box<dyn Platform> {
            Box::new(Simulator::threaded(spec))
        });
        registry.register("robot", |spec| -> Box<dyn Platform> { Box::new(Robot::new(spec)) });
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, factory: PlatformFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Instantiates the platform registered as `name`.
    pub fn create(&self, name: &str, spec: PlatformSpec) -> Result<Box<dyn Platform>, CampError> {
        let factory = self.factories.get(name).ok_or_else(|| {
            CampError::Exec(
                ErrorInfo::new(codes::UNKNOWN_PLATFORM, "platform is not registered")
                    .with_context("platform", name)
                    .with_context("known", self.names().join(",")),
            )
        })?;
        Ok(factory(spec))
    }
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camp_patch::PatchSet;
    use std::path::{Path, PathBuf};

    fn run() -> ExperimentalRun {
        ExperimentalRun {
            number: 1,
            id: "run_1".into(),
            seed: 77,
            input_path: PathBuf::from("/b/exp0/inputs/run_1/foraging.xml"),
            output_dir: PathBuf::from("/b/exp0/outputs/run_1"),
            changes: PatchSet::new(),
        }
    }

    #[test]
    fn builtin_paradigms() {
        let registry = PlatformRegistry::builtin();
        let paradigm = |name: &str| {
            registry
                .create(name, PlatformSpec::default())
                .expect("registered")
                .paradigm()
        };
        assert_eq!(paradigm("sim"), Paradigm::PerBatch);
        assert_eq!(paradigm("sim.threaded"), Paradigm::PerExperiment);
        assert_eq!(paradigm("robot"), Paradigm::PerRun);
        let err = registry.create("gazebo", PlatformSpec::default()).err().expect("unknown");
        assert_eq!(err.code(), codes::UNKNOWN_PLATFORM);
    }

    #[test]
    fn placeholders_are_substituted() {
        let spec = PlatformSpec {
            args: vec!["-c".into(), "{input}".into(), "--seed".into(), "{seed}".into()],
            ..PlatformSpec::default()
        };
        let cmds = Simulator::single_threaded(spec).run_commands(&run());
        assert_eq!(cmds.exec, "argos3 -c /b/exp0/inputs/run_1/foraging.xml --seed 77");
        assert_eq!(cmds.pre, vec!["mkdir -p /b/exp0/outputs/run_1".to_string()]);
    }

    #[test]
    fn paths_with_spaces_stay_single_words() {
        let run = ExperimentalRun {
            input_path: PathBuf::from("/my exps/run_0/input.xml"),
            output_dir: PathBuf::from("/my exps/run_0/output"),
            ..run()
        };
        let cmds = Simulator::single_threaded(PlatformSpec::default()).run_commands(&run);
        assert_eq!(cmds.pre, vec!["mkdir -p '/my exps/run_0/output'".to_string()]);
        assert_eq!(cmds.exec, "argos3 -c '/my exps/run_0/input.xml'");
        assert_eq!(
            cmds.render_line(Path::new("/my exps/run_0")),
            "cd '/my exps/run_0' && mkdir -p '/my exps/run_0/output' && argos3 -c '/my exps/run_0/input.xml'"
        );
    }

    #[test]
    fn threaded_simulator_reports_its_threads() {
        let spec = PlatformSpec {
            threads: 4,
            ..PlatformSpec::default()
        };
        assert_eq!(Simulator::threaded(spec.clone()).threads(), 4);
        assert_eq!(Simulator::single_threaded(spec.clone()).threads(), 1);
        assert_eq!(Robot::new(spec).threads(), 1);
    }

    #[test]
    fn robot_wraps_exec_in_transfers() {
        let spec = PlatformSpec {
            pre: Vec::new(),
            post: vec!["echo done".into()],
            transfer_in: Some("scp {input} robot:/tmp/{run}.xml".into()),
            transfer_out: Some("scp -r robot:/tmp/out {output}".into()),
            ..PlatformSpec::default()
        };
        let cmds = Robot::new(spec).run_commands(&run());
        assert_eq!(cmds.pre, vec!["scp /b/exp0/inputs/run_1/foraging.xml robot:/tmp/run_1.xml".to_string()]);
        assert_eq!(
            cmds.post,
            vec!["scp -r robot:/tmp/out /b/exp0/outputs/run_1".to_string(), "echo done".to_string()]
        );
    }
}
