use std::path::PathBuf;

use camp_core::CampError;
use camp_exp::{BatchLayout, Experiment};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::commands::{write_command_file, ExperimentCommands, RunEntry};
use crate::env::ExecEnv;
use crate::executor::ExecutorConfig;
use crate::platform::{Paradigm, Platform};
use crate::status::{check_run, ExecStatus, RunState};

/// Switches for one execution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecOptions {
    /// Leave complete runs out of the command files.
    pub resume: bool,
    /// Write command files without launching the executor.
    pub dry_run: bool,
}

/// One command file and the parallelism it runs with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecUnit {
    pub cmd_file: PathBuf,
    pub jobs: usize,
    pub lines: Vec<String>,
}

/// Command files for one execution pass, in launch order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutePlan {
    pub paradigm: Paradigm,
    pub units: Vec<ExecUnit>,
    /// Runs left out because they were already complete.
    pub skipped: usize,
}

impl ExecutePlan {
    pub fn total_runs(&self) -> usize {
        self.units.iter().map(|unit| unit.lines.len()).sum()
    }
}

/// What an execution pass did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteReport {
    pub plan: ExecutePlan,
    /// Empty for dry runs.
    pub statuses: Vec<ExecStatus>,
    pub launched: bool,
}

impl ExecuteReport {
    pub fn failed_runs(&self) -> usize {
        self.statuses.iter().map(ExecStatus::failed).sum()
    }
}

/// Maps a batch onto a platform and an execution environment.
pub struct ExecutionAdapter {
    platform: Box<dyn Platform>,
    env: Box<dyn ExecEnv>,
    executor: ExecutorConfig,
}

impl ExecutionAdapter {
    pub fn new(platform: Box<dyn Platform>, env: Box<dyn ExecEnv>, executor: ExecutorConfig) -> Self {
        Self {
            platform,
            env,
            executor,
        }
    }

    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    pub fn env(&self) -> &dyn ExecEnv {
        self.env.as_ref()
    }

    pub fn executor(&self) -> &ExecutorConfig {
        &self.executor
    }

    /// Run commands of every run of `exp`; each run executes from its input directory.
    pub fn commands_for(&self, exp: &Experiment) -> ExperimentCommands {
        ExperimentCommands {
            experiment: exp.name.clone(),
            runs: exp
                .runs
                .iter()
                .map(|run| RunEntry {
                    run: run.id.clone(),
                    dir: run
                        .input_path
                        .parent()
                        .map(PathBuf::from)
                        .unwrap_or_default(),
                    output_dir: run.output_dir.clone(),
                    commands: self.platform.run_commands(run),
                })
                .collect(),
        }
    }

    /// Concurrent runs that fit the environment when each occupies
    /// `platform.threads()` cores.
    fn slots(&self) -> usize {
        (self.env.max_parallel() / self.platform.threads().max(1)).max(1)
    }

    fn pending<'a>(&self, entries: &'a [RunEntry], resume: bool, skipped: &mut usize) -> Vec<&'a RunEntry> {
        entries
            .iter()
            .filter(|entry| {
                let done = resume
                    && check_run(&entry.run, &entry.output_dir, self.platform.expected_outputs()).state
                        == RunState::Complete;
                if done {
                    *skipped += 1;
                }
                !done
            })
            .collect()
    }

    /// Groups runs into command files according to the platform paradigm.
    pub fn plan(&self, layout: &BatchLayout, commands: &[ExperimentCommands], resume: bool) -> ExecutePlan {
        let scratch = layout.scratch_dir();
        let mut skipped = 0;
        let paradigm = self.platform.paradigm();
        let mut units = Vec::new();
        match paradigm {
            Paradigm::PerBatch => {
                let lines: Vec<String> = commands
                    .iter()
                    .flat_map(|exp| self.pending(&exp.runs, resume, &mut skipped))
                    .map(RunEntry::line)
                    .collect();
                units.push(ExecUnit {
                    cmd_file: scratch.join("batch.cmds"),
                    jobs: self.slots(),
                    lines,
                });
            }
            Paradigm::PerExperiment => {
                for exp in commands {
                    let lines: Vec<String> = self
                        .pending(&exp.runs, resume, &mut skipped)
                        .into_iter()
                        .map(RunEntry::line)
                        .collect();
                    units.push(ExecUnit {
                        cmd_file: scratch.join(format!("{}.cmds", exp.experiment)),
                        jobs: self.slots().min(exp.runs.len()).max(1),
                        lines,
                    });
                }
            }
            Paradigm::PerRun => {
                for exp in commands {
                    for entry in self.pending(&exp.runs, resume, &mut skipped) {
                        units.push(ExecUnit {
                            cmd_file: scratch
                                .join(&exp.experiment)
                                .join(format!("{}.cmds", entry.run)),
                            jobs: 1,
                            lines: vec![entry.line()],
                        });
                    }
                }
            }
        }
        units.retain(|unit| !unit.lines.is_empty());
        ExecutePlan {
            paradigm,
            units,
            skipped,
        }
    }

    /// Judges every run and records `outputs/exec_status.json` per experiment.
    pub fn record_status(
        &self,
        layout: &BatchLayout,
        commands: &[ExperimentCommands],
    ) -> Result<Vec<ExecStatus>, CampError> {
        let mut statuses = Vec::with_capacity(commands.len());
        for exp in commands {
            let status = ExecStatus {
                experiment: exp.experiment.clone(),
                runs: exp
                    .runs
                    .iter()
                    .map(|entry| check_run(&entry.run, &entry.output_dir, self.platform.expected_outputs()))
                    .collect(),
            };
            for run in status.runs.iter().filter(|r| r.state == RunState::Failed) {
                warn!(
                    experiment = %status.experiment,
                    run = %run.run,
                    missing = %run.missing.join(","),
                    "run failed"
                );
            }
            status.store(layout)?;
            statuses.push(status);
        }
        Ok(statuses)
    }

    /// Writes command files, launches them in order and records run status.
    pub fn execute(
        &self,
        layout: &BatchLayout,
        commands: &[ExperimentCommands],
        opts: ExecOptions,
    ) -> Result<ExecuteReport, CampError> {
        let plan = self.plan(layout, commands, opts.resume);
        for unit in &plan.units {
            write_command_file(&unit.cmd_file, &unit.lines)?;
        }
        info!(
            paradigm = ?plan.paradigm,
            units = plan.units.len(),
            runs = plan.total_runs(),
            skipped = plan.skipped,
            dry_run = opts.dry_run,
            "execution plan ready"
        );
        if opts.dry_run {
            return Ok(ExecuteReport {
                plan,
                statuses: Vec::new(),
                launched: false,
            });
        }
        let env_args = self.env.executor_args();
        for unit in &plan.units {
            self.executor.launch(&unit.cmd_file, unit.jobs, &env_args)?;
        }
        let statuses = self.record_status(layout, commands)?;
        Ok(ExecuteReport {
            plan,
            statuses,
            launched: true,
        })
    }
}
