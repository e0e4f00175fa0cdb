//! Runs the requested stages of one batch in order.

use std::path::PathBuf;

use camp_collate::CollationReport;
use camp_core::{CampError, ErrorInfo};
use camp_criteria::{BatchCriteria, CriteriaExpander};
use camp_exec::{
    EnvSource, ExecEnv, ExecEnvRegistry, ExecuteReport, ExecutionAdapter, LocalEnv, PlatformRegistry,
    ProcessEnv,
};
use camp_exp::{BatchCoordinates, BatchLayout, BatchManifest};
use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::artifacts::{check_preconditions, require_manifest};
use crate::codes;
use crate::config::PipelineConfig;
use crate::hooks::{NoHooks, StageContext, StageHooks};
use crate::stage::Stage;
use crate::stages::compare::ComparisonReport;
use crate::stages::deliver::DeliverManifest;
use crate::stages::generate::GenerateReport;
use crate::stages::{compare, deliver, execute, generate, process};

/// What each stage that ran produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub batch_root: PathBuf,
    pub stages: Vec<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate: Option<GenerateReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execute: Option<ExecuteReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<CollationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deliver: Option<DeliverManifest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare: Option<ComparisonReport>,
}

/// Drives Generate, Execute, Process, Deliver and Compare for one batch.
///
/// The configuration is frozen at construction. Criteria are expanded before
/// anything touches the filesystem, so a bad expression never leaves a
/// half-made batch directory behind.
pub struct StageOrchestrator {
    config: PipelineConfig,
    hooks: Box<dyn StageHooks>,
    platforms: PlatformRegistry,
    envs: ExecEnvRegistry,
    env_source: Box<dyn EnvSource>,
}

impl StageOrchestrator {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            hooks: Box::new(NoHooks),
            platforms: PlatformRegistry::builtin(),
            envs: ExecEnvRegistry::builtin(),
            env_source: Box::new(ProcessEnv),
        }
    }

    pub fn with_hooks(mut self, hooks: Box<dyn StageHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_platforms(mut self, platforms: PlatformRegistry) -> Self {
        self.platforms = platforms;
        self
    }

    pub fn with_envs(mut self, envs: ExecEnvRegistry) -> Self {
        self.envs = envs;
        self
    }

    /// Where scheduler environments read their allocation from.
    pub fn with_env_source(mut self, source: Box<dyn EnvSource>) -> Self {
        self.env_source = source;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Expands the configured criteria.
    pub fn criteria(&self) -> Result<BatchCriteria, CampError> {
        CriteriaExpander::new(self.config.criteria_registry()).expand_batch(&self.config.criteria)
    }

    /// Directory layout of the configured batch.
    pub fn layout(&self, criteria: &BatchCriteria) -> BatchLayout {
        BatchLayout::new(&BatchCoordinates {
            root: self.config.output_root(),
            project: self.config.project.clone(),
            template_stem: self.config.template_stem(),
            controller: self.config.controller.clone(),
            scenario: self.config.scenario.clone(),
            criteria: self.config.criteria.clone(),
            category: criteria.category(),
        })
    }

    /// Builds the adapter. Generation only needs the platform, so the
    /// configured environment is resolved only when `for_execution` is set.
    fn adapter(&self, for_execution: bool) -> Result<ExecutionAdapter, CampError> {
        let platform = self
            .platforms
            .create(&self.config.platform.name, self.config.platform.spec.clone())?;
        let env: Box<dyn ExecEnv> = if for_execution {
            self.envs
                .create(&self.config.env.name, &self.config.env.settings, self.env_source.as_ref())?
        } else {
            Box::new(LocalEnv::new(&self.config.env.settings))
        };
        Ok(ExecutionAdapter::new(platform, env, self.config.executor.clone()))
    }

    /// Runs `stages` in ascending order, whatever order they were given in.
    pub fn run(&self, stages: &[Stage]) -> Result<PipelineReport, CampError> {
        let criteria = self.criteria()?;
        let layout = self.layout(&criteria);
        let stages = Stage::ordered(stages);
        info!(
            batch_root = %layout.batch_root().display(),
            experiments = criteria.cardinality(),
            stages = ?stages,
            "starting pipeline"
        );

        let mut report = PipelineReport {
            batch_root: layout.batch_root().to_path_buf(),
            ..PipelineReport::default()
        };
        for stage in stages {
            if self.config.exec.dry_run && stage > Stage::Execute {
                warn!(%stage, "dry run: later stages need executed runs, stopping");
                break;
            }
            let _span = info_span!("stage", name = stage.name()).entered();
            check_preconditions(stage, &layout)?;
            let ctx = StageContext {
                stage,
                config: &self.config,
                layout: &layout,
            };
            self.hooks.pre_stage(&ctx)?;
            self.run_stage(stage, &criteria, &layout, &mut report)?;
            self.hooks.post_stage(&ctx)?;
            report.stages.push(stage);
            info!(%stage, "stage complete");
        }
        Ok(report)
    }

    fn run_stage(
        &self,
        stage: Stage,
        criteria: &BatchCriteria,
        layout: &BatchLayout,
        report: &mut PipelineReport,
    ) -> Result<(), CampError> {
        match stage {
            Stage::Generate => {
                let generated = generate::run(&self.config, criteria, layout, &self.adapter(false)?)?;
                if !generated.failures.is_empty() {
                    let names: Vec<&str> = generated
                        .failures
                        .iter()
                        .map(|f| f.experiment.as_str())
                        .collect();
                    return Err(CampError::Stage(
                        ErrorInfo::new(codes::GENERATE_FAILED, "some experiments could not be generated")
                            .with_context("experiments", names.join(","))
                            .with_context("first_error", generated.failures[0].error.to_string()),
                    ));
                }
                report.generate = Some(generated);
            }
            Stage::Execute => {
                let manifest = self.manifest(stage, layout)?;
                let adapter = self.adapter(true)?;
                report.execute = Some(execute::run(
                    &self.config,
                    layout,
                    &manifest,
                    &adapter,
                    self.env_source.as_ref(),
                )?);
            }
            Stage::Process => {
                let manifest = self.manifest(stage, layout)?;
                report.process = Some(process::run(&self.config, layout, &manifest)?);
            }
            Stage::Deliver => {
                let manifest = self.manifest(stage, layout)?;
                report.deliver = Some(deliver::run(layout, &manifest)?);
            }
            Stage::Compare => {
                let mut roots = vec![layout.batch_root().to_path_buf()];
                roots.extend(self.config.compare.batches.iter().map(|p| self.config.resolve(p)));
                report.compare = Some(compare::run(
                    &roots,
                    &self.config.compare.metrics,
                    &self.config.compare_output(),
                )?);
            }
        }
        Ok(())
    }

    fn manifest(&self, stage: Stage, layout: &BatchLayout) -> Result<BatchManifest, CampError> {
        require_manifest(stage, layout)
    }
}
