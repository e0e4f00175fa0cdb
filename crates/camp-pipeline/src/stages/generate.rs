//! Stage 1: expand criteria, materialize experiment inputs.

use camp_core::CampError;
use camp_criteria::BatchCriteria;
use camp_exec::ExecutionAdapter;
use camp_exp::{claim_batch, write_manifest, BatchIdentity, BatchLayout, Experiment, ExperimentBuilder};
use camp_patch::Document;
use serde::Serialize;
use tracing::{error, info};

use crate::config::PipelineConfig;

/// An experiment Generate could not materialize.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentFailure {
    pub experiment: String,
    pub error: CampError,
}

/// Outcome of Generate.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct GenerateReport {
    pub experiments: usize,
    pub runs: usize,
    pub failures: Vec<ExperimentFailure>,
}

/// Identity recorded in `batch.json`.
pub fn batch_identity(config: &PipelineConfig) -> BatchIdentity {
    BatchIdentity {
        project: config.project.clone(),
        template: config.template.display().to_string(),
        controller: config.controller.clone(),
        scenario: config.scenario.clone(),
        criteria: config.criteria.clone(),
        platform: config.platform.name.clone(),
        n_runs: config.n_runs,
        master_seed: (!config.seed.random).then_some(config.seed.master),
    }
}

fn materialize(
    template: &Document,
    exp: &Experiment,
    layout: &BatchLayout,
    adapter: &ExecutionAdapter,
) -> Result<usize, CampError> {
    // Render every run before writing anything for this experiment.
    let docs = exp
        .runs
        .iter()
        .map(|run| exp.render_run(template, run))
        .collect::<Result<Vec<_>, _>>()?;
    for (run, doc) in exp.runs.iter().zip(&docs) {
        std::fs::create_dir_all(&run.output_dir)
            .map_err(|err| CampError::io("io.create_dir", &run.output_dir, err))?;
        doc.write_xml(&run.input_path)?;
    }
    exp.store(layout)?;
    adapter.commands_for(exp).store(layout)?;
    Ok(docs.len())
}

/// Claims the batch root and writes every experiment's inputs.
///
/// Patch failures are collected per experiment; the remaining experiments
/// are still generated.
pub fn run(
    config: &PipelineConfig,
    criteria: &BatchCriteria,
    layout: &BatchLayout,
    adapter: &ExecutionAdapter,
) -> Result<GenerateReport, CampError> {
    let identity = batch_identity(config);
    claim_batch(layout, &identity, config.overwrite)?;
    let template = Document::load(&config.template_path())?;

    let batch = ExperimentBuilder::new(config.template_stem())
        .platform_changes(config.platform.changes.clone())
        .project_changes(config.project_changes.clone())
        .runs(config.n_runs)
        .seed_policy(config.seed.policy())
        .specialization(config.specialization.clone())
        .build(criteria, layout)?;

    let mut report = GenerateReport {
        experiments: batch.cardinality(),
        ..GenerateReport::default()
    };
    for exp in &batch.experiments {
        match materialize(&template, exp, layout, adapter) {
            Ok(runs) => report.runs += runs,
            Err(err) => {
                error!(experiment = %exp.name, %err, "experiment generation failed");
                report.failures.push(ExperimentFailure {
                    experiment: exp.name.clone(),
                    error: err,
                });
            }
        }
    }

    write_manifest(
        layout,
        identity,
        batch.param_names.clone(),
        batch.shape.clone(),
        batch.manifest_entries(),
    )?;
    info!(
        experiments = report.experiments,
        runs = report.runs,
        failed = report.failures.len(),
        "generated batch"
    );
    Ok(report)
}
