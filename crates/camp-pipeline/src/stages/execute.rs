//! Stage 2: hand the generated runs to the executor.

use camp_core::CampError;
use camp_exec::{preflight, EnvSource, ExecuteReport, ExecutionAdapter, ExperimentCommands};
use camp_exp::{BatchLayout, BatchManifest};
use tracing::{debug, info, warn};

use crate::artifacts::malformed;
use crate::config::PipelineConfig;
use crate::stage::Stage;

/// Loads the persisted commands of every experiment in manifest order.
pub fn load_commands(
    layout: &BatchLayout,
    manifest: &BatchManifest,
) -> Result<Vec<ExperimentCommands>, CampError> {
    manifest
        .experiments
        .iter()
        .map(|entry| {
            ExperimentCommands::load(layout, &entry.name)
                .map_err(|err| malformed(Stage::Execute, &layout.commands_path(&entry.name), err))
        })
        .collect()
}

/// Runs pre-flight against `source`, writes command files and launches them.
pub fn run(
    config: &PipelineConfig,
    layout: &BatchLayout,
    manifest: &BatchManifest,
    adapter: &ExecutionAdapter,
    source: &dyn EnvSource,
) -> Result<ExecuteReport, CampError> {
    let commands = load_commands(layout, manifest)?;
    if config.exec.dry_run {
        debug!("dry run: skipping pre-flight");
    } else {
        let checked = preflight(adapter.platform(), adapter.env(), adapter.executor(), source)?;
        debug!(max_parallel = checked.max_parallel, "pre-flight passed");
    }
    let report = adapter.execute(layout, &commands, config.exec)?;
    if report.failed_runs() > 0 {
        warn!(failed = report.failed_runs(), "some runs failed; they will surface as collation gaps");
    }
    info!(
        launched = report.launched,
        units = report.plan.units.len(),
        skipped = report.plan.skipped,
        "execution finished"
    );
    Ok(report)
}
