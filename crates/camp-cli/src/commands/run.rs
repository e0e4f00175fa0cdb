use std::error::Error;
use std::path::PathBuf;

use camp_pipeline::{ConfigOverrides, PipelineConfig, Stage, StageOrchestrator};
use clap::Args;

use super::print_json;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Campaign configuration (YAML or JSON).
    #[arg(long)]
    pub config: PathBuf,
    /// Stages to run, by number or name, e.g. `1,2,3` or `process,deliver`.
    #[arg(long, default_value = "1,2,3,4,5")]
    pub stages: String,
    /// Override the number of runs per experiment.
    #[arg(long)]
    pub runs: Option<usize>,
    /// Override the output root.
    #[arg(long)]
    pub output_root: Option<PathBuf>,
    /// Regenerate a batch that already exists.
    #[arg(long)]
    pub overwrite: bool,
    /// Skip runs whose outputs are already complete.
    #[arg(long)]
    pub resume: bool,
    /// Write command files without launching them.
    #[arg(long)]
    pub dry_run: bool,
    /// Treat collation gaps as errors.
    #[arg(long)]
    pub strict: bool,
    /// Print the pipeline report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            n_runs: self.runs,
            output_root: self.output_root.clone(),
            overwrite: self.overwrite,
            resume: self.resume,
            dry_run: self.dry_run,
            strict: self.strict,
        }
    }
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let stages = Stage::parse_list(&args.stages)?;
    let config = PipelineConfig::load(&args.config, &args.overrides())?;
    let report = StageOrchestrator::new(config).run(&stages)?;
    if args.json {
        return print_json(&report);
    }
    println!("batch: {}", report.batch_root.display());
    for stage in &report.stages {
        println!("  done: {stage}");
    }
    if let Some(process) = &report.process {
        println!("  collation gaps: {}", process.gaps.len());
    }
    if let Some(compare) = &report.compare {
        println!("  comparison: {}", compare.csv.display());
    }
    Ok(())
}
