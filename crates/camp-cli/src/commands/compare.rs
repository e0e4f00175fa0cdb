use std::error::Error;
use std::path::PathBuf;

use camp_pipeline::stages::compare;
use clap::Args;

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Batch roots to compare; the first one leads the row order.
    #[arg(long = "batch", required = true, num_args = 1..)]
    pub batches: Vec<PathBuf>,
    /// Metrics to compare; all shared metrics when omitted.
    #[arg(long = "metric")]
    pub metrics: Vec<String>,
    /// Output directory for `comparison.csv` and `comparison.json`.
    #[arg(long)]
    pub out: PathBuf,
}

pub fn run(args: &CompareArgs) -> Result<(), Box<dyn Error>> {
    let report = compare::run(&args.batches, &args.metrics, &args.out)?;
    println!(
        "compared {} batches over {} metrics: {}",
        report.batches.len(),
        report.metrics.len(),
        report.csv.display()
    );
    Ok(())
}
