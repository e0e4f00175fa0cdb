use std::error::Error;
use std::path::{Path, PathBuf};

use camp_collate::CollationReport;
use camp_exec::ExecStatus;
use camp_exp::{BatchLayout, BatchManifest};
use camp_pipeline::artifacts::check_preconditions;
use camp_pipeline::Stage;
use clap::Args;
use serde::Serialize;
use walkdir::WalkDir;

use super::print_json;

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Batch root (the directory holding `batch.json`).
    #[arg(long)]
    pub batch: PathBuf,
    /// Print the summary as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ExperimentState {
    name: String,
    executed: bool,
    runs: usize,
    failed: usize,
    /// Files under `outputs/`, status records included.
    output_files: usize,
}

#[derive(Debug, Serialize)]
struct BatchState {
    batch_root: PathBuf,
    identity_hash: String,
    category: String,
    shape: Vec<usize>,
    /// Stages whose inputs are all present.
    ready: Vec<Stage>,
    experiments: Vec<ExperimentState>,
    gaps: Option<usize>,
}

fn count_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .count()
}

pub fn run(args: &InspectArgs) -> Result<(), Box<dyn Error>> {
    let manifest = BatchManifest::load(&BatchLayout::at(args.batch.clone(), ""))?;
    let layout = BatchLayout::at(args.batch.clone(), manifest.category.clone());

    let experiments = manifest
        .experiments
        .iter()
        .map(|entry| {
            let output_files = count_files(&layout.outputs_dir(&entry.name));
            match ExecStatus::load(&layout, &entry.name) {
                Ok(status) => ExperimentState {
                    name: entry.name.clone(),
                    executed: true,
                    runs: status.runs.len(),
                    failed: status.failed(),
                    output_files,
                },
                Err(_) => ExperimentState {
                    name: entry.name.clone(),
                    executed: false,
                    runs: manifest.identity.n_runs,
                    failed: 0,
                    output_files,
                },
            }
        })
        .collect();
    let state = BatchState {
        batch_root: args.batch.clone(),
        identity_hash: manifest.identity_hash.clone(),
        category: manifest.category.clone(),
        shape: manifest.shape.clone(),
        ready: Stage::ALL
            .into_iter()
            .filter(|stage| check_preconditions(*stage, &layout).is_ok())
            .collect(),
        experiments,
        gaps: CollationReport::load(&layout).ok().map(|report| report.gaps.len()),
    };

    if args.json {
        return print_json(&state);
    }
    println!("batch {} ({})", state.batch_root.display(), state.category);
    println!("  identity: {}", state.identity_hash);
    println!("  shape: {:?}", state.shape);
    let ready: Vec<&str> = state.ready.iter().map(|s| s.name()).collect();
    println!("  ready stages: {}", ready.join(", "));
    for exp in &state.experiments {
        let status = if exp.executed {
            format!("{}/{} runs complete", exp.runs - exp.failed, exp.runs)
        } else {
            "not executed".to_string()
        };
        println!("  {:<20} {status}, {} output files", exp.name, exp.output_files);
    }
    if let Some(gaps) = state.gaps {
        println!("  collation gaps: {gaps}");
    }
    Ok(())
}
