use std::error::Error;
use std::path::PathBuf;

use camp_criteria::{CriteriaExpander, CriteriaRegistry};
use camp_pipeline::{ConfigOverrides, PipelineConfig};
use clap::Args;
use serde::Serialize;

use super::print_json;

#[derive(Args, Debug)]
pub struct ExpandArgs {
    /// One or two criteria expressions, e.g. `population_size.Log64 noise.C3`.
    #[arg(required = true, num_args = 1..=2)]
    pub expressions: Vec<String>,
    /// Configuration whose `criteria_defs` extend the built-in criteria.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Print the cells as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct Row {
    name: String,
    params: Vec<(String, String)>,
    changes: usize,
}

pub fn run(args: &ExpandArgs) -> Result<(), Box<dyn Error>> {
    let registry = match &args.config {
        Some(path) => PipelineConfig::load(path, &ConfigOverrides::default())?.criteria_registry(),
        None => CriteriaRegistry::builtin(),
    };
    let criteria = CriteriaExpander::new(registry).expand_batch(&args.expressions)?;
    let rows: Vec<Row> = criteria
        .cells()
        .into_iter()
        .map(|cell| Row {
            name: cell.name,
            params: cell
                .params
                .iter()
                .map(|p| (p.name.clone(), p.value.to_string()))
                .collect(),
            changes: cell.changes.len(),
        })
        .collect();
    if args.json {
        return print_json(&rows);
    }
    println!("category: {} ({} experiments)", criteria.category(), criteria.cardinality());
    for row in rows {
        let params: Vec<String> = row.params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        println!("{:<20} {}", row.name, params.join(" "));
    }
    Ok(())
}
