//! Stage 5: side-by-side summary metrics across batches.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use camp_collate::table::{format_cell, read_rows, write_rows};
use camp_collate::SUMMARY_FILE;
use camp_core::serde::write_json;
use camp_core::{stable_hash_string, CampError, Provenance};
use camp_exp::{BatchLayout, BatchManifest};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::artifacts::{malformed, require, DELIVERABLES_MANIFEST};
use crate::stage::Stage;
use crate::stages::deliver::DeliverManifest;

/// Comparison table name.
pub const COMPARISON_CSV: &str = "comparison.csv";
/// Comparison report name.
pub const COMPARISON_JSON: &str = "comparison.json";

/// One batch taking part in a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparedBatch {
    /// Column prefix, `<controller>@<scenario>`.
    pub label: String,
    pub batch_root: PathBuf,
    pub identity_hash: String,
    pub param_names: Vec<String>,
}

/// Contents of `comparison.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub batches: Vec<ComparedBatch>,
    pub metrics: Vec<String>,
    /// Row order of `comparison.csv`.
    pub experiments: Vec<String>,
    pub columns: Vec<String>,
    pub csv: PathBuf,
    pub provenance: Provenance,
}

struct Loaded {
    batch: ComparedBatch,
    metrics: Vec<String>,
    /// experiment -> metric -> value
    values: BTreeMap<String, BTreeMap<String, f64>>,
    order: Vec<String>,
}

fn load_batch(root: &Path) -> Result<Loaded, CampError> {
    let probe = BatchLayout::at(root, "");
    let deliver_path = probe.deliverables_dir().join(DELIVERABLES_MANIFEST);
    require(Stage::Compare, &deliver_path)?;
    let manifest = BatchManifest::load(&probe)
        .map_err(|err| malformed(Stage::Compare, &probe.manifest_path(), err))?;
    let deliver = DeliverManifest::load(&probe).map_err(|err| malformed(Stage::Compare, &deliver_path, err))?;

    let summary = probe.collated_dir().join(SUMMARY_FILE);
    require(Stage::Compare, &summary)?;
    let (header, rows) = read_rows(&summary).map_err(|err| malformed(Stage::Compare, &summary, err))?;
    let mut values = BTreeMap::new();
    let mut order = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(exp) = row.first().cloned() else { continue };
        let cells: BTreeMap<String, f64> = header
            .iter()
            .zip(&row)
            .filter(|(column, _)| deliver.metrics.contains(*column))
            .map(|(column, cell)| (column.clone(), cell.parse().unwrap_or(f64::NAN)))
            .collect();
        order.push(exp.clone());
        values.insert(exp, cells);
    }

    Ok(Loaded {
        batch: ComparedBatch {
            label: format!("{}@{}", manifest.identity.controller, manifest.identity.scenario),
            batch_root: root.to_path_buf(),
            identity_hash: manifest.identity_hash.clone(),
            param_names: manifest.param_names.clone(),
        },
        metrics: deliver.metrics,
        values,
        order,
    })
}

fn unique_labels(batches: &mut [Loaded]) {
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    for loaded in batches.iter_mut() {
        let count = seen.entry(loaded.batch.label.clone()).or_default();
        *count += 1;
        if *count > 1 {
            loaded.batch.label = format!("{}#{}", loaded.batch.label, count);
        }
    }
}

/// Compares `roots` (the current batch first) and writes the result to `output`.
///
/// With an empty `metrics`, every metric delivered by all batches is compared.
/// Rows follow the first batch's experiment order, extended by experiments
/// only later batches have.
pub fn run(roots: &[PathBuf], metrics: &[String], output: &Path) -> Result<ComparisonReport, CampError> {
    let mut batches = roots.iter().map(|root| load_batch(root)).collect::<Result<Vec<_>, _>>()?;
    unique_labels(&mut batches);

    let metrics: Vec<String> = if metrics.is_empty() {
        batches
            .first()
            .map(|first| {
                first
                    .metrics
                    .iter()
                    .filter(|m| batches.iter().all(|b| b.metrics.contains(*m)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    } else {
        metrics.to_vec()
    };

    if let Some(first) = batches.first() {
        for other in &batches[1..] {
            if other.batch.param_names != first.batch.param_names {
                warn!(
                    batch = %other.batch.label,
                    "criteria parameters differ from {}; rows align by experiment name only",
                    first.batch.label
                );
            }
        }
    }

    let mut experiments: Vec<String> = Vec::new();
    for loaded in &batches {
        for exp in &loaded.order {
            if !experiments.contains(exp) {
                experiments.push(exp.clone());
            }
        }
    }

    let mut columns = vec!["exp".to_string()];
    for loaded in &batches {
        for metric in &metrics {
            if !loaded.metrics.contains(metric) {
                warn!(batch = %loaded.batch.label, %metric, "metric not delivered; column left empty");
            }
            columns.push(format!("{}:{}", loaded.batch.label, metric));
        }
    }
    let rows = experiments.iter().map(|exp| {
        let mut row = vec![exp.clone()];
        for loaded in &batches {
            let cells = loaded.values.get(exp);
            row.extend(metrics.iter().map(|metric| {
                format_cell(cells.and_then(|c| c.get(metric)).copied().unwrap_or(f64::NAN))
            }));
        }
        row
    });
    let csv = output.join(COMPARISON_CSV);
    write_rows(&csv, &columns, rows)?;

    let hashes: Vec<&str> = batches.iter().map(|b| b.batch.identity_hash.as_str()).collect();
    let input_hash = stable_hash_string(&hashes)?;
    let report = ComparisonReport {
        batches: batches.into_iter().map(|b| b.batch).collect(),
        metrics,
        experiments,
        columns,
        csv,
        provenance: Provenance::now(input_hash, "camp-pipeline", env!("CARGO_PKG_VERSION")),
    };
    write_json(&output.join(COMPARISON_JSON), &report)?;
    info!(
        batches = report.batches.len(),
        metrics = report.metrics.len(),
        output = %output.display(),
        "wrote comparison"
    );
    Ok(report)
}
