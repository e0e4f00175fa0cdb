//! Stage 4: plot-ready data descriptors for the collated tables.

use std::fs;
use std::path::{Path, PathBuf};

use camp_collate::{CollationReport, SUMMARY_FILE};
use camp_core::serde::{read_json, write_json};
use camp_core::{bytes_hash_string, CampError, Provenance};
use camp_exp::{BatchLayout, BatchManifest};
use serde::{Deserialize, Serialize};
use tracing::info;
use walkdir::WalkDir;

use crate::artifacts::{malformed, DELIVERABLES_MANIFEST};
use crate::stage::Stage;

/// How a metric should be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotKind {
    /// Metric against the single criterion.
    Line,
    /// Metric over the two criteria.
    Heatmap,
    /// Per-experiment time series.
    Series,
}

/// Everything a renderer needs to draw one metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotDescriptor {
    pub metric: String,
    pub kind: PlotKind,
    /// Data table, relative to the batch root.
    pub source: PathBuf,
    /// Column of `source` holding the values (line plots only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub axes: Vec<String>,
    /// Tick labels per axis.
    pub ticks: Vec<Vec<String>>,
    pub title: String,
}

/// A collated file and its digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub sha256: String,
}

/// Contents of `deliverables/manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverManifest {
    pub identity_hash: String,
    pub metrics: Vec<String>,
    /// Descriptor files, relative to the deliverables directory.
    pub descriptors: Vec<PathBuf>,
    pub sources: Vec<SourceFile>,
    pub provenance: Provenance,
}

impl DeliverManifest {
    pub fn load(layout: &BatchLayout) -> Result<Self, CampError> {
        let path = layout.deliverables_dir().join(DELIVERABLES_MANIFEST);
        let manifest: Self = read_json(&path)?;
        manifest.provenance.ensure_readable(&path)?;
        Ok(manifest)
    }
}

fn ticks(manifest: &BatchManifest) -> Vec<Vec<String>> {
    let mut ticks: Vec<Vec<String>> = vec![Vec::new(); manifest.param_names.len()];
    for entry in &manifest.experiments {
        for (dim, param) in entry.params.iter().enumerate() {
            let label = param.value.to_string();
            if let Some(axis) = ticks.get_mut(dim) {
                if !axis.contains(&label) {
                    axis.push(label);
                }
            }
        }
    }
    ticks
}

fn hash_sources(layout: &BatchLayout) -> Result<Vec<SourceFile>, CampError> {
    let root = layout.collated_dir();
    let mut sources = Vec::new();
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(|err| CampError::io("io.walk", &root, err))?;
        if !entry.file_type().is_file() || entry.path().extension().map_or(true, |ext| ext != "csv") {
            continue;
        }
        let bytes = fs::read(entry.path()).map_err(|err| CampError::io("io.read", entry.path(), err))?;
        sources.push(SourceFile {
            path: relative(layout.batch_root(), entry.path()),
            sha256: bytes_hash_string(&bytes),
        });
    }
    Ok(sources)
}

fn relative(base: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(base).map(PathBuf::from).unwrap_or_else(|_| path.to_path_buf())
}

/// Writes one descriptor per collated metric plus the deliverables manifest.
pub fn run(layout: &BatchLayout, manifest: &BatchManifest) -> Result<DeliverManifest, CampError> {
    let collation_path = layout.collated_dir().join(camp_collate::COLLATION_FILE);
    let collation = CollationReport::load(layout).map_err(|err| malformed(Stage::Deliver, &collation_path, err))?;
    let out = layout.deliverables_dir();
    let ticks = ticks(manifest);
    let summary = relative(layout.batch_root(), &layout.collated_dir().join(SUMMARY_FILE));

    let mut descriptors = Vec::new();
    for metric in &collation.metrics {
        let series = layout.collated_dir().join(format!("{metric}.series.csv"));
        let matrix = layout.collated_dir().join(format!("{metric}.matrix.csv"));
        let (kind, source, column) = if series.is_file() {
            (PlotKind::Series, relative(layout.batch_root(), &series), None)
        } else if manifest.is_bivariate() && matrix.is_file() {
            (PlotKind::Heatmap, relative(layout.batch_root(), &matrix), None)
        } else {
            (PlotKind::Line, summary.clone(), Some(metric.clone()))
        };
        let descriptor = PlotDescriptor {
            metric: metric.clone(),
            kind,
            source,
            column,
            axes: manifest.param_names.clone(),
            ticks: ticks.clone(),
            title: format!("{metric} by {}", manifest.category),
        };
        let name = PathBuf::from(format!("{metric}.json"));
        write_json(&out.join(&name), &descriptor)?;
        descriptors.push(name);
    }

    let deliver = DeliverManifest {
        identity_hash: manifest.identity_hash.clone(),
        metrics: collation.metrics.clone(),
        descriptors,
        sources: hash_sources(layout)?,
        provenance: Provenance::now(
            manifest.identity_hash.clone(),
            "camp-pipeline",
            env!("CARGO_PKG_VERSION"),
        ),
    };
    write_json(&out.join(DELIVERABLES_MANIFEST), &deliver)?;
    info!(descriptors = deliver.descriptors.len(), "wrote deliverables");
    Ok(deliver)
}
