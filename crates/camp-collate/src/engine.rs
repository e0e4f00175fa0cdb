use std::path::PathBuf;

use camp_core::serde::{read_json, write_json};
use camp_core::{CampError, ErrorInfo, Provenance};
use camp_exp::{BatchExperiment, BatchLayout, BatchManifest};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::codes;
use crate::gaps::Gap;
use crate::inter::{collate_batch, SummarySpec};
use crate::intra::{collate_experiments, write_experiment_stats, IntraOptions};
use crate::stats::{Stat, StatsMode};
use crate::COLLATION_FILE;

/// Collation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollateConfig {
    /// Run table stems (`outputs/run_<k>/<stem>.csv`).
    pub stems: Vec<String>,
    pub mode: StatsMode,
    pub summaries: Vec<SummarySpec>,
    /// Promote gaps to errors.
    pub strict: bool,
    /// Phase 1 worker threads.
    pub threads: usize,
}

impl Default for CollateConfig {
    fn default() -> Self {
        Self {
            stems: Vec::new(),
            mode: StatsMode::None,
            summaries: Vec::new(),
            strict: false,
            threads: 4,
        }
    }
}

/// Contents of `statistics/collated/collation.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollationReport {
    pub identity_hash: String,
    pub experiments: Vec<String>,
    pub stats: Vec<Stat>,
    pub metrics: Vec<String>,
    /// Files written, relative to the batch root.
    pub files: Vec<PathBuf>,
    pub gaps: Vec<Gap>,
    pub provenance: Provenance,
}

impl CollationReport {
    pub fn load(layout: &BatchLayout) -> Result<Self, CampError> {
        let path = layout.collated_dir().join(COLLATION_FILE);
        let report: Self = read_json(&path)?;
        report.provenance.ensure_readable(&path)?;
        Ok(report)
    }
}

fn strict_failure(gaps: &[Gap], phase: &str) -> CampError {
    let listed: Vec<String> = gaps.iter().take(8).map(ToString::to_string).collect();
    CampError::Collate(
        ErrorInfo::new(codes::GAP, "collation gaps in strict mode")
            .with_context("phase", phase)
            .with_context("count", gaps.len().to_string())
            .with_context("gaps", listed.join("; ")),
    )
}

/// Runs both collation phases for a batch.
#[derive(Debug, Clone)]
pub struct CollationEngine {
    config: CollateConfig,
}

impl CollationEngine {
    pub fn new(config: CollateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CollateConfig {
        &self.config
    }

    /// Collates `batch` and writes every statistics artifact.
    pub fn process(
        &self,
        batch: &BatchExperiment,
        manifest: &BatchManifest,
    ) -> Result<CollationReport, CampError> {
        let layout = &batch.layout;
        let experiments: Vec<(String, Vec<String>)> = batch
            .experiments
            .iter()
            .map(|exp| (exp.name.clone(), exp.runs.iter().map(|r| r.id.clone()).collect()))
            .collect();
        let per_exp = collate_experiments(
            layout,
            &experiments,
            &IntraOptions {
                stems: self.config.stems.clone(),
                mode: self.config.mode,
                threads: self.config.threads,
            },
        )?;

        let mut gaps = Vec::new();
        for stats in &per_exp {
            write_experiment_stats(layout, stats)?;
            gaps.extend(stats.gaps.iter().cloned());
        }
        if self.config.strict && !gaps.is_empty() {
            return Err(strict_failure(&gaps, "intra"));
        }

        let lookup: Vec<_> = manifest
            .experiments
            .iter()
            .map(|entry| per_exp.iter().find(|s| s.experiment == entry.name))
            .collect();
        let inter = collate_batch(layout, manifest, &lookup, &self.config.summaries)?;
        if self.config.strict && !inter.gaps.is_empty() {
            return Err(strict_failure(&inter.gaps, "inter"));
        }
        gaps.extend(inter.gaps);
        if !gaps.is_empty() {
            warn!(gaps = gaps.len(), "collation finished with gaps");
        }

        let report = CollationReport {
            identity_hash: manifest.identity_hash.clone(),
            experiments: manifest.experiments.iter().map(|e| e.name.clone()).collect(),
            stats: self.config.mode.stats(),
            metrics: self.config.summaries.iter().map(SummarySpec::metric).collect(),
            files: inter.files,
            gaps,
            provenance: Provenance::now(
                manifest.identity_hash.clone(),
                "camp-collate",
                env!("CARGO_PKG_VERSION"),
            ),
        };
        write_json(&layout.collated_dir().join(COLLATION_FILE), &report)?;
        info!(
            experiments = report.experiments.len(),
            metrics = report.metrics.len(),
            gaps = report.gaps.len(),
            "collation complete"
        );
        Ok(report)
    }
}
