//! Phase 1: statistics across the runs of one experiment.

use std::collections::BTreeMap;
use std::path::Path;

use camp_core::serde::write_json;
use camp_core::{CampError, ErrorInfo};
use camp_exp::BatchLayout;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::codes;
use crate::gaps::{Gap, GapReason};
use crate::stats::{Sample, Stat, StatsMode};
use crate::table::Table;

/// File name of the phase 1 gap record.
pub const GAPS_FILE: &str = "gaps.json";

/// Phase 1 results of one experiment, not yet written.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentStats {
    pub experiment: String,
    /// Keyed by `(stem, stat)`.
    pub tables: BTreeMap<(String, Stat), Table>,
    /// Runs that contributed, per stem.
    pub contributing: BTreeMap<String, usize>,
    pub gaps: Vec<Gap>,
}

impl ExperimentStats {
    /// `<stem>.<stat>.csv`.
    pub fn file_name(stem: &str, stat: Stat) -> String {
        format!("{stem}.{}.csv", stat.suffix())
    }
}

fn malformed(experiment: &str, run: &str, stem: &str, detail: String) -> Gap {
    Gap {
        experiment: experiment.to_string(),
        run: Some(run.to_string()),
        table: stem.to_string(),
        reason: GapReason::Malformed { detail },
    }
}

/// Reads every run table of `stem` and reduces them cell by cell.
///
/// Rows are aligned by index; a run with fewer rows only contributes to the
/// rows it has. Runs whose header differs from the first readable run are
/// treated as malformed.
pub fn collate_stem(
    experiment: &str,
    outputs_dir: &Path,
    runs: &[String],
    stem: &str,
    mode: StatsMode,
) -> (BTreeMap<Stat, Table>, usize, Vec<Gap>) {
    let mut gaps = Vec::new();
    let mut tables: Vec<Table> = Vec::new();
    for run in runs {
        let path = outputs_dir.join(run).join(format!("{stem}.csv"));
        if !path.is_file() {
            gaps.push(Gap {
                experiment: experiment.to_string(),
                run: Some(run.clone()),
                table: stem.to_string(),
                reason: GapReason::Missing,
            });
            continue;
        }
        match Table::read_csv(&path) {
            Ok(table) => match tables.first() {
                Some(first) if first.columns != table.columns => gaps.push(malformed(
                    experiment,
                    run,
                    stem,
                    format!("header {:?} differs from {:?}", table.columns, first.columns),
                )),
                _ => tables.push(table),
            },
            Err(err) => gaps.push(malformed(experiment, run, stem, err.info().message.clone())),
        }
    }

    let mut out = BTreeMap::new();
    let Some(first) = tables.first() else {
        return (out, 0, gaps);
    };
    let columns = first.columns.clone();
    let n_rows = tables.iter().map(|t| t.rows.len()).max().unwrap_or(0);
    let samples: Vec<Vec<Sample>> = (0..n_rows)
        .map(|row| {
            (0..columns.len())
                .map(|col| {
                    Sample::new(
                        tables
                            .iter()
                            .filter_map(|t| t.rows.get(row).map(|r| r[col])),
                    )
                })
                .collect()
        })
        .collect();
    for stat in mode.stats() {
        let mut table = Table::new(columns.clone());
        table.rows = samples
            .iter()
            .map(|row| row.iter().map(|sample| sample.get(stat)).collect())
            .collect();
        out.insert(stat, table);
    }
    (out, tables.len(), gaps)
}

/// Phase 1 settings.
#[derive(Debug, Clone, PartialEq)]
pub struct IntraOptions {
    pub stems: Vec<String>,
    pub mode: StatsMode,
    pub threads: usize,
}

/// Computes phase 1 statistics for every experiment in parallel.
///
/// `experiments` pairs each experiment name with its run ids. Nothing is
/// written; see [`write_experiment_stats`].
pub fn collate_experiments(
    layout: &BatchLayout,
    experiments: &[(String, Vec<String>)],
    opts: &IntraOptions,
) -> Result<Vec<ExperimentStats>, CampError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.threads.max(1))
        .build()
        .map_err(|err| CampError::Collate(ErrorInfo::new(codes::THREAD_POOL, err.to_string())))?;
    let results = pool.install(|| {
        experiments
            .par_iter()
            .map(|(experiment, runs)| {
                let outputs = layout.outputs_dir(experiment);
                let mut stats = ExperimentStats {
                    experiment: experiment.clone(),
                    tables: BTreeMap::new(),
                    contributing: BTreeMap::new(),
                    gaps: Vec::new(),
                };
                for stem in &opts.stems {
                    let (tables, used, gaps) = collate_stem(experiment, &outputs, runs, stem, opts.mode);
                    stats
                        .tables
                        .extend(tables.into_iter().map(|(stat, t)| ((stem.clone(), stat), t)));
                    stats.contributing.insert(stem.clone(), used);
                    stats.gaps.extend(gaps);
                }
                debug!(experiment = %experiment, gaps = stats.gaps.len(), "collated runs");
                stats
            })
            .collect::<Vec<_>>()
    });
    Ok(results)
}

/// Writes one experiment's tables and gap record under `statistics/<exp>/`.
pub fn write_experiment_stats(layout: &BatchLayout, stats: &ExperimentStats) -> Result<(), CampError> {
    let dir = layout.exp_statistics_dir(&stats.experiment);
    for ((stem, stat), table) in &stats.tables {
        table.write_csv(&dir.join(ExperimentStats::file_name(stem, *stat)))?;
    }
    for gap in &stats.gaps {
        warn!(%gap, "collation gap");
    }
    write_json(&dir.join(GAPS_FILE), &stats.gaps)
}
