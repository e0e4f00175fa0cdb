//! Phase 2: one value per experiment, assembled into batch tables.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use camp_core::{CampError, ErrorInfo};
use camp_exp::{BatchLayout, BatchManifest};
use serde::{Deserialize, Serialize};

use crate::codes;
use crate::gaps::{Gap, GapReason};
use crate::intra::ExperimentStats;
use crate::stats::{Sample, Stat};
use crate::table::{format_cell, write_rows, Table};

/// How a column of an experiment's mean table becomes one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Reduce {
    Last,
    Mean,
    Max,
    Min,
    /// Zero-based row.
    Row(usize),
    /// Keep the whole column.
    Series,
}

impl FromStr for Reduce {
    type Err = CampError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "last" => Ok(Reduce::Last),
            "mean" => Ok(Reduce::Mean),
            "max" => Ok(Reduce::Max),
            "min" => Ok(Reduce::Min),
            "series" => Ok(Reduce::Series),
            other => other
                .strip_prefix("row:")
                .and_then(|n| n.parse().ok())
                .map(Reduce::Row)
                .ok_or_else(|| {
                    CampError::Config(
                        ErrorInfo::new(codes::BAD_REDUCE, "unknown summary reduction")
                            .with_context("reduce", other)
                            .with_hint("use last, mean, max, min, row:<n> or series"),
                    )
                }),
        }
    }
}

impl TryFrom<String> for Reduce {
    type Error = CampError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Reduce> for String {
    fn from(value: Reduce) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Reduce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reduce::Last => f.write_str("last"),
            Reduce::Mean => f.write_str("mean"),
            Reduce::Max => f.write_str("max"),
            Reduce::Min => f.write_str("min"),
            Reduce::Row(n) => write!(f, "row:{n}"),
            Reduce::Series => f.write_str("series"),
        }
    }
}

impl Reduce {
    fn apply(self, column: &[f64]) -> Result<f64, GapReason> {
        let sample = || Sample::new(column.iter().copied());
        let value = match self {
            Reduce::Last => column.last().copied().unwrap_or(f64::NAN),
            Reduce::Mean => sample().mean(),
            Reduce::Max => sample().percentile(1.0),
            Reduce::Min => sample().percentile(0.0),
            Reduce::Row(row) => *column.get(row).ok_or(GapReason::MissingRow { row })?,
            Reduce::Series => f64::NAN,
        };
        Ok(value)
    }
}

/// One collated metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarySpec {
    /// Metric name; defaults to `<stem>.<column>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub stem: String,
    pub column: String,
    #[serde(default = "default_reduce")]
    pub reduce: Reduce,
}

fn default_reduce() -> Reduce {
    Reduce::Last
}

impl SummarySpec {
    pub fn metric(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}.{}", self.stem, self.column))
    }
}

/// Files phase 2 wrote, relative to the batch root.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InterOutputs {
    pub files: Vec<PathBuf>,
    pub gaps: Vec<Gap>,
}

enum Lookup {
    Column(Vec<f64>),
    Gap(GapReason),
}

fn mean_column(stats: Option<&ExperimentStats>, spec: &SummarySpec) -> Lookup {
    let Some(stats) = stats else {
        return Lookup::Gap(GapReason::Missing);
    };
    let Some(table) = stats.tables.get(&(spec.stem.clone(), Stat::Mean)) else {
        return Lookup::Gap(GapReason::Missing);
    };
    match table.column(&spec.column) {
        Some(column) => Lookup::Column(column),
        None => Lookup::Gap(GapReason::MissingColumn {
            column: spec.column.clone(),
        }),
    }
}

fn relative(layout: &BatchLayout, path: &std::path::Path) -> PathBuf {
    path.strip_prefix(layout.batch_root())
        .map(PathBuf::from)
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Writes `summary.csv` plus matrix and series tables under `statistics/collated/`.
///
/// `stats` must hold one entry per manifest experiment, in manifest order;
/// `None` marks an experiment whose statistics are unavailable.
pub fn collate_batch(
    layout: &BatchLayout,
    manifest: &BatchManifest,
    stats: &[Option<&ExperimentStats>],
    summaries: &[SummarySpec],
) -> Result<InterOutputs, CampError> {
    let dir = layout.collated_dir();
    let mut outputs = InterOutputs::default();
    let scalar: Vec<&SummarySpec> = summaries.iter().filter(|s| s.reduce != Reduce::Series).collect();

    // values[metric][experiment]
    let mut values: Vec<Vec<f64>> = Vec::with_capacity(scalar.len());
    for spec in &scalar {
        let mut column = Vec::with_capacity(manifest.cardinality());
        for (entry, exp_stats) in manifest.experiments.iter().zip(stats) {
            let outcome = match mean_column(*exp_stats, spec) {
                Lookup::Column(col) => spec.reduce.apply(&col),
                Lookup::Gap(reason) => Err(reason),
            };
            match outcome {
                Ok(value) => column.push(value),
                Err(reason) => {
                    outputs.gaps.push(Gap {
                        experiment: entry.name.clone(),
                        run: None,
                        table: spec.metric(),
                        reason,
                    });
                    column.push(f64::NAN);
                }
            }
        }
        values.push(column);
    }

    let mut header = vec!["exp".to_string()];
    header.extend(manifest.param_names.iter().cloned());
    header.extend(scalar.iter().map(|s| s.metric()));
    let rows = manifest.experiments.iter().enumerate().map(|(idx, entry)| {
        let mut row = vec![entry.name.clone()];
        row.extend(entry.params.iter().map(|p| p.value.to_string()));
        row.extend(values.iter().map(|col| format_cell(col[idx])));
        row
    });
    let summary = dir.join(crate::SUMMARY_FILE);
    write_rows(&summary, &header, rows)?;
    outputs.files.push(relative(layout, &summary));

    if manifest.is_bivariate() {
        let (n_i, n_j) = (manifest.shape[0], manifest.shape[1]);
        let ticks_j: Vec<String> = (0..n_j)
            .map(|j| param_label(manifest, j, 1))
            .collect();
        for (spec, col) in scalar.iter().zip(&values) {
            let mut header = vec![format!("{}\\{}", manifest.param_names[0], manifest.param_names[1])];
            header.extend(ticks_j.iter().cloned());
            let rows = (0..n_i).map(|i| {
                let mut row = vec![param_label(manifest, i * n_j, 0)];
                row.extend((0..n_j).map(|j| format_cell(col[i * n_j + j])));
                row
            });
            let path = dir.join(format!("{}.matrix.csv", spec.metric()));
            write_rows(&path, &header, rows)?;
            outputs.files.push(relative(layout, &path));
        }
    }

    for spec in summaries.iter().filter(|s| s.reduce == Reduce::Series) {
        let mut series = Table::new(manifest.experiments.iter().map(|e| e.name.clone()).collect());
        let mut columns = Vec::with_capacity(manifest.cardinality());
        for (entry, exp_stats) in manifest.experiments.iter().zip(stats) {
            match mean_column(*exp_stats, spec) {
                Lookup::Column(col) => columns.push(col),
                Lookup::Gap(reason) => {
                    outputs.gaps.push(Gap {
                        experiment: entry.name.clone(),
                        run: None,
                        table: spec.metric(),
                        reason,
                    });
                    columns.push(Vec::new());
                }
            }
        }
        let n_rows = columns.iter().map(Vec::len).max().unwrap_or(0);
        series.rows = (0..n_rows)
            .map(|row| {
                columns
                    .iter()
                    .map(|col| col.get(row).copied().unwrap_or(f64::NAN))
                    .collect()
            })
            .collect();
        let path = dir.join(format!("{}.series.csv", spec.metric()));
        series.write_csv(&path)?;
        outputs.files.push(relative(layout, &path));
    }

    Ok(outputs)
}

fn param_label(manifest: &BatchManifest, ordinal: usize, dim: usize) -> String {
    manifest
        .experiments
        .get(ordinal)
        .and_then(|entry| entry.params.get(dim))
        .map(|param| param.value.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduce_parses_and_prints() {
        for text in ["last", "mean", "max", "min", "row:3", "series"] {
            let reduce: Reduce = text.parse().expect(text);
            assert_eq!(reduce.to_string(), text);
        }
        assert_eq!(
            "row:x".parse::<Reduce>().expect_err("bad").code(),
            codes::BAD_REDUCE
        );
    }

    #[test]
    fn reductions_over_column() {
        let col = [3.0, 1.0, f64::NAN, 5.0];
        assert_eq!(Reduce::Last.apply(&col), Ok(5.0));
        assert_eq!(Reduce::Max.apply(&col), Ok(5.0));
        assert_eq!(Reduce::Min.apply(&col), Ok(1.0));
        assert_eq!(Reduce::Mean.apply(&col), Ok(3.0));
        assert_eq!(Reduce::Row(1).apply(&col), Ok(1.0));
        assert_eq!(Reduce::Row(9).apply(&col), Err(GapReason::MissingRow { row: 9 }));
    }
}
