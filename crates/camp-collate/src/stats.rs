//! Replicate statistics.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which statistics phase 1 produces besides the mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsMode {
    /// Mean only.
    #[default]
    None,
    /// Mean, standard deviation and a 95% confidence interval.
    Conf95,
    /// Mean plus box-and-whisker statistics.
    Bw,
    /// Everything.
    All,
}

/// A single per-cell statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    Mean,
    Stddev,
    Ci95Lo,
    Ci95Hi,
    Median,
    Q1,
    Q3,
    Whislo,
    Whishi,
}

impl Stat {
    /// File-name suffix, e.g. `ci95_lo`.
    pub fn suffix(self) -> &'static str {
        match self {
            Stat::Mean => "mean",
            Stat::Stddev => "stddev",
            Stat::Ci95Lo => "ci95_lo",
            Stat::Ci95Hi => "ci95_hi",
            Stat::Median => "median",
            Stat::Q1 => "q1",
            Stat::Q3 => "q3",
            Stat::Whislo => "whislo",
            Stat::Whishi => "whishi",
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

const CONF95: [Stat; 3] = [Stat::Stddev, Stat::Ci95Lo, Stat::Ci95Hi];
const BW: [Stat; 5] = [Stat::Median, Stat::Q1, Stat::Q3, Stat::Whislo, Stat::Whishi];

impl StatsMode {
    /// Statistics produced in this mode; always starts with the mean.
    pub fn stats(self) -> Vec<Stat> {
        let mut stats = vec![Stat::Mean];
        if matches!(self, StatsMode::Conf95 | StatsMode::All) {
            stats.extend(CONF95);
        }
        if matches!(self, StatsMode::Bw | StatsMode::All) {
            stats.extend(BW);
        }
        stats
    }
}

/// z-score of the two-sided 95% interval.
const Z95: f64 = 1.96;

/// Summary of one cell across replicates. NaN inputs are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    sorted: Vec<f64>,
}

impl Sample {
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        let mut sorted: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
        sorted.sort_by(f64::total_cmp);
        Self { sorted }
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    pub fn mean(&self) -> f64 {
        if self.sorted.is_empty() {
            return f64::NAN;
        }
        self.sorted.iter().sum::<f64>() / self.sorted.len() as f64
    }

    /// Sample standard deviation; zero for a single replicate.
    pub fn stddev(&self) -> f64 {
        let n = self.sorted.len();
        match n {
            0 => f64::NAN,
            1 => 0.0,
            _ => {
                let mean = self.mean();
                let ss: f64 = self.sorted.iter().map(|v| (v - mean) * (v - mean)).sum();
                (ss / (n - 1) as f64).sqrt()
            }
        }
    }

    /// Linear-interpolated quantile.
    pub fn percentile(&self, quantile: f64) -> f64 {
        let values = &self.sorted;
        if values.is_empty() {
            return f64::NAN;
        }
        let position = quantile * (values.len() - 1) as f64;
        let lower = position.floor() as usize;
        let upper = position.ceil() as usize;
        if lower == upper {
            values[lower]
        } else {
            let weight = position - lower as f64;
            values[lower] * (1.0 - weight) + values[upper] * weight
        }
    }

    pub fn get(&self, stat: Stat) -> f64 {
        if self.sorted.is_empty() {
            return f64::NAN;
        }
        let half_width = || Z95 * self.stddev() / (self.sorted.len() as f64).sqrt();
        match stat {
            Stat::Mean => self.mean(),
            Stat::Stddev => self.stddev(),
            Stat::Ci95Lo => self.mean() - half_width(),
            Stat::Ci95Hi => self.mean() + half_width(),
            Stat::Median => self.percentile(0.5),
            Stat::Q1 => self.percentile(0.25),
            Stat::Q3 => self.percentile(0.75),
            // Tukey whiskers: the most extreme samples within 1.5 IQR of the box.
            Stat::Whislo => {
                let (q1, q3) = (self.percentile(0.25), self.percentile(0.75));
                let fence = q1 - 1.5 * (q3 - q1);
                self.sorted.iter().copied().find(|v| *v >= fence).unwrap_or(q1)
            }
            Stat::Whishi => {
                let (q1, q3) = (self.percentile(0.25), self.percentile(0.75));
                let fence = q3 + 1.5 * (q3 - q1);
                self.sorted.iter().rev().copied().find(|v| *v <= fence).unwrap_or(q3)
            }
        }
    }
}
