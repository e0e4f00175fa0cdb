use std::fmt;

use serde::{Deserialize, Serialize};

/// Why data expected by collation is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GapReason {
    /// File does not exist.
    Missing,
    /// File exists but could not be read as a numeric table.
    Malformed { detail: String },
    /// Column requested by a summary is absent.
    MissingColumn { column: String },
    /// Table has fewer rows than the summary asks for.
    MissingRow { row: usize },
}

/// A hole in the collated data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub experiment: String,
    /// Run the gap concerns; `None` for experiment-level gaps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,
    /// Table stem (phase 1) or metric (phase 2).
    pub table: String,
    pub reason: GapReason,
}

impl fmt::Display for Gap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.experiment)?;
        if let Some(run) = &self.run {
            write!(f, "/{run}")?;
        }
        write!(f, " {}: ", self.table)?;
        match &self.reason {
            GapReason::Missing => f.write_str("missing"),
            GapReason::Malformed { detail } => write!(f, "malformed ({detail})"),
            GapReason::MissingColumn { column } => write!(f, "no column {column}"),
            GapReason::MissingRow { row } => write!(f, "no row {row}"),
        }
    }
}
