use std::fmt;

use serde::{Deserialize, Serialize};

/// Type of the values a criterion produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Integer valued (population sizes, counts).
    #[default]
    Int,
    /// Real valued (noise levels, rates).
    Float,
    /// Opaque labels, only usable with explicit enumerations.
    Text,
}

impl ValueKind {
    /// True for kinds that support log and linear models.
    pub fn is_numeric(self) -> bool {
        matches!(self, ValueKind::Int | ValueKind::Float)
    }

    pub(crate) fn numeric(self, raw: f64) -> ParamValue {
        match self {
            ValueKind::Int => ParamValue::Int(raw.round() as i64),
            _ => ParamValue::Float((raw * 1e10).round() / 1e10),
        }
    }
}

/// A single concrete parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Integer value.
    Int(i64),
    /// Real value, rounded to ten decimal places on construction.
    Float(f64),
    /// Text label.
    Text(String),
}

impl ParamValue {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            ParamValue::Text(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Text(v) => f.write_str(v),
        }
    }
}

/// A named parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name.
    pub name: String,
    /// Concrete value.
    pub value: ParamValue,
}

/// Ordered parameter values addressing one experiment.
pub type ParamTuple = Vec<Param>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_values_are_rounded() {
        assert_eq!(ValueKind::Float.numeric(0.1 + 0.2), ParamValue::Float(0.3));
        assert_eq!(ValueKind::Int.numeric(33.4), ParamValue::Int(33));
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(ParamValue::Float(25.0).to_string(), "25");
        assert_eq!(ParamValue::Float(0.05).to_string(), "0.05");
        assert_eq!(ParamValue::Int(1024).to_string(), "1024");
    }
}
