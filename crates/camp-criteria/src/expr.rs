use std::fmt;

use camp_core::{CampError, ErrorInfo};
use serde::{Deserialize, Serialize};

use crate::codes;

/// Value-distribution model named by an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum ModelSpec {
    /// Powers of two from 1 up to `max` (`Log<N>`).
    Log { max: i64 },
    /// `max` split into `increments` even steps (`Linear<N>[.C<K>]`).
    Linear { max: i64, increments: i64 },
    /// `count` levels from the criterion's enumeration (`C<K>`).
    Levels { count: i64 },
    /// The criterion's full enumeration (no model token).
    Full,
}

/// Increments used by `Linear<N>` when no `C<K>` token is given.
pub const DEFAULT_LINEAR_INCREMENTS: i64 = 10;

/// Parsed univariate criteria expression such as `population_size.Linear100.C4`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriteriaExpr {
    /// Registered criterion name.
    pub criterion: String,
    /// Value-distribution model.
    pub model: ModelSpec,
    /// Expression text as written.
    pub source: String,
}

impl fmt::Display for CriteriaExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn syntax(source: &str, token: &str, message: &str) -> CampError {
    CampError::Criteria(
        ErrorInfo::new(codes::SYNTAX, message)
            .with_context("expression", source)
            .with_context("token", token),
    )
}

fn parse_bound(source: &str, token: &str, digits: &str) -> Result<i64, CampError> {
    let valid = {
        let unsigned = digits.strip_prefix('-').unwrap_or(digits);
        !unsigned.is_empty() && unsigned.chars().all(|c| c.is_ascii_digit())
    };
    if !valid {
        return Err(syntax(source, token, "expected an integer bound"));
    }
    digits
        .parse::<i64>()
        .map_err(|_| syntax(source, token, "bound out of range"))
}

impl CriteriaExpr {
    /// Parses `<criterion>(.<token>)*`.
    ///
    /// Only syntax is checked here; bounds are validated against the
    /// criterion definition during expansion.
    pub fn parse(source: &str) -> Result<Self, CampError> {
        let trimmed = source.trim();
        let mut tokens = trimmed.split('.');
        let criterion = tokens.next().unwrap_or_default();
        if criterion.is_empty()
            || !criterion
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(syntax(source, criterion, "invalid criterion name"));
        }

        let mut log = None;
        let mut linear = None;
        let mut levels = None;
        // raw text of the Log/Linear tokens and the cardinality token, for error context
        let mut model_tokens = Vec::new();
        let mut levels_token = "";
        for token in tokens {
            if let Some(rest) = token.strip_prefix("Log") {
                if log.replace(parse_bound(source, token, rest)?).is_some() {
                    return Err(syntax(source, token, "duplicate Log token"));
                }
                model_tokens.push(token);
            } else if let Some(rest) = token.strip_prefix("Linear") {
                if linear.replace(parse_bound(source, token, rest)?).is_some() {
                    return Err(syntax(source, token, "duplicate Linear token"));
                }
                model_tokens.push(token);
            } else if let Some(rest) = token.strip_prefix('C') {
                if levels.replace(parse_bound(source, token, rest)?).is_some() {
                    return Err(syntax(source, token, "duplicate cardinality token"));
                }
                levels_token = token;
            } else {
                return Err(syntax(source, token, "unknown expression token"));
            }
        }

        let model = match (log, linear, levels) {
            (Some(_), Some(_), _) => {
                let second = model_tokens.get(1).copied().unwrap_or(trimmed);
                return Err(syntax(source, second, "Log and Linear are mutually exclusive"));
            }
            (Some(_), None, Some(_)) => {
                return Err(syntax(
                    source,
                    levels_token,
                    "cardinality cannot be combined with Log",
                ))
            }
            (Some(max), None, None) => ModelSpec::Log { max },
            (None, Some(max), increments) => ModelSpec::Linear {
                max,
                increments: increments.unwrap_or(DEFAULT_LINEAR_INCREMENTS),
            },
            (None, None, Some(count)) => ModelSpec::Levels { count },
            (None, None, None) => ModelSpec::Full,
        };
        Ok(Self {
            criterion: criterion.to_string(),
            model,
            source: trimmed.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_models() {
        assert_eq!(
            CriteriaExpr::parse("population_size.Log1024").expect("log").model,
            ModelSpec::Log { max: 1024 }
        );
        assert_eq!(
            CriteriaExpr::parse("population_size.Linear100.C4")
                .expect("linear")
                .model,
            ModelSpec::Linear {
                max: 100,
                increments: 4
            }
        );
        assert_eq!(
            CriteriaExpr::parse("population_size.Linear100").expect("linear").model,
            ModelSpec::Linear {
                max: 100,
                increments: DEFAULT_LINEAR_INCREMENTS
            }
        );
        assert_eq!(
            CriteriaExpr::parse("noise.C3").expect("levels").model,
            ModelSpec::Levels { count: 3 }
        );
        assert_eq!(CriteriaExpr::parse("controller").expect("full").model, ModelSpec::Full);
    }

    #[test]
    fn negative_bounds_parse_and_fail_later() {
        assert_eq!(
            CriteriaExpr::parse("population_size.Log-4").expect("parse").model,
            ModelSpec::Log { max: -4 }
        );
    }

    #[test]
    fn parse_errors_name_offending_token() {
        for (bad, token) in [
            ("population_size.Logx", "Logx"),
            ("population_size.Square4", "Square4"),
            ("population_size.Log8.Log16", "Log16"),
            ("population_size.Log8.C2", "C2"),
            ("population_size.C02.Log8", "C02"),
            ("population_size.Log8.Linear16", "Linear16"),
            ("population_size.Linear16.C4.Log8", "Log8"),
            ("population_size..C2", ""),
            (".C2", ""),
            ("pop size.C2", "pop size"),
            ("noise.C", "C"),
        ] {
            let err = CriteriaExpr::parse(bad).expect_err(bad);
            assert_eq!(err.code(), codes::SYNTAX, "{bad}");
            assert_eq!(
                err.info().context.get("token").map(String::as_str),
                Some(token),
                "{bad}"
            );
        }
    }
}
