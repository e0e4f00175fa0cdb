use camp_core::{CampError, ErrorInfo};

use crate::codes;
use crate::expr::{CriteriaExpr, ModelSpec};
use crate::registry::CriterionDef;
use crate::value::{ParamValue, ValueKind};

fn bound_error(expr: &CriteriaExpr, message: &str) -> CampError {
    CampError::Criteria(
        ErrorInfo::new(codes::BOUND, message)
            .with_context("expression", expr.source.clone())
            .with_context("criterion", expr.criterion.clone()),
    )
}

fn require_numeric(expr: &CriteriaExpr, def: &CriterionDef) -> Result<(), CampError> {
    if def.kind.is_numeric() {
        Ok(())
    } else {
        Err(bound_error(expr, "log and linear models require a numeric criterion"))
    }
}

/// Expands `expr` into its ordered value sequence using the domain in `def`.
///
/// Pure and deterministic; all validation happens here, before any caller
/// touches the filesystem.
pub fn expand_values(expr: &CriteriaExpr, def: &CriterionDef) -> Result<Vec<ParamValue>, CampError> {
    match expr.model {
        ModelSpec::Log { max } => {
            require_numeric(expr, def)?;
            if max <= 0 {
                return Err(bound_error(expr, "Log bound must be positive"));
            }
            let mut values = Vec::new();
            let mut current: i64 = 1;
            while current <= max {
                values.push(def.kind.numeric(current as f64));
                match current.checked_mul(2) {
                    Some(next) => current = next,
                    None => break,
                }
            }
            Ok(values)
        }
        ModelSpec::Linear { max, increments } => {
            require_numeric(expr, def)?;
            if max <= 0 {
                return Err(bound_error(expr, "Linear bound must be positive"));
            }
            if increments <= 0 {
                return Err(bound_error(expr, "increment count must be positive"));
            }
            if increments > max {
                return Err(bound_error(
                    expr,
                    "increment count cannot exceed the Linear bound",
                ));
            }
            let step = max as f64 / increments as f64;
            Ok((1..=increments)
                .map(|i| def.kind.numeric(step * i as f64))
                .collect())
        }
        ModelSpec::Levels { count } => {
            if count <= 0 {
                return Err(bound_error(expr, "cardinality must be positive"));
            }
            let count = count as usize;
            if !def.values.is_empty() {
                if count > def.values.len() {
                    return Err(bound_error(
                        expr,
                        "cardinality exceeds the criterion's enumeration",
                    ));
                }
                return Ok(def.values[..count].to_vec());
            }
            let Some([lo, hi]) = def.range else {
                return Err(bound_error(
                    expr,
                    "criterion defines neither values nor a range",
                ));
            };
            if def.kind == ValueKind::Text {
                return Err(bound_error(expr, "text criteria cannot sample a range"));
            }
            if count == 1 {
                return Ok(vec![def.kind.numeric(lo)]);
            }
            let step = (hi - lo) / (count - 1) as f64;
            Ok((0..count)
                .map(|i| def.kind.numeric(lo + step * i as f64))
                .collect())
        }
        ModelSpec::Full => {
            if def.values.is_empty() {
                return Err(bound_error(
                    expr,
                    "criterion has no enumeration; add a Log, Linear or C token",
                ));
            }
            Ok(def.values.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CriteriaRegistry;

    fn values(source: &str) -> Result<Vec<ParamValue>, CampError> {
        let registry = CriteriaRegistry::builtin();
        let expr = CriteriaExpr::parse(source)?;
        expand_values(&expr, registry.get(&expr.criterion)?)
    }

    #[test]
    fn log_model_counts_powers_of_two() {
        let vals = values("population_size.Log1024").expect("log");
        assert_eq!(vals.len(), 11);
        assert_eq!(vals.first(), Some(&ParamValue::Int(1)));
        assert_eq!(vals.last(), Some(&ParamValue::Int(1024)));
        assert_eq!(values("population_size.Log1000").expect("log").len(), 10);
        assert_eq!(values("population_size.Log1").expect("log"), vec![ParamValue::Int(1)]);
    }

    #[test]
    fn linear_model_splits_bound() {
        assert_eq!(
            values("population_size.Linear100.C4").expect("linear"),
            vec![
                ParamValue::Int(25),
                ParamValue::Int(50),
                ParamValue::Int(75),
                ParamValue::Int(100)
            ]
        );
        let default = values("population_size.Linear50").expect("linear");
        assert_eq!(default.len(), 10);
        assert_eq!(default[0], ParamValue::Int(5));
    }

    #[test]
    fn range_levels_are_inclusive() {
        assert_eq!(
            values("noise.C3").expect("levels"),
            vec![
                ParamValue::Float(0.0),
                ParamValue::Float(0.1),
                ParamValue::Float(0.2)
            ]
        );
        assert_eq!(values("noise.C1").expect("levels"), vec![ParamValue::Float(0.0)]);
    }

    #[test]
    fn out_of_domain_bounds_are_rejected() {
        for bad in [
            "population_size.Log0",
            "population_size.Log-4",
            "population_size.Linear0",
            "population_size.Linear5",
            "population_size.Linear10.C11",
            "population_size.Linear10.C0",
            "population_size.C3",
            "population_size",
        ] {
            let err = values(bad).expect_err(bad);
            assert_eq!(err.code(), codes::BOUND, "{bad}");
        }
    }
}
