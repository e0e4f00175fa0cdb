use camp_core::{CampError, ErrorInfo};
use camp_patch::PatchSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codes;
use crate::expr::CriteriaExpr;
use crate::model::expand_values;
use crate::registry::{CriteriaRegistry, CriterionDef};
use crate::value::{Param, ParamTuple, ParamValue};

/// One expanded sweep dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    /// Parsed expression the dimension was expanded from.
    pub expr: CriteriaExpr,
    /// Parameter name reported in tables.
    pub param: String,
    /// Ordered values.
    pub values: Vec<ParamValue>,
    /// Definition snapshot used to derive per-value changes.
    pub def: CriterionDef,
}

impl Dimension {
    /// Number of values in the dimension.
    pub fn cardinality(&self) -> usize {
        self.values.len()
    }

    /// Criterion name.
    pub fn criterion(&self) -> &str {
        &self.expr.criterion
    }

    /// Changes for the value at `idx`.
    pub fn changes_at(&self, idx: usize) -> PatchSet {
        self.values
            .get(idx)
            .map(|value| self.def.changes_for(value))
            .unwrap_or_default()
    }

    fn param_at(&self, idx: usize) -> Param {
        Param {
            name: self.param.clone(),
            value: self.values[idx].clone(),
        }
    }
}

/// Position of an experiment in the criteria value space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellIndex {
    /// Index along the first dimension.
    pub i: usize,
    /// Index along the second dimension, for bivariate criteria.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub j: Option<usize>,
}

/// One point of the expanded criteria space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Row-major position in the expansion.
    pub ordinal: usize,
    /// 1D or 2D address.
    pub index: CellIndex,
    /// Stable experiment directory name.
    pub name: String,
    /// Parameter values addressing the experiment.
    pub params: ParamTuple,
    /// Criteria-driven document changes.
    pub changes: PatchSet,
}

/// Univariate or bivariate batch criteria.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "arity", rename_all = "lowercase")]
pub enum BatchCriteria {
    /// A single sweep dimension.
    Univariate { dim: Dimension },
    /// Cross product of two dimensions, `i` outer and `j` inner.
    Bivariate { dim1: Dimension, dim2: Dimension },
}

impl BatchCriteria {
    /// Total number of experiments.
    pub fn cardinality(&self) -> usize {
        match self {
            BatchCriteria::Univariate { dim } => dim.cardinality(),
            BatchCriteria::Bivariate { dim1, dim2 } => dim1.cardinality() * dim2.cardinality(),
        }
    }

    /// Dimensions in declaration order.
    pub fn dimensions(&self) -> Vec<&Dimension> {
        match self {
            BatchCriteria::Univariate { dim } => vec![dim],
            BatchCriteria::Bivariate { dim1, dim2 } => vec![dim1, dim2],
        }
    }

    /// True for two-dimensional criteria.
    pub fn is_bivariate(&self) -> bool {
        matches!(self, BatchCriteria::Bivariate { .. })
    }

    /// Directory category naming the swept criteria, e.g. `population_size+noise`.
    pub fn category(&self) -> String {
        self.dimensions()
            .iter()
            .map(|dim| dim.criterion())
            .collect::<Vec<_>>()
            .join("+")
    }

    /// Expression texts, used for batch identity.
    pub fn expressions(&self) -> Vec<String> {
        self.dimensions()
            .iter()
            .map(|dim| dim.expr.source.clone())
            .collect()
    }

    /// Parameter names in dimension order.
    pub fn param_names(&self) -> Vec<String> {
        self.dimensions().iter().map(|dim| dim.param.clone()).collect()
    }

    /// Every cell in row-major expansion order.
    pub fn cells(&self) -> Vec<Cell> {
        match self {
            BatchCriteria::Univariate { dim } => (0..dim.cardinality())
                .map(|i| Cell {
                    ordinal: i,
                    index: CellIndex { i, j: None },
                    name: format!("exp{i}"),
                    params: vec![dim.param_at(i)],
                    changes: dim.changes_at(i),
                })
                .collect(),
            BatchCriteria::Bivariate { dim1, dim2 } => {
                let mut cells = Vec::with_capacity(self.cardinality());
                for i in 0..dim1.cardinality() {
                    for j in 0..dim2.cardinality() {
                        cells.push(Cell {
                            ordinal: i * dim2.cardinality() + j,
                            index: CellIndex { i, j: Some(j) },
                            name: format!("c1-exp{i}+c2-exp{j}"),
                            params: vec![dim1.param_at(i), dim2.param_at(j)],
                            changes: PatchSet::concat([&dim1.changes_at(i), &dim2.changes_at(j)]),
                        });
                    }
                }
                cells
            }
        }
    }

    /// Human-readable tick labels per dimension.
    pub fn tick_labels(&self) -> Vec<Vec<String>> {
        self.dimensions()
            .iter()
            .map(|dim| dim.values.iter().map(ToString::to_string).collect())
            .collect()
    }
}

/// Expands criteria expressions against a registry of criterion definitions.
#[derive(Debug, Clone, Default)]
pub struct CriteriaExpander {
    registry: CriteriaRegistry,
}

impl CriteriaExpander {
    /// Creates an expander over `registry`.
    pub fn new(registry: CriteriaRegistry) -> Self {
        Self { registry }
    }

    /// The registry backing this expander.
    pub fn registry(&self) -> &CriteriaRegistry {
        &self.registry
    }

    /// Expands one univariate expression.
    pub fn expand(&self, expression: &str) -> Result<Dimension, CampError> {
        let expr = CriteriaExpr::parse(expression)?;
        let def = self.registry.get(&expr.criterion)?;
        let values = expand_values(&expr, def)?;
        debug!(expression = %expr, cardinality = values.len(), "expanded criterion");
        Ok(Dimension {
            param: def.param_name(&expr.criterion).to_string(),
            values,
            def: def.clone(),
            expr,
        })
    }

    /// Expands one or two expressions into batch criteria.
    pub fn expand_batch<S: AsRef<str>>(&self, expressions: &[S]) -> Result<BatchCriteria, CampError> {
        match expressions {
            [one] => Ok(BatchCriteria::Univariate {
                dim: self.expand(one.as_ref())?,
            }),
            [first, second] => {
                let dim1 = self.expand(first.as_ref())?;
                let dim2 = self.expand(second.as_ref())?;
                if dim1.criterion() == dim2.criterion() {
                    return Err(CampError::Criteria(
                        ErrorInfo::new(
                            codes::ARITY,
                            "bivariate criteria must sweep two different criteria",
                        )
                        .with_context("criterion", dim1.criterion()),
                    ));
                }
                Ok(BatchCriteria::Bivariate { dim1, dim2 })
            }
            other => Err(CampError::Criteria(
                ErrorInfo::new(codes::ARITY, "batch criteria take one or two expressions")
                    .with_context("count", other.len().to_string()),
            )),
        }
    }
}

/// Expands one expression against `bounds`, the criterion's value domain.
pub fn expand(expression: &str, bounds: &CriterionDef) -> Result<Vec<ParamTuple>, CampError> {
    let expr = CriteriaExpr::parse(expression)?;
    let param = bounds.param_name(&expr.criterion).to_string();
    Ok(expand_values(&expr, bounds)?
        .into_iter()
        .map(|value| {
            vec![Param {
                name: param.clone(),
                value,
            }]
        })
        .collect())
}
