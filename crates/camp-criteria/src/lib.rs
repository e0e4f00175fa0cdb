//! Batch criteria: parsing compact parameter-sweep expressions and expanding
//! them into ordered, addressable experiment cells.

mod batch;
mod expr;
mod model;
mod registry;
mod value;

pub use batch::{expand, BatchCriteria, Cell, CellIndex, CriteriaExpander, Dimension};
pub use expr::{CriteriaExpr, ModelSpec, DEFAULT_LINEAR_INCREMENTS};
pub use model::expand_values;
pub use registry::{CriteriaRegistry, CriterionDef, VALUE_PLACEHOLDER};
pub use value::{Param, ParamTuple, ParamValue, ValueKind};

/// Stable error codes raised by this crate.
pub mod codes {
    /// Malformed expression.
    pub const SYNTAX: &str = "criteria.syntax";
    /// Out-of-domain bound or cardinality.
    pub const BOUND: &str = "criteria.bound";
    /// Criterion missing from the registry.
    pub const UNKNOWN: &str = "criteria.unknown";
    /// Wrong number of expressions for batch criteria.
    pub const ARITY: &str = "criteria.arity";
}
