use std::collections::BTreeMap;

use camp_core::{CampError, ErrorInfo};
use camp_patch::{Change, PatchSet};
use serde::{Deserialize, Serialize};

use crate::codes;
use crate::value::{ParamValue, ValueKind};

/// Placeholder substituted with the criterion value in change templates.
pub const VALUE_PLACEHOLDER: &str = "{value}";

/// Declarative definition of a sweepable criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionDef {
    /// Parameter name reported in collated tables; defaults to the criterion name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    /// Value type.
    #[serde(default)]
    pub kind: ValueKind,
    /// Explicit enumeration used by `C<K>` and bare expressions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<ParamValue>,
    /// Inclusive range sampled evenly by `C<K>` when no enumeration is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
    /// Changes emitted per value; `{value}` is substituted in every string field.
    #[serde(default)]
    pub changes: PatchSet,
    /// Emit each `ElementAdd` template `value` times (population-style criteria).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub repeat_adds: bool,
}

impl CriterionDef {
    /// Parameter name for a criterion registered as `name`.
    pub fn param_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.param.as_deref().unwrap_or(name)
    }

    /// Instantiates the change templates for `value`.
    pub fn changes_for(&self, value: &ParamValue) -> PatchSet {
        let rendered = value.to_string();
        let sub = |text: &str| text.replace(VALUE_PLACEHOLDER, &rendered);
        let copies = match value {
            ParamValue::Int(n) if self.repeat_adds => (*n).max(0) as usize,
            _ => 1,
        };
        self.changes
            .changes()
            .iter()
            .flat_map(|change| {
                let n = if matches!(change, Change::ElementAdd { .. }) { copies } else { 1 };
                std::iter::repeat(change).take(n)
            })
            .map(|change| match change {
                Change::AttributeChange {
                    path,
                    attribute,
                    value,
                } => Change::AttributeChange {
                    path: sub(path),
                    attribute: sub(attribute),
                    value: sub(value),
                },
                Change::ElementAdd {
                    parent,
                    tag,
                    attributes,
                } => Change::ElementAdd {
                    parent: sub(parent),
                    tag: sub(tag),
                    attributes: attributes
                        .iter()
                        .map(|(k, v)| (sub(k), sub(v)))
                        .collect(),
                },
                Change::ElementRemove { parent, tag } => Change::ElementRemove {
                    parent: sub(parent),
                    tag: sub(tag),
                },
            })
            .collect()
    }
}

/// Explicit registry of criteria available to expressions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CriteriaRegistry {
    defs: BTreeMap<String, CriterionDef>,
}

impl CriteriaRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the stock swarm criteria.
    ///
    /// `population_size` sets the quantity of the distributed entity and
    /// `noise` sets the actuator/sensor noise level over `[0, 0.2]`.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.insert(
            "population_size",
            CriterionDef {
                param: None,
                kind: ValueKind::Int,
                values: Vec::new(),
                range: None,
                changes: [Change::attribute(
                    ".//arena/distribute/entity",
                    "quantity",
                    VALUE_PLACEHOLDER,
                )]
                .into_iter()
                .collect(),
                repeat_adds: false,
            },
        );
        registry.insert(
            "noise",
            CriterionDef {
                param: Some("noise_level".into()),
                kind: ValueKind::Float,
                values: Vec::new(),
                range: Some([0.0, 0.2]),
                changes: [Change::attribute(".//noise", "level", VALUE_PLACEHOLDER)]
                    .into_iter()
                    .collect(),
                repeat_adds: false,
            },
        );
        registry
    }

    /// Registers (or replaces) a criterion.
    pub fn insert(&mut self, name: impl Into<String>, def: CriterionDef) {
        self.defs.insert(name.into(), def);
    }

    /// Merges `other` into this registry; entries in `other` win.
    pub fn merge(&mut self, other: &CriteriaRegistry) {
        for (name, def) in &other.defs {
            self.defs.insert(name.clone(), def.clone());
        }
    }

    /// Looks up a criterion by name.
    pub fn get(&self, name: &str) -> Result<&CriterionDef, CampError> {
        self.defs.get(name).ok_or_else(|| {
            CampError::Criteria(
                ErrorInfo::new(codes::UNKNOWN, "criterion is not registered")
                    .with_context("criterion", name)
                    .with_context("known", self.names().join(",")),
            )
        })
    }

    /// Registered criterion names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.defs.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_substitute_value() {
        let registry = CriteriaRegistry::builtin();
        let def = registry.get("population_size").expect("builtin");
        let set = def.changes_for(&ParamValue::Int(16));
        assert_eq!(
            set.changes(),
            &[Change::attribute(".//arena/distribute/entity", "quantity", "16")]
        );
    }

    #[test]
    fn repeated_adds_scale_with_value() {
        let def = CriterionDef {
            param: None,
            kind: ValueKind::Int,
            values: Vec::new(),
            range: None,
            changes: [
                Change::add(".//arena", "robot", [("id", "r")]),
                Change::attribute(".//arena", "count", VALUE_PLACEHOLDER),
            ]
            .into_iter()
            .collect(),
            repeat_adds: true,
        };
        let set = def.changes_for(&ParamValue::Int(3));
        assert_eq!(set.len(), 4);
        assert_eq!(
            set.changes().last(),
            Some(&Change::attribute(".//arena", "count", "3"))
        );
        assert_eq!(def.changes_for(&ParamValue::Int(0)).len(), 1);
    }

    #[test]
    fn unknown_criterion_lists_known_names() {
        let err = CriteriaRegistry::builtin().get("temperature").expect_err("unknown");
        assert_eq!(err.code(), codes::UNKNOWN);
        assert_eq!(
            err.info().context.get("known").map(String::as_str),
            Some("noise,population_size")
        );
    }
}
