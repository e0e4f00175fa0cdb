use camp_core::CampError;
use camp_patch::{Change, Document, PatchSet};
use serde::{Deserialize, Serialize};

/// Origin of a change; also its application precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeLayer {
    /// Changes every experiment on a platform needs.
    Platform,
    /// Project-wide changes from configuration.
    Project,
    /// Changes driven by the criteria value of the experiment.
    Criteria,
    /// Per-run unique changes (seed, output path).
    Run,
}

impl ChangeLayer {
    /// Layers in application order.
    pub const ALL: [ChangeLayer; 4] = [
        ChangeLayer::Platform,
        ChangeLayer::Project,
        ChangeLayer::Criteria,
        ChangeLayer::Run,
    ];
}

/// A change tagged with its layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayeredChange {
    /// Originating layer.
    pub layer: ChangeLayer,
    /// The change itself.
    pub change: Change,
}

/// Ordered changes that turn the template into one experiment.
///
/// Changes are kept grouped by layer in precedence order no matter the
/// order layers are pushed in, so a later layer may target elements an
/// earlier layer creates.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExperimentDefinition {
    changes: Vec<LayeredChange>,
}

impl ExperimentDefinition {
    /// An empty definition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`ExperimentDefinition::push_layer`].
    pub fn with_layer(mut self, layer: ChangeLayer, set: &PatchSet) -> Self {
        self.push_layer(layer, set);
        self
    }

    /// Appends `set` to `layer`, after any changes already in that layer.
    pub fn push_layer(&mut self, layer: ChangeLayer, set: &PatchSet) {
        let at = self
            .changes
            .iter()
            .position(|entry| entry.layer > layer)
            .unwrap_or(self.changes.len());
        let tagged = set.changes().iter().cloned().map(|change| LayeredChange { layer, change });
        self.changes.splice(at..at, tagged);
    }

    /// Tagged changes in application order.
    pub fn entries(&self) -> &[LayeredChange] {
        &self.changes
    }

    /// Changes of one layer.
    pub fn layer(&self, layer: ChangeLayer) -> PatchSet {
        self.changes
            .iter()
            .filter(|entry| entry.layer == layer)
            .map(|entry| entry.change.clone())
            .collect()
    }

    /// All changes as one patch set, in precedence order.
    pub fn patch_set(&self) -> PatchSet {
        self.changes.iter().map(|entry| entry.change.clone()).collect()
    }

    /// Copy of this definition with per-run changes appended.
    pub fn specialize(&self, run_changes: &PatchSet) -> Self {
        self.clone().with_layer(ChangeLayer::Run, run_changes)
    }

    /// Applies the definition to `template`.
    pub fn apply(&self, template: &Document) -> Result<Document, CampError> {
        self.patch_set().apply(template)
    }

    /// Number of changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// True when there are no changes.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camp_patch::Element;

    #[test]
    fn layers_apply_in_precedence_order() {
        let criteria: PatchSet = [Change::attribute(".//robot", "speed", "3")].into_iter().collect();
        let platform: PatchSet = [Change::add(".", "robot", [("speed", "1")])].into_iter().collect();
        let def = ExperimentDefinition::new()
            .with_layer(ChangeLayer::Criteria, &criteria)
            .with_layer(ChangeLayer::Platform, &platform);
        let layers: Vec<_> = def.entries().iter().map(|e| e.layer).collect();
        assert_eq!(layers, vec![ChangeLayer::Platform, ChangeLayer::Criteria]);

        let doc = def
            .apply(&Document::new(Element::new("config")))
            .expect("criteria change sees the platform element");
        assert_eq!(doc.root.children[0].attr("speed"), Some("3"));
    }

    #[test]
    fn specialization_leaves_original_untouched() {
        let def = ExperimentDefinition::new().with_layer(
            ChangeLayer::Project,
            &[Change::attribute(".", "a", "1")].into_iter().collect(),
        );
        let run = def.specialize(&[Change::attribute(".", "seed", "7")].into_iter().collect());
        assert_eq!(def.len(), 1);
        assert_eq!(run.len(), 2);
        assert_eq!(run.layer(ChangeLayer::Run).len(), 1);
        assert_eq!(run.layer(ChangeLayer::Platform).len(), 0);
    }
}
