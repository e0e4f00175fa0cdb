use camp_core::serde::{from_json_slice, from_yaml_slice, to_canonical_json_bytes, to_yaml_string};
use camp_core::{CampError, ErrorInfo};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::codes;
use crate::document::{Document, Element};
use crate::locator::{Locator, NodePath};

/// A single structural mutation of a hierarchical document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Change {
    /// Sets `attribute` on the single element matched by `path`.
    AttributeChange {
        path: String,
        attribute: String,
        value: String,
    },
    /// Appends a new `tag` element under the single element matched by `parent`.
    ///
    /// Not idempotent: applying the same change twice adds two elements.
    ElementAdd {
        parent: String,
        tag: String,
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        attributes: IndexMap<String, String>,
    },
    /// Removes the first `tag` child of the element matched by `parent`.
    ///
    /// A parent or child that does not exist is a no-op.
    ElementRemove { parent: String, tag: String },
}

impl Change {
    /// Convenience constructor for [`Change::AttributeChange`].
    pub fn attribute(
        path: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Change::AttributeChange {
            path: path.into(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Convenience constructor for [`Change::ElementAdd`].
    pub fn add<K, V, I>(parent: impl Into<String>, tag: impl Into<String>, attributes: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Change::ElementAdd {
            parent: parent.into(),
            tag: tag.into(),
            attributes: attributes
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Convenience constructor for [`Change::ElementRemove`].
    pub fn remove(parent: impl Into<String>, tag: impl Into<String>) -> Self {
        Change::ElementRemove {
            parent: parent.into(),
            tag: tag.into(),
        }
    }

    /// The locator this change targets.
    pub fn target(&self) -> &str {
        match self {
            Change::AttributeChange { path, .. } => path,
            Change::ElementAdd { parent, .. } | Change::ElementRemove { parent, .. } => parent,
        }
    }

    /// Applies the change to `doc` in place.
    pub fn apply_to(&self, doc: &mut Document) -> Result<(), CampError> {
        match self {
            Change::AttributeChange {
                path,
                attribute,
                value,
            } => {
                let target = single_match(doc, path)?;
                if let Some(element) = doc.node_mut(&target) {
                    element.attributes.insert(attribute.clone(), value.clone());
                }
            }
            Change::ElementAdd {
                parent,
                tag,
                attributes,
            } => {
                let target = single_match(doc, parent)?;
                if let Some(element) = doc.node_mut(&target) {
                    let mut child = Element::new(tag.clone());
                    child.attributes = attributes.clone();
                    element.children.push(child);
                }
            }
            Change::ElementRemove { parent, tag } => {
                let locator = Locator::parse(parent)?;
                let matches = locator.resolve(&doc.root);
                match matches.len() {
                    0 => trace!(parent = %parent, "remove target absent; skipping"),
                    1 => {
                        if let Some(element) = doc.node_mut(&matches[0]) {
                            if let Some(pos) = element.children.iter().position(|c| c.tag == *tag)
                            {
                                element.children.remove(pos);
                            } else {
                                trace!(parent = %parent, tag = %tag, "no child to remove");
                            }
                        }
                    }
                    count => return Err(ambiguous(parent, count)),
                }
            }
        }
        Ok(())
    }
}

fn ambiguous(path: &str, count: usize) -> CampError {
    CampError::Patch(
        ErrorInfo::new(codes::AMBIGUOUS_PATH, "locator matched more than one element")
            .with_context("path", path)
            .with_context("matches", count.to_string())
            .with_hint("add an attribute or position predicate to select a single element"),
    )
}

fn single_match(doc: &Document, path: &str) -> Result<NodePath, CampError> {
    let locator = Locator::parse(path)?;
    let mut matches = locator.resolve(&doc.root);
    match matches.len() {
        0 => Err(CampError::Patch(
            ErrorInfo::new(codes::PATH_NOT_FOUND, "locator matched no element")
                .with_context("path", path),
        )),
        1 => Ok(matches.remove(0)),
        count => Err(ambiguous(path, count)),
    }
}

/// Ordered, serializable list of document changes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatchSet {
    changes: Vec<Change>,
}

impl PatchSet {
    /// Creates an empty patch set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a change.
    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    /// Appends every change of `other`, preserving order.
    pub fn extend(&mut self, other: &PatchSet) {
        self.changes.extend(other.changes.iter().cloned());
    }

    /// Concatenates patch sets in the given order.
    pub fn concat<'a>(sets: impl IntoIterator<Item = &'a PatchSet>) -> PatchSet {
        let mut merged = PatchSet::new();
        for set in sets {
            merged.extend(set);
        }
        merged
    }

    /// Changes in application order.
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// Number of changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// True when the set holds no changes.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Applies every change in order to `doc`, stopping at the first failure.
    ///
    /// The failing change index is recorded in the error context.
    pub fn apply_all(&self, doc: &mut Document) -> Result<(), CampError> {
        for (idx, change) in self.changes.iter().enumerate() {
            change.apply_to(doc).map_err(|err| match err {
                CampError::Patch(info) => {
                    CampError::Patch(info.with_context("change_index", idx.to_string()))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    /// Returns a patched copy of `doc`.
    pub fn apply(&self, doc: &Document) -> Result<Document, CampError> {
        let mut patched = doc.clone();
        self.apply_all(&mut patched)?;
        Ok(patched)
    }

    /// Canonical JSON encoding.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, CampError> {
        to_canonical_json_bytes(self)
    }

    /// Decodes a JSON encoded patch set.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, CampError> {
        from_json_slice(bytes)
    }

    /// YAML encoding.
    pub fn to_yaml(&self) -> Result<String, CampError> {
        to_yaml_string(self)
    }

    /// Decodes a YAML encoded patch set.
    pub fn from_yaml(text: &str) -> Result<Self, CampError> {
        from_yaml_slice(text.as_bytes())
    }
}

impl FromIterator<Change> for PatchSet {
    fn from_iter<T: IntoIterator<Item = Change>>(iter: T) -> Self {
        Self {
            changes: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for PatchSet {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

/// Applies `patch_set` to `document`, returning the patched document.
pub fn apply(patch_set: &PatchSet, document: &Document) -> Result<Document, CampError> {
    patch_set.apply(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::new(
            Element::new("config")
                .with_child(Element::new("x"))
                .with_child(
                    Element::new("arena")
                        .with_child(Element::new("box"))
                        .with_child(Element::new("box")),
                ),
        )
    }

    #[test]
    fn later_attribute_change_wins() {
        let set: PatchSet = [Change::attribute(".//x", "a", "1"), Change::attribute(".//x", "a", "2")]
            .into_iter()
            .collect();
        let patched = set.apply(&doc()).expect("apply");
        assert_eq!(patched.select(".//x").expect("select")[0].attr("a"), Some("2"));
    }

    #[test]
    fn ambiguous_attribute_target_is_rejected() {
        let set: PatchSet = [Change::attribute(".//box", "id", "1")].into_iter().collect();
        let err = set.apply(&doc()).expect_err("ambiguous");
        assert_eq!(err.code(), codes::AMBIGUOUS_PATH);
        assert_eq!(err.info().context.get("matches").map(String::as_str), Some("2"));
        assert_eq!(err.info().context.get("change_index").map(String::as_str), Some("0"));
    }

    #[test]
    fn missing_add_parent_is_rejected() {
        let set: PatchSet = [Change::add(".//loop", "functions", [("label", "f")])]
            .into_iter()
            .collect();
        let err = set.apply(&doc()).expect_err("missing");
        assert_eq!(err.code(), codes::PATH_NOT_FOUND);
    }

    #[test]
    fn removal_tolerates_absent_targets() {
        let set: PatchSet = [
            Change::remove(".//visualization", "qt-opengl"),
            Change::remove(".", "visualization"),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.apply(&doc()).expect("apply"), doc());
    }

    #[test]
    fn removal_takes_first_matching_child() {
        let set: PatchSet = [Change::remove("./arena", "box")].into_iter().collect();
        let patched = set.apply(&doc()).expect("apply");
        assert_eq!(patched.select(".//box").expect("select").len(), 1);
    }

    #[test]
    fn later_changes_see_elements_added_earlier() {
        let set: PatchSet = [
            Change::add(".", "loop", Vec::<(String, String)>::new()),
            Change::attribute("./loop", "library", "libloop.so"),
        ]
        .into_iter()
        .collect();
        let patched = set.apply(&doc()).expect("apply");
        assert_eq!(
            patched.select("./loop").expect("select")[0].attr("library"),
            Some("libloop.so")
        );
    }
}
