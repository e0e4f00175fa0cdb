use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use camp_core::serde::read_structured;
use camp_core::CampError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::locator::{Locator, NodePath};

/// A single element in a hierarchical template document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Element tag name.
    pub tag: String,
    /// Attributes in insertion order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, String>,
    /// Optional text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Child elements in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Element>,
}

impl Element {
    /// Creates an empty element with the given tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: IndexMap::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Builder helper adding an attribute.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Builder helper appending a child element.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Returns the value of an attribute, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn render(&self, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        let _ = write!(out, "{indent}<{}", self.tag);
        for (name, value) in &self.attributes {
            let _ = write!(out, " {}=\"{}\"", name, escape(value));
        }
        if self.children.is_empty() && self.text.is_none() {
            out.push_str(" />\n");
            return;
        }
        out.push('>');
        if let Some(text) = &self.text {
            out.push_str(&escape(text));
        }
        if !self.children.is_empty() {
            out.push('\n');
            for child in &self.children {
                child.render(depth + 1, out);
            }
            out.push_str(&indent);
        }
        let _ = writeln!(out, "</{}>", self.tag);
    }
}

/// A hierarchical document with a single root element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Root element of the document.
    pub root: Element,
}

impl Document {
    /// Wraps a root element into a document.
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// Loads a template document from a YAML or JSON file.
    pub fn load(path: &Path) -> Result<Self, CampError> {
        read_structured(path)
    }

    /// Returns all elements matched by `locator`, in document order.
    pub fn select(&self, locator: &str) -> Result<Vec<&Element>, CampError> {
        let locator = Locator::parse(locator)?;
        Ok(locator
            .resolve(&self.root)
            .iter()
            .filter_map(|path| self.node(path))
            .collect())
    }

    /// Returns the element addressed by a resolved node path.
    pub fn node(&self, path: &NodePath) -> Option<&Element> {
        let mut current = &self.root;
        for &idx in path.indices() {
            current = current.children.get(idx)?;
        }
        Some(current)
    }

    /// Returns a mutable reference to the element addressed by a node path.
    pub fn node_mut(&mut self, path: &NodePath) -> Option<&mut Element> {
        let mut current = &mut self.root;
        for &idx in path.indices() {
            current = current.children.get_mut(idx)?;
        }
        Some(current)
    }

    /// Renders the document as XML text for consumption by external platforms.
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" ?>\n");
        self.root.render(0, &mut out);
        out
    }

    /// Writes the XML rendering to `path`.
    pub fn write_xml(&self, path: &Path) -> Result<(), CampError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| CampError::io("io.create_dir", parent, err))?;
        }
        fs::write(path, self.to_xml()).map_err(|err| CampError::io("io.write", path, err))
    }
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_nested_xml_with_escaping() {
        let doc = Document::new(
            Element::new("config")
                .with_child(Element::new("arena").with_attr("size", "10, 10, 1"))
                .with_child(Element::new("note").with_attr("msg", "a<b & \"c\"")),
        );
        let xml = doc.to_xml();
        assert!(xml.contains("<config>\n"));
        assert!(xml.contains("  <arena size=\"10, 10, 1\" />\n"));
        assert!(xml.contains("msg=\"a&lt;b &amp; &quot;c&quot;\""));
        assert!(xml.ends_with("</config>\n"));
    }

    #[test]
    fn text_content_stays_inline() {
        let mut leaf = Element::new("name");
        leaf.text = Some("foraging".into());
        let doc = Document::new(Element::new("root").with_child(leaf));
        assert!(doc.to_xml().contains("<name>foraging</name>"));
    }
}
