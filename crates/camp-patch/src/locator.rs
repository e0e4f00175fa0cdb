//! XPath-like structural locators.
//!
//! Supported syntax: `.` (context root), `./a/b` and `a/b` (child steps),
//! `.//a` and `a//b` (descendant steps), `/root/a` (absolute, the first step
//! must name the root), `//a` (any element in the document), `*` (any tag),
//! and predicates `[@attr]`, `[@attr='v']`, `[n]` (1-based position among the
//! element's siblings matched by the step).

use std::fmt;

use camp_core::{CampError, ErrorInfo};
use serde::{Deserialize, Serialize};

use crate::codes;
use crate::document::Element;

/// Address of an element as child indices from the root.
///
/// Lexicographic order of node paths equals document (pre-order) order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    /// The root element.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Child indices from the root.
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Path of the `idx`-th child of this node.
    pub fn child(&self, idx: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(idx);
        Self(indices)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Anchor {
    Context,
    Root,
    Anywhere,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    SelfNode,
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeTest {
    Name(String),
    Any,
}

impl NodeTest {
    fn matches(&self, element: &Element) -> bool {
        match self {
            NodeTest::Name(name) => element.tag == *name,
            NodeTest::Any => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    HasAttr(String),
    AttrEq(String, String),
    Position(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

/// A parsed structural locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    source: String,
    anchor: Anchor,
    steps: Vec<Step>,
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn syntax_error(source: &str, token: &str, message: &str) -> CampError {
    CampError::Patch(
        ErrorInfo::new(codes::LOCATOR_SYNTAX, message)
            .with_context("locator", source)
            .with_context("token", token),
    )
}

impl Locator {
    /// Parses a locator expression.
    pub fn parse(source: &str) -> Result<Self, CampError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(syntax_error(source, "", "empty locator"));
        }
        let (anchor, rest) = if let Some(rest) = trimmed.strip_prefix("//") {
            (Anchor::Anywhere, rest)
        } else if let Some(rest) = trimmed.strip_prefix('/') {
            (Anchor::Root, rest)
        } else {
            (Anchor::Context, trimmed)
        };

        let segments = split_top_level(source, rest)?;
        let mut steps = Vec::with_capacity(segments.len());
        let mut descend = false;
        for (idx, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                if descend || idx == 0 || idx + 1 == segments.len() {
                    return Err(syntax_error(source, "/", "unexpected path separator"));
                }
                descend = true;
                continue;
            }
            let mut step = parse_step(source, segment)?;
            if descend {
                if step.axis == Axis::SelfNode {
                    return Err(syntax_error(source, segment, "`.` cannot follow `//`"));
                }
                step.axis = Axis::Descendant;
                descend = false;
            }
            steps.push(step);
        }
        if anchor != Anchor::Context && steps.first().map(|s| s.axis) == Some(Axis::SelfNode) {
            return Err(syntax_error(source, ".", "`.` cannot follow a leading `/`"));
        }
        Ok(Self {
            source: trimmed.to_string(),
            anchor,
            steps,
        })
    }

    /// The locator text as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Resolves the locator against `root`, returning matches in document order.
    pub fn resolve(&self, root: &Element) -> Vec<NodePath> {
        let mut steps = self.steps.iter();
        let mut context: Vec<NodePath> = match self.anchor {
            Anchor::Context => vec![NodePath::root()],
            Anchor::Root => match steps.next() {
                Some(first) if root_matches(first, root) => vec![NodePath::root()],
                Some(_) => Vec::new(),
                None => vec![NodePath::root()],
            },
            Anchor::Anywhere => match steps.next() {
                Some(first) => {
                    let mut found = Vec::new();
                    if root_matches(first, root) {
                        found.push(NodePath::root());
                    }
                    let as_child = Step {
                        axis: Axis::Descendant,
                        ..first.clone()
                    };
                    found.extend(apply_step(&as_child, root, &[NodePath::root()]));
                    normalize(found)
                }
                None => vec![NodePath::root()],
            },
        };
        for step in steps {
            if context.is_empty() {
                break;
            }
            context = apply_step(step, root, &context);
        }
        context
    }
}

fn root_matches(step: &Step, root: &Element) -> bool {
    if !step.test.matches(root) {
        return false;
    }
    step.predicates.iter().all(|predicate| match predicate {
        Predicate::HasAttr(name) => root.attributes.contains_key(name),
        Predicate::AttrEq(name, value) => root.attr(name) == Some(value.as_str()),
        Predicate::Position(pos) => *pos == 1,
    })
}

fn lookup<'a>(root: &'a Element, path: &NodePath) -> Option<&'a Element> {
    let mut current = root;
    for &idx in path.indices() {
        current = current.children.get(idx)?;
    }
    Some(current)
}

fn descendants_or_self(root: &Element, start: &NodePath, out: &mut Vec<NodePath>) {
    out.push(start.clone());
    if let Some(element) = lookup(root, start) {
        for idx in 0..element.children.len() {
            descendants_or_self(root, &start.child(idx), out);
        }
    }
}

fn apply_step(step: &Step, root: &Element, context: &[NodePath]) -> Vec<NodePath> {
    let parents: Vec<NodePath> = match step.axis {
        Axis::SelfNode => {
            let kept = context
                .iter()
                .filter(|path| {
                    lookup(root, path)
                        .map(|el| filter_one(step, el))
                        .unwrap_or(false)
                })
                .cloned()
                .collect();
            return normalize(kept);
        }
        Axis::Child => context.to_vec(),
        Axis::Descendant => {
            let mut expanded = Vec::new();
            for path in context {
                descendants_or_self(root, path, &mut expanded);
            }
            normalize(expanded)
        }
    };
    let mut matched = Vec::new();
    for parent in &parents {
        let Some(element) = lookup(root, parent) else {
            continue;
        };
        let mut candidates: Vec<(NodePath, &Element)> = element
            .children
            .iter()
            .enumerate()
            .filter(|(_, child)| step.test.matches(child))
            .map(|(idx, child)| (parent.child(idx), child))
            .collect();
        for predicate in &step.predicates {
            candidates = match predicate {
                Predicate::HasAttr(name) => candidates
                    .into_iter()
                    .filter(|(_, el)| el.attributes.contains_key(name))
                    .collect(),
                Predicate::AttrEq(name, value) => candidates
                    .into_iter()
                    .filter(|(_, el)| el.attr(name) == Some(value.as_str()))
                    .collect(),
                Predicate::Position(pos) => candidates.into_iter().skip(pos - 1).take(1).collect(),
            };
        }
        matched.extend(candidates.into_iter().map(|(path, _)| path));
    }
    normalize(matched)
}

fn filter_one(step: &Step, element: &Element) -> bool {
    step.predicates.iter().all(|predicate| match predicate {
        Predicate::HasAttr(name) => element.attributes.contains_key(name),
        Predicate::AttrEq(name, value) => element.attr(name) == Some(value.as_str()),
        Predicate::Position(pos) => *pos == 1,
    })
}

fn normalize(mut paths: Vec<NodePath>) -> Vec<NodePath> {
    paths.sort();
    paths.dedup();
    paths
}

fn split_top_level<'a>(source: &str, rest: &'a str) -> Result<Vec<&'a str>, CampError> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0usize;
    for (idx, ch) in rest.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'') | (None, '"') => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => {
                if depth == 0 {
                    return Err(syntax_error(source, "]", "unbalanced `]`"));
                }
                depth -= 1;
            }
            (None, '/') if depth == 0 => {
                segments.push(&rest[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if quote.is_some() {
        return Err(syntax_error(source, rest, "unterminated quote"));
    }
    if depth != 0 {
        return Err(syntax_error(source, "[", "unbalanced `[`"));
    }
    segments.push(&rest[start..]);
    Ok(segments)
}

fn parse_step(source: &str, segment: &str) -> Result<Step, CampError> {
    let name_end = segment.find('[').unwrap_or(segment.len());
    let name = &segment[..name_end];
    let (axis, test) = match name {
        "." => (Axis::SelfNode, NodeTest::Any),
        ".." => return Err(syntax_error(source, name, "parent steps are not supported")),
        "*" => (Axis::Child, NodeTest::Any),
        "" => return Err(syntax_error(source, segment, "missing element name")),
        other => {
            if !other
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
            {
                return Err(syntax_error(source, other, "invalid element name"));
            }
            (Axis::Child, NodeTest::Name(other.to_string()))
        }
    };
    let mut predicates = Vec::new();
    let mut rest = &segment[name_end..];
    while !rest.is_empty() {
        let Some(body_and_tail) = rest.strip_prefix('[') else {
            return Err(syntax_error(source, rest, "unexpected characters after step"));
        };
        let close = find_closing(body_and_tail)
            .ok_or_else(|| syntax_error(source, rest, "unterminated predicate"))?;
        let body = body_and_tail[..close].trim();
        predicates.push(parse_predicate(source, body)?);
        rest = &body_and_tail[close + 1..];
    }
    Ok(Step {
        axis,
        test,
        predicates,
    })
}

fn find_closing(text: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (idx, ch) in text.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'') | (None, '"') => quote = Some(ch),
            (None, ']') => return Some(idx),
            _ => {}
        }
    }
    None
}

fn parse_predicate(source: &str, body: &str) -> Result<Predicate, CampError> {
    if let Some(attr) = body.strip_prefix('@') {
        return match attr.split_once('=') {
            None => {
                let name = attr.trim();
                if name.is_empty() {
                    return Err(syntax_error(source, body, "missing attribute name"));
                }
                Ok(Predicate::HasAttr(name.to_string()))
            }
            Some((name, value)) => {
                let name = name.trim();
                let value = value.trim();
                let unquoted = value
                    .strip_prefix('\'')
                    .and_then(|v| v.strip_suffix('\''))
                    .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')))
                    .ok_or_else(|| syntax_error(source, value, "attribute value must be quoted"))?;
                if name.is_empty() {
                    return Err(syntax_error(source, body, "missing attribute name"));
                }
                Ok(Predicate::AttrEq(name.to_string(), unquoted.to_string()))
            }
        };
    }
    match body.parse::<usize>() {
        Ok(0) => Err(syntax_error(source, body, "positions are 1-based")),
        Ok(pos) => Ok(Predicate::Position(pos)),
        Err(_) => Err(syntax_error(source, body, "unsupported predicate")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Element {
        Element::new("config")
            .with_child(
                Element::new("arena")
                    .with_child(Element::new("box").with_attr("id", "a"))
                    .with_child(Element::new("box").with_attr("id", "b"))
                    .with_child(Element::new("distribute").with_child(Element::new("entity"))),
            )
            .with_child(Element::new("controllers").with_child(Element::new("params")))
    }

    fn resolve(locator: &str) -> Vec<NodePath> {
        Locator::parse(locator).expect("parse").resolve(&sample())
    }

    #[test]
    fn context_root() {
        assert_eq!(resolve("."), vec![NodePath::root()]);
    }

    #[test]
    fn descendant_and_child_steps() {
        assert_eq!(resolve(".//box").len(), 2);
        assert_eq!(resolve("./arena/box").len(), 2);
        assert_eq!(resolve("arena/distribute/entity"), vec![NodePath(vec![0, 2, 0])]);
        assert_eq!(resolve(".//params"), vec![NodePath(vec![1, 0])]);
    }

    #[test]
    fn predicates_filter_matches() {
        assert_eq!(resolve(".//box[@id='b']"), vec![NodePath(vec![0, 1])]);
        assert_eq!(resolve(".//box[2]"), vec![NodePath(vec![0, 1])]);
        assert_eq!(resolve(".//box[@id]").len(), 2);
        assert!(resolve(".//box[@id=\"z\"]").is_empty());
    }

    #[test]
    fn absolute_paths_anchor_at_root() {
        assert_eq!(resolve("/config/arena"), vec![NodePath(vec![0])]);
        assert!(resolve("/other/arena").is_empty());
        assert_eq!(resolve("//config"), vec![NodePath::root()]);
        assert_eq!(resolve("//entity"), vec![NodePath(vec![0, 2, 0])]);
    }

    #[test]
    fn wildcard_matches_any_tag() {
        assert_eq!(resolve("./*").len(), 2);
        assert_eq!(resolve("./arena/*").len(), 3);
    }

    #[test]
    fn malformed_locators_name_the_token() {
        for (bad, token) in [
            ("", ""),
            ("./a//", "/"),
            ("a///b", "/"),
            (".//box[@id=b]", "b"),
            (".//box[0]", "0"),
            ("../a", ".."),
            (".//box[@id='b'", "["),
            ("a/b c", "b c"),
        ] {
            let err = Locator::parse(bad).expect_err(bad);
            assert_eq!(err.code(), codes::LOCATOR_SYNTAX, "{bad}");
            assert_eq!(
                err.info().context.get("token").map(String::as_str),
                Some(token),
                "{bad}"
            );
        }
    }
}
