//! Hierarchical template documents and the structured patch model used to
//! materialize experiment variants.
//!
//! A [`PatchSet`] is an ordered list of [`Change`]s. Changes are applied in
//! list order, so a later change may target an element created by an earlier
//! one. [`Change::AttributeChange`] is idempotent under reapplication;
//! [`Change::ElementAdd`] is not, and reapplying it duplicates the element.
//! Callers that reapply definitions must track what has already been applied.

mod change;
mod document;
mod locator;

pub use change::{apply, Change, PatchSet};
pub use document::{Document, Element};
pub use locator::{Locator, NodePath};

/// Stable error codes raised by this crate.
pub mod codes {
    /// A locator matched more than one element where exactly one was required.
    pub const AMBIGUOUS_PATH: &str = "patch.ambiguous_path";
    /// A locator matched no element where one was required.
    pub const PATH_NOT_FOUND: &str = "patch.path_not_found";
    /// A locator could not be parsed.
    pub const LOCATOR_SYNTAX: &str = "patch.locator_syntax";
}
