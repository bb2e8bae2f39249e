//! Placement rules.
//!
//! A rule is a sequence of [`SFGroup`]s. Each group carries the selectors
//! that walk the hierarchy level by level, the filters that restrict which
//! attribute values are admissible, and an explicit exclude list of node
//! ids. Per-group results are merged by sorted union.

use serde::{Deserialize, Serialize};

use crate::filter::Filter;

/// Separator between `key:value` pairs in a bucket option string.
pub const SEPARATOR: &str = "/";

/// Reserved selector key that enumerates leaves instead of matching
/// children by attribute.
pub const NODES_BUCKET: &str = "Node";

/// One level of a selection: pick `count` children whose tag key matches
/// `key`, or `count` leaves when `key` is [`NODES_BUCKET`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Select {
    /// Attribute key to match, or the [`NODES_BUCKET`] sentinel.
    pub key: String,
    /// How many children (or leaves) to pick.
    pub count: u32,
}

impl Select {
    /// Create a selector.
    #[must_use]
    pub fn new(key: impl Into<String>, count: u32) -> Self {
        Self { key: key.into(), count }
    }

    /// Create a leaf-level selector for `count` nodes.
    #[must_use]
    pub fn nodes(count: u32) -> Self {
        Self::new(NODES_BUCKET, count)
    }
}

/// A (selectors, filters, exclude) triple: one unit of a placement rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SFGroup {
    /// Level-by-level selection to apply.
    pub selectors: Vec<Select>,
    /// Attribute predicates restricting admissible sub-trees.
    pub filters: Vec<Filter>,
    /// Node ids that must not appear in the result.
    pub exclude: Vec<u32>,
}

impl SFGroup {
    /// Create a group with the given selectors and no filters or excludes.
    #[must_use]
    pub fn with_selectors(selectors: Vec<Select>) -> Self {
        Self { selectors, ..Self::default() }
    }
}
