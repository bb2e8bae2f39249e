//! Attribute filters.
//!
//! A [`SimpleFilter`] is a predicate over attribute values with boolean
//! composition; a [`Filter`] binds one to an attribute key. Numeric
//! comparisons parse both sides as signed 64-bit decimal and fall through
//! to `true` when the tested value does not parse, so range filters can
//! coexist with non-numeric values elsewhere in the tree.

use serde::{Deserialize, Serialize};

use crate::bucket::Bucket;

/// A predicate over a single attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimpleFilter {
    /// Always true.
    Np,
    /// Value equals the literal.
    Eq(String),
    /// Value differs from the literal.
    Ne(String),
    /// Value parses below the literal.
    Lt(i64),
    /// Value parses at or below the literal.
    Le(i64),
    /// Value parses above the literal.
    Gt(i64),
    /// Value parses at or above the literal.
    Ge(i64),
    /// Conjunction; an empty list is true.
    And(Vec<SimpleFilter>),
    /// Disjunction; an empty list is true.
    Or(Vec<SimpleFilter>),
}

impl SimpleFilter {
    /// Predicate accepting any value from the list: `OR [EQ v...]`.
    #[must_use]
    pub fn any_of<S: AsRef<str>>(values: &[S]) -> Self {
        Self::Or(values.iter().map(|v| Self::Eq(v.as_ref().to_owned())).collect())
    }

    /// Predicate rejecting every value from the list: `AND [NE v...]`.
    #[must_use]
    pub fn none_of<S: AsRef<str>>(values: &[S]) -> Self {
        Self::And(values.iter().map(|v| Self::Ne(v.as_ref().to_owned())).collect())
    }

    /// Evaluate the predicate against a value.
    ///
    /// All branches of `And`/`Or` have pure operands, so evaluation order
    /// is unobservable; short-circuiting is just an optimization here.
    #[must_use]
    pub fn check(&self, value: &str) -> bool {
        match self {
            Self::Np => true,
            Self::Eq(s) => value == s,
            Self::Ne(s) => value != s,
            Self::And(fs) => fs.iter().all(|f| f.check(value)),
            Self::Or(fs) => fs.is_empty() || fs.iter().any(|f| f.check(value)),
            Self::Lt(n) => value.parse::<i64>().map_or(true, |v| v < *n),
            Self::Le(n) => value.parse::<i64>().map_or(true, |v| v <= *n),
            Self::Gt(n) => value.parse::<i64>().map_or(true, |v| v > *n),
            Self::Ge(n) => value.parse::<i64>().map_or(true, |v| v >= *n),
        }
    }
}

/// A predicate bound to an attribute key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Attribute key this filter applies to.
    pub key: String,
    /// The predicate over the attribute value.
    pub predicate: SimpleFilter,
}

impl Filter {
    /// Create a filter.
    #[must_use]
    pub fn new(key: impl Into<String>, predicate: SimpleFilter) -> Self {
        Self { key: key.into(), predicate }
    }

    /// Returns true if `bucket` carries this filter's key and its value
    /// satisfies the predicate.
    #[must_use]
    pub fn check(&self, bucket: &Bucket) -> bool {
        self.key == bucket.key && self.predicate.check(&bucket.value)
    }
}
