//! The hierarchical fleet map.
//!
//! A [`Bucket`] is a labeled internal node of the fleet tree. Its
//! `(key, value)` tag identifies it among its siblings (for example
//! `Location:Europe`), its children are ordered, and it caches the sorted
//! union of every leaf node reachable through it. The cache is an invariant
//! target: every mutation re-establishes it, and [`Bucket::fill_nodes`] is
//! the canonical recompute.
//!
//! Construction is incremental: [`Bucket::add_bucket`] parses a
//! `/k1:v1/k2:v2` option string, descends into matching children or creates
//! them, and attaches the nodes along every visited ancestor. Once a bucket
//! is handed to a query it is treated as read-only; queries allocate fresh
//! buckets for their results and never alias the input tree.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{FleetmapError, Result};
use crate::node::{Node, NodeSet};
use crate::rule::SEPARATOR;

/// A labeled node of the fleet tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    /// Attribute key, e.g. `Location`.
    pub key: String,
    /// Attribute value, e.g. `Europe`.
    pub value: String,
    /// Aggregated weight of the sub-tree; 0 means "unknown, rank unweighted".
    pub(crate) weight: f64,
    /// Cached sorted union of all leaves reachable through this sub-tree.
    pub(crate) nodes: NodeSet,
    /// Ordered children. Insertion order breaks ties only when no pivot is
    /// supplied; otherwise the rendezvous ranking reorders candidates.
    pub(crate) children: Vec<Bucket>,
}

impl Bucket {
    /// Create an empty bucket with the given tag.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into(), ..Self::default() }
    }

    /// The bucket's short identifier, `key:value`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}:{}", self.key, self.value)
    }

    /// Returns true if both buckets carry the same tag. Contained nodes and
    /// children are not compared.
    #[must_use]
    pub fn same_tag(&self, other: &Bucket) -> bool {
        self.key == other.key && self.value == other.value
    }

    /// The aggregated weight of this sub-tree.
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// The cached leaf set of this sub-tree.
    #[must_use]
    pub fn nodelist(&self) -> NodeSet {
        if !self.nodes.is_empty() || self.children.is_empty() {
            return self.nodes.clone();
        }
        let mut r = NodeSet::new();
        for c in &self.children {
            r = r.merge(&c.nodelist());
        }
        r
    }

    /// The direct children of this bucket.
    #[must_use]
    pub fn children(&self) -> &[Bucket] {
        &self.children
    }

    /// A bucket with this bucket's tag and weight but no contents. Query
    /// results are grown from these.
    pub(crate) fn tag(&self) -> Bucket {
        Bucket {
            key: self.key.clone(),
            value: self.value.clone(),
            weight: self.weight,
            ..Self::default()
        }
    }

    /// Add the bucket chain described by `path` with `nodes` attached.
    ///
    /// The path must start with `/` and not end with one; a lone `/` means
    /// the root itself. Nodes are merged into every bucket along the chain.
    pub fn add_bucket(&mut self, path: &str, nodes: NodeSet) -> Result<()> {
        let props = parse_path(path)?;
        self.add_nodes(&props, &nodes);
        Ok(())
    }

    /// Add a single node under each of the given option paths.
    pub fn add_node(&mut self, node: Node, paths: &[&str]) -> Result<()> {
        let single = NodeSet::from(vec![node]);
        for path in paths {
            let props = parse_path(path)?;
            self.add_nodes(&props, &single);
        }
        Ok(())
    }

    /// Attach `child` directly, merging its leaves into the cache.
    pub fn add_child(&mut self, child: Bucket) {
        self.nodes = self.nodes.merge(&child.nodes);
        self.children.push(child);
    }

    fn add_nodes(&mut self, props: &[(String, String)], nodes: &NodeSet) {
        self.nodes = self.nodes.merge(nodes);
        let Some((first, rest)) = props.split_first() else {
            return;
        };
        for c in &mut self.children {
            if c.key == first.0 && c.value == first.1 {
                return c.add_nodes(rest, nodes);
            }
        }
        self.children.push(make_chain(first, rest, nodes));
    }

    /// Checks that the tree is well-formed:
    /// - every child is itself valid
    /// - children only contain leaves their parent also contains
    /// - no two children share a node id
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.children.iter().all(Bucket::is_valid) && self.level_valid()
    }

    /// [`Bucket::is_valid`] as a `Result`, naming the offending sub-tree.
    pub fn validate(&self) -> Result<()> {
        for c in &self.children {
            c.validate()?;
        }
        if self.level_valid() {
            Ok(())
        } else {
            Err(FleetmapError::InvariantViolated {
                key: self.key.clone(),
                value: self.value.clone(),
            })
        }
    }

    /// The invariant check for this level alone: children's leaves must all
    /// appear in the parent's cache, and no id may appear in two children.
    fn level_valid(&self) -> bool {
        if self.children.is_empty() {
            return true;
        }

        let mut combined: Vec<Node> =
            self.children.iter().flat_map(|c| c.nodes.iter().copied()).collect();
        combined.sort_by_key(|n| n.id);

        // Count how many of the children's entries (duplicates included)
        // line up against the parent's set; a duplicate id or a leaf
        // missing from the parent both make the count fall short.
        let parent = self.nodes.as_slice();
        let (mut i, mut j, mut matched) = (0, 0, 0usize);
        while i < combined.len() && j < parent.len() {
            match combined[i].id.cmp(&parent[j].id) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    matched += 1;
                    i += 1;
                    j += 1;
                }
            }
        }
        matched == combined.len()
    }

    /// Checks whether `other` can be merged into `self` without conflict.
    ///
    /// A conflict is a node that carries different values for the same
    /// attribute in the two trees.
    #[must_use]
    pub fn check_conflicts(&self, other: &Bucket) -> bool {
        for n in other.nodes.iter() {
            if !self.nodes.contains(n.id) {
                continue;
            }
            for c in &self.children {
                if !c.nodes.contains(n.id) {
                    continue;
                }
                let mut checked = false;
                for c1 in &other.children {
                    if c1.nodes.contains(n.id) && !c.same_tag(c1) {
                        return true;
                    }
                    if c.same_tag(c1) && !checked && c.check_conflicts(c1) {
                        return true;
                    }
                    checked = true;
                }
            }
        }
        false
    }

    /// Merge `other` into `self`, assuming no conflicts.
    ///
    /// Children with matching tags merge recursively; new tags append in
    /// `other`'s order.
    pub fn merge(&mut self, other: Bucket) {
        self.nodes = self.nodes.merge(&other.nodes);
        for c1 in other.children {
            match self.children.iter_mut().find(|c| c.same_tag(&c1)) {
                Some(c) => c.merge(c1),
                None => self.children.push(c1),
            }
        }
    }

    /// Recompute the cached leaf set of every bucket from the leaves up.
    pub fn fill_nodes(&mut self) {
        let mut r = std::mem::take(&mut self.nodes);
        for c in &mut self.children {
            c.fill_nodes();
            r = r.merge(&c.nodelist());
        }
        self.nodes = r;
    }

    /// Rebuild the tree with node ids mapped through `tr`. Ids absent from
    /// the table are kept; sets are re-sorted under the new ids.
    #[must_use]
    pub fn update_indices(&self, tr: &HashMap<u32, u32>) -> Bucket {
        let children = self.children.iter().map(|c| c.update_indices(tr)).collect();
        let nodes: Vec<Node> = self
            .nodes
            .iter()
            .map(|n| Node { id: *tr.get(&n.id).unwrap_or(&n.id), ..*n })
            .collect();
        Bucket {
            key: self.key.clone(),
            value: self.value.clone(),
            weight: self.weight,
            nodes: NodeSet::from(nodes),
            children,
        }
    }

    /// The nodes found under all of the given option paths, intersected.
    pub fn get_nodes_by_option(&self, options: &[&str]) -> Result<NodeSet> {
        let mut nodes: Option<NodeSet> = None;
        for opt in options {
            let props = parse_path(opt)?;
            let found = self.nodes_under(&props);
            nodes = Some(match nodes {
                None => found,
                Some(prev) => prev.intersect(&found),
            });
        }
        Ok(nodes.unwrap_or_default())
    }

    fn nodes_under(&self, props: &[(String, String)]) -> NodeSet {
        let Some((first, rest)) = props.split_first() else {
            return self.nodelist();
        };
        for c in &self.children {
            if c.key == first.0 && c.value == first.1 {
                return c.nodes_under(rest);
            }
        }
        NodeSet::new()
    }
}

/// Build a nested chain of buckets, attaching `nodes` at every level.
fn make_chain(first: &(String, String), rest: &[(String, String)], nodes: &NodeSet) -> Bucket {
    let mut b = Bucket::new(first.0.clone(), first.1.clone());
    b.nodes = nodes.clone();
    if let Some((next, tail)) = rest.split_first() {
        b.children = vec![make_chain(next, tail, nodes)];
    }
    b
}

/// Parse a `/k1:v1/k2:v2` option string into its (key, value) pairs.
///
/// A lone `/` parses to the empty chain (the root). Each segment splits on
/// its first `:`, so values may contain further colons but keys may not.
pub(crate) fn parse_path(path: &str) -> Result<Vec<(String, String)>> {
    if path == SEPARATOR {
        return Ok(Vec::new());
    }
    if !path.starts_with(SEPARATOR) {
        return Err(FleetmapError::PathFormat {
            path: path.to_owned(),
            reason: "must start with '/'",
        });
    }
    if path.ends_with(SEPARATOR) {
        return Err(FleetmapError::PathFormat {
            path: path.to_owned(),
            reason: "must not end with '/'",
        });
    }

    path[1..]
        .split(SEPARATOR)
        .map(|segment| {
            segment.split_once(':').map(|(k, v)| (k.to_owned(), v.to_owned())).ok_or_else(|| {
                FleetmapError::PathFormat {
                    path: path.to_owned(),
                    reason: "each segment must be key:value",
                }
            })
        })
        .collect()
}
