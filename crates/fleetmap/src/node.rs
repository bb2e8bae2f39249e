//! Storage nodes and sorted node sets.
//!
//! A [`Node`] is a leaf of the fleet tree: an immutable id/capacity/price
//! triple plus a placement weight. A [`NodeSet`] is a sequence of nodes
//! sorted ascending by id with no duplicates; every set operation relies on
//! and preserves that ordering, which is what keeps them O(n+m).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A storage node: the leaf of the fleet hierarchy.
///
/// Identity is by `id`; two nodes with the same id in one fleet are the same
/// node. The `weight` is consumed by the weighted rendezvous ranker and is
/// typically produced by a weight function over capacity and price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node id within the fleet.
    pub id: u32,
    /// Storage capacity attribute.
    pub capacity: u64,
    /// Price attribute.
    pub price: u64,
    /// Placement weight; 0 means "unknown, rank unweighted".
    pub weight: u64,
}

impl Node {
    /// Create a node with the given id and zeroed attributes.
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self { id, ..Self::default() }
    }

    /// Set the capacity attribute.
    #[must_use]
    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the price attribute.
    #[must_use]
    pub fn with_price(mut self, price: u64) -> Self {
        self.price = price;
        self
    }

    /// Set the placement weight.
    #[must_use]
    pub fn with_weight(mut self, weight: u64) -> Self {
        self.weight = weight;
        self
    }
}

/// An ordered set of nodes, sorted ascending by id, duplicate-free.
///
/// The sort invariant holds for every set produced by this type's
/// constructors and set operations. The one deliberate exception is a
/// node-level selection result, whose leaves are left in rendezvous rank
/// order; merging such a result into a larger set re-establishes the
/// invariant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSet(Vec<Node>);

impl NodeSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build a set of bare nodes (zero attributes) from a list of ids.
    #[must_use]
    pub fn from_ids(ids: &[u32]) -> Self {
        ids.iter().map(|&id| Node::new(id)).collect()
    }

    /// Number of nodes in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the nodes in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.0.iter()
    }

    /// View the nodes as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Node] {
        &self.0
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Node] {
        &mut self.0
    }

    /// Returns true if a node with the given id is in the set.
    #[must_use]
    pub fn contains(&self, id: u32) -> bool {
        self.0.binary_search_by_key(&id, |n| n.id).is_ok()
    }

    /// The ids of all nodes, in set order.
    #[must_use]
    pub fn ids(&self) -> Vec<u32> {
        self.0.iter().map(|n| n.id).collect()
    }

    /// Keep only the first `len` nodes.
    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    /// Append a node, trusting the caller to keep ids ascending.
    ///
    /// Used by the decoders, which read nodes back in stored order.
    pub(crate) fn push(&mut self, node: Node) {
        self.0.push(node);
    }

    /// Sorted union of two sets. On duplicate ids the node from `self` wins.
    #[must_use]
    pub fn merge(&self, other: &NodeSet) -> NodeSet {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }

        let (a, b) = (&self.0, &other.0);
        let mut out = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].id.cmp(&b[j].id) {
                std::cmp::Ordering::Less => {
                    out.push(a[i]);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    out.push(b[j]);
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    out.push(a[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&a[i..]);
        out.extend_from_slice(&b[j..]);
        NodeSet(out)
    }

    /// Nodes present in both sets, taken from `self`.
    #[must_use]
    pub fn intersect(&self, other: &NodeSet) -> NodeSet {
        let (a, b) = (&self.0, &other.0);
        let mut out = Vec::with_capacity(a.len().min(b.len()));
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].id.cmp(&b[j].id) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    out.push(a[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        NodeSet(out)
    }

    /// Nodes of `self` whose id is not in `excluded`.
    #[must_use]
    pub fn diff(&self, excluded: &HashSet<u32>) -> NodeSet {
        NodeSet(self.0.iter().filter(|n| !excluded.contains(&n.id)).copied().collect())
    }
}

impl From<Vec<Node>> for NodeSet {
    /// Sort by id and drop duplicate ids, keeping the first occurrence.
    fn from(mut nodes: Vec<Node>) -> Self {
        nodes.sort_by_key(|n| n.id);
        nodes.dedup_by_key(|n| n.id);
        NodeSet(nodes)
    }
}

impl FromIterator<Node> for NodeSet {
    fn from_iter<T: IntoIterator<Item = Node>>(iter: T) -> Self {
        NodeSet::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<'a> IntoIterator for &'a NodeSet {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
