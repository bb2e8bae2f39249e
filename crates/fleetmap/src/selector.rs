//! The placement query path: filtering, pruning and selection.
//!
//! A query runs in three stages. First the admissible leaf set is computed
//! from the group's filters and exclude list. Then
//! [`Bucket::get_max_selection`] prunes every sub-tree that cannot possibly
//! supply enough matching descendants, acting as a feasibility oracle.
//! Finally [`Bucket::get_selection`] walks the pruned tree top-down, ranking
//! candidates at each level by rendezvous hash of the caller's pivot and
//! keeping the first `count` whose recursive selection succeeds.
//!
//! Queries never mutate the input tree; results are freshly allocated, so
//! concurrent queries over a shared snapshot are safe.

use std::collections::HashSet;

use crate::bucket::Bucket;
use crate::filter::Filter;
use crate::hash;
use crate::node::NodeSet;
use crate::rule::{SFGroup, Select, NODES_BUCKET};

impl Bucket {
    /// Select the sub-graph satisfying a placement rule.
    ///
    /// Per-group results are merged into one tree; if any group cannot be
    /// satisfied the whole rule fails with `None`.
    #[must_use]
    pub fn find_graph(&self, pivot: &[u8], groups: &[SFGroup]) -> Option<Bucket> {
        let mut out = self.tag();
        for g in groups {
            out.merge(self.find_group(pivot, g)?);
        }
        Some(out)
    }

    /// Select the node set satisfying a placement rule.
    ///
    /// Unlike [`Bucket::find_graph`], groups that cannot be satisfied
    /// contribute nothing instead of failing the whole rule.
    #[must_use]
    pub fn find_nodes(&self, pivot: &[u8], groups: &[SFGroup]) -> NodeSet {
        let mut out = NodeSet::new();
        for g in groups {
            if let Some(b) = self.find_group(pivot, g) {
                out = out.merge(&b.nodelist());
            }
        }
        out
    }

    fn find_group(&self, pivot: &[u8], group: &SFGroup) -> Option<Bucket> {
        self.get_max_selection(group)?.get_selection(&group.selectors, pivot)
    }

    /// Compute the maximal sub-tree that could satisfy `group`: the
    /// admissible leaves under the group's filters minus its excludes,
    /// pruned of every sub-tree that cannot supply the selector counts.
    ///
    /// `None` means the rule is unsatisfiable under this fleet snapshot.
    #[must_use]
    pub fn get_max_selection(&self, group: &SFGroup) -> Option<Bucket> {
        let allowed = self.find_allowed(&group.filters);
        let excluded: HashSet<u32> = group.exclude.iter().copied().collect();
        let keep = move |nodes: &NodeSet| nodes.intersect(&allowed).diff(&excluded);
        self.max_selection(&group.selectors, &keep, true).map(|(b, _)| b)
    }

    /// The leaves admissible under all filters: per filter, the union of
    /// cached leaf sets of every sub-tree whose tag satisfies it; the
    /// per-filter unions intersect with each other and with this bucket's
    /// own leaf set.
    fn find_allowed(&self, filters: &[Filter]) -> NodeSet {
        let mut allowed = self.nodes.clone();
        for f in filters {
            let mut per_filter = NodeSet::new();
            self.collect_allowed(f, &mut per_filter);
            allowed = allowed.intersect(&per_filter);
        }
        allowed
    }

    fn collect_allowed(&self, f: &Filter, acc: &mut NodeSet) {
        if f.check(self) {
            *acc = acc.merge(&self.nodes);
        }
        for c in &self.children {
            c.collect_allowed(f, acc);
        }
    }

    /// Keep only the leaves accepted by `keep`, dropping sub-trees that end
    /// up empty. Returns `None` when nothing survives.
    fn filter_subtree(&self, keep: &impl Fn(&NodeSet) -> NodeSet) -> Option<Bucket> {
        let mut root = self.tag();
        if self.children.is_empty() {
            root.nodes = keep(&self.nodes);
            return (!root.nodes.is_empty()).then_some(root);
        }
        for c in &self.children {
            if let Some(r) = c.filter_subtree(keep) {
                root.nodes = root.nodes.merge(&r.nodes);
                root.children.push(r);
            }
        }
        (!root.nodes.is_empty()).then_some(root)
    }

    /// The recursive pruning walk. `cut` is true when this bucket was
    /// reached through a selector-consuming edge, in which case it must
    /// satisfy the head selector's count on its own; otherwise any non-zero
    /// count bubbles up to the consuming ancestor.
    fn max_selection(
        &self,
        selectors: &[Select],
        keep: &impl Fn(&NodeSet) -> NodeSet,
        cut: bool,
    ) -> Option<(Bucket, u32)> {
        let leaf_level = match selectors.first() {
            None => true,
            Some(s) => s.key == NODES_BUCKET,
        };
        if leaf_level {
            let sub = self.filter_subtree(keep)?;
            let count = sub.nodes.len() as u32;
            return match selectors.first() {
                Some(s) if s.count > count => None,
                _ => Some((sub, count)),
            };
        }

        let head = &selectors[0];
        let mut root = self.tag();
        let mut count = 0u32;
        for c in &self.children {
            let consumes = c.key == head.key;
            let sel = if consumes { &selectors[1..] } else { selectors };
            if let Some((r, n)) = c.max_selection(sel, keep, consumes) {
                root.nodes = root.nodes.merge(&r.nodelist());
                root.children.push(r);
                // A consuming child counts as one unit regardless of how
                // many leaves it carries.
                count += if consumes { 1 } else { n };
            }
        }

        if (!cut && count != 0) || count >= head.count {
            Some((root, count))
        } else {
            None
        }
    }

    /// Deterministically pick a sub-graph satisfying `selectors`, assuming
    /// all filtering already happened (typically on the result of
    /// [`Bucket::get_max_selection`]).
    ///
    /// At each level the candidates are ranked by rendezvous hash of the
    /// pivot, weighted when any candidate carries a non-zero weight; with
    /// an empty pivot candidates keep their tree order. A node-level
    /// selection returns its leaves in rank order.
    ///
    /// `None` means fewer than `count` candidates succeeded at some level,
    /// not that the request was malformed.
    #[must_use]
    pub fn get_selection(&self, selectors: &[Select], pivot: &[u8]) -> Option<Bucket> {
        let pivot_hash = (!pivot.is_empty()).then(|| hash::hash_bytes(pivot));
        self.selection(selectors, pivot_hash)
    }

    fn selection(&self, selectors: &[Select], pivot_hash: Option<u64>) -> Option<Bucket> {
        let mut root = self.tag();

        let Some(head) = selectors.first() else {
            root.nodes = self.nodes.clone();
            root.children = self.children.clone();
            return Some(root);
        };

        let count = head.count as usize;
        if head.key == NODES_BUCKET {
            if self.nodes.len() < count {
                return None;
            }
            let mut nodes = self.nodes.clone();
            if let Some(h) = pivot_hash {
                hash::rank_nodes(nodes.as_mut_slice(), h);
            }
            nodes.truncate(count);
            root.nodes = nodes;
            return Some(root);
        }

        let mut candidates = self.children_by_key(head);
        if let Some(h) = pivot_hash {
            hash::rank_buckets(&mut candidates, h);
        }

        let mut picked = 0;
        for c in &candidates {
            if let Some(r) = c.selection(&selectors[1..], pivot_hash) {
                // Wrap the accepted sub-tree back along the ancestor chain
                // separating it from this bucket.
                if let Some(wrapped) = self.combine(&r) {
                    root.merge(wrapped);
                    picked += 1;
                    if picked == count {
                        return Some(root);
                    }
                }
            }
        }
        None
    }

    /// Candidate children for a selector: direct children with a matching
    /// key, plus matching buckets found by drilling through children whose
    /// key does not match, flattened into one layer.
    fn children_by_key(&self, selector: &Select) -> Vec<Bucket> {
        let mut out = Vec::new();
        for c in &self.children {
            if c.key == selector.key {
                out.push(c.clone());
            } else {
                out.extend(c.children_by_key(selector));
            }
        }
        out
    }

    /// Rebuild the ancestor chain from this bucket down to the bucket whose
    /// tag matches `target`, carrying only the selected leaves.
    fn combine(&self, target: &Bucket) -> Option<Bucket> {
        if self.same_tag(target) {
            return Some(target.clone());
        }
        for c in &self.children {
            if let Some(r) = c.combine(target) {
                let mut wrapped = self.tag();
                wrapped.nodes = r.nodes.clone();
                wrapped.children = vec![r];
                return Some(wrapped);
            }
        }
        None
    }
}
