//! GraphViz rendering of a fleet tree.
//!
//! Produces `.dot` text: buckets as plain nodes, leaves as boxes hanging
//! off their bucket with dotted edges. A selection sub-tree can be
//! highlighted by bolding the edges it contains. Writing the output to a
//! file is the caller's business.

use std::collections::HashSet;
use std::fmt::Write;

use crate::bucket::Bucket;

impl Bucket {
    /// Render the tree as GraphViz DOT text.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph fleetmap {\n");
        self.write_dot(&mut out, &HashSet::new());
        out.push_str("}\n");
        out
    }

    /// Render the tree with the edges of `selection` drawn bold and red.
    ///
    /// `selection` is expected to be a query result over this tree, i.e. a
    /// sub-tree of it.
    #[must_use]
    pub fn to_dot_with_selection(&self, selection: &Bucket) -> String {
        let mut highlighted = HashSet::new();
        selection.collect_edges(&mut highlighted);

        let mut out = String::from("digraph fleetmap {\n");
        self.write_dot(&mut out, &highlighted);
        out.push_str("}\n");
        out
    }

    fn write_dot(&self, out: &mut String, highlighted: &HashSet<(String, String)>) {
        let name = self.name();
        let _ = writeln!(out, "  {:?};", name);

        if self.children.is_empty() {
            for n in &self.nodes {
                let _ = writeln!(out, "  {:?} [shape=box];", n.id.to_string());
                let edge = (name.clone(), n.id.to_string());
                let style = if highlighted.contains(&edge) {
                    "[style=\"dotted,bold\" color=red]"
                } else {
                    "[style=dotted]"
                };
                let _ = writeln!(out, "  {:?} -> {:?} {};", name, n.id.to_string(), style);
            }
            return;
        }

        for c in &self.children {
            c.write_dot(out, highlighted);
            let edge = (name.clone(), c.name());
            if highlighted.contains(&edge) {
                let _ = writeln!(out, "  {:?} -> {:?} [style=bold color=red];", name, c.name());
            } else {
                let _ = writeln!(out, "  {:?} -> {:?};", name, c.name());
            }
        }
    }

    /// Collect every parent-to-child and bucket-to-leaf edge of this tree.
    fn collect_edges(&self, edges: &mut HashSet<(String, String)>) {
        let name = self.name();
        if self.children.is_empty() {
            for n in &self.nodes {
                edges.insert((name.clone(), n.id.to_string()));
            }
            return;
        }
        for c in &self.children {
            edges.insert((name.clone(), c.name()));
            c.collect_edges(edges);
        }
    }
}
