//! A fleet map with a declared attribute schema.
//!
//! [`Root`] wraps a bucket tree behind a fixed list of attribute names,
//! e.g. `[Location, Country, City]`. Nodes are added with exactly one
//! value per schema level, and lookups take a value-path prefix, so the
//! tree stays uniform by construction.

use serde::{Deserialize, Serialize};

use crate::bucket::Bucket;
use crate::error::{FleetmapError, Result};
use crate::node::{Node, NodeSet};

/// A bucket tree constrained by an attribute schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Root {
    schema: Vec<String>,
    bucket: Bucket,
}

impl Root {
    /// Create an empty map with the given schema.
    #[must_use]
    pub fn new(schema: Vec<String>) -> Self {
        Self { schema, bucket: Bucket::default() }
    }

    /// The declared schema.
    #[must_use]
    pub fn schema(&self) -> &[String] {
        &self.schema
    }

    /// The underlying bucket tree, for running placement queries.
    #[must_use]
    pub fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    /// Add a node with one attribute value per schema level.
    ///
    /// The number of values must match the schema exactly; otherwise the
    /// call is rejected and the tree is unchanged.
    pub fn add_node(&mut self, node: Node, values: &[&str]) -> Result<()> {
        if values.len() != self.schema.len() {
            return Err(FleetmapError::SchemaMismatch {
                expected: self.schema.len(),
                actual: values.len(),
            });
        }
        self.bucket.add_levels(&self.schema, values, node);
        Ok(())
    }

    /// The nodes under a value-path prefix; the whole fleet for an empty
    /// prefix. A prefix longer than the schema is rejected.
    pub fn get_nodes(&self, prefix: &[&str]) -> Result<NodeSet> {
        if prefix.len() > self.schema.len() {
            return Err(FleetmapError::SchemaMismatch {
                expected: self.schema.len(),
                actual: prefix.len(),
            });
        }
        Ok(self.bucket.nodes_by_values(prefix))
    }
}

impl Bucket {
    fn add_levels(&mut self, schema: &[String], values: &[&str], node: Node) {
        self.nodes = self.nodes.merge(&NodeSet::from(vec![node]));
        let (Some(key), Some((value, rest))) = (schema.first(), values.split_first()) else {
            return;
        };
        for c in &mut self.children {
            if c.value == *value {
                return c.add_levels(&schema[1..], rest, node);
            }
        }
        let mut child = Bucket::new(key.clone(), (*value).to_owned());
        child.add_levels(&schema[1..], rest, node);
        self.children.push(child);
    }

    fn nodes_by_values(&self, prefix: &[&str]) -> NodeSet {
        let Some((value, rest)) = prefix.split_first() else {
            return self.nodes.clone();
        };
        for c in &self.children {
            if c.value == *value {
                return c.nodes_by_values(rest);
            }
        }
        NodeSet::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<String> {
        vec!["Location".to_owned(), "Country".to_owned(), "City".to_owned()]
    }

    #[test]
    fn test_add_node_schema_validation() {
        let mut root = Root::new(schema());
        let nodes: Vec<Node> = (0u32..7).map(Node::new).collect();

        assert!(root.add_node(nodes[0], &["Europe", "France", "Paris"]).is_ok());
        assert!(root.add_node(nodes[1], &["Europe", "France", "Lyon"]).is_ok());
        assert!(matches!(
            root.add_node(nodes[2], &["Europe", "France"]),
            Err(FleetmapError::SchemaMismatch { expected: 3, actual: 2 })
        ));
        assert!(root.add_node(nodes[3], &["Europe", "Germany", "Berlin"]).is_ok());
        assert!(root.add_node(nodes[4], &["Asia", "China", "Beijing"]).is_ok());
        assert!(root.add_node(nodes[5], &["Asia", "China", "Beijing"]).is_ok());
        assert!(matches!(
            root.add_node(nodes[6], &["Asia", "China", "Beijing", "Last"]),
            Err(FleetmapError::SchemaMismatch { expected: 3, actual: 4 })
        ));

        let ns = root.get_nodes(&["Europe"]).unwrap();
        assert_eq!(ns.ids(), vec![0, 1, 3]);

        let ns = root.get_nodes(&["Asia", "China"]).unwrap();
        assert_eq!(ns.ids(), vec![4, 5]);

        let ns = root.get_nodes(&["Asia", "Korea"]).unwrap();
        assert!(ns.is_empty());

        assert!(root.get_nodes(&["Europe", "France", "Paris", "Centrum"]).is_err());

        let ns = root.get_nodes(&[]).unwrap();
        assert_eq!(ns.ids(), vec![0, 1, 3, 4, 5]);
    }

    #[test]
    fn test_schema_tree_carries_keys() {
        let mut root = Root::new(schema());
        root.add_node(Node::new(1), &["Europe", "France", "Paris"]).unwrap();

        let b = root.bucket();
        assert_eq!(b.children()[0].key, "Location");
        assert_eq!(b.children()[0].value, "Europe");
        assert_eq!(b.children()[0].children()[0].key, "Country");
        assert!(b.is_valid());
    }

    #[test]
    fn test_schema_tree_is_queryable() {
        use crate::rule::{SFGroup, Select};

        let mut root = Root::new(schema());
        root.add_node(Node::new(1), &["Europe", "France", "Paris"]).unwrap();
        root.add_node(Node::new(2), &["Europe", "Germany", "Berlin"]).unwrap();
        root.add_node(Node::new(3), &["Asia", "China", "Beijing"]).unwrap();

        let g = SFGroup::with_selectors(vec![Select::new("Country", 2)]);
        let found = root.bucket().find_nodes(b"pivot", &[g]);
        assert_eq!(found.len(), 2);
    }
}
