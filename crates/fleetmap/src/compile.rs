//! The compiled flat-array form of a fleet map.
//!
//! [`Bucket::compile`] re-expresses the tree as a pre-order array of
//! fixed-size [`CNode`] records plus a string-to-id dictionary, trading the
//! pointer-chasing tree walk for cache-friendly linear scans. Each header
//! record stores the length of its sub-tree including itself, so the next
//! sibling of record `i` lives at `i + data[i].size`; leaf records have
//! size 1, key 0 (the reserved node sentinel) and the node id as value.
//!
//! Queries mutate the `disabled` flags in place, so every query must start
//! from its own [`Clone`] of the compiled bucket. The clone duplicates the
//! record array but shares the dictionary, which is immutable once
//! compiled.
//!
//! Compiled selection assumes each selector key lives at a single depth of
//! the tree; rules mixing depths for one key must use the tree path.

use std::collections::HashMap;
use std::sync::Arc;

use crate::bucket::Bucket;
use crate::filter::SimpleFilter;
use crate::node::Node;
use crate::rule::SFGroup;

/// Descriptor id reserved for leaf records.
const NODES_DESC: u32 = 0;

/// Assigns a unique `u32` to every key and value string in a tree.
///
/// Id 0 is reserved for the node sentinel; free ids start at 1. Keys and
/// values draw from the same counter, so an id identifies a string
/// unambiguously across both tables.
#[derive(Debug, Default)]
pub struct Descriptor {
    next: u32,
    keys: HashMap<String, u32>,
    values: HashMap<String, u32>,
}

impl Descriptor {
    fn new() -> Self {
        Self { next: NODES_DESC + 1, keys: HashMap::new(), values: HashMap::new() }
    }

    fn add_key(&mut self, key: &str) -> u32 {
        if let Some(&id) = self.keys.get(key) {
            return id;
        }
        let id = self.next;
        self.next += 1;
        self.keys.insert(key.to_owned(), id);
        id
    }

    fn add_value(&mut self, value: &str) -> u32 {
        if let Some(&id) = self.values.get(value) {
            return id;
        }
        let id = self.next;
        self.next += 1;
        self.values.insert(value.to_owned(), id);
        id
    }

    /// The id of a key string, if the compiled tree contains it.
    #[must_use]
    pub fn key_id(&self, key: &str) -> Option<u32> {
        self.keys.get(key).copied()
    }

    /// The id of a value string, if the compiled tree contains it.
    #[must_use]
    pub fn value_id(&self, value: &str) -> Option<u32> {
        self.values.get(value).copied()
    }

    /// The id-to-string view, for decompilation and dumps.
    fn invert(&self) -> HashMap<u32, &str> {
        self.keys
            .iter()
            .chain(self.values.iter())
            .map(|(s, &id)| (id, s.as_str()))
            .collect()
    }
}

/// One record of the compiled array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CNode {
    /// Length of this record's sub-tree, itself included.
    pub size: u32,
    /// Descriptor id of the bucket key, or 0 for a leaf record.
    pub key: u32,
    /// Descriptor id of the bucket value, or the node id for a leaf record.
    pub value: u32,
    /// Set when a filter or selector ruled this sub-tree out.
    pub disabled: bool,
}

impl CNode {
    /// Returns true if this is a leaf (node) record.
    #[must_use]
    pub fn is_node(&self) -> bool {
        self.key == NODES_DESC
    }
}

/// A compiled fleet map: pre-order records, the shared dictionary, and the
/// node weights needed to decompile.
#[derive(Debug, Clone)]
pub struct CompiledBucket {
    desc: Arc<Descriptor>,
    data: Vec<CNode>,
    weights: Arc<HashMap<u32, u64>>,
}

/// A filter lowered onto descriptor ids.
///
/// Only equality-shaped predicates survive compilation; everything else
/// lowers to [`CompiledOp::Pass`], which constrains nothing. Mixed or
/// numeric predicates must use the tree path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFilter {
    /// Descriptor id of the attribute key.
    pub key: u32,
    /// The lowered predicate.
    pub op: CompiledOp,
}

/// The predicate of a [`CompiledFilter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledOp {
    /// Disable sub-trees whose value differs from the literal.
    Eq(u32),
    /// Disable sub-trees whose value equals the literal.
    Ne(u32),
    /// Disable sub-trees whose value differs from any of the literals.
    All(Vec<u32>),
    /// No constraint.
    Pass,
}

/// A selector lowered onto descriptor ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompiledSelect {
    /// Descriptor id of the attribute key.
    pub key: u32,
    /// How many children must qualify.
    pub count: usize,
}

/// An [`SFGroup`] lowered onto descriptor ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledSFGroup {
    /// Lowered filters.
    pub filters: Vec<CompiledFilter>,
    /// Lowered selectors.
    pub selectors: Vec<CompiledSelect>,
}

impl SFGroup {
    /// Lower this group onto a compiled bucket's dictionary.
    ///
    /// Returns `None` when the group references a key or value string the
    /// compiled tree does not contain; such a rule cannot match anything.
    /// The exclude list has no compiled form and is ignored here.
    #[must_use]
    pub fn compile(&self, desc: &Descriptor) -> Option<CompiledSFGroup> {
        let mut filters = Vec::with_capacity(self.filters.len());
        for f in &self.filters {
            filters.push(CompiledFilter {
                key: desc.key_id(&f.key)?,
                op: compile_predicate(&f.predicate, desc)?,
            });
        }

        let mut selectors = Vec::with_capacity(self.selectors.len());
        for s in &self.selectors {
            selectors.push(CompiledSelect {
                key: desc.key_id(&s.key)?,
                count: s.count as usize,
            });
        }

        Some(CompiledSFGroup { filters, selectors })
    }
}

fn compile_predicate(predicate: &SimpleFilter, desc: &Descriptor) -> Option<CompiledOp> {
    match predicate {
        SimpleFilter::Eq(v) => Some(CompiledOp::Eq(desc.value_id(v)?)),
        SimpleFilter::Ne(v) => Some(CompiledOp::Ne(desc.value_id(v)?)),
        SimpleFilter::And(fs) => {
            let mut values = Vec::with_capacity(fs.len());
            for f in fs {
                match f {
                    SimpleFilter::Eq(v) | SimpleFilter::Ne(v) => values.push(desc.value_id(v)?),
                    _ => return Some(CompiledOp::Pass),
                }
            }
            Some(CompiledOp::All(values))
        }
        _ => Some(CompiledOp::Pass),
    }
}

impl Bucket {
    /// Compile the tree into its flat-array form.
    ///
    /// One pre-order traversal: each bucket becomes a header whose size is
    /// backpatched once its sub-tree is emitted; each leaf bucket emits one
    /// record per node and registers the node's weight.
    #[must_use]
    pub fn compile(&self) -> CompiledBucket {
        let mut desc = Descriptor::new();
        let mut data = Vec::new();
        let mut weights = HashMap::new();
        self.compile_into(&mut desc, &mut data, &mut weights);
        CompiledBucket { desc: Arc::new(desc), data, weights: Arc::new(weights) }
    }

    fn compile_into(
        &self,
        desc: &mut Descriptor,
        data: &mut Vec<CNode>,
        weights: &mut HashMap<u32, u64>,
    ) {
        let key = desc.add_key(&self.key);
        let value = desc.add_value(&self.value);
        let header = data.len();
        data.push(CNode { size: 0, key, value, disabled: false });

        if self.children.is_empty() {
            for n in &self.nodes {
                data.push(CNode { size: 1, key: NODES_DESC, value: n.id, disabled: false });
                weights.insert(n.id, n.weight);
            }
        } else {
            for c in &self.children {
                c.compile_into(desc, data, weights);
            }
        }
        data[header].size = (data.len() - header) as u32;
    }
}

impl CompiledBucket {
    /// The record array.
    #[must_use]
    pub fn data(&self) -> &[CNode] {
        &self.data
    }

    /// The shared string dictionary.
    #[must_use]
    pub fn desc(&self) -> &Descriptor {
        &self.desc
    }

    /// Apply a whole group: every filter, then the selector chain. The
    /// compiled analogue of the tree path's maximal selection.
    pub fn apply_group(&mut self, group: &CompiledSFGroup) {
        for f in &group.filters {
            self.apply_filter(f);
        }
        self.apply_selects(&group.selectors);
    }

    /// Disable every sub-tree whose tag fails the filter.
    ///
    /// Disabling is monotonic: a record disabled by one filter is never
    /// re-enabled by another, so filters compose as a union of disabled
    /// regions. A record with the filter's key is decided and its whole
    /// sub-tree skipped; other records are scanned through.
    pub fn apply_filter(&mut self, filter: &CompiledFilter) {
        let len = self.data.len();
        let mut i = 0;
        while i < len {
            if self.data[i].key != filter.key {
                i += 1;
                continue;
            }
            let fails = match &filter.op {
                CompiledOp::Eq(v) => self.data[i].value != *v,
                CompiledOp::Ne(v) => self.data[i].value == *v,
                CompiledOp::All(vs) => vs.iter().any(|v| self.data[i].value != *v),
                CompiledOp::Pass => false,
            };
            if fails {
                self.data[i].disabled = true;
            }
            i += self.data[i].size as usize;
        }
    }

    /// Disable every sub-tree that cannot supply its selector counts, and
    /// return how many sub-trees at the head selector's level survive.
    ///
    /// Assumes each selector key lives at a single depth (see the module
    /// docs); an empty selector chain applies no constraint and returns 0.
    pub fn apply_selects(&mut self, selectors: &[CompiledSelect]) -> usize {
        if selectors.is_empty() {
            return 0;
        }
        self.apply_selects_in(1, self.data.len(), selectors)
    }

    fn apply_selects_in(
        &mut self,
        start: usize,
        finish: usize,
        selectors: &[CompiledSelect],
    ) -> usize {
        let head = selectors[0];
        let rest = &selectors[1..];
        let mut count = 0;
        let mut i = start;

        while i < finish {
            // Scan to the first record at the head selector's level.
            while i < finish && self.data[i].key != head.key {
                i += 1;
            }
            // Walk the sibling run, recursing into each live sub-tree.
            while i < finish && !self.data[i].disabled {
                let size = self.data[i].size as usize;
                if rest.is_empty() {
                    count += 1;
                } else if self.apply_selects_in(i + 1, i + size, rest) < rest[0].count {
                    self.data[i].disabled = true;
                } else {
                    count += 1;
                }
                i += size;
            }
            // Skip the disabled sub-tree that ended the run.
            if i < finish {
                i += self.data[i].size as usize;
            }
        }
        count
    }

    /// A new compiled bucket containing only the records that survived
    /// filtering and selection, with sub-tree sizes rebuilt.
    ///
    /// Returns `None` when the root itself was disabled.
    #[must_use]
    pub fn shrink(&self) -> Option<CompiledBucket> {
        if self.data.is_empty() || self.data[0].disabled {
            return None;
        }
        let mut out = Vec::with_capacity(self.data.len());
        shrink_into(&self.data, &mut out);
        Some(CompiledBucket {
            desc: Arc::clone(&self.desc),
            data: out,
            weights: Arc::clone(&self.weights),
        })
    }

    /// Rebuild the tree form, reattaching node weights from the compiled
    /// weight table and recomputing the cached leaf sets.
    ///
    /// Capacity and price are not part of the compiled form and come back
    /// zeroed.
    #[must_use]
    pub fn decompile(&self) -> Bucket {
        let inv = self.desc.invert();
        let (_, mut bucket) = decompile_at(&inv, &self.weights, &self.data);
        bucket.fill_nodes();
        bucket
    }

    /// Render the record array for debugging, one record per line.
    #[must_use]
    pub fn dump(&self) -> String {
        use std::fmt::Write;

        let inv = self.desc.invert();
        let mut out = String::new();
        for record in &self.data {
            if record.is_node() {
                let _ = writeln!(
                    out,
                    ":{} ({}) {}",
                    record.value, record.size, record.disabled
                );
            } else {
                let _ = writeln!(
                    out,
                    "{}:{} ({}) {}",
                    inv.get(&record.key).copied().unwrap_or("?"),
                    inv.get(&record.value).copied().unwrap_or("?"),
                    record.size,
                    record.disabled
                );
            }
        }
        out
    }
}

/// Copy the live records of the sub-tree at `data[0]`, backpatching sizes.
fn shrink_into(data: &[CNode], out: &mut Vec<CNode>) {
    if data[0].disabled {
        return;
    }
    let header = out.len();
    out.push(data[0]);

    let mut offset = 1;
    let size = data[0].size as usize;
    while offset < size {
        let child_size = data[offset].size as usize;
        shrink_into(&data[offset..], out);
        offset += child_size;
    }
    out[header].size = (out.len() - header) as u32;
}

fn decompile_at(
    inv: &HashMap<u32, &str>,
    weights: &HashMap<u32, u64>,
    data: &[CNode],
) -> (usize, Bucket) {
    let header = data[0];
    let mut bucket = Bucket::new(
        inv.get(&header.key).copied().unwrap_or_default(),
        inv.get(&header.value).copied().unwrap_or_default(),
    );

    let size = header.size as usize;
    let mut offset = 1;
    while offset < size {
        if data[offset].is_node() {
            let id = data[offset].value;
            bucket
                .nodes
                .push(Node::new(id).with_weight(weights.get(&id).copied().unwrap_or_default()));
            offset += 1;
        } else {
            let (consumed, child) = decompile_at(inv, weights, &data[offset..]);
            bucket.children.push(child);
            offset += consumed;
        }
    }
    (size, bucket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use crate::node::NodeSet;
    use crate::rule::Select;

    fn new_root(buckets: &[(&str, &[u32])]) -> Bucket {
        let mut b = Bucket::default();
        for (path, ids) in buckets {
            b.add_bucket(path, NodeSet::from_ids(ids)).unwrap();
        }
        b
    }

    fn eight_country_fleet() -> Bucket {
        new_root(&[
            ("/Location:Europe/Country:Germany", &[1]),
            ("/Location:Europe/Country:France", &[2]),
            ("/Location:Europe/Country:Spain", &[3]),
            ("/Location:America/Country:USA", &[4]),
            ("/Location:America/Country:Canada", &[5]),
            ("/Location:Asia/Country:China", &[6]),
            ("/Location:Asia/Country:Korea", &[7]),
            ("/Location:Australia/Country:Australia", &[8]),
        ])
    }

    #[test]
    fn test_compile_layout() {
        let root = new_root(&[("/Location:Europe/Country:Germany", &[1, 2])]);
        let cb = root.compile();

        // root header, Europe header, Germany header, two leaves.
        assert_eq!(cb.data().len(), 5);
        assert_eq!(cb.data()[0].size, 5);
        assert_eq!(cb.data()[1].size, 4);
        assert_eq!(cb.data()[2].size, 3);
        assert!(cb.data()[3].is_node());
        assert_eq!(cb.data()[3].size, 1);
        assert_eq!(cb.data()[3].value, 1);
        assert_eq!(cb.data()[4].value, 2);

        assert!(cb.desc().key_id("Location").is_some());
        assert!(cb.desc().value_id("Germany").is_some());
        assert!(cb.desc().key_id("Nowhere").is_none());
    }

    #[test]
    fn test_decompile_round_trip() {
        let mut root = Bucket::default();
        root.add_bucket(
            "/Location:Europe/Country:Germany",
            NodeSet::from(vec![Node::new(1).with_weight(3), Node::new(4).with_weight(1)]),
        )
        .unwrap();
        root.add_bucket(
            "/Location:Asia/Country:Korea",
            NodeSet::from(vec![Node::new(2).with_weight(7)]),
        )
        .unwrap();

        assert_eq!(root.compile().decompile(), root);
    }

    #[test]
    fn test_clone_shares_dictionary_but_not_records() {
        let root = eight_country_fleet();
        let cb = root.compile();
        let mut copy = cb.clone();

        let g = SFGroup {
            selectors: vec![],
            filters: vec![Filter::new("Location", SimpleFilter::Ne("America".to_owned()))],
            exclude: vec![],
        };
        let cg = g.compile(cb.desc()).unwrap();
        copy.apply_group(&cg);

        // The copy got marked, the original stayed clean.
        assert!(copy.data().iter().any(|r| r.disabled));
        assert!(cb.data().iter().all(|r| !r.disabled));
        assert!(Arc::ptr_eq(&cb.desc, &copy.desc));
    }

    #[test]
    fn test_apply_filter_ne_then_shrink() {
        let root = eight_country_fleet();
        let mut cb = root.compile();

        let g = SFGroup {
            selectors: vec![],
            filters: vec![Filter::new("Location", SimpleFilter::Ne("America".to_owned()))],
            exclude: vec![],
        };
        cb.apply_filter(&g.compile(cb.desc()).unwrap().filters[0]);

        let expected = new_root(&[
            ("/Location:Europe/Country:Germany", &[1]),
            ("/Location:Europe/Country:France", &[2]),
            ("/Location:Europe/Country:Spain", &[3]),
            ("/Location:Asia/Country:China", &[6]),
            ("/Location:Asia/Country:Korea", &[7]),
            ("/Location:Australia/Country:Australia", &[8]),
        ]);
        assert_eq!(cb.shrink().unwrap().decompile(), expected);
    }

    #[test]
    fn test_apply_filter_eq() {
        let root = eight_country_fleet();
        let mut cb = root.compile();

        let g = SFGroup {
            selectors: vec![],
            filters: vec![Filter::new("Location", SimpleFilter::Eq("Asia".to_owned()))],
            exclude: vec![],
        };
        cb.apply_filter(&g.compile(cb.desc()).unwrap().filters[0]);

        let expected = new_root(&[
            ("/Location:Asia/Country:China", &[6]),
            ("/Location:Asia/Country:Korea", &[7]),
        ]);
        assert_eq!(cb.shrink().unwrap().decompile(), expected);
    }

    #[test]
    fn test_filters_compose_monotonically() {
        let root = eight_country_fleet();
        let mut cb = root.compile();
        let desc_eq = |key: &str, value: &str| CompiledFilter {
            key: cb.desc().key_id(key).unwrap(),
            op: CompiledOp::Eq(cb.desc().value_id(value).unwrap()),
        };

        // Contradictory filters disable everything below the root.
        let f1 = desc_eq("Location", "Asia");
        let f2 = desc_eq("Location", "Europe");
        cb.apply_filter(&f1);
        cb.apply_filter(&f2);

        let shrunk = cb.shrink().unwrap();
        // Only the root header survives.
        assert_eq!(shrunk.data().len(), 1);
    }

    #[test]
    fn test_apply_selects_prunes_small_subtrees() {
        let root = eight_country_fleet();
        let mut cb = root.compile();

        let g = SFGroup {
            selectors: vec![Select::new("Location", 2), Select::new("Country", 2)],
            filters: vec![Filter::new("Location", SimpleFilter::Ne("America".to_owned()))],
            exclude: vec![],
        };
        let cg = g.compile(cb.desc()).unwrap();
        cb.apply_group(&cg);

        // America is filtered out; Australia has one country, short of two.
        let expected = new_root(&[
            ("/Location:Europe/Country:Germany", &[1]),
            ("/Location:Europe/Country:France", &[2]),
            ("/Location:Europe/Country:Spain", &[3]),
            ("/Location:Asia/Country:China", &[6]),
            ("/Location:Asia/Country:Korea", &[7]),
        ]);
        assert_eq!(cb.shrink().unwrap().decompile(), expected);
    }

    #[test]
    fn test_apply_selects_three_levels() {
        let root = new_root(&[
            ("/Location:Europe/Country:Germany/City:Berlin", &[1, 2]),
            ("/Location:Europe/Country:Germany/City:Hamburg", &[3]),
            ("/Location:Europe/Country:France/City:Paris", &[4]),
            ("/Location:Asia/Country:China/City:Beijing", &[5]),
        ]);
        let mut cb = root.compile();

        let g = SFGroup::with_selectors(vec![
            Select::new("Location", 1),
            Select::new("Country", 1),
            Select::new("City", 2),
        ]);
        let survivors = cb.apply_selects(&g.compile(cb.desc()).unwrap().selectors);

        // Only Germany has two cities. France falls, Europe survives via
        // Germany; China falls and takes Asia with it.
        assert_eq!(survivors, 1);
        let expected = new_root(&[
            ("/Location:Europe/Country:Germany/City:Berlin", &[1, 2]),
            ("/Location:Europe/Country:Germany/City:Hamburg", &[3]),
        ]);
        assert_eq!(cb.shrink().unwrap().decompile(), expected);
    }

    #[test]
    fn test_compile_unknown_strings_fail() {
        let root = eight_country_fleet();
        let cb = root.compile();

        let g = SFGroup {
            selectors: vec![Select::new("Planet", 1)],
            filters: vec![],
            exclude: vec![],
        };
        assert!(g.compile(cb.desc()).is_none());

        let g = SFGroup {
            selectors: vec![],
            filters: vec![Filter::new("Location", SimpleFilter::Eq("Atlantis".to_owned()))],
            exclude: vec![],
        };
        assert!(g.compile(cb.desc()).is_none());
    }

    #[test]
    fn test_parity_with_tree_path() {
        let root = eight_country_fleet();

        let g = SFGroup {
            selectors: vec![Select::new("Location", 2), Select::new("Country", 2)],
            filters: vec![Filter::new("Location", SimpleFilter::Ne("America".to_owned()))],
            exclude: vec![],
        };

        let tree = root.get_max_selection(&g).unwrap();

        let mut cb = root.compile();
        cb.apply_group(&g.compile(cb.desc()).unwrap());
        let compiled = cb.shrink().unwrap().decompile();

        assert_eq!(tree.nodelist().ids(), compiled.nodelist().ids());
    }

    #[test]
    fn test_dump_mentions_tags() {
        let root = new_root(&[("/Location:Europe/Country:Germany", &[1])]);
        let dump = root.compile().dump();
        assert!(dump.contains("Location:Europe"));
        assert!(dump.contains("Country:Germany"));
        assert!(dump.contains(":1 (1)"));
    }
}
