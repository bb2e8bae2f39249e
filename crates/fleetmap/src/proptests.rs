//! Property tests against small reference models.

use std::collections::{BTreeMap, HashSet};

use proptest::prelude::*;

use crate::bucket::Bucket;
use crate::node::NodeSet;

fn arb_ids() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(0u32..64, 0..24)
}

/// One tree entry: a location/country coordinate, an optional city level,
/// and how many nodes to attach.
#[derive(Debug, Clone)]
struct Entry {
    l: u8,
    c: u8,
    city: Option<u8>,
    count: u8,
}

impl Entry {
    fn path(&self) -> String {
        let mut p = format!("/Location:L{}/Country:C{}-{}", self.l, self.l, self.c);
        if let Some(city) = self.city {
            p.push_str(&format!("/City:T{}-{}-{}", self.l, self.c, city));
        }
        p
    }

    /// Node ids carved from a range owned by this exact path, so distinct
    /// paths never share an id and the sibling-disjointness invariant
    /// holds by construction.
    fn ids(&self) -> Vec<u32> {
        let slot = (u32::from(self.l) * 4 + u32::from(self.c)) * 20
            + self.city.map_or(0, |t| 5 + u32::from(t) * 5);
        (slot..slot + u32::from(self.count)).collect()
    }
}

/// Trees mixing depths: some countries carry nodes directly, some through
/// city buckets.
fn arb_tree() -> impl Strategy<Value = Vec<Entry>> {
    prop::collection::vec(
        (0u8..4, 0u8..4, prop::option::of(0u8..3), 1u8..5)
            .prop_map(|(l, c, city, count)| Entry { l, c, city, count }),
        1..12,
    )
}

/// Trees whose nodes all sit at the city level, the shape the compiled
/// form represents exactly.
fn arb_leaf_tree() -> impl Strategy<Value = Vec<Entry>> {
    prop::collection::vec(
        (0u8..4, 0u8..4, 0u8..3, 1u8..5)
            .prop_map(|(l, c, city, count)| Entry { l, c, city: Some(city), count }),
        1..12,
    )
}

fn build(entries: &[Entry]) -> Bucket {
    let mut b = Bucket::default();
    for e in entries {
        b.add_bucket(&e.path(), NodeSet::from_ids(&e.ids())).unwrap();
    }
    b
}

proptest! {
    #[test]
    fn merge_equals_model_union(a in arb_ids(), b in arb_ids()) {
        let sa = NodeSet::from_ids(&a);
        let sb = NodeSet::from_ids(&b);

        let model: BTreeMap<u32, ()> =
            a.iter().chain(b.iter()).map(|&id| (id, ())).collect();

        let merged = sa.merge(&sb);
        prop_assert_eq!(merged.ids(), model.keys().copied().collect::<Vec<_>>());
    }

    #[test]
    fn intersect_equals_model(a in arb_ids(), b in arb_ids()) {
        let sa = NodeSet::from_ids(&a);
        let sb = NodeSet::from_ids(&b);

        let in_b: HashSet<u32> = b.iter().copied().collect();
        let model: BTreeMap<u32, ()> =
            a.iter().filter(|id| in_b.contains(*id)).map(|&id| (id, ())).collect();

        prop_assert_eq!(sa.intersect(&sb).ids(), model.keys().copied().collect::<Vec<_>>());
    }

    #[test]
    fn diff_removes_exactly_the_excluded(a in arb_ids(), e in arb_ids()) {
        let sa = NodeSet::from_ids(&a);
        let excluded: HashSet<u32> = e.into_iter().collect();

        let got = sa.diff(&excluded);
        for id in got.ids() {
            prop_assert!(!excluded.contains(&id));
        }
        prop_assert_eq!(got.len(), sa.ids().into_iter().filter(|id| !excluded.contains(id)).count());
    }

    #[test]
    fn set_ops_preserve_sorted_invariant(a in arb_ids(), b in arb_ids()) {
        let sa = NodeSet::from_ids(&a);
        let sb = NodeSet::from_ids(&b);

        for set in [sa.merge(&sb), sa.intersect(&sb)] {
            let ids = set.ids();
            prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn constructed_trees_are_valid(entries in arb_tree()) {
        prop_assert!(build(&entries).is_valid());
    }

    #[test]
    fn codec_round_trips(entries in arb_tree()) {
        let before = build(&entries);
        let after = Bucket::decode(&before.encode()).unwrap();
        prop_assert_eq!(&before, &after);
        prop_assert_eq!(before.encode(), after.encode());
    }

    #[test]
    fn compile_round_trips(entries in arb_leaf_tree()) {
        let before = build(&entries);
        prop_assert_eq!(before.compile().decompile(), before);
    }

    #[test]
    fn fill_nodes_is_idempotent(entries in arb_tree()) {
        let mut b = build(&entries);
        let reference = b.clone();
        b.fill_nodes();
        prop_assert_eq!(&b, &reference);
        b.fill_nodes();
        prop_assert_eq!(&b, &reference);
    }
}
