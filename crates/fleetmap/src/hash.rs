//! Deterministic hashing and rendezvous ranking.
//!
//! Every placement decision reduces to ordering a candidate list by a hash
//! of (pivot, candidate key). The hash must be:
//! - Deterministic: same input always produces same output, on every
//!   machine and build target
//! - Uniform: output is uniformly distributed
//! - Fast: computed for every candidate at every level of a query
//!
//! Uses SipHash-1-3 seeded with a fixed key so all clients of the same
//! fleet snapshot agree on the ranking without coordination.

use std::hash::Hasher;

use siphasher::sip::SipHasher13;

use crate::bucket::Bucket;
use crate::node::Node;

/// Placement hash key, fixed for cross-client consistency.
const PLACEMENT_HASH_KEY: (u64, u64) = (0x9e37_79b9_7f4a_7c15, 0x2545_f491_4f6c_dd1d);

/// Hash an opaque byte string, typically the caller's pivot.
#[inline]
#[must_use]
pub fn hash_bytes(input: &[u8]) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(PLACEMENT_HASH_KEY.0, PLACEMENT_HASH_KEY.1);
    hasher.write(input);
    hasher.finish()
}

/// Combine two hashes into one. Order matters.
#[inline]
#[must_use]
pub fn hash_pair(a: u64, b: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(PLACEMENT_HASH_KEY.0, PLACEMENT_HASH_KEY.1);
    hasher.write_u64(a);
    hasher.write_u64(b);
    hasher.finish()
}

/// Rendezvous key of a node: its id as an 8-byte big-endian value.
#[inline]
pub(crate) fn node_key_hash(n: &Node) -> u64 {
    hash_bytes(&u64::from(n.id).to_be_bytes())
}

/// Rendezvous key of a bucket: the byte string `key + value`.
#[inline]
pub(crate) fn bucket_key_hash(b: &Bucket) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(PLACEMENT_HASH_KEY.0, PLACEMENT_HASH_KEY.1);
    hasher.write(b.key.as_bytes());
    hasher.write(b.value.as_bytes());
    hasher.finish()
}

/// Rank nodes by rendezvous hash of `pivot`, best candidate first.
///
/// Weighted when any node carries a non-zero weight, plain otherwise.
pub(crate) fn rank_nodes(nodes: &mut [Node], pivot: u64) {
    if nodes.iter().any(|n| n.weight != 0) {
        rank_weighted(nodes, pivot, node_key_hash, |n| n.weight as f64);
    } else {
        rank_plain(nodes, pivot, node_key_hash);
    }
}

/// Rank sibling buckets by rendezvous hash of `pivot`, best candidate first.
///
/// Weighted when any bucket carries a non-zero aggregated weight.
pub(crate) fn rank_buckets(buckets: &mut [Bucket], pivot: u64) {
    if buckets.iter().any(|b| b.weight() != 0.0) {
        rank_weighted(buckets, pivot, bucket_key_hash, Bucket::weight);
    } else {
        rank_plain(buckets, pivot, bucket_key_hash);
    }
}

/// Sort descending by `hash_pair(pivot, key)`. Stable, so equal scores keep
/// their input order and the ranking stays deterministic.
fn rank_plain<T>(items: &mut [T], pivot: u64, key: impl Fn(&T) -> u64) {
    items.sort_by_cached_key(|item| std::cmp::Reverse(hash_pair(pivot, key(item))));
}

/// Weighted rendezvous: each item draws `-w / ln(u)` where `u` is its
/// combined hash mapped into the unit interval, and items sort by draw
/// descending. Doubling an item's weight doubles its expected share while
/// still moving only a minimal number of assignments when membership
/// changes. Zero-weight items draw 0 and sort behind every weighted item.
fn rank_weighted<T: Clone>(
    items: &mut [T],
    pivot: u64,
    key: impl Fn(&T) -> u64,
    weight: impl Fn(&T) -> f64,
) {
    let draws: Vec<f64> = items
        .iter()
        .map(|item| {
            let u = hash_pair(pivot, key(item)) as f64 / u64::MAX as f64;
            weight(item) * (-u.ln()).recip()
        })
        .collect();

    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&i, &j| draws[j].total_cmp(&draws[i]));

    let ranked: Vec<T> = order.into_iter().map(|i| items[i].clone()).collect();
    items.clone_from_slice(&ranked);
}
