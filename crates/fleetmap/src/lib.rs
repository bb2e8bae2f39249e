//! Deterministic, weighted, rule-based node placement for distributed
//! storage fleets.
//!
//! This crate answers "where does this object live?" as a pure function
//! `(fleet, rule, pivot) -> node set`, with no coordination between
//! callers: every client holding the same fleet snapshot computes the same
//! answer for the same pivot.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Bucket tree                       │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌───────────────┐ ┌───────────────┐ ┌───────────────┐   │
//! │  │ Location:Asia │ │ Location:EU   │ │ Storage:SSD   │   │
//! │  └──────┬────────┘ └──────┬────────┘ └──────┬────────┘   │
//! │         │                 │                 │            │
//! │  ┌──────┴────────┐ ┌──────┴────────┐      (leaves)       │
//! │  │ Country:Korea │ │ Country:Spain │                     │
//! │  └──────┬────────┘ └──────┬────────┘                     │
//! │      (leaves)          (leaves)                          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! A query intersects the fleet with its filters, prunes sub-trees that
//! cannot satisfy the selector counts ([`Bucket::get_max_selection`]), and
//! then walks top-down picking the configured number of children per
//! level, ranked by weighted rendezvous hashing of the caller's pivot
//! ([`Bucket::get_selection`]).
//!
//! # Usage
//!
//! ```
//! use fleetmap::{Bucket, NodeSet, SFGroup, Select};
//!
//! let mut fleet = Bucket::default();
//! fleet.add_bucket("/Location:Europe/Country:Spain", NodeSet::from_ids(&[17, 18])).unwrap();
//! fleet.add_bucket("/Location:Europe/Country:Germany", NodeSet::from_ids(&[25])).unwrap();
//! fleet.add_bucket("/Location:Asia/Country:Korea", NodeSet::from_ids(&[1, 3])).unwrap();
//!
//! let rule = SFGroup::with_selectors(vec![
//!     Select::new("Country", 1),
//!     Select::nodes(2),
//! ]);
//!
//! let placed = fleet.find_nodes(b"object-id", &[rule]);
//! assert_eq!(placed.len(), 2);
//! ```
//!
//! The tree path is the reference semantics; [`Bucket::compile`] produces
//! a flat-array form of the same fleet for cheap repeated evaluation of
//! the equality-only filter subset.
//!
//! # Concurrency
//!
//! The engine is a pure library: queries never mutate their input, so any
//! number may run concurrently over a shared snapshot. Mutating operations
//! are caller-synchronized. Compiled-bucket queries mutate in place and
//! must each start from their own clone.

#![warn(missing_docs)]

pub mod aggregator;
pub mod bucket;
mod codec;
pub mod compile;
mod dot;
pub mod error;
pub mod filter;
pub mod hash;
pub mod node;
pub mod root;
pub mod rule;
mod selector;

#[cfg(test)]
mod proptests;

pub use bucket::Bucket;
pub use compile::{CompiledBucket, CompiledSFGroup};
pub use error::{FleetmapError, Result};
pub use filter::{Filter, SimpleFilter};
pub use node::{Node, NodeSet};
pub use root::Root;
pub use rule::{SFGroup, Select, NODES_BUCKET, SEPARATOR};
