//! Binary encoding of the fleet tree.
//!
//! Big-endian, length-prefixed, no padding:
//!
//! ```text
//! Bucket := i32 nameLen, bytes[nameLen] name,      -- name is "key:value"
//!           i32 nodeCount, Node[nodeCount] nodes,
//!           i32 childCount, Bucket[childCount] children
//! Node   := u32 id, u64 capacity, u64 price
//! ```
//!
//! The format carries neither weights nor disabled flags; decoding finishes
//! with [`Bucket::fill_nodes`] so the cached leaf sets satisfy the tree
//! invariants even for streams that only attach nodes at the leaves. Empty
//! input decodes to the empty bucket; any read shorter than its length
//! prefix is a fatal error.

use bytes::{Buf, BufMut};

use crate::bucket::Bucket;
use crate::error::{FleetmapError, Result};
use crate::node::Node;

/// Bytes of one encoded node record.
const NODE_WIRE_SIZE: usize = 4 + 8 + 8;

impl Bucket {
    /// Serialize the tree.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        let name = self.name();
        buf.put_i32(name.len() as i32);
        buf.put_slice(name.as_bytes());

        buf.put_i32(self.nodes.len() as i32);
        for n in &self.nodes {
            buf.put_u32(n.id);
            buf.put_u64(n.capacity);
            buf.put_u64(n.price);
        }

        buf.put_i32(self.children.len() as i32);
        for c in &self.children {
            c.encode_into(buf);
        }
    }

    /// Deserialize a tree.
    ///
    /// Empty input is a soft success: it decodes to the empty bucket.
    /// Trailing bytes after the top-level bucket are ignored.
    pub fn decode(data: &[u8]) -> Result<Bucket> {
        if data.is_empty() {
            return Ok(Bucket::default());
        }
        let mut buf = data;
        let mut bucket = decode_bucket(&mut buf)?;
        bucket.fill_nodes();
        Ok(bucket)
    }
}

fn decode_bucket(buf: &mut &[u8]) -> Result<Bucket> {
    let name_len = read_len(buf, "bucket name")?;
    if buf.remaining() < name_len {
        return Err(FleetmapError::DecodeShort {
            what: "bucket name",
            expected: name_len,
            actual: buf.remaining(),
        });
    }
    let name = String::from_utf8_lossy(&buf[..name_len]).into_owned();
    buf.advance(name_len);

    let mut bucket = match name.split_once(':') {
        Some((key, value)) => Bucket::new(key, value),
        None => Bucket::new(name, ""),
    };

    let node_count = read_len(buf, "node list")?;
    if buf.remaining() < node_count * NODE_WIRE_SIZE {
        return Err(FleetmapError::DecodeShort {
            what: "node list",
            expected: node_count * NODE_WIRE_SIZE,
            actual: buf.remaining(),
        });
    }
    for _ in 0..node_count {
        let node = Node::new(buf.get_u32())
            .with_capacity(buf.get_u64())
            .with_price(buf.get_u64());
        bucket.nodes.push(node);
    }

    let child_count = read_len(buf, "child list")?;
    for _ in 0..child_count {
        let child = decode_bucket(buf)?;
        bucket.children.push(child);
    }

    Ok(bucket)
}

/// Read an `i32` length prefix, rejecting negatives.
fn read_len(buf: &mut &[u8], what: &'static str) -> Result<usize> {
    if buf.remaining() < 4 {
        return Err(FleetmapError::DecodeShort {
            what,
            expected: 4,
            actual: buf.remaining(),
        });
    }
    let len = buf.get_i32();
    if len < 0 {
        return Err(FleetmapError::InvalidLength { what, len });
    }
    Ok(len as usize)
}
