//! Structural fingerprints of a diagram
//!
//! Two hashes are derived from the same nodes and edges, neither of which
//! looks at canvas positions:
//! - [`structure_hash`] keys the metrics cache and covers the full table data;
//! - [`dirty_hash`] is the cheap change fingerprint compared before a save.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::schema::{Query, Relationship, TableNode};

/// Hash of everything metrics can depend on
pub fn structure_hash(nodes: &[TableNode], edges: &[Relationship]) -> u64 {
    let mut hasher = DefaultHasher::new();
    nodes.len().hash(&mut hasher);
    for node in nodes {
        node.id.hash(&mut hasher);
        node.node_type.hash(&mut hasher);
        node.data.hash(&mut hasher);
    }
    edges.hash(&mut hasher);
    hasher.finish()
}

pub fn queries_hash(queries: &[Query]) -> u64 {
    let mut hasher = DefaultHasher::new();
    queries.hash(&mut hasher);
    hasher.finish()
}

/// Java-style `h * 31 + c` string hash over UTF-16 code units
fn rolling_hash(input: &str, seed: i32) -> i32 {
    input
        .encode_utf16()
        .fold(seed, |hash, unit| hash.wrapping_mul(31).wrapping_add(unit as i32))
}

/// Change fingerprint of a version.
///
/// Each node contributes its id, type, label, column count and nested-table
/// count (over the whole subtree); edges contribute `source->target`. The two
/// hashes are rendered in base 36 and joined with `:`.
pub fn dirty_hash(nodes: &[TableNode], edges: &[Relationship]) -> String {
    let node_hash = nodes.iter().fold(0i32, |hash, node| {
        let table = node.table();
        let projection = format!(
            "{}|{}|{}|{}|{};",
            node.id,
            node.node_type,
            table.label,
            table.total_columns(),
            table.total_nested()
        );
        rolling_hash(&projection, hash)
    });

    let edge_hash = edges.iter().fold(0i32, |hash, edge| {
        rolling_hash(&format!("{}->{};", edge.source, edge.target), hash)
    });

    format!("{}:{}", to_base36(node_hash), to_base36(edge_hash))
}

fn to_base36(value: i32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    let negative = value < 0;
    let mut magnitude = value.unsigned_abs();
    if magnitude == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while magnitude > 0 {
        digits.push(DIGITS[(magnitude % 36) as usize]);
        magnitude /= 36;
    }
    if negative {
        digits.push(b'-');
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}
