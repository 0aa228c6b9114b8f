// Copyright (c) 2024 Botho Foundation

//! Network roster snapshot.
//!
//! The ledger client owns the live view of the network and hands out
//! snapshots of it. Keys are display strings (usually node addresses) and
//! carry no meaning; several keys may point at the same node.

use std::collections::{BTreeMap, BTreeSet};

use crate::account::NodeId;

/// Read-only view of the execution nodes known for a network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeRoster {
    entries: BTreeMap<String, NodeId>,
}

impl NodeRoster {
    /// Create an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entry.
    pub fn insert(&mut self, key: impl Into<String>, node: NodeId) -> Option<NodeId> {
        self.entries.insert(key.into(), node)
    }

    /// Number of distinct nodes; this is what selection can draw from.
    pub fn available(&self) -> usize {
        self.node_ids().len()
    }

    /// Number of display entries, including aliases of the same node.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct node ids in ascending order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.entries
            .values()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// True if some entry maps to `node`.
    pub fn contains(&self, node: &NodeId) -> bool {
        self.entries.values().any(|n| n == node)
    }

    /// Iterate over `(key, node)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeId)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, NodeId)> for NodeRoster {
    fn from_iter<I: IntoIterator<Item = (K, NodeId)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
