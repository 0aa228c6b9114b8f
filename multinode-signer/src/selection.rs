// Copyright (c) 2024 Botho Foundation

//! Node selection for redundant submission.
//!
//! Draws a set of distinct nodes from a roster snapshot so that one logical
//! transaction can be signed for, and submitted to, several nodes.
//!
//! # Properties
//!
//! - **Uniform**: every subset of the requested size is equally likely
//!   (partial Fisher-Yates over the distinct node ids)
//! - **Distinct**: no node is returned twice
//! - **No clamping**: asking for more nodes than the roster holds is an error,
//!   never a shorter result
//!
//! The returned order is significant: callers associate per-node artifacts
//! with it positionally.

use rand::{seq::SliceRandom, Rng};
use thiserror::Error;

use crate::{account::NodeId, roster::NodeRoster};

/// Errors that can occur during node selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// Requested count was zero.
    #[error("node count must be positive")]
    InvalidCount,

    /// Roster holds fewer distinct nodes than requested.
    #[error("insufficient nodes: need {requested}, have {available}")]
    InsufficientNodes {
        /// Number of nodes requested
        requested: usize,
        /// Number of distinct nodes in the roster
        available: usize,
    },
}

/// Select `count` distinct nodes using the thread-local RNG.
pub fn select_nodes(roster: &NodeRoster, count: usize) -> Result<Vec<NodeId>, SelectionError> {
    select_nodes_with_rng(roster, count, &mut rand::thread_rng())
}

/// Select `count` distinct nodes using the given RNG.
///
/// Candidates are sorted before shuffling, so a seeded RNG yields a
/// reproducible selection for the same roster.
pub fn select_nodes_with_rng<R: Rng + ?Sized>(
    roster: &NodeRoster,
    count: usize,
    rng: &mut R,
) -> Result<Vec<NodeId>, SelectionError> {
    if count == 0 {
        return Err(SelectionError::InvalidCount);
    }

    let mut candidates = roster.node_ids();
    if candidates.len() < count {
        return Err(SelectionError::InsufficientNodes {
            requested: count,
            available: candidates.len(),
        });
    }

    let (selected, _) = candidates.partial_shuffle(rng, count);
    Ok(selected.to_vec())
}
