//! Downstream operations.
//!
//! Every mutation of a replica, local or remote, is expressed as one of two
//! operations. `AddRight` carries the anchor timestamp `t` plus the new
//! node `w` (its timestamp and atom); `Remove` names the tombstoned node.
//! The serde attributes produce the exact shapes that travel on the wire:
//!
//! ```text
//! {"type": "addRight", "t": -1, "w": {"timestamp": 65536, "atom": "h"}}
//! {"type": "remove", "t": 65536}
//! ```

use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};

/// The new node carried by an `addRight` op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insertion {
    /// Timestamp minted for the new node.
    pub timestamp: Timestamp,
    /// The single character the node holds.
    pub atom: char,
}

/// An operation that can be integrated into any replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Op {
    /// Insert `w` immediately to the right of the node `t` (which may be a
    /// tombstone), subject to descending-timestamp sibling order.
    #[serde(rename = "addRight")]
    AddRight {
        #[serde(rename = "t")]
        after: Timestamp,
        w: Insertion,
    },

    /// Mark the node `t` as removed. The node stays in the structure as a
    /// tombstone.
    #[serde(rename = "remove")]
    Remove { t: Timestamp },
}

impl Op {
    /// Build an `addRight` op.
    pub fn add_right(after: Timestamp, timestamp: Timestamp, atom: char) -> Op {
        Op::AddRight {
            after,
            w: Insertion { timestamp, atom },
        }
    }

    /// Build a `remove` op.
    pub fn remove(t: Timestamp) -> Op {
        Op::Remove { t }
    }
}
