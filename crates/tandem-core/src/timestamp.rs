//! Replica identifiers and totally-ordered timestamps.
//!
//! A timestamp packs a per-replica monotone counter and the replica id into
//! a single integer: `(counter << 16) | replica`. The low 16 bits guarantee
//! global uniqueness (each replica only ever mints values carrying its own
//! id) and plain integer comparison gives the total order used to break
//! ties between concurrent insertions at the same anchor.

use serde::{Deserialize, Serialize};

/// A unique identifier for each replica in a collaboration session.
///
/// The id occupies the low bits of every timestamp the replica mints, so
/// the valid range is exactly what `u16` can hold.
pub type ReplicaId = u16;

/// Number of low bits reserved for the replica id.
const REPLICA_BITS: u32 = 16;

/// A unique, totally-ordered identifier for one atom.
///
/// Stored as `i64` so the counter half is effectively unbounded while the
/// replica id stays in the low 16 bits. The left document edge is the
/// sentinel [`Timestamp::LEFT`], which sorts below every minted timestamp.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The left edge of every document.
    pub const LEFT: Timestamp = Timestamp(-1);

    /// Pack a counter and replica id into a timestamp.
    pub fn pack(counter: u64, replica: ReplicaId) -> Timestamp {
        Timestamp(((counter as i64) << REPLICA_BITS) | replica as i64)
    }

    /// The counter half of this timestamp.
    #[inline]
    pub fn counter(&self) -> u64 {
        (self.0 >> REPLICA_BITS) as u64
    }

    /// The replica that minted this timestamp.
    #[inline]
    pub fn replica(&self) -> ReplicaId {
        (self.0 & 0xFFFF) as ReplicaId
    }

    /// Whether this is the left-edge sentinel.
    #[inline]
    pub fn is_left(&self) -> bool {
        *self == Timestamp::LEFT
    }
}

impl std::fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_left() {
            write!(f, "Timestamp(LEFT)")
        } else {
            write!(f, "Timestamp({}#{})", self.counter(), self.replica())
        }
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_left() {
            write!(f, "LEFT")
        } else {
            write!(f, "{}#{}", self.counter(), self.replica())
        }
    }
}
