//! Tandem Core - replicated growable array and subscription bus
//!
//! This crate provides the data-structure heart of tandem:
//! - Totally-ordered timestamps combining a replica id and a monotone counter
//! - The RGA replica: insert-after, tombstone removal, history export/replay
//! - A subscription bus with deferred delivery and in-process ties
//!
//! Replicas that integrate the same set of operations converge to the same
//! visible text regardless of delivery order or duplication.

pub mod bus;
pub mod error;
pub mod op;
pub mod rga;
pub mod timestamp;

pub use bus::{share, tie, untie, ManualQueue, OpSink, Peer, SharedReplica, SinkId, Task, TaskQueue, TieHandle};
pub use error::{Error, Result};
pub use op::{Insertion, Op};
pub use rga::{Replica, RowCol};
pub use timestamp::{ReplicaId, Timestamp};
