//! The replicated growable array.
//!
//! A replica holds an arena of nodes linked in visible document order, with
//! slot 0 reserved for the left sentinel, plus an index from timestamp to
//! arena slot. Nodes are never freed: removal sets a tombstone flag so that
//! concurrent insertions anchored on the removed node still have a home.
//!
//! Two replicas that have integrated the same set of operations hold the
//! same node list and render the same visible text, whatever the delivery
//! order, because concurrent siblings at one anchor are placed in strictly
//! descending timestamp order.

use std::collections::HashMap;
use std::sync::Arc;

use crate::bus::{OpSink, SinkId};
use crate::error::{Error, Result};
use crate::op::Op;
use crate::timestamp::{ReplicaId, Timestamp};

/// Arena slot of the left sentinel.
const LEFT_SLOT: usize = 0;

/// A row/column position in the visible text.
///
/// Newline atoms end a row and reset the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowCol {
    pub row: usize,
    pub col: usize,
}

impl RowCol {
    /// The position one atom to the right of `self`.
    pub fn advanced(self, atom: char) -> RowCol {
        if atom == '\n' {
            RowCol { row: self.row + 1, col: 0 }
        } else {
            RowCol { row: self.row, col: self.col + 1 }
        }
    }
}

/// One slot in the node arena.
#[derive(Debug, Clone)]
struct Node {
    timestamp: Timestamp,
    /// `None` only on the left sentinel.
    atom: Option<char>,
    removed: bool,
    /// Arena slot of the successor, `None` at the tail.
    next: Option<usize>,
}

/// A single replica of the shared document.
pub struct Replica {
    id: ReplicaId,
    nodes: Vec<Node>,
    index: HashMap<Timestamp, usize>,
    next_counter: u64,
    subscribers: Vec<(SinkId, Arc<dyn OpSink>)>,
}

impl Replica {
    /// Create an empty replica.
    pub fn new(id: ReplicaId) -> Replica {
        let left = Node {
            timestamp: Timestamp::LEFT,
            atom: None,
            removed: false,
            next: None,
        };
        let mut index = HashMap::new();
        index.insert(Timestamp::LEFT, LEFT_SLOT);
        Replica {
            id,
            nodes: vec![left],
            index,
            next_counter: 0,
            subscribers: Vec::new(),
        }
    }

    /// Create a replica by replaying a history.
    ///
    /// Replay is deterministic and idempotent: duplicated ops are absorbed,
    /// so replaying the same history twice yields the same state as once.
    pub fn from_history(id: ReplicaId, history: &[Op]) -> Result<Replica> {
        let mut replica = Replica::new(id);
        for op in history {
            replica.integrate(*op)?;
        }
        Ok(replica)
    }

    /// This replica's id.
    pub fn id(&self) -> ReplicaId {
        self.id
    }

    /// Insert `atom` immediately to the right of the node `after`, mint a
    /// timestamp for it, and broadcast the op to every subscriber.
    ///
    /// The anchor must be present and not removed; anchoring a *local* edit
    /// on a tombstone is a caller bug (remote ops may do so freely).
    pub fn add_right(&mut self, after: Timestamp, atom: char) -> Result<Timestamp> {
        match self.index.get(&after) {
            None => {
                return Err(Error::PreconditionViolated(format!(
                    "addRight anchor {after} is not present"
                )))
            }
            Some(&slot) if self.nodes[slot].removed => {
                return Err(Error::PreconditionViolated(format!(
                    "addRight anchor {after} is removed"
                )))
            }
            Some(_) => {}
        }

        let w = Timestamp::pack(self.next_counter, self.id);
        let op = Op::add_right(after, w, atom);
        self.integrate(op)?;
        self.broadcast(None, &op);
        Ok(w)
    }

    /// Tombstone the node `t` and broadcast the op to every subscriber.
    pub fn remove(&mut self, t: Timestamp) -> Result<()> {
        match self.index.get(&t) {
            None => {
                return Err(Error::PreconditionViolated(format!(
                    "remove target {t} is not present"
                )))
            }
            Some(&slot) if self.nodes[slot].removed => {
                return Err(Error::PreconditionViolated(format!(
                    "remove target {t} is already removed"
                )))
            }
            Some(_) => {}
        }

        let op = Op::remove(t);
        self.integrate(op)?;
        self.broadcast(None, &op);
        Ok(())
    }

    /// Integrate an op received from a peer, then forward it to every
    /// subscriber except `sender`.
    ///
    /// Duplicates (an `addRight` already indexed, a `remove` already
    /// tombstoned) are absorbed without error and without re-broadcast,
    /// which is what keeps cyclic subscription topologies from looping.
    pub fn apply(&mut self, op: Op, sender: SinkId) -> Result<()> {
        if self.integrate(op)? {
            self.broadcast(Some(sender), &op);
        }
        Ok(())
    }

    /// Integrate an op into the local structure.
    ///
    /// Returns `Ok(true)` if the op changed state, `Ok(false)` if it was a
    /// duplicate.
    fn integrate(&mut self, op: Op) -> Result<bool> {
        match op {
            Op::AddRight { after, w } => {
                if self.index.contains_key(&w.timestamp) {
                    return Ok(false);
                }
                let mut prev = *self
                    .index
                    .get(&after)
                    .ok_or(Error::UnknownReference(after))?;
                // Siblings with larger timestamps stay to the left of w.
                while let Some(next) = self.nodes[prev].next {
                    if self.nodes[next].timestamp > w.timestamp {
                        prev = next;
                    } else {
                        break;
                    }
                }
                let slot = self.nodes.len();
                let next = self.nodes[prev].next;
                self.nodes.push(Node {
                    timestamp: w.timestamp,
                    atom: Some(w.atom),
                    removed: false,
                    next,
                });
                self.nodes[prev].next = Some(slot);
                self.index.insert(w.timestamp, slot);
                self.observe(w.timestamp);
                Ok(true)
            }
            Op::Remove { t } => {
                let slot = *self.index.get(&t).ok_or(Error::UnknownReference(t))?;
                if slot == LEFT_SLOT {
                    return Err(Error::PreconditionViolated(
                        "the left edge cannot be removed".into(),
                    ));
                }
                if self.nodes[slot].removed {
                    return Ok(false);
                }
                self.nodes[slot].removed = true;
                Ok(true)
            }
        }
    }

    /// Keep the local counter strictly ahead of every observed timestamp.
    fn observe(&mut self, t: Timestamp) {
        if t.counter() >= self.next_counter {
            self.next_counter = t.counter() + 1;
        }
    }

    /// An ordered sequence of ops that reconstructs this replica's state
    /// when replayed on a fresh replica.
    pub fn history(&self) -> Vec<Op> {
        let mut ops = Vec::new();
        let mut prev = Timestamp::LEFT;
        for node in self.list() {
            let atom = match node.atom {
                Some(atom) => atom,
                None => continue,
            };
            ops.push(Op::add_right(prev, node.timestamp, atom));
            if node.removed {
                ops.push(Op::remove(node.timestamp));
            }
            prev = node.timestamp;
        }
        ops
    }

    /// The visible text.
    pub fn text(&self) -> String {
        self.visible().map(|(_, atom)| atom).collect()
    }

    /// Number of visible atoms.
    pub fn len(&self) -> usize {
        self.visible().count()
    }

    /// Whether the visible text is empty.
    pub fn is_empty(&self) -> bool {
        self.visible().next().is_none()
    }

    /// Visible atoms with their timestamps, in document order.
    pub fn visible(&self) -> impl Iterator<Item = (Timestamp, char)> + '_ {
        self.list()
            .filter(|node| !node.removed)
            .filter_map(|node| node.atom.map(|atom| (node.timestamp, atom)))
    }

    /// Whether the node `t` is present (visible or tombstoned).
    pub fn contains(&self, t: Timestamp) -> bool {
        self.index.contains_key(&t)
    }

    /// The atom held by node `t` (`None` for the left sentinel).
    pub fn atom(&self, t: Timestamp) -> Result<Option<char>> {
        self.index
            .get(&t)
            .map(|&slot| self.nodes[slot].atom)
            .ok_or(Error::UnknownReference(t))
    }

    /// Whether the node `t` has been removed.
    pub fn is_removed(&self, t: Timestamp) -> Result<bool> {
        self.index
            .get(&t)
            .map(|&slot| self.nodes[slot].removed)
            .ok_or(Error::UnknownReference(t))
    }

    /// The position immediately to the left of node `t`.
    ///
    /// This is where the node's own atom renders, so it is the anchor for
    /// removing it from an editor.
    pub fn row_col_before(&self, t: Timestamp) -> Result<RowCol> {
        if t.is_left() {
            return Ok(RowCol::default());
        }
        if !self.index.contains_key(&t) {
            return Err(Error::UnknownReference(t));
        }
        let mut pos = RowCol::default();
        for node in self.list() {
            if node.timestamp == t {
                return Ok(pos);
            }
            if !node.removed {
                if let Some(atom) = node.atom {
                    pos = pos.advanced(atom);
                }
            }
        }
        Err(Error::UnknownReference(t))
    }

    /// The position where a new node timestamped `w` and anchored on
    /// `after` will render: just past the anchor, then past any siblings
    /// already present with larger timestamps.
    pub fn row_col_after(&self, after: Timestamp, w: Timestamp) -> Result<RowCol> {
        let anchor = *self
            .index
            .get(&after)
            .ok_or(Error::UnknownReference(after))?;
        let mut pos = RowCol::default();
        let mut cur = self.nodes[LEFT_SLOT].next;
        if anchor != LEFT_SLOT {
            while let Some(slot) = cur {
                let node = &self.nodes[slot];
                if !node.removed {
                    if let Some(atom) = node.atom {
                        pos = pos.advanced(atom);
                    }
                }
                cur = node.next;
                if slot == anchor {
                    break;
                }
            }
        }
        while let Some(slot) = cur {
            let node = &self.nodes[slot];
            if node.timestamp <= w {
                break;
            }
            if !node.removed {
                if let Some(atom) = node.atom {
                    pos = pos.advanced(atom);
                }
            }
            cur = node.next;
        }
        Ok(pos)
    }

    /// Subscribe a sink under the given id.
    pub fn on(&mut self, id: SinkId, sink: Arc<dyn OpSink>) {
        self.subscribers.push((id, sink));
    }

    /// Remove the subscription with the given id.
    pub fn off(&mut self, id: SinkId) {
        self.subscribers.retain(|(existing, _)| *existing != id);
    }

    /// Deliver `op` to every subscriber except `skip`.
    fn broadcast(&self, skip: Option<SinkId>, op: &Op) {
        for (id, sink) in &self.subscribers {
            if Some(*id) != skip {
                sink.deliver(op);
            }
        }
    }

    fn list(&self) -> List<'_> {
        List {
            nodes: &self.nodes,
            cur: self.nodes[LEFT_SLOT].next,
        }
    }
}

impl std::fmt::Debug for Replica {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replica")
            .field("id", &self.id)
            .field("text", &self.text())
            .field("nodes", &(self.nodes.len() - 1))
            .finish()
    }
}

/// Iterator over nodes in list order, sentinel excluded.
struct List<'a> {
    nodes: &'a [Node],
    cur: Option<usize>,
}

impl<'a> Iterator for List<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<&'a Node> {
        let slot = self.cur?;
        let node = &self.nodes[slot];
        self.cur = node.next;
        Some(node)
    }
}
