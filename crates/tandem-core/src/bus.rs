//! Subscription bus: sinks, deferred delivery, and in-process ties.
//!
//! A replica broadcasts every freshly applied op to its subscribers. A sink
//! must only *enqueue*: delivery runs while the replica is borrowed, so a
//! sink that called back into it synchronously would interleave with the
//! edit being applied. In-process links therefore route through a
//! [`TaskQueue`]: broadcasting schedules the far side's `apply` to run
//! later, after the current task returns. Tests drive a [`ManualQueue`] by
//! hand; the network transport plays the same role with channels.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::op::Op;
use crate::rga::Replica;

/// Identity of one subscription, process-unique.
///
/// The id doubles as the sender attribution when an op is applied: the
/// replica skips the named sink while re-broadcasting, which is what stops
/// a delivered op from echoing straight back over the link it came in on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(u64);

impl SinkId {
    /// Mint a fresh, process-unique sink id.
    pub fn fresh() -> SinkId {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        SinkId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A subscriber receiving ops applied to a replica.
///
/// `deliver` is called with the replica borrowed; implementations must
/// enqueue and return, never re-enter the replica.
pub trait OpSink: Send + Sync {
    fn deliver(&self, op: &Op);
}

/// The inbound side of a link: anything that can integrate downstream ops.
///
/// A bare [`Replica`] applies ops directly; an editor reconciler drains
/// pending user edits first. Transport adapters only see this trait.
pub trait Peer: Send {
    /// Integrate a downstream op attributed to `sender`.
    fn receive(&mut self, sender: SinkId, op: Op) -> Result<()>;

    /// The replica behind this peer.
    fn replica(&self) -> &Replica;

    /// Mutable access to the replica, for subscription management.
    fn replica_mut(&mut self) -> &mut Replica;
}

impl Peer for Replica {
    fn receive(&mut self, sender: SinkId, op: Op) -> Result<()> {
        self.apply(op, sender)
    }

    fn replica(&self) -> &Replica {
        self
    }

    fn replica_mut(&mut self) -> &mut Replica {
        self
    }
}

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() -> Result<()> + Send>;

/// Deferred execution: runs each task exactly once, in FIFO order, no
/// sooner than after the current task returns.
pub trait TaskQueue: Send + Sync {
    fn schedule(&self, task: Task);
}

/// A task queue drained on demand, for tests and single-threaded hosts.
#[derive(Default)]
pub struct ManualQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl ManualQueue {
    pub fn new() -> Arc<ManualQueue> {
        Arc::new(ManualQueue::default())
    }

    /// Run queued tasks until none remain, including tasks scheduled by the
    /// tasks themselves. Stops at the first error.
    pub fn drain(&self) -> Result<()> {
        loop {
            let task = self.tasks.lock().pop_front();
            match task {
                Some(task) => task()?,
                None => return Ok(()),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

impl TaskQueue for ManualQueue {
    fn schedule(&self, task: Task) {
        self.tasks.lock().push_back(task);
    }
}

/// A replica shared between links.
pub type SharedReplica = Arc<Mutex<Replica>>;

/// Wrap a replica for sharing.
pub fn share(replica: Replica) -> SharedReplica {
    Arc::new(Mutex::new(replica))
}

/// A sink forwarding ops into another replica through a task queue.
struct QueueSink {
    target: SharedReplica,
    /// Sink id the delivered op is attributed to on the target, i.e. the
    /// reverse direction of this link.
    link: SinkId,
    queue: Arc<dyn TaskQueue>,
}

impl OpSink for QueueSink {
    fn deliver(&self, op: &Op) {
        let target = Arc::clone(&self.target);
        let link = self.link;
        let op = *op;
        self.queue
            .schedule(Box::new(move || target.lock().apply(op, link)));
    }
}

/// The two subscriptions created by [`tie`], for later [`untie`].
#[derive(Debug, Clone, Copy)]
pub struct TieHandle {
    pub on_a: SinkId,
    pub on_b: SinkId,
}

/// Symmetrically subscribe two replicas to each other through `queue`.
///
/// Both replicas must hold identical histories beforehand; anything else
/// would leave the pair permanently diverged.
pub fn tie(a: &SharedReplica, b: &SharedReplica, queue: &Arc<dyn TaskQueue>) -> Result<TieHandle> {
    let on_a = SinkId::fresh();
    let on_b = SinkId::fresh();

    let mut guard_a = a.lock();
    let mut guard_b = b.lock();
    if guard_a.history() != guard_b.history() {
        return Err(Error::PreconditionViolated(
            "tie requires identical histories".into(),
        ));
    }
    guard_a.on(
        on_a,
        Arc::new(QueueSink {
            target: Arc::clone(b),
            link: on_b,
            queue: Arc::clone(queue),
        }),
    );
    guard_b.on(
        on_b,
        Arc::new(QueueSink {
            target: Arc::clone(a),
            link: on_a,
            queue: Arc::clone(queue),
        }),
    );
    Ok(TieHandle { on_a, on_b })
}

/// Remove the subscriptions created by a [`tie`].
pub fn untie(a: &SharedReplica, b: &SharedReplica, handle: TieHandle) {
    a.lock().off(handle.on_a);
    b.lock().off(handle.on_b);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timestamp::Timestamp;

    fn tied_pair() -> (SharedReplica, SharedReplica, Arc<ManualQueue>) {
        let queue = ManualQueue::new();
        let a = share(Replica::new(0));
        let b = share(Replica::new(1));
        let generic: Arc<dyn TaskQueue> = queue.clone();
        tie(&a, &b, &generic).unwrap();
        (a, b, queue)
    }

    #[test]
    fn ops_flow_both_ways() {
        let (a, b, queue) = tied_pair();

        let t = a.lock().add_right(Timestamp::LEFT, 'x').unwrap();
        queue.drain().unwrap();
        assert_eq!(b.lock().text(), "x");

        b.lock().add_right(t, 'y').unwrap();
        queue.drain().unwrap();
        assert_eq!(a.lock().text(), "xy");
        assert_eq!(b.lock().text(), "xy");
    }

    #[test]
    fn delivery_is_deferred_until_drain() {
        let (a, b, queue) = tied_pair();
        a.lock().add_right(Timestamp::LEFT, 'x').unwrap();
        assert_eq!(b.lock().text(), "");
        assert!(!queue.is_empty());
        queue.drain().unwrap();
        assert_eq!(b.lock().text(), "x");
    }

    #[test]
    fn tie_requires_identical_histories() {
        let queue: Arc<dyn TaskQueue> = ManualQueue::new();
        let a = share(Replica::new(0));
        let b = share(Replica::new(1));
        b.lock().add_right(Timestamp::LEFT, 'x').unwrap();
        assert!(matches!(
            tie(&a, &b, &queue),
            Err(Error::PreconditionViolated(_))
        ));
    }

    #[test]
    fn concurrent_removes_of_same_node_converge() {
        let (a, b, queue) = tied_pair();
        let mut last = Timestamp::LEFT;
        for ch in "grin".chars() {
            last = a.lock().add_right(last, ch).unwrap();
        }
        queue.drain().unwrap();

        // Both sides remove the final 'n' before either delivery arrives.
        a.lock().remove(last).unwrap();
        b.lock().remove(last).unwrap();
        queue.drain().unwrap();

        assert_eq!(a.lock().text(), "gri");
        assert_eq!(b.lock().text(), "gri");
    }

    #[test]
    fn concurrent_inserts_at_left_converge_descending() {
        let (a, b, queue) = tied_pair();
        a.lock().add_right(Timestamp::LEFT, 'X').unwrap();
        b.lock().add_right(Timestamp::LEFT, 'Y').unwrap();
        queue.drain().unwrap();

        // id 1's timestamp outranks id 0's at the same counter.
        assert_eq!(a.lock().text(), "YX");
        assert_eq!(b.lock().text(), "YX");
    }

    #[test]
    fn chain_of_ties_propagates_transitively() {
        let queue = ManualQueue::new();
        let generic: Arc<dyn TaskQueue> = queue.clone();
        let a = share(Replica::new(0));
        let b = share(Replica::new(1));
        let c = share(Replica::new(2));
        tie(&a, &b, &generic).unwrap();
        tie(&b, &c, &generic).unwrap();

        a.lock().add_right(Timestamp::LEFT, 'q').unwrap();
        queue.drain().unwrap();
        assert_eq!(c.lock().text(), "q");
    }

    #[test]
    fn cyclic_ties_terminate() {
        // Duplicates are absorbed without re-broadcast, so a cycle drains.
        let queue = ManualQueue::new();
        let generic: Arc<dyn TaskQueue> = queue.clone();
        let a = share(Replica::new(0));
        let b = share(Replica::new(1));
        let c = share(Replica::new(2));
        tie(&a, &b, &generic).unwrap();
        tie(&b, &c, &generic).unwrap();
        tie(&c, &a, &generic).unwrap();

        a.lock().add_right(Timestamp::LEFT, 'q').unwrap();
        queue.drain().unwrap();

        assert_eq!(a.lock().text(), "q");
        assert_eq!(b.lock().text(), "q");
        assert_eq!(c.lock().text(), "q");
        assert!(queue.is_empty());
    }

    #[test]
    fn untie_stops_propagation() {
        let queue = ManualQueue::new();
        let generic: Arc<dyn TaskQueue> = queue.clone();
        let a = share(Replica::new(0));
        let b = share(Replica::new(1));
        let handle = tie(&a, &b, &generic).unwrap();

        untie(&a, &b, handle);
        a.lock().add_right(Timestamp::LEFT, 'x').unwrap();
        queue.drain().unwrap();
        assert_eq!(b.lock().text(), "");
    }
}
