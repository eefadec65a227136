//! Keeping a replica and a live editor in agreement.
//!
//! The reconciler owns both sides and one extra piece of state: the editor
//! contents as of the last successful sync. Everything else follows from a
//! single rule: before a remote op may touch either side, any discrepancy
//! between `last_text` and the editor's current value is attributed to user
//! input and folded into the replica. Diffing against the snapshot makes
//! every pending editor notification idempotent, so late delivery and
//! self-caused events need no bookkeeping of their own.

use tracing::debug;

use tandem_core::{Error, Op, Peer, Replica, Result, SinkId, Timestamp};

use crate::diff::{diff, PatchOp};
use crate::editor::{Editor, Span};

/// Binds an RGA replica to an asynchronously-notifying text editor.
pub struct Reconciler<E: Editor> {
    replica: Replica,
    editor: E,
    /// Editor contents as of the last successful sync.
    last_text: String,
}

impl<E: Editor> Reconciler<E> {
    /// Take ownership of a replica and an editor, pushing the replica's
    /// text into the editor as its full value.
    pub fn new(replica: Replica, mut editor: E) -> Reconciler<E> {
        let last_text = replica.text();
        editor.set_value(&last_text);
        Reconciler {
            replica,
            editor,
            last_text,
        }
    }

    /// The editor side, for the host that renders it.
    pub fn editor(&self) -> &E {
        &self.editor
    }

    /// Mutable editor access, for the host delivering user input.
    pub fn editor_mut(&mut self) -> &mut E {
        &mut self.editor
    }

    /// Fold any user edits sitting in the editor into the replica.
    ///
    /// Called by the host whenever the editor fires `change`, and by
    /// [`on_remote_op`](Reconciler::on_remote_op) before integrating. Safe
    /// to call at any time: if the editor matches the snapshot this is a
    /// no-op, which is exactly what absorbs stale change events for edits
    /// the reconciler itself made.
    pub fn take_user_edits(&mut self) -> Result<()> {
        let current = self.editor.value();
        if current == self.last_text {
            return Ok(());
        }
        self.check_synced()?;

        let patch = diff(&self.last_text, &current);
        debug!(steps = patch.ops().len(), "translating user edits");

        // Walk the visible nodes in step with the patch cursor.
        let visible: Vec<Timestamp> = self.replica.visible().map(|(t, _)| t).collect();
        let mut cursor = 0usize;
        let mut anchor = Timestamp::LEFT;
        for op in patch.ops() {
            match op {
                PatchOp::Retain(n) => {
                    cursor += n;
                    anchor = visible[cursor - 1];
                }
                PatchOp::Delete(n) => {
                    // Tombstoning keeps the anchor chain intact, so the
                    // anchor does not move.
                    for t in &visible[cursor..cursor + n] {
                        self.replica.remove(*t)?;
                    }
                    cursor += n;
                }
                PatchOp::Insert(text) => {
                    for ch in text.chars() {
                        anchor = self.replica.add_right(anchor, ch)?;
                    }
                }
            }
        }

        self.last_text = current;
        self.check_synced()
    }

    /// Integrate an op arriving from a peer or the transport.
    ///
    /// User edits are drained *first*: a discrepancy between the snapshot
    /// and the editor must be attributed to user input before the remote op
    /// disturbs either side. The editor mutation is computed from the
    /// replica (not from the editor's own geometry) and applied before the
    /// op lands in the replica, so both sides move together.
    pub fn on_remote_op(&mut self, sender: SinkId, op: Op) -> Result<()> {
        self.take_user_edits()?;

        match op {
            Op::AddRight { after, w } => {
                if !self.replica.contains(w.timestamp) {
                    let pos = self.replica.row_col_after(after, w.timestamp)?;
                    debug!(t = %w.timestamp, row = pos.row, col = pos.col, "remote insert");
                    self.editor.insert(pos, &w.atom.to_string());
                    self.replica.apply(op, sender)?;
                }
            }
            Op::Remove { t } => {
                if !self.replica.is_removed(t)? {
                    let start = self.replica.row_col_before(t)?;
                    let atom = self.replica.atom(t)?.ok_or_else(|| {
                        Error::PreconditionViolated("the left edge cannot be removed".into())
                    })?;
                    debug!(t = %t, row = start.row, col = start.col, "remote remove");
                    self.editor.remove(Span {
                        start,
                        end: start.advanced(atom),
                    });
                    self.replica.apply(op, sender)?;
                }
            }
        }

        self.last_text = self.editor.value();
        self.check_synced()
    }

    /// The reconciliation invariant: outside a step, snapshot, editor and
    /// replica all agree.
    fn check_synced(&self) -> Result<()> {
        let replica = self.replica.text();
        if self.last_text == replica {
            Ok(())
        } else {
            Err(Error::SyncDrift {
                editor: self.last_text.clone(),
                replica,
            })
        }
    }
}

impl<E: Editor + Send> Peer for Reconciler<E> {
    fn receive(&mut self, sender: SinkId, op: Op) -> Result<()> {
        self.on_remote_op(sender, op)
    }

    fn replica(&self) -> &Replica {
        &self.replica
    }

    fn replica_mut(&mut self) -> &mut Replica {
        &mut self.replica
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::TextBuffer;
    use std::sync::Arc;
    use parking_lot::Mutex;
    use tandem_core::{OpSink, RowCol};

    /// Subscriber that records every broadcast op.
    #[derive(Default)]
    struct Recording(Mutex<Vec<Op>>);

    impl OpSink for Recording {
        fn deliver(&self, op: &Op) {
            self.0.lock().push(*op);
        }
    }

    fn sender() -> SinkId {
        SinkId::fresh()
    }

    fn reconciler() -> Reconciler<TextBuffer> {
        Reconciler::new(Replica::new(0), TextBuffer::new())
    }

    /// Simulate the user typing `text` at `pos`, change event delivered
    /// immediately.
    fn user_types(r: &mut Reconciler<TextBuffer>, pos: RowCol, text: &str) {
        r.editor_mut().insert(pos, text);
        r.take_user_edits().unwrap();
    }

    fn pos(row: usize, col: usize) -> RowCol {
        RowCol { row, col }
    }

    #[test]
    fn new_pushes_replica_text_into_editor() {
        let mut replica = Replica::new(0);
        let mut anchor = Timestamp::LEFT;
        for ch in "seed".chars() {
            anchor = replica.add_right(anchor, ch).unwrap();
        }
        let r = Reconciler::new(replica, TextBuffer::new());
        assert_eq!(r.editor().value(), "seed");
    }

    #[test]
    fn user_typing_reaches_replica_and_subscribers() {
        let mut r = reconciler();
        let recording = Arc::new(Recording::default());
        r.replica_mut().on(SinkId::fresh(), recording.clone());

        user_types(&mut r, pos(0, 0), "hi");
        assert_eq!(r.replica().text(), "hi");
        assert_eq!(recording.0.lock().len(), 2);
    }

    #[test]
    fn user_deletion_reaches_replica() {
        let mut r = reconciler();
        user_types(&mut r, pos(0, 0), "hello");
        r.editor_mut().remove(Span { start: pos(0, 1), end: pos(0, 3) });
        r.take_user_edits().unwrap();
        assert_eq!(r.replica().text(), "hlo");
        assert_eq!(r.editor().value(), "hlo");
    }

    #[test]
    fn user_replacement_across_lines() {
        let mut r = reconciler();
        user_types(&mut r, pos(0, 0), "one\ntwo\nthree");
        r.editor_mut().remove(Span { start: pos(0, 1), end: pos(2, 1) });
        r.editor_mut().insert(pos(0, 1), "k\nmid");
        r.take_user_edits().unwrap();
        assert_eq!(r.replica().text(), r.editor().value());
        assert_eq!(r.editor().value(), "ok\nmidhree");
    }

    #[test]
    fn stale_change_event_is_a_no_op() {
        let mut r = reconciler();
        user_types(&mut r, pos(0, 0), "abc");
        let before = r.replica().history();
        // The editor's queued event fires again with nothing new.
        r.take_user_edits().unwrap();
        r.take_user_edits().unwrap();
        assert_eq!(r.replica().history(), before);
    }

    #[test]
    fn remote_insert_lands_in_editor() {
        let mut r = reconciler();
        user_types(&mut r, pos(0, 0), "ac");
        let (t_a, _) = r.replica().visible().next().unwrap();

        let w = Timestamp::pack(50, 1);
        r.on_remote_op(sender(), Op::add_right(t_a, w, 'b')).unwrap();
        assert_eq!(r.editor().value(), "abc");
        assert_eq!(r.replica().text(), "abc");
    }

    #[test]
    fn remote_remove_lands_in_editor() {
        let mut r = reconciler();
        user_types(&mut r, pos(0, 0), "abc");
        let (t_b, _) = r.replica().visible().nth(1).unwrap();

        r.on_remote_op(sender(), Op::remove(t_b)).unwrap();
        assert_eq!(r.editor().value(), "ac");
        assert_eq!(r.replica().text(), "ac");
    }

    #[test]
    fn remote_remove_of_newline_merges_rows() {
        let mut r = reconciler();
        user_types(&mut r, pos(0, 0), "ab\ncd");
        let (t_nl, _) = r.replica().visible().nth(2).unwrap();

        r.on_remote_op(sender(), Op::remove(t_nl)).unwrap();
        assert_eq!(r.editor().value(), "abcd");
    }

    #[test]
    fn duplicate_remote_ops_are_no_ops() {
        let mut r = reconciler();
        user_types(&mut r, pos(0, 0), "xy");
        let (t_x, _) = r.replica().visible().next().unwrap();

        let w = Timestamp::pack(40, 2);
        let insert = Op::add_right(t_x, w, 'q');
        r.on_remote_op(sender(), insert).unwrap();
        r.on_remote_op(sender(), insert).unwrap();
        assert_eq!(r.editor().value(), "xqy");

        let remove = Op::remove(w);
        r.on_remote_op(sender(), remove).unwrap();
        r.on_remote_op(sender(), remove).unwrap();
        assert_eq!(r.editor().value(), "xy");
    }

    #[test]
    fn late_editor_event_racing_remote_insert() {
        // The replica and editor hold "HOME RUN". The user deletes the
        // space, but the editor's change event is still sitting in its
        // queue when a remote op inserts '*' after the space's
        // predecessor.
        let mut r = reconciler();
        user_types(&mut r, pos(0, 0), "HOME RUN");

        let (t_e, _) = r.replica().visible().nth(3).unwrap();
        r.editor_mut().remove(Span { start: pos(0, 4), end: pos(0, 5) });

        // Only the remote op is delivered; the user edit is drained first,
        // then the insert is placed where the RGA says it belongs.
        let w = Timestamp::pack(100, 1);
        r.on_remote_op(sender(), Op::add_right(t_e, w, '*')).unwrap();
        assert_eq!(r.replica().text(), "HOME*RUN");
        assert_eq!(r.editor().value(), "HOME*RUN");

        // The stale editor event finally fires: nothing left to do.
        r.take_user_edits().unwrap();
        assert_eq!(r.replica().text(), "HOME*RUN");
        assert_eq!(r.editor().value(), "HOME*RUN");
    }

    #[test]
    fn remote_op_with_unknown_anchor_surfaces() {
        let mut r = reconciler();
        let err = r
            .on_remote_op(
                sender(),
                Op::add_right(Timestamp::pack(9, 9), Timestamp::pack(10, 9), 'x'),
            )
            .unwrap_err();
        assert!(matches!(err, Error::UnknownReference(_)));
    }
}
