//! Tandem Sync - diff engine and editor reconciliation
//!
//! This crate keeps an RGA replica in lockstep with a live text editor:
//! - A Hunt–McIlroy diff producing retain/delete/insert patches
//! - The editor handle trait plus an in-memory reference implementation
//! - The reconciler that folds asynchronous user edits and remote ops
//!   together without racing
//!
//! Errors are the core vocabulary (`tandem_core::Error`); drift between
//! editor and replica surfaces as `Error::SyncDrift` and is fatal for the
//! session.

pub mod diff;
pub mod editor;
pub mod reconcile;

pub use diff::{diff, Patch, PatchOp};
pub use editor::{Editor, Span, TextBuffer};
pub use reconcile::Reconciler;
