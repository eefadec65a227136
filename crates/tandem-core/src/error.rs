//! Error types for tandem core

use crate::timestamp::Timestamp;
use thiserror::Error;

/// Core error types
#[derive(Error, Debug)]
pub enum Error {
    /// A local edit named an anchor or target that is missing or removed.
    /// This is a caller bug, reported synchronously.
    #[error("precondition violated: {0}")]
    PreconditionViolated(String),

    /// A downstream op referenced a timestamp this replica has never seen.
    /// The causal dependency was lost in transit; integration is aborted.
    #[error("unknown reference: {0}")]
    UnknownReference(Timestamp),

    /// The editor and the replica disagree outside of a reconciliation
    /// step. Fatal for the session: the reconciler or the editor handle is
    /// broken.
    #[error("sync drift: editor holds {editor:?}, replica holds {replica:?}")]
    SyncDrift { editor: String, replica: String },

    /// The server ran out of replica ids to assign.
    #[error("replica id space exhausted")]
    IdSpaceExhausted,
}

/// Result type alias for tandem core operations
pub type Result<T> = std::result::Result<T, Error>;
