//! Tandem wire protocol
//!
//! JSON messages exchanged over a collaboration socket, one per text frame.
//!
//! ## Message format
//! ```text
//! {"tag":"welcome","id":3,"history":[...]}          # server -> client, once
//! {"tag":"downstream","op":{"type":"addRight",...}} # either direction
//! {"tag":"downstream","op":{"type":"remove",...}}   # either direction
//! ```
//!
//! `welcome` hands a newly-connected client its assigned replica id and the
//! full operation history; every op after that travels as a `downstream`.

pub mod error;
pub mod message;

pub use error::{ProtocolError, ProtocolResult};
pub use message::Message;
