//! Messages travelling on a collaboration socket.

use serde::{Deserialize, Serialize};
use tandem_core::{Op, ReplicaId};

use crate::error::ProtocolResult;

/// One wire message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "lowercase")]
pub enum Message {
    /// An operation to integrate, in either direction.
    Downstream { op: Op },

    /// Sent by the server to each newly-connected client: the client's
    /// assigned replica id and the history to replay before tying in.
    Welcome { id: ReplicaId, history: Vec<Op> },
}

impl Message {
    /// Encode as a JSON text frame.
    pub fn encode(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a JSON text frame.
    pub fn decode(text: &str) -> ProtocolResult<Message> {
        Ok(serde_json::from_str(text)?)
    }

    /// Tag name, for diagnostics.
    pub fn tag(&self) -> &'static str {
        match self {
            Message::Downstream { .. } => "downstream",
            Message::Welcome { .. } => "welcome",
        }
    }
}
