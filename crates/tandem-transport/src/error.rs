//! Transport error types

use thiserror::Error;

/// Transport-specific errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] tandem_protocol::ProtocolError),

    #[error("core error: {0}")]
    Core(#[from] tandem_core::Error),

    #[error("connection closed before the welcome arrived")]
    ClosedBeforeWelcome,

    #[error("link task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;
