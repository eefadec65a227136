//! Connecting to a collaboration server.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::info;

use tandem_core::{Op, Replica, ReplicaId};
use tandem_protocol::{Message, ProtocolError};

use crate::error::{TransportError, TransportResult};
use crate::socket::{share_peer, tie_to_socket, SharedPeer};

/// The socket type `connect_async` yields.
pub type ClientSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open a socket and wait for the server's `welcome`.
///
/// Returns the assigned replica id, the history to replay, and the socket
/// ready for [`tie_to_socket`]. Hosts that wrap the replica in an editor
/// reconciler use this directly; plain peers use [`connect`].
pub async fn handshake(url: &str) -> TransportResult<(ReplicaId, Vec<Op>, ClientSocket)> {
    let (mut ws, _) = connect_async(url).await?;
    loop {
        match ws.next().await {
            Some(Ok(WsMessage::Text(text))) => match Message::decode(&text)? {
                Message::Welcome { id, history } => {
                    info!(id, ops = history.len(), "joined session");
                    return Ok((id, history, ws));
                }
                other => {
                    return Err(ProtocolError::UnexpectedMessage {
                        expected: "welcome",
                        got: other.tag(),
                    }
                    .into())
                }
            },
            Some(Ok(WsMessage::Close(_))) | None => {
                return Err(TransportError::ClosedBeforeWelcome)
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => return Err(err.into()),
        }
    }
}

/// A live connection: the local replica plus the pump task keeping it tied
/// to the server.
pub struct Connection {
    pub peer: SharedPeer<Replica>,
    pub id: ReplicaId,
    link: JoinHandle<TransportResult<()>>,
}

impl Connection {
    /// Wait for the link to close and surface its outcome.
    pub async fn closed(self) -> TransportResult<()> {
        self.link.await?
    }

    /// Abort the link, dropping the subscription.
    pub fn disconnect(&self) {
        self.link.abort();
    }
}

/// Connect to a server, replay the welcome history into a fresh replica,
/// and tie it to the socket.
pub async fn connect(url: &str) -> TransportResult<Connection> {
    let (id, history, ws) = handshake(url).await?;
    let peer = share_peer(Replica::from_history(id, &history)?);
    let pump = Arc::clone(&peer);
    let link = tokio::spawn(async move { tie_to_socket(pump, ws).await });
    Ok(Connection { peer, id, link })
}
