//! Bridging a peer to a WebSocket.
//!
//! The outbound half is a subscriber on the peer's replica: every op the
//! replica broadcasts is serialized and pushed onto an unbounded channel,
//! which a pump task forwards into the socket. Delivery therefore never
//! re-enters the replica, the same contract the in-process queue sinks
//! honour. The inbound half decodes `downstream` frames and hands them to
//! the peer with the link marked as sender, so nothing echoes back over
//! the socket it arrived on. On disconnect the subscription is dropped;
//! in-flight ops are not cancelled and unacked ops are simply lost for
//! that link.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::warn;

use tandem_core::{Op, OpSink, Peer, SinkId};
use tandem_protocol::Message;

use crate::error::TransportResult;

/// A peer shared between the socket tasks and the host.
pub type SharedPeer<P> = Arc<Mutex<P>>;

/// Wrap a peer for sharing.
pub fn share_peer<P: Peer>(peer: P) -> SharedPeer<P> {
    Arc::new(Mutex::new(peer))
}

/// Subscriber that serializes ops onto the socket's outbound queue.
struct SocketSink {
    tx: mpsc::UnboundedSender<WsMessage>,
}

impl OpSink for SocketSink {
    fn deliver(&self, op: &Op) {
        match (Message::Downstream { op: *op }).encode() {
            // A send failure means the link is shutting down; the op is
            // lost for this peer, which reconnection semantics own.
            Ok(text) => {
                let _ = self.tx.send(WsMessage::Text(text));
            }
            Err(err) => warn!(error = %err, "failed to encode downstream op"),
        }
    }
}

/// One attached socket link: the subscription plus its outbound queue.
pub struct SocketLink {
    link: SinkId,
    rx: mpsc::UnboundedReceiver<WsMessage>,
}

impl SocketLink {
    /// Subscribe `peer` to a fresh outbound queue.
    ///
    /// `greeting` runs under the peer lock and its messages are queued
    /// ahead of any broadcast op, which is how a server guarantees the
    /// welcome precedes every downstream frame on the wire.
    pub fn attach<P, G>(peer: &SharedPeer<P>, greeting: G) -> TransportResult<SocketLink>
    where
        P: Peer,
        G: FnOnce(&P) -> Vec<Message>,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let link = SinkId::fresh();
        let mut guard = peer.lock();
        for message in greeting(&guard) {
            let _ = tx.send(WsMessage::Text(message.encode()?));
        }
        guard.replica_mut().on(link, Arc::new(SocketSink { tx }));
        Ok(SocketLink { link, rx })
    }

    /// Pump the link until the connection closes or a fatal error occurs,
    /// then unsubscribe.
    pub async fn run<P, S>(
        mut self,
        peer: SharedPeer<P>,
        ws: WebSocketStream<S>,
    ) -> TransportResult<()>
    where
        P: Peer,
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut sink, mut stream) = ws.split();
        let result = loop {
            tokio::select! {
                frame = self.rx.recv() => match frame {
                    Some(frame) => {
                        if let Err(err) = sink.send(frame).await {
                            break Err(err.into());
                        }
                    }
                    None => break Ok(()),
                },
                inbound = stream.next() => match inbound {
                    Some(Ok(WsMessage::Text(text))) => match Message::decode(&text) {
                        Ok(Message::Downstream { op }) => {
                            if let Err(err) = peer.lock().receive(self.link, op) {
                                break Err(err.into());
                            }
                        }
                        Ok(other) => {
                            warn!(tag = other.tag(), "unexpected message mid-session");
                        }
                        Err(err) => break Err(err.into()),
                    },
                    Some(Ok(WsMessage::Close(_))) | None => break Ok(()),
                    Some(Ok(_)) => {}
                    Some(Err(err)) => break Err(err.into()),
                },
            }
        };
        peer.lock().replica_mut().off(self.link);
        result
    }
}

/// Bridge `peer` to `ws` until the connection closes.
///
/// Ops applied to the peer's replica flow out as `downstream` frames;
/// inbound frames are integrated with the socket marked as sender.
pub async fn tie_to_socket<P, S>(peer: SharedPeer<P>, ws: WebSocketStream<S>) -> TransportResult<()>
where
    P: Peer,
    S: AsyncRead + AsyncWrite + Unpin,
{
    let link = SocketLink::attach(&peer, |_| Vec::new())?;
    link.run(peer, ws).await
}
