//! The collaboration server.
//!
//! One long-lived central replica with id 0. Each connecting client gets
//! the next positive replica id and a `welcome` carrying the history, then
//! the connection is tied to the central replica: every op a client sends
//! is integrated centrally and fanned out to every other client.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tracing::{error, info};

use tandem_core::{Error, Replica, ReplicaId, Result};
use tandem_protocol::Message;

use crate::error::TransportResult;
use crate::socket::{share_peer, SharedPeer, SocketLink};

/// WebSocket server hosting a single shared document.
pub struct CollabServer {
    replica: SharedPeer<Replica>,
    addr: SocketAddr,
    next_client: AtomicU16,
}

impl CollabServer {
    /// Create a server with an empty central replica.
    pub fn new(addr: SocketAddr) -> CollabServer {
        CollabServer {
            replica: share_peer(Replica::new(0)),
            addr,
            next_client: AtomicU16::new(1),
        }
    }

    /// The central replica, e.g. for seeding or inspection.
    pub fn replica(&self) -> SharedPeer<Replica> {
        SharedPeer::clone(&self.replica)
    }

    /// Bind the configured address and serve until the task is dropped.
    pub async fn run(&self) -> TransportResult<()> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener.
    pub async fn serve(&self, listener: TcpListener) -> TransportResult<()> {
        info!(addr = %listener.local_addr()?, "tandem server listening");

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let id = match self.assign_id() {
                        Ok(id) => id,
                        Err(err) => {
                            error!(error = %err, "refusing connection");
                            continue;
                        }
                    };
                    let replica = SharedPeer::clone(&self.replica);
                    tokio::spawn(async move {
                        if let Err(err) =
                            Self::handle_connection(stream, peer_addr, id, replica).await
                        {
                            error!(client = id, error = %err, "connection error");
                        }
                    });
                }
                Err(err) => {
                    error!(error = %err, "failed to accept connection");
                }
            }
        }
    }

    fn assign_id(&self) -> Result<ReplicaId> {
        let id = self.next_client.fetch_add(1, Ordering::Relaxed);
        // Wrapping back to the server's own id means 2^16 - 1 clients have
        // already connected.
        if id == 0 {
            return Err(Error::IdSpaceExhausted);
        }
        Ok(id)
    }

    async fn handle_connection(
        stream: TcpStream,
        peer_addr: SocketAddr,
        id: ReplicaId,
        replica: SharedPeer<Replica>,
    ) -> TransportResult<()> {
        let ws = accept_async(stream).await?;
        let link = SocketLink::attach(&replica, |central: &Replica| {
            vec![Message::Welcome {
                id,
                history: central.history(),
            }]
        })?;
        info!(client = id, addr = %peer_addr, "client connected");

        let result = link.run(replica, ws).await;
        info!(client = id, "client disconnected");
        result
    }
}
