//! Stream (TCP) ingestion.
//!
//! # Responsibilities
//! - Run the accept loop until the acceptor signal fires
//! - Spawn one handling routine per connection, registered for cancellation
//! - Per message: decode, broadcast, reply `[TCP] <text>`, honour `exit`/`quit`

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::hub::{decode_payload, is_exit_command, Envelope, Hub, Protocol};
use crate::lifecycle::ShutdownSignal;
use crate::net::connection::{ConnectionGuard, ConnectionRegistry};
use crate::net::listener::{ConnectionPermit, Listener};
use crate::observability::metrics;

/// Why a connection routine ended.
#[derive(Debug)]
pub enum ConnectionEnd {
    /// Peer closed its side (read returned 0 bytes).
    PeerClosed,
    /// Peer sent `exit` or `quit`.
    ExitRequested,
    /// Shutdown signal observed at a suspension point.
    Cancelled,
    /// Read or write failed.
    Fault(std::io::Error),
}

/// Bound stream socket plus everything its connections need.
pub struct StreamListener {
    listener: Listener,
    registry: ConnectionRegistry,
    hub: Hub,
    read_buffer_size: usize,
}

impl StreamListener {
    pub fn new(listener: Listener, registry: ConnectionRegistry, hub: Hub, read_buffer_size: usize) -> Self {
        Self {
            listener,
            registry,
            hub,
            read_buffer_size: read_buffer_size.max(1),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Accept connections until `acceptor` fires, then close the listening socket.
    ///
    /// Connection routines observe `connections`, which is separate so the
    /// controller can cancel them before it stops accepting.
    pub async fn run(self, mut acceptor: ShutdownSignal, connections: ShutdownSignal) {
        loop {
            let accepted = tokio::select! {
                biased;
                _ = acceptor.recv() => break,
                res = self.listener.accept() => res,
            };

            match accepted {
                Ok((stream, peer, permit)) => {
                    let guard = self.registry.register(peer);
                    let id = guard.id();
                    tracing::info!(peer_addr = %peer, connection_id = %id, "Stream connection opened");

                    let task = tokio::spawn(handle_connection(
                        stream,
                        peer,
                        guard,
                        permit,
                        self.hub.clone(),
                        self.read_buffer_size,
                        connections.clone(),
                    ));
                    self.registry.attach(id, task.abort_handle());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    // Avoid spinning on persistent errors such as EMFILE.
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                }
            }
        }

        tracing::info!("Stream listener stopped accepting");
    }
}

/// Read/broadcast/reply loop for one connection.
pub async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    guard: ConnectionGuard,
    _permit: ConnectionPermit,
    hub: Hub,
    read_buffer_size: usize,
    mut shutdown: ShutdownSignal,
) -> ConnectionEnd {
    let connection_id = guard.id();
    let mut buf = vec![0u8; read_buffer_size];

    let end = loop {
        let n = tokio::select! {
            biased;
            _ = shutdown.recv() => break ConnectionEnd::Cancelled,
            res = stream.read(&mut buf) => match res {
                Ok(0) => break ConnectionEnd::PeerClosed,
                Ok(n) => n,
                Err(e) => break ConnectionEnd::Fault(e),
            },
        };

        let text = decode_payload(&buf[..n]);
        tracing::info!(
            peer_addr = %peer,
            connection_id = %connection_id,
            protocol = %Protocol::Stream,
            message = %text,
            "Message received"
        );
        metrics::record_message(Protocol::Stream);
        hub.broadcast(&Envelope::new(Protocol::Stream, peer, text.as_str()));

        let reply = Protocol::Stream.reply(&text);
        let write = async {
            stream.write_all(reply.as_bytes()).await?;
            stream.flush().await
        };
        tokio::select! {
            biased;
            _ = shutdown.recv() => break ConnectionEnd::Cancelled,
            res = write => if let Err(e) = res {
                metrics::record_reply_failure(Protocol::Stream);
                break ConnectionEnd::Fault(e);
            },
        }

        if is_exit_command(&text) {
            break ConnectionEnd::ExitRequested;
        }
    };

    match &end {
        ConnectionEnd::PeerClosed => {
            tracing::info!(peer_addr = %peer, connection_id = %connection_id, "Connection closed by peer")
        }
        ConnectionEnd::ExitRequested => {
            tracing::info!(peer_addr = %peer, connection_id = %connection_id, "Peer requested exit")
        }
        ConnectionEnd::Cancelled => {
            tracing::info!(peer_addr = %peer, connection_id = %connection_id, "Connection cancelled by shutdown")
        }
        ConnectionEnd::Fault(e) => {
            tracing::warn!(peer_addr = %peer, connection_id = %connection_id, error = %e, "Connection fault")
        }
    }

    let _ = stream.shutdown().await;
    drop(guard);
    end
}
