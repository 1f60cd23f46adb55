//! Datagram (UDP) ingestion.
//!
//! Stateless per packet: every datagram is decoded, broadcast, and answered
//! with `[UDP] <text>` to its origin. A bad packet or a failed reply is
//! logged and the receive loop carries on.

use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::config::DatagramConfig;
use crate::hub::{decode_payload, Envelope, Hub, Protocol};
use crate::lifecycle::ShutdownSignal;
use crate::net::listener::{parse_address, ListenerError};
use crate::observability::metrics;

/// Bound datagram socket and its receive loop.
pub struct DatagramListener {
    socket: UdpSocket,
    hub: Hub,
    max_datagram_size: usize,
}

impl DatagramListener {
    pub async fn bind(config: &DatagramConfig, hub: Hub) -> Result<Self, ListenerError> {
        let addr = parse_address(&config.bind_address)?;
        let socket = UdpSocket::bind(addr).await.map_err(ListenerError::Bind)?;
        let local_addr = socket.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(address = %local_addr, "Datagram listener bound");

        Ok(Self {
            socket,
            hub,
            max_datagram_size: config.max_datagram_size.max(1),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.socket.local_addr()
    }

    /// Receive until `shutdown` fires, then drop (close) the socket.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        let mut buf = vec![0u8; self.max_datagram_size];

        loop {
            let (n, peer) = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                res = self.socket.recv_from(&mut buf) => match res {
                    Ok(received) => received,
                    Err(e) => {
                        // e.g. ICMP port unreachable from an earlier reply
                        tracing::warn!(error = %e, "Datagram receive failed");
                        continue;
                    }
                },
            };

            self.handle_datagram(&buf[..n], peer).await;
        }

        tracing::info!("Datagram listener closed");
    }

    async fn handle_datagram(&self, data: &[u8], peer: SocketAddr) {
        let text = decode_payload(data);
        tracing::info!(
            peer_addr = %peer,
            protocol = %Protocol::Datagram,
            message = %text,
            "Message received"
        );
        metrics::record_message(Protocol::Datagram);
        self.hub.broadcast(&Envelope::new(Protocol::Datagram, peer, text.as_str()));

        let reply = Protocol::Datagram.reply(&text);
        if let Err(e) = self.socket.send_to(reply.as_bytes(), peer).await {
            metrics::record_reply_failure(Protocol::Datagram);
            tracing::warn!(peer_addr = %peer, error = %e, "Datagram reply failed");
        }
    }
}
