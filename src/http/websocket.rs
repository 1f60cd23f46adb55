//! WebSocket push channel.
//!
//! # Responsibilities
//! - Accept WebSocket clients on the push address
//! - Register each client as a hub subscriber for the life of its socket
//! - Forward queued envelopes as JSON text frames
//!
//! # Data Flow
//! ```text
//! Hub queue ──→ push task ──── text frames ────→ Client
//!                  ▲
//!                  └── close / error / EOF → unsubscribe
//! ```
//!
//! # Design Decisions
//! - Runs for the whole process; listener start/stop does not touch subscribers
//! - Inbound frames other than close are ignored (tungstenite answers pings)

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};

use crate::config::PushConfig;
use crate::hub::Hub;
use crate::lifecycle::ShutdownSignal;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("invalid push address '{0}'")]
    Address(String),

    #[error("failed to bind push listener: {0}")]
    Bind(#[from] std::io::Error),
}

/// Accepts subscribers and pumps hub traffic to them.
pub struct PushServer {
    listener: TcpListener,
    hub: Hub,
}

impl PushServer {
    pub async fn bind(config: &PushConfig, hub: Hub) -> Result<Self, PushError> {
        let addr: SocketAddr = config
            .bind_address
            .parse()
            .map_err(|_| PushError::Address(config.bind_address.clone()))?;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(address = %listener.local_addr()?, "Push channel listening");
        Ok(Self { listener, hub })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Accept subscribers until `shutdown` fires.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        loop {
            let accepted = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                res = self.listener.accept() => res,
            };

            match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(serve_subscriber(stream, peer, self.hub.clone(), shutdown.clone()));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Push accept failed");
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                }
            }
        }

        tracing::info!("Push channel stopped");
    }
}

async fn serve_subscriber(stream: TcpStream, peer: SocketAddr, hub: Hub, mut shutdown: ShutdownSignal) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::debug!(peer_addr = %peer, error = %e, "WebSocket handshake failed");
            return;
        }
    };

    let mut subscription = hub.subscribe();
    let subscriber_id = subscription.id();
    tracing::info!(peer_addr = %peer, subscriber_id = %subscriber_id, "Subscriber connected");

    let (mut sink, mut source) = ws.split();
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            payload = subscription.recv() => match payload {
                Some(payload) => {
                    if let Err(e) = sink.send(Message::text(payload.to_string())).await {
                        tracing::debug!(subscriber_id = %subscriber_id, error = %e, "Delivery failed");
                        break;
                    }
                }
                // Pruned by the hub after a failed delivery.
                None => break,
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(subscriber_id = %subscriber_id, error = %e, "Subscriber read failed");
                    break;
                }
            },
        }
    }

    hub.unsubscribe(subscriber_id);
    tracing::info!(peer_addr = %peer, subscriber_id = %subscriber_id, "Subscriber disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{Envelope, Protocol};
    use crate::lifecycle::Shutdown;
    use std::time::Duration;
    use tokio_tungstenite::connect_async;

    async fn wait_for_subscribers(hub: &Hub, count: usize) {
        for _ in 0..100 {
            if hub.subscriber_count() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} subscribers, have {}", count, hub.subscriber_count());
    }

    #[tokio::test]
    async fn subscriber_receives_json_and_deregisters_on_close() {
        let hub = Hub::new(8);
        let config = PushConfig {
            bind_address: "127.0.0.1:0".into(),
            ..PushConfig::default()
        };
        let server = PushServer::bind(&config, hub.clone()).await.unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = Shutdown::new();
        tokio::spawn(server.run(shutdown.subscribe()));

        let (mut client, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        wait_for_subscribers(&hub, 1).await;

        let source: SocketAddr = "192.168.1.9:5555".parse().unwrap();
        hub.broadcast(&Envelope::new(Protocol::Stream, source, "hello"));

        let frame = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        assert_eq!(json["protocol"], "Stream");
        assert_eq!(json["ip"], "192.168.1.9");
        assert_eq!(json["port"], 5555);
        assert_eq!(json["data"], "hello");

        client.close(None).await.unwrap();
        wait_for_subscribers(&hub, 0).await;
    }

    #[tokio::test]
    async fn rejects_bad_address() {
        let config = PushConfig {
            bind_address: "push".into(),
            ..PushConfig::default()
        };
        assert!(matches!(
            PushServer::bind(&config, Hub::new(1)).await,
            Err(PushError::Address(_))
        ));
    }
}
