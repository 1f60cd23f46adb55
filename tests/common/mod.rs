//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use msg_relay::config::RelayConfig;
use msg_relay::http::{HttpServer, PushServer};
use msg_relay::hub::Hub;
use msg_relay::lifecycle::{LifecycleController, ListenerAddrs, Shutdown, StartOutcome};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Config with every listener on an ephemeral loopback port.
pub fn local_config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.stream.bind_address = "127.0.0.1:0".into();
    config.datagram.bind_address = "127.0.0.1:0".into();
    config.push.bind_address = "127.0.0.1:0".into();
    config.control.bind_address = "127.0.0.1:0".into();
    config.lifecycle.shutdown_grace_ms = 1000;
    config
}

/// A full relay process: controller, push channel and control API.
pub struct TestRelay {
    pub controller: Arc<LifecycleController>,
    pub hub: Hub,
    pub push_addr: SocketAddr,
    pub control_addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestRelay {
    pub async fn spawn() -> Self {
        Self::spawn_with(local_config()).await
    }

    pub async fn spawn_with(config: RelayConfig) -> Self {
        let hub = Hub::new(config.push.subscriber_buffer);
        let controller = Arc::new(LifecycleController::new(config.clone(), hub.clone()));
        let shutdown = Shutdown::new();

        let push = PushServer::bind(&config.push, hub.clone()).await.unwrap();
        let push_addr = push.local_addr().unwrap();
        tokio::spawn(push.run(shutdown.subscribe()));

        let listener = TcpListener::bind(&config.control.bind_address).await.unwrap();
        let control_addr = listener.local_addr().unwrap();
        let server = HttpServer::new(Arc::clone(&controller), &config.control);
        tokio::spawn(server.run(listener, shutdown.subscribe()));

        Self {
            controller,
            hub,
            push_addr,
            control_addr,
            shutdown,
        }
    }

    /// Start the listeners and return where they are bound.
    pub async fn start(&self) -> ListenerAddrs {
        match self.controller.start().await.unwrap() {
            StartOutcome::Started(addrs) => addrs,
            StartOutcome::AlreadyActive(state) => panic!("relay already {}", state),
        }
    }

    pub fn control_url(&self, path: &str) -> String {
        format!("http://{}{}", self.control_addr, path)
    }

    pub async fn subscribe(&self) -> WsClient {
        let (client, _) = connect_async(format!("ws://{}", self.push_addr)).await.unwrap();
        client
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Poll until the hub has exactly `count` subscribers.
pub async fn wait_for_subscribers(hub: &Hub, count: usize) {
    for _ in 0..200 {
        if hub.subscriber_count() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {} subscribers, have {}", count, hub.subscriber_count());
}

/// Read one reply chunk from a stream connection.
pub async fn read_reply(client: &mut TcpStream) -> String {
    let mut buf = [0u8; 1024];
    let n = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf))
        .await
        .expect("reply timed out")
        .unwrap();
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

/// Send one datagram and wait for the reply, if any arrives within `wait`.
pub async fn datagram_exchange(target: SocketAddr, payload: &[u8], wait: Duration) -> Option<String> {
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(payload, target).await.unwrap();
    let mut buf = [0u8; 1024];
    match tokio::time::timeout(wait, client.recv_from(&mut buf)).await {
        Ok(Ok((n, _))) => Some(String::from_utf8_lossy(&buf[..n]).into_owned()),
        _ => None,
    }
}

/// Next text frame from a subscriber, parsed as JSON.
pub async fn next_envelope(client: &mut WsClient) -> serde_json::Value {
    let frame = tokio::time::timeout(Duration::from_secs(2), client.next())
        .await
        .expect("no envelope pushed")
        .expect("push channel closed")
        .unwrap();
    serde_json::from_str(frame.to_text().unwrap()).unwrap()
}

/// Assert nothing further is pushed within `wait`.
pub async fn assert_no_envelope(client: &mut WsClient, wait: Duration) {
    if let Ok(Some(Ok(frame))) = tokio::time::timeout(wait, client.next()).await {
        panic!("unexpected frame: {:?}", frame);
    }
}
