//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Largest payload a single UDP datagram can carry over IPv4.
pub const MAX_UDP_PAYLOAD: usize = 65_507;

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// Stream (TCP) ingestion listener.
    pub stream: StreamConfig,

    /// Datagram (UDP) ingestion listener.
    pub datagram: DatagramConfig,

    /// WebSocket push channel for subscribers.
    pub push: PushConfig,

    /// HTTP control surface.
    pub control: ControlConfig,

    /// Start/stop behaviour.
    pub lifecycle: LifecycleConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Stream listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum bytes consumed by a single read.
    pub read_buffer_size: usize,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            read_buffer_size: 1024,
            max_connections: 10_000,
        }
    }
}

/// Datagram listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DatagramConfig {
    /// Bind address (e.g., "0.0.0.0:8081").
    pub bind_address: String,

    /// Receive buffer size; longer datagrams are truncated by the OS.
    pub max_datagram_size: usize,
}

impl Default for DatagramConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8081".to_string(),
            max_datagram_size: MAX_UDP_PAYLOAD,
        }
    }
}

/// Push channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PushConfig {
    /// Bind address (e.g., "0.0.0.0:8082").
    pub bind_address: String,

    /// Messages queued per subscriber before deliveries to it are dropped.
    pub subscriber_buffer: usize,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8082".to_string(),
            subscriber_buffer: 256,
        }
    }
}

/// Control API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ControlConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,

    /// Directory served for every path the API does not handle.
    pub static_dir: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            static_dir: "static".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LifecycleConfig {
    /// How long `stop` waits for connections and listener tasks to finish.
    pub shutdown_grace_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_ms: 5_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_ports() {
        let config = RelayConfig::default();
        assert_eq!(config.stream.bind_address, "0.0.0.0:8080");
        assert_eq!(config.datagram.bind_address, "0.0.0.0:8081");
        assert_eq!(config.push.bind_address, "0.0.0.0:8082");
        assert_eq!(config.control.bind_address, "0.0.0.0:8000");
        assert_eq!(config.stream.read_buffer_size, 1024);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: RelayConfig = toml::from_str(
            r#"
            [stream]
            bind_address = "127.0.0.1:9000"

            [lifecycle]
            shutdown_grace_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.stream.bind_address, "127.0.0.1:9000");
        assert_eq!(config.stream.read_buffer_size, 1024);
        assert_eq!(config.lifecycle.shutdown_grace_ms, 250);
        assert_eq!(config.datagram, DatagramConfig::default());
    }
}
