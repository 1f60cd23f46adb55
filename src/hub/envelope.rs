//! Normalized message envelope shared by both ingestion protocols.

use std::net::SocketAddr;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Raw transport a message arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// Connection-oriented TCP.
    Stream,
    /// Connectionless UDP.
    Datagram,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Stream => "Stream",
            Protocol::Datagram => "Datagram",
        }
    }

    /// Marker prepended to every reply sent back to a peer.
    pub fn reply_marker(&self) -> &'static str {
        match self {
            Protocol::Stream => "[TCP] ",
            Protocol::Datagram => "[UDP] ",
        }
    }

    /// Build the reply echoed to the sender of `text`.
    pub fn reply(&self, text: &str) -> String {
        let marker = self.reply_marker();
        let mut reply = String::with_capacity(marker.len() + text.len());
        reply.push_str(marker);
        reply.push_str(text);
        reply
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decode a received chunk as text. Invalid UTF-8 is replaced, never rejected.
pub fn decode_payload(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// `exit` / `quit` in any case ask the server to close a stream connection.
pub fn is_exit_command(text: &str) -> bool {
    text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit")
}

/// One ingested message, as delivered to every subscriber.
///
/// Serializes to `{protocol, ip, port, timestamp, data}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    protocol: Protocol,
    #[serde(rename = "ip")]
    source_ip: String,
    #[serde(rename = "port")]
    source_port: u16,
    timestamp: String,
    #[serde(rename = "data")]
    payload: String,
}

impl Envelope {
    /// Stamp a message received from `source` with the current time.
    pub fn new(protocol: Protocol, source: SocketAddr, payload: impl Into<String>) -> Self {
        Self {
            protocol,
            source_ip: source.ip().to_string(),
            source_port: source.port(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            payload: payload.into(),
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn source_ip(&self) -> &str {
        &self.source_ip
    }

    pub fn source_port(&self) -> u16 {
        self.source_port
    }

    /// ISO-8601 / RFC 3339 receive time in UTC.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_uses_short_field_names() {
        let source: SocketAddr = "10.0.0.7:40000".parse().unwrap();
        let envelope = Envelope::new(Protocol::Datagram, source, "ping");
        let json: serde_json::Value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["protocol"], "Datagram");
        assert_eq!(json["ip"], "10.0.0.7");
        assert_eq!(json["port"], 40000);
        assert_eq!(json["data"], "ping");
        assert!(chrono::DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn payload_is_trimmed_and_lossy() {
        assert_eq!(decode_payload(b"  hello\r\n"), "hello");
        assert_eq!(decode_payload(&[b'o', b'k', 0xff]), "ok\u{fffd}");
    }

    #[test]
    fn replies_carry_protocol_marker() {
        assert_eq!(Protocol::Stream.reply("hello"), "[TCP] hello");
        assert_eq!(Protocol::Datagram.reply("ping"), "[UDP] ping");
    }

    #[test]
    fn exit_commands_ignore_case() {
        assert!(is_exit_command("exit"));
        assert!(is_exit_command("QUIT"));
        assert!(is_exit_command("Exit"));
        assert!(!is_exit_command("exiting"));
        assert!(!is_exit_command(""));
    }
}
