//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (buffers > 0, grace > 0, datagram size)
//! - Detect relay listeners fighting over the same port
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{RelayConfig, MAX_UDP_PAYLOAD};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g. `stream.bind_address`).
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let stream = check_address(&mut errors, "stream.bind_address", &config.stream.bind_address);
    check_address(
        &mut errors,
        "datagram.bind_address",
        &config.datagram.bind_address,
    );
    let push = check_address(&mut errors, "push.bind_address", &config.push.bind_address);
    let control = check_address(&mut errors, "control.bind_address", &config.control.bind_address);
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.stream.read_buffer_size == 0 {
        errors.push(ValidationError::new(
            "stream.read_buffer_size",
            "must be greater than zero",
        ));
    }
    if config.stream.max_connections == 0 {
        errors.push(ValidationError::new(
            "stream.max_connections",
            "must be greater than zero",
        ));
    }
    if config.datagram.max_datagram_size == 0 || config.datagram.max_datagram_size > MAX_UDP_PAYLOAD {
        errors.push(ValidationError::new(
            "datagram.max_datagram_size",
            format!("must be between 1 and {}", MAX_UDP_PAYLOAD),
        ));
    }
    if config.push.subscriber_buffer == 0 {
        errors.push(ValidationError::new(
            "push.subscriber_buffer",
            "must be greater than zero",
        ));
    }
    if config.control.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "control.request_timeout_secs",
            "must be greater than zero",
        ));
    }
    if config.lifecycle.shutdown_grace_ms == 0 {
        errors.push(ValidationError::new(
            "lifecycle.shutdown_grace_ms",
            "must be greater than zero",
        ));
    }

    // TCP and UDP may share a port number; push and control are TCP too.
    let tcp = [
        ("stream.bind_address", stream),
        ("push.bind_address", push),
        ("control.bind_address", control),
    ];
    for (i, (field, addr)) in tcp.iter().enumerate() {
        let Some(addr) = addr else { continue };
        for (other_field, other) in &tcp[..i] {
            if let Some(other) = other {
                if addr.port() != 0 && addr == other {
                    errors.push(ValidationError::new(
                        *field,
                        format!("conflicts with {} ({})", other_field, other),
                    ));
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    value: &str,
) -> Option<SocketAddr> {
    match value.parse::<SocketAddr>() {
        Ok(addr) => Some(addr),
        Err(e) => {
            errors.push(ValidationError::new(field, format!("invalid socket address '{}': {}", value, e)));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&RelayConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = RelayConfig::default();
        config.stream.bind_address = "not-an-address".into();
        config.stream.read_buffer_size = 0;
        config.lifecycle.shutdown_grace_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "stream.bind_address",
                "stream.read_buffer_size",
                "lifecycle.shutdown_grace_ms"
            ]
        );
    }

    #[test]
    fn oversized_datagram_rejected() {
        let mut config = RelayConfig::default();
        config.datagram.max_datagram_size = MAX_UDP_PAYLOAD + 1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn stream_and_push_must_not_share_port() {
        let mut config = RelayConfig::default();
        config.push.bind_address = config.stream.bind_address.clone();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "push.bind_address");
    }

    #[test]
    fn control_port_conflict_detected() {
        let mut config = RelayConfig::default();
        config.control.bind_address = config.push.bind_address.clone();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "control.bind_address");
        assert!(errors[0].message.contains("push.bind_address"));
    }

    #[test]
    fn ephemeral_ports_never_conflict() {
        let mut config = RelayConfig::default();
        config.stream.bind_address = "127.0.0.1:0".into();
        config.push.bind_address = "127.0.0.1:0".into();
        assert!(validate_config(&config).is_ok());
    }
}
