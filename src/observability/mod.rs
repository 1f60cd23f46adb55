//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Listeners, hub, lifecycle controller produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (tracing fmt layer)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
