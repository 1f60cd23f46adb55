//! Broadcast hub subsystem.
//!
//! # Data Flow
//! ```text
//! Stream / Datagram listener
//!     → envelope.rs (decode, trim, stamp origin + time)
//!     → broadcast.rs (serialize once, enqueue per subscriber)
//!     → per-subscriber queue
//!     → push task (http/websocket.rs) → WebSocket text frame
//! ```
//!
//! # Design Decisions
//! - Registry is a `DashMap`, so subscribe/unsubscribe race safely with broadcast
//! - Delivery is best-effort per subscriber; one failure never touches another
//! - Bounded queues: a stalled subscriber loses messages, ingestion never waits

pub mod broadcast;
pub mod envelope;

pub use broadcast::{BroadcastReport, Hub, SubscriberId, Subscription};
pub use envelope::{decode_payload, is_exit_command, Envelope, Protocol};
