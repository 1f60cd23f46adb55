//! Network ingestion subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, connection limits)
//!     → stream.rs (accept loop, one routine per connection)
//!     → connection.rs (registry entry for cancellation)
//!     → Envelope → Hub, reply "[TCP] <text>"
//!
//! Incoming UDP datagram
//!     → datagram.rs (receive loop)
//!     → Envelope → Hub, reply "[UDP] <text>"
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked so stop() can cancel and await it
//! - Datagrams carry no per-sender state

pub mod connection;
pub mod datagram;
pub mod listener;
pub mod stream;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionRegistry};
pub use datagram::DatagramListener;
pub use listener::{Listener, ListenerError};
pub use stream::{ConnectionEnd, StreamListener};
