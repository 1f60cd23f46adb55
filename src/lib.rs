//! Real-time TCP/UDP message relay with WebSocket fan-out.

pub mod config;
pub mod control;
pub mod http;
pub mod hub;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::RelayConfig;
pub use http::{HttpServer, PushServer};
pub use hub::{Envelope, Hub, Protocol};
pub use lifecycle::{LifecycleController, ServerState, Shutdown};
