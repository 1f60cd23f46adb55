//! HTTP-facing subsystem.
//!
//! # Data Flow
//! ```text
//! Control client (browser, relay-cli)
//!     → server.rs (Axum setup, middleware, static fallback)
//!     → control/ (status, start, stop)
//!     → lifecycle controller
//!
//! Push subscriber
//!     → websocket.rs (handshake, hub subscription)
//!     ← JSON envelopes
//! ```

pub mod server;
pub mod websocket;

pub use server::HttpServer;
pub use websocket::{PushError, PushServer};
