//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the control API and static asset fallback
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener and serve until shutdown

use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ControlConfig;
use crate::control::setup_control_router;
use crate::lifecycle::{LifecycleController, ShutdownSignal};

/// HTTP server for the control API and static assets.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(controller: Arc<LifecycleController>, config: &ControlConfig) -> Self {
        let router = Self::build_router(controller, config);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(controller: Arc<LifecycleController>, config: &ControlConfig) -> Router {
        setup_control_router(controller)
            .fallback_service(ServeDir::new(&config.static_dir))
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, mut shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "Control API listening"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.recv().await })
            .await?;

        tracing::info!("Control API stopped");
        Ok(())
    }
}
