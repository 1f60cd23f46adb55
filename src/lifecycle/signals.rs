//! OS signal handling.

/// Wait for Ctrl+C (SIGINT). Failing to install the handler is logged and
/// treated as an immediate shutdown request.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("Shutdown signal received");
}
