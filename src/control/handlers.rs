use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use crate::lifecycle::{LifecycleController, ServerState, StartOutcome, StopOutcome};

/// Shared state for control handlers.
#[derive(Clone)]
pub struct ControlState {
    pub controller: Arc<LifecycleController>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: ServerState,
}

/// Reply to start/stop. `status` is a state name or `"error"`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResponse {
    pub status: String,
    pub message: String,
}

impl CommandResponse {
    fn new(status: &str, message: impl Into<String>) -> Self {
        Self {
            status: status.to_string(),
            message: message.into(),
        }
    }
}

pub async fn get_status(
    State(state): State<ControlState>,
) -> Json<StatusResponse> {
    let status = state.controller.status();
    tracing::debug!(status = %status, "Status requested");
    Json(StatusResponse { status })
}

pub async fn post_start(
    State(state): State<ControlState>,
) -> (StatusCode, Json<CommandResponse>) {
    tracing::info!("Start command received");
    match state.controller.start().await {
        Ok(StartOutcome::Started(addrs)) => (
            StatusCode::OK,
            Json(CommandResponse::new(
                ServerState::Running.as_str(),
                format!("Listeners started (stream {}, datagram {})", addrs.stream, addrs.datagram),
            )),
        ),
        Ok(StartOutcome::AlreadyActive(current)) => (
            StatusCode::OK,
            Json(CommandResponse::new(current.as_str(), "Relay is already active")),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(CommandResponse::new("error", e.to_string())),
        ),
    }
}

pub async fn post_stop(
    State(state): State<ControlState>,
) -> (StatusCode, Json<CommandResponse>) {
    tracing::info!("Stop command received");
    match state.controller.stop().await {
        Ok(StopOutcome::Stopped) => (
            StatusCode::OK,
            Json(CommandResponse::new(ServerState::Stopped.as_str(), "Listeners stopped")),
        ),
        Ok(StopOutcome::NotRunning(current)) => (
            StatusCode::OK,
            Json(CommandResponse::new(
                ServerState::Stopped.as_str(),
                format!("Relay is not running (state: {})", current),
            )),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(CommandResponse::new("error", e.to_string())),
        ),
    }
}
