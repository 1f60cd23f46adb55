//! HTTP control surface for the lifecycle controller.
//!
//! ```text
//! GET  /status → { "status": "stopped" | "starting" | "running" | "stopping" }
//! POST /start  → { "status": ..., "message": ... }   (500 + "error" on bind failure)
//! POST /stop   → { "status": ..., "message": ... }   (500 + "error" on teardown failure)
//! ```

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use crate::lifecycle::LifecycleController;
use self::handlers::*;

pub fn setup_control_router(controller: Arc<LifecycleController>) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/start", post(post_start))
        .route("/stop", post(post_stop))
        .with_state(ControlState { controller })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::hub::Hub;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn controller(config: RelayConfig) -> Arc<LifecycleController> {
        Arc::new(LifecycleController::new(config, Hub::new(8)))
    }

    fn local_config() -> RelayConfig {
        let mut config = RelayConfig::default();
        config.stream.bind_address = "127.0.0.1:0".into();
        config.datagram.bind_address = "127.0.0.1:0".into();
        config
    }

    async fn call(router: &Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .clone()
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn status_start_stop_round() {
        let router = setup_control_router(controller(local_config()));

        let (code, body) = call(&router, "GET", "/status").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["status"], "stopped");

        let (code, body) = call(&router, "POST", "/start").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["status"], "running");

        let (code, body) = call(&router, "POST", "/start").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["status"], "running");
        assert_eq!(body["message"], "Relay is already active");

        let (_, body) = call(&router, "GET", "/status").await;
        assert_eq!(body["status"], "running");

        let (code, body) = call(&router, "POST", "/stop").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["status"], "stopped");

        let (code, body) = call(&router, "POST", "/stop").await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["status"], "stopped");
    }

    #[tokio::test]
    async fn start_failure_is_500_and_stays_stopped() {
        let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = local_config();
        config.stream.bind_address = blocker.local_addr().unwrap().to_string();
        let router = setup_control_router(controller(config));

        let (code, body) = call(&router, "POST", "/start").await;
        assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("Stream"));

        let (_, body) = call(&router, "GET", "/status").await;
        assert_eq!(body["status"], "stopped");
    }

    #[tokio::test]
    async fn start_requires_post() {
        let router = setup_control_router(controller(local_config()));
        let response = router
            .oneshot(Request::builder().uri("/start").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
