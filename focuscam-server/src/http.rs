// HTTP router: health endpoint plus the streaming WebSocket route

use crate::websocket::{websocket_handler, RelayState};
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use focuscam_core::NetworkConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub sessions: usize,
    pub workers: usize,
    pub version: String,
}

pub fn create_router(state: Arc<RelayState>, network: &NetworkConfig) -> Router {
    let router = Router::new()
        .route("/health", get(health_handler))
        .route(&network.ws_path, get(websocket_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if network.cors_permissive {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<RelayState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        sessions: state.registry.count(),
        workers: state.pipeline.dispatcher().workers(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use focuscam_core::RelayConfig;
    use focuscam_eye::{FramePipeline, NullDetector};
    use tower::ServiceExt;

    fn state(workers: usize) -> Arc<RelayState> {
        let mut config = RelayConfig::default();
        config.dispatcher.workers = workers;
        let pipeline = FramePipeline::from_config(&config, Arc::new(NullDetector));
        Arc::new(RelayState::new(Arc::new(pipeline)))
    }

    #[tokio::test]
    async fn test_health_reports_sessions_and_workers() {
        let app = create_router(state(3), &NetworkConfig::default());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.sessions, 0);
        assert_eq!(health.workers, 3);
    }

    #[tokio::test]
    async fn test_ws_route_requires_upgrade() {
        let app = create_router(state(1), &NetworkConfig::default());
        let response = app
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_cors_headers_when_permissive() {
        let app = create_router(state(1), &NetworkConfig::default());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("origin", "http://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response
            .headers()
            .contains_key("access-control-allow-origin"));
    }
}
