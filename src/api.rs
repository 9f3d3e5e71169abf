//! HTTP wrapper around the provisioning automation
//!
//! Each request owns its own headless browser for the duration of the
//! call; nothing is shared between requests beyond the configuration.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::Config;
use crate::driver::RunMode;
use crate::error::Result;
use crate::runner::Automation;
use crate::session::SessionState;

#[derive(Debug, Deserialize)]
pub struct InitAuthRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct InitAuthResponse {
    pub status: String,
    pub message: String,
    pub session_state: SessionState,
}

#[derive(Debug, Deserialize)]
pub struct CompleteAuthRequest {
    pub email: String,
    pub code: String,
    pub account_name: String,
    pub session_state: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct CompleteAuthResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

/// Build the service router
pub fn router(config: Arc<Config>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/auth/init", post(init_auth))
        .route("/api/v1/auth/complete", post(complete_auth))
        .with_state(config)
}

/// Bind and serve until the process is stopped
pub async fn serve(config: Config, listen: &str) -> Result<()> {
    let addr: SocketAddr = listen.parse().map_err(|e| {
        crate::error::AutomationError::InvalidInput(format!(
            "invalid listen address {listen:?}: {e}"
        ))
    })?;

    let app = router(Arc::new(config));

    info!(%addr, "Starting HTTP service");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::AutomationError::ActionFailed(format!("HTTP server error: {e}")))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Phase 1: open a browser, enter the email, return the captured session
/// state for the client to hold until the code arrives.
async fn init_auth(
    State(config): State<Arc<Config>>,
    Json(request): Json<InitAuthRequest>,
) -> Response {
    info!(email = %request.email, "API: initiating auth");

    match run_init(config.as_ref().clone(), &request.email).await {
        Ok(state) => (
            StatusCode::OK,
            Json(InitAuthResponse {
                status: "waiting_code".to_string(),
                message: "Auth initiated. Provide the verification code sent by email."
                    .to_string(),
                session_state: state,
            }),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "API: init failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    detail: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Phase 2: restore the session, enter the code, run the full provisioning
/// sequence.
async fn complete_auth(
    State(config): State<Arc<Config>>,
    Json(request): Json<CompleteAuthRequest>,
) -> Response {
    info!(account = %request.account_name, "API: completing auth");

    let state: SessionState = match serde_json::from_value(request.session_state.clone()) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "API: session state did not deserialize");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    detail: "Invalid session state provided.".to_string(),
                }),
            )
                .into_response();
        }
    };

    match run_complete(config.as_ref().clone(), &request, state).await {
        Ok(()) => (
            StatusCode::OK,
            Json(CompleteAuthResponse {
                status: "success".to_string(),
                message: format!(
                    "Automation completed successfully for {}",
                    request.account_name
                ),
            }),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "API: complete failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    detail: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn run_init(config: Config, email: &str) -> Result<SessionState> {
    let automation = Automation::launch(config, RunMode::Apply, true).await?;
    let result = automation.init_auth(email).await;
    if result.is_err() {
        automation.capture_failure().await;
    }
    automation.shutdown().await;
    result
}

async fn run_complete(
    config: Config,
    request: &CompleteAuthRequest,
    state: SessionState,
) -> Result<()> {
    let automation = Automation::launch(config, RunMode::Apply, true).await?;
    let result = automation
        .complete_auth(
            &request.email,
            &request.code,
            &request.account_name,
            Some(state),
        )
        .await;
    if result.is_err() {
        automation.capture_failure().await;
    }
    automation.shutdown().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health() {
        let app = router(Arc::new(Config::default()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_complete_rejects_invalid_session_state() {
        let app = router(Arc::new(Config::default()));

        let payload = serde_json::json!({
            "email": "a@b.com",
            "code": "123456",
            "account_name": "Clinic",
            "session_state": 42
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/auth/complete")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"], "Invalid session state provided.");
    }

    #[test]
    fn test_request_shapes() {
        let init: InitAuthRequest =
            serde_json::from_value(serde_json::json!({"email": "a@b.com"})).unwrap();
        assert_eq!(init.email, "a@b.com");

        let complete: CompleteAuthRequest = serde_json::from_value(serde_json::json!({
            "email": "a@b.com",
            "code": "123456",
            "account_name": "Clinic",
            "session_state": {"cookies": [], "origins": []}
        }))
        .unwrap();
        assert_eq!(complete.account_name, "Clinic");

        let response = InitAuthResponse {
            status: "waiting_code".to_string(),
            message: String::new(),
            session_state: SessionState::default(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "waiting_code");
        assert!(json["session_state"]["cookies"].is_array());
    }
}
