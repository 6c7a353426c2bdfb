//! REST API endpoints.
//!
//! Axum-based HTTP API exposing per-player statistics computed from the
//! upstream game history, plus a request-echo endpoint for client debugging.

pub mod routes;
pub mod state;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::fetch::FetchError;
use crate::resolve::ResolveError;
use state::AppState;

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Method {0} not allowed")]
    MethodNotAllowed(Method),

    #[error("Upstream request timed out")]
    UpstreamTimeout,

    #[error("Upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::UpstreamTimeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::Upstream { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(StatusCode::is_server_error)
                .unwrap_or(StatusCode::BAD_GATEWAY),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            ApiError::Upstream { status, message } => Some(serde_json::json!({
                "upstreamStatus": status,
                "message": message,
            })),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
            details: self.details(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Timeout => ApiError::UpstreamTimeout,
            FetchError::HttpStatus { status: 404, message } => ApiError::NotFound(message),
            FetchError::HttpStatus { status, message } => ApiError::Upstream { status, message },
            FetchError::Http(ref inner) if inner.is_timeout() => ApiError::UpstreamTimeout,
            other => match other.status() {
                Some(status) => ApiError::Upstream {
                    status,
                    message: other.to_string(),
                },
                None => ApiError::Internal(other.to_string()),
            },
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::InvalidInput(msg) => ApiError::BadRequest(msg),
            ResolveError::NotFound(who) => ApiError::NotFound(format!("Player not found: {}", who)),
            ResolveError::Upstream(e) => e.into(),
        }
    }
}

/// CORS policy from the configured origin list; `"*"` allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin {:?}", o);
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route(
            "/api/stats",
            get(routes::stats::player_stats)
                .options(routes::preflight)
                .fallback(routes::method_not_allowed),
        )
        .route(
            "/api/debug",
            get(routes::debug::echo)
                .options(routes::preflight)
                .fallback(routes::method_not_allowed),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
