pub mod debug;
pub mod stats;

use axum::http::{Method, StatusCode};

use super::ApiError;

/// `OPTIONS`: 200 with no body.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

pub async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}
