use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use common_http_errors::ApiError;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::AppState;

pub const PROXY_SECRET_HEADER: &str = "x-proxy-secret";

// Shared-secret check in front of every operation route. Comparison is
// constant-time so a probing caller learns nothing about the secret.
pub async fn require_proxy_secret(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let expected = state.config.proxy_secret.as_bytes();
    let provided = req
        .headers()
        .get(PROXY_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    // An unset secret closes the relay rather than opening it.
    if expected.is_empty() || provided.as_bytes().ct_eq(expected).unwrap_u8() != 1 {
        warn!(path = %req.uri().path(), "rejected request without a valid proxy secret");
        return ApiError::Unauthorized.into_response();
    }

    next.run(req).await
}
