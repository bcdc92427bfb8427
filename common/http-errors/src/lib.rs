use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")] pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")] pub detail: Option<Value>,
}

#[derive(Debug)]
pub enum ApiError {
    /// Shared-secret check failed; detected locally, upstream never contacted.
    Unauthorized,
    /// A required request field is missing or malformed; names the field.
    BadRequest { code: &'static str, field: Option<&'static str>, message: Option<String> },
    /// The gateway rejected the OAuth exchange; upstream body kept for diagnostics.
    UpstreamAuth { detail: Value },
    /// The gateway rejected a business call; its status and body pass through untranslated.
    Upstream { status: u16, body: Value },
    Internal { message: Option<String> },
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal { message: Some(e.to_string()) }
    }

    pub fn missing_field(field: &'static str) -> Self {
        Self::BadRequest {
            code: "missing_field",
            field: Some(field),
            message: Some(format!("{field} is required")),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body, error_code) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorBody { code: "unauthorized".into(), field: None, message: Some("missing or invalid proxy secret".into()), detail: None },
                "unauthorized",
            ),
            ApiError::BadRequest { code, field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorBody { code: code.into(), field: field.map(Into::into), message, detail: None },
                code,
            ),
            ApiError::UpstreamAuth { detail } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody { code: "upstream_auth".into(), field: None, message: Some("gateway rejected credentials".into()), detail: Some(detail) },
                "upstream_auth",
            ),
            ApiError::Upstream { status, body } => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                ErrorBody { code: "upstream_error".into(), field: None, message: None, detail: Some(body) },
                "upstream_error",
            ),
            ApiError::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody { code: "internal_error".into(), field: None, message, detail: None },
                "internal_error",
            ),
        };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
