use anyhow::Result;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use common_http_errors::ApiError;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::AppState;

#[derive(Clone)]
pub struct RelayMetrics {
    registry: Registry,
    operations: IntCounterVec,
    upstream_requests: IntCounterVec,
}

impl RelayMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let operations = IntCounterVec::new(
            Opts::new("relay_operations_total", "Inbound operations grouped by result"),
            &["operation", "result"],
        )?;
        let upstream_requests = IntCounterVec::new(
            Opts::new(
                "relay_upstream_requests_total",
                "Upstream gateway requests grouped by endpoint and status class",
            ),
            &["endpoint", "status"],
        )?;
        registry.register(Box::new(operations.clone()))?;
        registry.register(Box::new(upstream_requests.clone()))?;
        Ok(Self {
            registry,
            operations,
            upstream_requests,
        })
    }

    pub fn record_operation(&self, operation: &str, result: &str) {
        self.operations.with_label_values(&[operation, result]).inc();
    }

    pub fn record_upstream(&self, endpoint: &str, status: u16) {
        let class = format!("{}xx", status / 100);
        self.upstream_requests
            .with_label_values(&[endpoint, &class])
            .inc();
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}

pub async fn render_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(resp) => resp,
        Err(err) => ApiError::internal(err).into_response(),
    }
}
