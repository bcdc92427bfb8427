use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

pub mod config;
pub mod efi;
pub mod metrics;
pub mod pix_handlers;
pub mod proxy_secret;

use config::RelayConfig;
use efi::EfiClient;
use metrics::RelayMetrics;

/// Shared application state; everything here is immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub efi: Arc<EfiClient>,
    pub metrics: RelayMetrics,
}

impl AppState {
    pub fn new(config: RelayConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let efi = Arc::new(EfiClient::new(config.clone()));
        let metrics = RelayMetrics::new()?;
        Ok(Self {
            config,
            efi,
            metrics,
        })
    }
}

/// Full inbound surface. The four operation routes sit behind the
/// shared-secret check; health and metrics do not.
pub fn router(state: AppState) -> Router {
    let guarded = Router::new()
        .route("/create-charge", post(pix_handlers::create_charge))
        .route("/send-pix", post(pix_handlers::send_pix))
        .route("/register-webhook", post(pix_handlers::register_webhook))
        .route("/balance", get(pix_handlers::get_balance))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            proxy_secret::require_proxy_secret,
        ));

    Router::new()
        .route("/", get(pix_handlers::health))
        .route("/metrics", get(metrics::render_metrics))
        .merge(guarded)
        .with_state(state)
}
