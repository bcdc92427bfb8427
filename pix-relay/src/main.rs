use std::net::SocketAddr;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::warn;

use pix_relay::config::RelayConfig;
use pix_relay::{router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = RelayConfig::from_env()?;
    if config.proxy_secret.is_empty() {
        warn!("PROXY_SECRET is empty; every operation request will be rejected");
    }
    if config.certificate.is_none() {
        warn!("EFI_CERTIFICATE_BASE64 not set; outbound calls will not present a client certificate");
    }

    let addr = SocketAddr::new(config.host.parse()?, config.port);
    let state = AppState::new(config)?;
    let app = router(state);

    println!("starting pix-relay on {addr}");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
