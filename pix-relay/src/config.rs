use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::env;

pub const DEFAULT_BASE_URL: &str = "https://pix.api.efipay.com.br";

/// Immutable process configuration, read once at startup and passed into
/// every component via `AppState`. Request handling never touches the
/// environment.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    /// Shared secret expected in the `x-proxy-secret` header. Empty means
    /// every operation request is rejected.
    pub proxy_secret: String,
    pub client_id: String,
    pub client_secret: String,
    /// Decoded PKCS12 bundle, empty passphrase. `None` disables the client
    /// identity on outbound calls.
    pub certificate: Option<Vec<u8>>,
    pub pix_key: String,
    pub base_url: String,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self> {
        let client_id = env::var("EFI_CLIENT_ID").context("EFI_CLIENT_ID must be set")?;
        let client_secret =
            env::var("EFI_CLIENT_SECRET").context("EFI_CLIENT_SECRET must be set")?;
        let pix_key = env::var("EFI_PIX_KEY").context("EFI_PIX_KEY must be set")?;
        let certificate = match env::var("EFI_CERTIFICATE_BASE64") {
            Ok(blob) if !blob.trim().is_empty() => Some(decode_certificate(&blob)?),
            _ => None,
        };
        let proxy_secret = env::var("PROXY_SECRET").unwrap_or_default();
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3000);
        let base_url = env::var("EFI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            host,
            port,
            proxy_secret,
            client_id,
            client_secret,
            certificate,
            pix_key,
            base_url,
        })
    }
}

/// Certificates arrive as one large base64 blob; tolerate wrapped lines.
pub fn decode_certificate(blob: &str) -> Result<Vec<u8>> {
    let cleaned: String = blob.split_whitespace().collect();
    BASE64
        .decode(cleaned.as_bytes())
        .context("EFI_CERTIFICATE_BASE64 is not valid base64")
}
