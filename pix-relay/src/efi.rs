use std::sync::Arc;

use common_http_errors::ApiError;
use reqwest::{Client, Identity, Method};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error};

use crate::config::RelayConfig;

#[derive(Debug, Error)]
pub enum EfiError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway refused credentials (status {status})")]
    Auth { status: u16, body: Value },
}

impl From<EfiError> for ApiError {
    fn from(err: EfiError) -> Self {
        match err {
            EfiError::Transport(e) => {
                error!(error = %e, "upstream transport failure");
                ApiError::internal(e)
            }
            EfiError::Auth { status, body } => {
                error!(status, "gateway rejected OAuth exchange");
                ApiError::UpstreamAuth { detail: body }
            }
        }
    }
}

/// Buffered upstream response. `data` holds the parsed JSON value when the
/// body parses as JSON, otherwise the raw text as a JSON string.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: u16,
    pub data: Value,
}

impl UpstreamReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Client for the EFI PIX gateway. Holds only the immutable configuration;
/// the TLS transport is rebuilt from the decoded certificate for every
/// outbound call.
pub struct EfiClient {
    config: Arc<RelayConfig>,
}

impl EfiClient {
    pub fn new(config: Arc<RelayConfig>) -> Self {
        Self { config }
    }

    fn transport(&self) -> Result<Client, EfiError> {
        let mut builder = Client::builder();
        if let Some(der) = &self.config.certificate {
            let identity = Identity::from_pkcs12_der(der, "")?;
            builder = builder.identity(identity);
        }
        Ok(builder.build()?)
    }

    /// One request/response cycle against the gateway. Network-level
    /// failures surface as `EfiError::Transport`; HTTP error statuses are
    /// returned in the reply for the caller to interpret.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        headers: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<UpstreamReply, EfiError> {
        let url = format!("{}{}", self.config.base_url, path);
        let mut req = self.transport()?.request(method, &url);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let data = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
        debug!(%url, status, "upstream reply");
        Ok(UpstreamReply { status, data })
    }

    /// client_credentials grant against the gateway's OAuth endpoint. A
    /// fresh token is fetched for every operation; nothing is cached.
    pub async fn oauth_token(&self) -> Result<String, EfiError> {
        let url = format!("{}/oauth/token", self.config.base_url);
        let resp = self
            .transport()?
            .post(&url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .json(&json!({ "grant_type": "client_credentials" }))
            .send()
            .await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let data = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
        if !(200..300).contains(&status) {
            return Err(EfiError::Auth { status, body: data });
        }
        match data.get("access_token").and_then(Value::as_str) {
            Some(token) => Ok(token.to_string()),
            // A grant reply without a token is as unusable as a rejection.
            None => Err(EfiError::Auth { status, body: data }),
        }
    }
}
