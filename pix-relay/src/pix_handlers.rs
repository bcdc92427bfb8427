use std::sync::atomic::{AtomicU32, Ordering};

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use common_http_errors::{ApiError, ApiResult};
use common_money::Amount;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::AppState;

/// Expiry window for new charges, in seconds.
const CHARGE_EXPIRATION_SECS: u32 = 3600;
/// Platform tag stamped into charge metadata.
const PLATFORM_TAG: &str = "pix-relay";
/// Prefix of synthesized payout identifiers; everything after it is digits.
const PAYOUT_ID_PREFIX: &str = "envio";

static PAYOUT_SEQ: AtomicU32 = AtomicU32::new(0);

#[derive(Deserialize)]
pub struct ChargeRequest {
    pub amount: Option<Amount>,
    pub txid: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
pub struct PayoutRequest {
    pub pix_key: Option<String>,
    pub amount: Option<Amount>,
}

#[derive(Deserialize)]
pub struct WebhookRequest {
    pub webhook_url: Option<String>,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "pix-relay" }))
}

pub async fn create_charge(
    State(state): State<AppState>,
    Json(req): Json<ChargeRequest>,
) -> ApiResult<Json<Value>> {
    let amount = req.amount.ok_or_else(|| ApiError::missing_field("amount"))?;
    let txid = req
        .txid
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::missing_field("txid"))?;
    let user = req.user_id.unwrap_or_else(|| "unknown".to_string());

    let token = state.efi.oauth_token().await?;
    let body = json!({
        "calendario": { "expiracao": CHARGE_EXPIRATION_SECS },
        "valor": { "original": amount.formatted() },
        "chave": state.config.pix_key,
        "infoAdicionais": [
            { "nome": "plataforma", "valor": PLATFORM_TAG },
            { "nome": "usuario", "valor": user },
        ],
    });
    let charge = state
        .efi
        .request(
            Method::PUT,
            &format!("/v2/cob/{txid}"),
            Some(&token),
            &[],
            Some(&body),
        )
        .await?;
    state.metrics.record_upstream("cob", charge.status);
    if !matches!(charge.status, 200 | 201) {
        warn!(status = charge.status, %txid, "gateway refused charge");
        state.metrics.record_operation("create_charge", "upstream_error");
        return Err(ApiError::Upstream {
            status: charge.status,
            body: charge.data,
        });
    }

    // The QR payload lives behind the charge's location id. Losing it is
    // not fatal; the charge itself already exists upstream.
    let mut qr_code = String::new();
    let mut qr_code_image = String::new();
    let mut qr_copy_paste = None;
    if let Some(loc_id) = charge.data.pointer("/loc/id").and_then(Value::as_i64) {
        let qr = state
            .efi
            .request(
                Method::GET,
                &format!("/v2/loc/{loc_id}/qrcode"),
                Some(&token),
                &[],
                None,
            )
            .await?;
        state.metrics.record_upstream("loc_qrcode", qr.status);
        if qr.status == 200 {
            qr_code = qr
                .data
                .get("qrcode")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            qr_code_image = qr
                .data
                .get("imagemQrcode")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            qr_copy_paste = qr.data.get("qrcode").and_then(Value::as_str).map(str::to_string);
        } else {
            warn!(status = qr.status, loc_id, "QR fetch failed; returning charge without QR payload");
        }
    }

    let pix_copy_paste = charge
        .data
        .get("pixCopiaECola")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or(qr_copy_paste)
        .unwrap_or_default();

    info!(%txid, "charge created");
    state.metrics.record_operation("create_charge", "ok");
    Ok(Json(json!({
        "charge": charge.data,
        "qr_code": qr_code,
        "qr_code_image": qr_code_image,
        "pix_copy_paste": pix_copy_paste,
    })))
}

pub async fn send_pix(
    State(state): State<AppState>,
    Json(req): Json<PayoutRequest>,
) -> ApiResult<Json<Value>> {
    let pix_key = req
        .pix_key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::missing_field("pix_key"))?;
    let amount = req.amount.ok_or_else(|| ApiError::missing_field("amount"))?;

    let token = state.efi.oauth_token().await?;
    let id_envio = next_payout_id();
    let body = json!({
        "valor": amount.formatted(),
        "pagador": { "chave": state.config.pix_key },
        "favorecido": { "chave": pix_key },
    });
    let reply = state
        .efi
        .request(
            Method::PUT,
            &format!("/v2/gn/pix/{id_envio}"),
            Some(&token),
            &[],
            Some(&body),
        )
        .await?;
    state.metrics.record_upstream("gn_pix", reply.status);
    if !reply.is_success() {
        warn!(status = reply.status, %id_envio, "gateway refused payout");
        state.metrics.record_operation("send_pix", "upstream_error");
        return Err(ApiError::Upstream {
            status: reply.status,
            body: reply.data,
        });
    }

    let e2eid = reply.data.get("e2eId").cloned().unwrap_or(Value::Null);
    info!(%id_envio, "payout dispatched");
    state.metrics.record_operation("send_pix", "ok");
    Ok(Json(json!({
        "success": true,
        "idEnvio": id_envio,
        "e2eid": e2eid,
        "data": reply.data,
    })))
}

pub async fn register_webhook(
    State(state): State<AppState>,
    Json(req): Json<WebhookRequest>,
) -> ApiResult<Json<Value>> {
    let webhook_url = req
        .webhook_url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::missing_field("webhook_url"))?;

    let token = state.efi.oauth_token().await?;
    let body = json!({ "webhookUrl": webhook_url });
    let reply = state
        .efi
        .request(
            Method::PUT,
            &webhook_path(&state.config.pix_key),
            Some(&token),
            // The gateway would otherwise call the webhook URL back over mTLS
            // before accepting it.
            &[("x-skip-mtls-checking", "true")],
            Some(&body),
        )
        .await?;
    state.metrics.record_upstream("webhook", reply.status);
    if !reply.is_success() {
        warn!(status = reply.status, "gateway refused webhook registration");
        state.metrics.record_operation("register_webhook", "upstream_error");
        return Err(ApiError::Upstream {
            status: reply.status,
            body: reply.data,
        });
    }

    info!(%webhook_url, "webhook registered");
    state.metrics.record_operation("register_webhook", "ok");
    Ok(Json(json!({ "success": true, "data": reply.data })))
}

// Unlike the other operations this one relays the gateway payload verbatim,
// whatever status the gateway answered with.
pub async fn get_balance(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let token = state.efi.oauth_token().await?;
    let reply = state
        .efi
        .request(Method::GET, "/v2/gn/saldo", Some(&token), &[], None)
        .await?;
    state.metrics.record_upstream("gn_saldo", reply.status);
    state.metrics.record_operation("balance", "ok");
    Ok(Json(reply.data))
}

fn webhook_path(pix_key: &str) -> String {
    format!("/v2/webhook/{}", urlencoding::encode(pix_key))
}

// Millisecond timestamp plus a process-local sequence; payouts issued within
// the same millisecond still get distinct identifiers.
fn next_payout_id() -> String {
    let seq = PAYOUT_SEQ.fetch_add(1, Ordering::Relaxed) % 1000;
    format!("{}{}{:03}", PAYOUT_ID_PREFIX, Utc::now().timestamp_millis(), seq)
}
