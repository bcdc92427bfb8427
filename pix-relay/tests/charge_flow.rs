use axum::body::{to_bytes, Body};
use axum::http::{response::Parts, Request};
use httpmock::prelude::*;
use pix_relay::config::RelayConfig;
use pix_relay::{router, AppState};
use serde_json::{json, Value};
use tower::util::ServiceExt;

const SECRET: &str = "s3cret";

fn app(base_url: &str) -> axum::Router {
    let config = RelayConfig {
        host: "127.0.0.1".into(),
        port: 0,
        proxy_secret: SECRET.into(),
        client_id: "client-id".into(),
        client_secret: "client-secret".into(),
        certificate: None,
        pix_key: "relay-key".into(),
        base_url: base_url.to_string(),
    };
    router(AppState::new(config).unwrap())
}

fn charge_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/create-charge")
        .header("content-type", "application/json")
        .header("x-proxy-secret", SECRET)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn call(app: axum::Router, req: Request<Body>) -> (Parts, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let (parts, body) = resp.into_parts();
    let bytes = to_bytes(body, 1024 * 64).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (parts, value)
}

fn mock_token(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST).path("/oauth/token");
        then.status(200).json_body(json!({ "access_token": "tok", "token_type": "Bearer" }));
    })
}

#[tokio::test]
async fn charge_with_qr_payload() {
    let server = MockServer::start();
    mock_token(&server);
    server.mock(|when, then| {
        when.method(PUT)
            .path("/v2/cob/abc123")
            .header("authorization", "Bearer tok")
            .json_body(json!({
                "calendario": { "expiracao": 3600 },
                "valor": { "original": "10.50" },
                "chave": "relay-key",
                "infoAdicionais": [
                    { "nome": "plataforma", "valor": "pix-relay" },
                    { "nome": "usuario", "valor": "unknown" },
                ],
            }));
        then.status(201)
            .json_body(json!({ "loc": { "id": 1 }, "pixCopiaECola": "XYZ" }));
    });
    let qr_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v2/loc/1/qrcode")
            .header("authorization", "Bearer tok");
        then.status(200)
            .json_body(json!({ "qrcode": "Q", "imagemQrcode": "IMG" }));
    });

    let (parts, body) = call(
        app(&server.base_url()),
        charge_request(json!({ "amount": "10.5", "txid": "abc123" })),
    )
    .await;

    assert_eq!(parts.status.as_u16(), 200);
    assert_eq!(body["charge"]["loc"]["id"], 1);
    assert_eq!(body["qr_code"], "Q");
    assert_eq!(body["qr_code_image"], "IMG");
    assert_eq!(body["pix_copy_paste"], "XYZ");
    assert_eq!(qr_mock.hits(), 1);
}

#[tokio::test]
async fn numeric_amount_is_formatted_to_two_decimals() {
    let server = MockServer::start();
    mock_token(&server);
    let cob_mock = server.mock(|when, then| {
        when.method(PUT)
            .path("/v2/cob/tx-num")
            .json_body_partial(r#"{ "valor": { "original": "10.50" } }"#);
        then.status(201).json_body(json!({ "pixCopiaECola": "CP" }));
    });

    let (parts, _) = call(
        app(&server.base_url()),
        charge_request(json!({ "amount": 10.5, "txid": "tx-num", "user_id": "u-77" })),
    )
    .await;

    assert_eq!(parts.status.as_u16(), 200);
    assert_eq!(cob_mock.hits(), 1);
}

#[tokio::test]
async fn qr_fetch_follows_location_id() {
    let server = MockServer::start();
    mock_token(&server);
    server.mock(|when, then| {
        when.method(PUT).path("/v2/cob/tx42");
        then.status(200).json_body(json!({ "loc": { "id": 42 } }));
    });
    let qr_mock = server.mock(|when, then| {
        when.method(GET).path("/v2/loc/42/qrcode");
        then.status(200).json_body(json!({ "qrcode": "Q42", "imagemQrcode": "I42" }));
    });

    let (parts, body) = call(
        app(&server.base_url()),
        charge_request(json!({ "amount": "1.00", "txid": "tx42" })),
    )
    .await;

    assert_eq!(parts.status.as_u16(), 200);
    assert_eq!(body["qr_code"], "Q42");
    // No pixCopiaECola on the charge; the QR string stands in for it.
    assert_eq!(body["pix_copy_paste"], "Q42");
    assert_eq!(qr_mock.hits(), 1);
}

#[tokio::test]
async fn failed_qr_fetch_still_returns_the_charge() {
    let server = MockServer::start();
    mock_token(&server);
    server.mock(|when, then| {
        when.method(PUT).path("/v2/cob/tx-qr-down");
        then.status(201)
            .json_body(json!({ "loc": { "id": 7 }, "pixCopiaECola": "XYZ" }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/v2/loc/7/qrcode");
        then.status(500).json_body(json!({ "nome": "erro_interno" }));
    });

    let (parts, body) = call(
        app(&server.base_url()),
        charge_request(json!({ "amount": "3.33", "txid": "tx-qr-down" })),
    )
    .await;

    assert_eq!(parts.status.as_u16(), 200);
    assert_eq!(body["qr_code"], "");
    assert_eq!(body["qr_code_image"], "");
    assert_eq!(body["pix_copy_paste"], "XYZ");
}

#[tokio::test]
async fn charge_without_location_skips_the_qr_fetch() {
    let server = MockServer::start();
    mock_token(&server);
    server.mock(|when, then| {
        when.method(PUT).path("/v2/cob/tx-no-loc");
        then.status(201).json_body(json!({ "pixCopiaECola": "CP" }));
    });
    let qr_mock = server.mock(|when, then| {
        when.method(GET).path_matches(regex::Regex::new(r"^/v2/loc/.*").unwrap());
        then.status(200).json_body(json!({ "qrcode": "Q" }));
    });

    let (parts, body) = call(
        app(&server.base_url()),
        charge_request(json!({ "amount": "2.00", "txid": "tx-no-loc" })),
    )
    .await;

    assert_eq!(parts.status.as_u16(), 200);
    assert_eq!(body["qr_code"], "");
    assert_eq!(body["pix_copy_paste"], "CP");
    assert_eq!(qr_mock.hits(), 0);
}

#[tokio::test]
async fn missing_txid_is_rejected_before_any_upstream_call() {
    let server = MockServer::start();
    let token_mock = mock_token(&server);

    let (parts, body) = call(
        app(&server.base_url()),
        charge_request(json!({ "amount": "10.5" })),
    )
    .await;

    assert_eq!(parts.status.as_u16(), 400);
    assert_eq!(parts.headers.get("X-Error-Code").unwrap(), "missing_field");
    assert_eq!(body["field"], "txid");
    assert_eq!(token_mock.hits(), 0);
}

#[tokio::test]
async fn missing_amount_is_rejected() {
    let server = MockServer::start();
    let (parts, body) = call(
        app(&server.base_url()),
        charge_request(json!({ "txid": "abc" })),
    )
    .await;
    assert_eq!(parts.status.as_u16(), 400);
    assert_eq!(body["field"], "amount");
}

#[tokio::test]
async fn gateway_rejection_passes_status_and_body_through() {
    let server = MockServer::start();
    mock_token(&server);
    server.mock(|when, then| {
        when.method(PUT).path("/v2/cob/tx-dup");
        then.status(409).json_body(json!({ "nome": "cobranca_duplicada" }));
    });
    let qr_mock = server.mock(|when, then| {
        when.method(GET).path_matches(regex::Regex::new(r"^/v2/loc/.*").unwrap());
        then.status(200).json_body(json!({ "qrcode": "Q" }));
    });

    let (parts, body) = call(
        app(&server.base_url()),
        charge_request(json!({ "amount": "5.00", "txid": "tx-dup" })),
    )
    .await;

    assert_eq!(parts.status.as_u16(), 409);
    assert_eq!(parts.headers.get("X-Error-Code").unwrap(), "upstream_error");
    assert_eq!(body["detail"]["nome"], "cobranca_duplicada");
    assert_eq!(qr_mock.hits(), 0);
}
