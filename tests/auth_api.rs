//! 電話番号 OTP ログイン API

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;

use common::{spawn_app, spawn_app_with, TestApp};
use vehicle_market_api::auth::MAX_OTP_ATTEMPTS;

async fn send_code(app: &TestApp, phone: &str) -> String {
    let (status, body) = app.post("/api/auth/otp/send", json!({ "phone": phone })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["next"], "otp");
    body["verification_id"].as_str().unwrap().to_string()
}

async fn authed(app: &TestApp, method: Method, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.request(request).await
}

#[tokio::test]
async fn first_login_asks_for_profile_then_completes() {
    let app = spawn_app().await;
    let vid = send_code(&app, "98765 43210").await;
    let code = app.sms.last_code_for("+919876543210").unwrap();

    let (status, body) = app
        .post(
            "/api/auth/otp/verify",
            json!({ "verification_id": vid, "code": code }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["needs_profile"], true);
    assert_eq!(body["next"], "profile");
    assert_eq!(body["user"]["phone_number"], "+919876543210");
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = authed(
        &app,
        Method::PUT,
        "/api/auth/profile",
        &token,
        json!({ "name": "Asha Rao" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Asha Rao");

    let (status, body) = authed(&app, Method::GET, "/api/auth/me", &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Asha Rao");

    // 2 回目のログインではプロフィール設定は不要
    let vid = send_code(&app, "+91 9876543210").await;
    let code = app.sms.last_code_for("+919876543210").unwrap();
    let (_, body) = app
        .post("/api/auth/otp/verify", json!({ "verification_id": vid, "code": code }))
        .await;
    assert_eq!(body["needs_profile"], false);
    assert_eq!(body["next"], "done");
    assert_eq!(app.count_rows("user_details").await, 1);
}

#[tokio::test]
async fn wrong_code_can_be_retried_but_used_code_cannot() {
    let app = spawn_app().await;
    let vid = send_code(&app, "9123456780").await;
    let code = app.sms.last_code_for("+919123456780").unwrap();
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let (status, _) = app
        .post("/api/auth/otp/verify", json!({ "verification_id": vid, "code": wrong }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .post("/api/auth/otp/verify", json!({ "verification_id": vid, "code": code }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post("/api/auth/otp/verify", json!({ "verification_id": vid, "code": code }))
        .await;
    assert_eq!(status, StatusCode::GONE);
}

#[tokio::test]
async fn repeated_wrong_codes_lock_the_challenge() {
    let app = spawn_app().await;
    let vid = send_code(&app, "9123456781").await;
    let code = app.sms.last_code_for("+919123456781").unwrap();
    let wrong = if code == "000000" { "111111" } else { "000000" };

    for _ in 1..MAX_OTP_ATTEMPTS {
        let (status, _) = app
            .post("/api/auth/otp/verify", json!({ "verification_id": vid, "code": wrong }))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, body) = app
        .post("/api/auth/otp/verify", json!({ "verification_id": vid, "code": wrong }))
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].as_str().unwrap().contains("Too many"));

    // 正しいコードでももう通らない
    let (status, _) = app
        .post("/api/auth/otp/verify", json!({ "verification_id": vid, "code": code }))
        .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(app.count_rows("sessions").await, 0);
}

#[tokio::test]
async fn failed_delivery_leaves_no_challenge() {
    let app = spawn_app().await;
    app.sms.fail_delivery.store(true, Ordering::SeqCst);

    let (status, body) = app.post("/api/auth/otp/send", json!({ "phone": "9123456782" })).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("gateway unavailable"));
    assert_eq!(app.count_rows("otp_challenges").await, 0);

    app.sms.fail_delivery.store(false, Ordering::SeqCst);
    send_code(&app, "9123456782").await;
    assert_eq!(app.count_rows("otp_challenges").await, 1);
}

#[tokio::test]
async fn malformed_input_is_rejected_before_any_lookup() {
    let app = spawn_app().await;

    let (status, _) = app.post("/api/auth/otp/send", json!({ "phone": "12345" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/api/auth/otp/verify", json!({ "verification_id": "x", "code": "12ab" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/auth/otp/verify",
            json!({ "verification_id": "no-such-id", "code": "123456" }),
        )
        .await;
    assert_eq!(status, StatusCode::GONE);
}

#[tokio::test]
async fn expired_challenge_is_gone() {
    let app = spawn_app_with(|config| config.otp_ttl_secs = 0).await;
    let vid = send_code(&app, "9000000001").await;
    let code = app.sms.last_code_for("+919000000001").unwrap();

    let (status, body) = app
        .post("/api/auth/otp/verify", json!({ "verification_id": vid, "code": code }))
        .await;
    assert_eq!(status, StatusCode::GONE);
    assert!(body["error"].as_str().unwrap().contains("expired"));
}

#[tokio::test]
async fn me_requires_a_session() {
    let app = spawn_app().await;

    let (status, _) = app.get("/api/auth/me").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = authed(&app, Method::GET, "/api/auth/me", "not-a-token", json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
