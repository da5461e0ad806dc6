//! 結合テスト共通: インメモリ SQLite + 一時バケット + SMS キャプチャ

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

use vehicle_market_api::auth::{AuthError, SmsSender};
use vehicle_market_api::config::AppConfig;
use vehicle_market_api::{build_router, db, AppState};

pub const BOUNDARY: &str = "----vehicle-market-test-boundary";
pub const JPEG_MAGIC: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

/// 送信したコードを記録する SMS ベンダー（`fail_delivery` で送信失敗を再現）
#[derive(Default)]
pub struct CapturingSms {
    sent: Mutex<Vec<(String, String)>>,
    pub fail_delivery: AtomicBool,
}

impl CapturingSms {
    pub fn last_code_for(&self, phone: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(p, _)| p == phone)
            .map(|(_, c)| c.clone())
    }
}

#[async_trait]
impl SmsSender for CapturingSms {
    async fn send_otp(&self, phone_number: &str, code: &str) -> Result<(), AuthError> {
        if self.fail_delivery.load(Ordering::SeqCst) {
            return Err(AuthError::Delivery("gateway unavailable".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((phone_number.to_string(), code.to_string()));
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub sms: Arc<CapturingSms>,
    _dir: TempDir,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(tweak: impl FnOnce(&mut AppConfig)) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig {
        database_url: "sqlite::memory:".to_string(),
        base_data_dir: dir.path().to_path_buf(),
        public_base_url: "http://test.local".to_string(),
        ..AppConfig::default()
    };
    tweak(&mut config);

    let pool = db::init_db(&config.database_url).await.unwrap();
    let sms = Arc::new(CapturingSms::default());
    let state = Arc::new(AppState::new(pool, config, sms.clone()));
    let router = build_router(Arc::clone(&state));

    TestApp {
        router,
        state,
        sms,
        _dir: dir,
    }
}

impl TestApp {
    pub async fn request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn send_json(&self, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.request(request).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send_json(Method::POST, uri, body).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send_json(Method::PUT, uri, body).await
    }

    pub async fn upload(&self, uri: &str, parts: &[Part]) -> (StatusCode, Value) {
        let request = Request::post(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.request(request).await
    }

    pub async fn count_rows(&self, table: &str) -> i64 {
        let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.state.db)
            .await
            .unwrap();
        n
    }
}

/// multipart の 1 ファイル
pub struct Part {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub fn jpeg_part(field: &str, file_name: &str) -> Part {
    let mut bytes = vec![0u8; 256];
    bytes[..4].copy_from_slice(&JPEG_MAGIC);
    Part {
        field: field.to_string(),
        file_name: file_name.to_string(),
        content_type: "image/jpeg".to_string(),
        bytes,
    }
}

pub fn video_part(field: &str) -> Part {
    Part {
        field: field.to_string(),
        file_name: "walk around.mp4".to_string(),
        content_type: "video/mp4".to_string(),
        bytes: vec![7u8; 512],
    }
}

/// 車種の全カテゴリを 1 件ずつ
pub fn full_media(vehicle: &str) -> Vec<Part> {
    let images: &[&str] = match vehicle {
        "car" => &["Exterior", "Interior", "Tyres", "Features", "Defects", "Odometer"],
        _ => &["Front", "Rear", "Left", "Right", "Defects", "Odometer"],
    };
    let mut parts: Vec<Part> = images
        .iter()
        .map(|c| jpeg_part(c, &format!("{} 1.jpg", c.to_lowercase())))
        .collect();
    parts.push(video_part("Walkaround"));
    parts
}

pub fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                part.field, part.file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", part.content_type).as_bytes());
        body.extend_from_slice(&part.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}
