//! Vehicle marketplace API
//! 車・バイクの閲覧、出品ウィザード、電話番号 OTP ログイン

pub mod auth;
pub mod checklist;
pub mod config;
pub mod db;
pub mod draft;
pub mod error;
pub mod handlers;
pub mod media;
pub mod models;
pub mod otp_input;
pub mod pricing;
pub mod publish;
pub mod wizard;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::auth::SmsSender;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::draft::{DraftStore, SqliteDraftStore};
use crate::media::{LocalObjectStore, ObjectStore, BUCKET};

/// ハンドラ共有状態
pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub drafts: Arc<dyn DraftStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub sms: Arc<dyn SmsSender>,
}

impl AppState {
    /// 標準構成（drafts は SQLite、バケットはローカルディスク）
    pub fn new(db: DbPool, config: AppConfig, sms: Arc<dyn SmsSender>) -> Self {
        let objects = LocalObjectStore::new(&config.base_data_dir, &config.public_base_url);
        Self {
            drafts: Arc::new(SqliteDraftStore::new(db.clone())),
            objects: Arc::new(objects),
            db,
            config,
            sms,
        }
    }
}

/// ルーター構築
pub fn build_router(state: Arc<AppState>) -> Router {
    let bucket_dir = state.config.base_data_dir.join(BUCKET);

    let media_routes = Router::new()
        .route("/api/drafts/:draft_id/media", post(handlers::media::upload_media))
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes));

    Router::new()
        .route("/api/health", get(handlers::health_check))
        // 閲覧
        .route("/api/listings/:vehicle", get(handlers::listings::list_listings))
        .route("/api/listings/:vehicle/:id", get(handlers::listings::get_listing))
        // 出品ウィザード
        .route("/api/drafts", post(handlers::drafts::create_draft))
        .route(
            "/api/drafts/:draft_id",
            get(handlers::drafts::get_draft).delete(handlers::drafts::delete_draft),
        )
        .route("/api/drafts/:draft_id/vehicle", put(handlers::drafts::set_vehicle))
        .route("/api/drafts/:draft_id/steps/:step", put(handlers::drafts::save_step))
        .route("/api/drafts/:draft_id/next", post(handlers::drafts::next_step))
        .route("/api/drafts/:draft_id/back", post(handlers::drafts::back_step))
        .route("/api/drafts/:draft_id/pricing", get(handlers::publish::get_pricing))
        .route("/api/drafts/:draft_id/promo", post(handlers::publish::apply_promo))
        .route("/api/drafts/:draft_id/checklist", get(handlers::publish::get_checklist))
        .route("/api/drafts/:draft_id/publish", post(handlers::publish::publish_draft))
        // 認証
        .route("/api/auth/otp/send", post(handlers::auth::send_otp))
        .route("/api/auth/otp/verify", post(handlers::auth::verify_otp))
        .route("/api/auth/me", get(handlers::auth::me))
        .route("/api/auth/profile", put(handlers::auth::update_profile))
        .merge(media_routes)
        // アップロード済みファイルの配信
        .nest_service(&format!("/{}", BUCKET), ServeDir::new(bucket_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
