use std::sync::Arc;
use tracing::info;

use vehicle_market_api::auth::LogSmsSender;
use vehicle_market_api::config::AppConfig;
use vehicle_market_api::{build_router, db, AppState};

// ========================================
// メイン
// ========================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env があれば読み込む
    dotenvy::dotenv().ok();

    // ログ初期化
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = AppConfig::from_env();
    tokio::fs::create_dir_all(&config.base_data_dir).await?;

    let pool = db::init_db(&config.database_url).await?;
    let addr = config.bind_addr.clone();
    let max_body_mb = config.max_body_bytes / (1024 * 1024);

    let state = Arc::new(AppState::new(pool, config, Arc::new(LogSmsSender)));
    let app = build_router(state);

    info!("🚀 Vehicle Market API listening on {}", addr);
    info!("📦 Max media upload size: {}MB", max_body_mb);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
