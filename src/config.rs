//! 設定
//! 環境変数（.env 対応）から AppConfig を構築

use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_url: String,
    /// バケットディレクトリの親（seller-uploads はこの下）
    pub base_data_dir: PathBuf,
    /// 公開URLのベース（末尾スラッシュなし）
    pub public_base_url: String,
    pub max_body_bytes: usize,
    pub otp_ttl_secs: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            database_url: "sqlite:data/market.db?mode=rwc".to_string(),
            base_data_dir: PathBuf::from("./data"),
            public_base_url: "http://localhost:3000".to_string(),
            max_body_bytes: 512 * 1024 * 1024,
            otp_ttl_secs: 300,
        }
    }
}

impl AppConfig {
    /// 環境変数から読み込み
    ///
    /// | Env Var           | Default                           |
    /// |-------------------|-----------------------------------|
    /// | `BIND_ADDR`       | `0.0.0.0:3000`                    |
    /// | `DATABASE_URL`    | `sqlite:data/market.db?mode=rwc`  |
    /// | `DATA_DIR`        | `./data`                          |
    /// | `PUBLIC_BASE_URL` | `http://localhost:3000`           |
    /// | `MAX_BODY_MB`     | `512`                             |
    /// | `OTP_TTL_SECS`    | `300`                             |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_body_mb: usize = env_parse("MAX_BODY_MB", defaults.max_body_bytes / (1024 * 1024));

        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: std::env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            base_data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.base_data_dir),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_base_url),
            max_body_bytes: mb_to_bytes(max_body_mb),
            otp_ttl_secs: env_parse("OTP_TTL_SECS", defaults.otp_ttl_secs),
        }
    }
}

/// MB → bytes（大きすぎる値は usize::MAX で頭打ち）
fn mb_to_bytes(mb: usize) -> usize {
    mb.saturating_mul(1024 * 1024)
}

/// 数値の環境変数。パース失敗時はデフォルトに戻して警告
fn env_parse<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("⚠️  {}={:?} is not a valid number, using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
