//! Database Module
//! SQLite を使用した listings / drafts / users / OTP の管理

use anyhow::Result;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use tracing::info;

use crate::models::VehicleType;

/// データベース接続プール
pub type DbPool = Pool<Sqlite>;

/// データベースを初期化
///
/// `sqlite::memory:` の場合は接続ごとに別DBになるため接続数を1に制限する
pub async fn init_db(database_url: &str) -> Result<DbPool> {
    info!("Initializing database: {}", database_url);

    let in_memory = database_url.contains(":memory:");
    let mut options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
    if in_memory {
        // 接続が閉じられると DB ごと消える
        options = options.idle_timeout(None).max_lifetime(None);
    }

    let pool = options.connect(database_url).await?;

    // スキーマ作成
    create_schema(&pool).await?;

    info!("Database initialized successfully");
    Ok(pool)
}

/// スキーマ作成
async fn create_schema(pool: &DbPool) -> Result<()> {
    // buyer listings（閲覧用、car / bike 共通スキーマ）
    for vehicle in [VehicleType::Car, VehicleType::Bike] {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                brand TEXT NOT NULL,
                model TEXT NOT NULL,
                variant TEXT,
                year INTEGER,
                kilometers_driven INTEGER,
                fuel_type TEXT,
                transmission_type TEXT,
                price INTEGER NOT NULL,
                city TEXT,
                image_url TEXT,
                created_at_ms INTEGER NOT NULL
            )
            "#,
            vehicle.buyer_table()
        ))
        .execute(pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{0}_city ON {0}(city)",
            vehicle.buyer_table()
        ))
        .execute(pool)
        .await?;
    }

    // seller listings（publish 先、draft_id で二重登録を防ぐ）
    for vehicle in [VehicleType::Car, VehicleType::Bike] {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                draft_id TEXT NOT NULL UNIQUE,
                registration_number TEXT,
                rto_state TEXT,
                rto TEXT,
                body_type TEXT,
                engine_cc INTEGER,
                load_capacity REAL,
                number_of_owners INTEGER,
                ownership_type TEXT,
                fuel_type TEXT,
                color TEXT,
                transmission_type TEXT,
                modifications TEXT,
                battery_health TEXT,
                warranty_status TEXT,
                loan_status TEXT,
                tire_condition TEXT,
                permit_type TEXT,
                fitness_certificate TEXT,
                accident_history TEXT,
                seller_name TEXT,
                sell_price INTEGER,
                seller_phone_number TEXT,
                seller_location_city TEXT,
                preferred_contact_time TEXT,
                reason_for_sale TEXT,
                aadhaar_number TEXT,
                pan_number TEXT,
                live_location TEXT,
                brand TEXT,
                year INTEGER,
                model TEXT,
                variant TEXT,
                kilometers_driven INTEGER,
                photos TEXT NOT NULL,
                features TEXT NOT NULL,
                listing_fee INTEGER NOT NULL,
                promo_code TEXT,
                created_at_ms INTEGER NOT NULL
            )
            "#,
            vehicle.seller_table()
        ))
        .execute(pool)
        .await?;
    }

    // drafts テーブル（1 draft = 1 行、JSON body + schema_version、revision で楽観ロック）
    sqlx::query(r#"
        CREATE TABLE IF NOT EXISTS drafts (
            draft_id TEXT PRIMARY KEY,
            schema_version INTEGER NOT NULL,
            body TEXT NOT NULL,
            revision INTEGER NOT NULL DEFAULT 0,
            created_at_ms INTEGER NOT NULL,
            updated_at_ms INTEGER NOT NULL
        )
    "#)
    .execute(pool)
    .await?;

    // user_details テーブル（電話番号 → 表示名）
    sqlx::query(r#"
        CREATE TABLE IF NOT EXISTS user_details (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            phone_number TEXT NOT NULL UNIQUE,
            name TEXT,
            photo_url TEXT,
            created_at_ms INTEGER NOT NULL,
            updated_at_ms INTEGER NOT NULL
        )
    "#)
    .execute(pool)
    .await?;

    // otp_challenges テーブル（コードは sha256 のみ保存）
    sqlx::query(r#"
        CREATE TABLE IF NOT EXISTS otp_challenges (
            verification_id TEXT PRIMARY KEY,
            phone_number TEXT NOT NULL,
            code_sha256 TEXT NOT NULL,
            expires_at_ms INTEGER NOT NULL,
            consumed INTEGER NOT NULL DEFAULT 0,
            attempts INTEGER NOT NULL DEFAULT 0,
            created_at_ms INTEGER NOT NULL
        )
    "#)
    .execute(pool)
    .await?;

    // sessions テーブル
    sqlx::query(r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            created_at_ms INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES user_details(id)
        )
    "#)
    .execute(pool)
    .await?;

    // インデックス作成
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_otp_phone ON otp_challenges(phone_number)")
        .execute(pool).await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)")
        .execute(pool).await?;

    Ok(())
}
