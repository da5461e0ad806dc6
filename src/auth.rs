//! Phone Authentication
//! 電話番号 → OTP 送信 → OTP 検証 → プロフィール設定

use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::models::{OtpChallenge, UserDetails};

pub const COUNTRY_CODE: &str = "+91";
pub const OTP_LENGTH: usize = 6;
/// 1 challenge あたりの誤入力上限。超えたら challenge は無効
pub const MAX_OTP_ATTEMPTS: i64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Please enter a valid 10-digit phone number")]
    InvalidPhone,
    #[error("Please enter the 6-digit code")]
    InvalidCode,
    #[error("Verification expired, please request a new code")]
    VerificationExpired,
    #[error("Incorrect code, please try again")]
    WrongCode,
    #[error("Too many incorrect attempts, please request a new code")]
    TooManyAttempts,
    #[error("Not signed in")]
    Unauthorized,
    #[error("Failed to send code: {0}")]
    Delivery(String),
    #[error("DB error: {0}")]
    Database(#[from] sqlx::Error),
}

/// 認証フローの次の段階
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStage {
    Otp,
    Profile,
    Done,
}

/// 10 桁（`+91` / `91` / `0` 始まりも可）を `+91XXXXXXXXXX` に正規化
pub fn normalize_phone(input: &str) -> Result<String, AuthError> {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '(' && *c != ')')
        .collect();

    let digits = if let Some(rest) = cleaned.strip_prefix(COUNTRY_CODE) {
        rest
    } else if cleaned.len() == 12 && cleaned.starts_with("91") {
        &cleaned[2..]
    } else if cleaned.len() == 11 && cleaned.starts_with('0') {
        &cleaned[1..]
    } else {
        cleaned.as_str()
    };

    if digits.len() != 10 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AuthError::InvalidPhone);
    }
    Ok(format!("{}{}", COUNTRY_CODE, digits))
}

pub fn validate_code(code: &str) -> Result<(), AuthError> {
    if code.len() != OTP_LENGTH || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AuthError::InvalidCode);
    }
    Ok(())
}

/// 有効期限（巨大な TTL は i64::MAX で頭打ち）
fn expires_at(now_ms: i64, ttl_secs: i64) -> i64 {
    now_ms.saturating_add(ttl_secs.saturating_mul(1000))
}

fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

/// verification_id をソルトにしたコードのハッシュ
fn hash_code(verification_id: &str, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verification_id.as_bytes());
    hasher.update(b":");
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

// ========================================
// SMS Vendor
// ========================================

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_otp(&self, phone_number: &str, code: &str) -> Result<(), AuthError>;
}

/// 開発用: コードをログに出すだけ
pub struct LogSmsSender;

#[async_trait]
impl SmsSender for LogSmsSender {
    async fn send_otp(&self, phone_number: &str, code: &str) -> Result<(), AuthError> {
        info!("📨 OTP for {}: {}", phone_number, code);
        Ok(())
    }
}

// ========================================
// Challenge / Verify
// ========================================

#[derive(Debug, Clone, Serialize)]
pub struct IssuedChallenge {
    pub verification_id: String,
    pub phone_number: String,
    pub expires_at_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifiedLogin {
    pub token: String,
    pub user: UserDetails,
    pub needs_profile: bool,
    pub next: AuthStage,
}

/// OTP を発行して送信（DB にはハッシュのみ保存）
///
/// challenge を保存してから送信する。送信に失敗したら challenge を削除
pub async fn issue_challenge(
    db: &DbPool,
    sms: &dyn SmsSender,
    phone_input: &str,
    ttl_secs: i64,
) -> Result<IssuedChallenge, AuthError> {
    let phone_number = normalize_phone(phone_input)?;
    let now_ms = chrono::Utc::now().timestamp_millis();
    let verification_id = Uuid::new_v4().to_string();
    let code = generate_code();
    let expires_at_ms = expires_at(now_ms, ttl_secs);

    sqlx::query(
        "INSERT INTO otp_challenges (verification_id, phone_number, code_sha256, expires_at_ms, consumed, attempts, created_at_ms) VALUES (?, ?, ?, ?, 0, 0, ?)"
    )
    .bind(&verification_id)
    .bind(&phone_number)
    .bind(hash_code(&verification_id, &code))
    .bind(expires_at_ms)
    .bind(now_ms)
    .execute(db)
    .await?;

    if let Err(e) = sms.send_otp(&phone_number, &code).await {
        warn!("❌ OTP delivery failed: verification_id={}, error={}", verification_id, e);
        sqlx::query("DELETE FROM otp_challenges WHERE verification_id = ?")
            .bind(&verification_id)
            .execute(db)
            .await?;
        return Err(e);
    }

    info!("OTP challenge issued: verification_id={}, phone={}", verification_id, phone_number);

    Ok(IssuedChallenge {
        verification_id,
        phone_number,
        expires_at_ms,
    })
}

/// OTP 検証。成功したら challenge を消費し、ユーザー作成（初回）とセッション発行
pub async fn verify_challenge(
    db: &DbPool,
    verification_id: &str,
    code: &str,
) -> Result<VerifiedLogin, AuthError> {
    let code = code.trim();
    validate_code(code)?;
    let now_ms = chrono::Utc::now().timestamp_millis();

    let challenge: Option<OtpChallenge> = sqlx::query_as(
        "SELECT * FROM otp_challenges WHERE verification_id = ?"
    )
    .bind(verification_id)
    .fetch_optional(db)
    .await?;

    let challenge = match challenge {
        Some(c) if c.consumed == 0 && c.expires_at_ms > now_ms => c,
        _ => {
            warn!("OTP verification expired or unknown: verification_id={}", verification_id);
            return Err(AuthError::VerificationExpired);
        }
    };

    if hash_code(verification_id, code) != challenge.code_sha256 {
        return Err(record_wrong_code(db, verification_id).await?);
    }

    // 同時検証で二重消費しないよう条件付き UPDATE
    let consumed = sqlx::query(
        "UPDATE otp_challenges SET consumed = 1 WHERE verification_id = ? AND consumed = 0 AND attempts < ?"
    )
    .bind(verification_id)
    .bind(MAX_OTP_ATTEMPTS)
    .execute(db)
    .await?;
    if consumed.rows_affected() == 0 {
        return Err(AuthError::VerificationExpired);
    }

    sqlx::query(
        "INSERT INTO user_details (phone_number, created_at_ms, updated_at_ms) VALUES (?, ?, ?) ON CONFLICT(phone_number) DO NOTHING"
    )
    .bind(&challenge.phone_number)
    .bind(now_ms)
    .bind(now_ms)
    .execute(db)
    .await?;

    let user: UserDetails = sqlx::query_as("SELECT * FROM user_details WHERE phone_number = ?")
        .bind(&challenge.phone_number)
        .fetch_one(db)
        .await?;

    let token = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO sessions (token, user_id, created_at_ms) VALUES (?, ?, ?)")
        .bind(&token)
        .bind(user.id)
        .bind(now_ms)
        .execute(db)
        .await?;

    let needs_profile = user.name.as_deref().map_or(true, |n| n.trim().is_empty());
    info!("✅ Phone verified: user_id={}, needs_profile={}", user.id, needs_profile);

    Ok(VerifiedLogin {
        token,
        user,
        needs_profile,
        next: if needs_profile { AuthStage::Profile } else { AuthStage::Done },
    })
}

/// 誤入力を数え、上限に達したら challenge を消費する
async fn record_wrong_code(db: &DbPool, verification_id: &str) -> Result<AuthError, AuthError> {
    let attempts: Option<(i64,)> = sqlx::query_as(
        "UPDATE otp_challenges SET attempts = attempts + 1, consumed = CASE WHEN attempts + 1 >= ? THEN 1 ELSE consumed END WHERE verification_id = ? AND consumed = 0 RETURNING attempts"
    )
    .bind(MAX_OTP_ATTEMPTS)
    .bind(verification_id)
    .fetch_optional(db)
    .await?;

    match attempts {
        Some((n,)) if n < MAX_OTP_ATTEMPTS => {
            warn!("Wrong OTP: verification_id={}, attempts={}", verification_id, n);
            Ok(AuthError::WrongCode)
        }
        Some(_) => {
            warn!("🔒 OTP locked after {} attempts: verification_id={}", MAX_OTP_ATTEMPTS, verification_id);
            Ok(AuthError::TooManyAttempts)
        }
        // 並行する検証で既に消費済み
        None => Ok(AuthError::VerificationExpired),
    }
}

/// Bearer トークンからユーザーを取得
pub async fn user_for_token(db: &DbPool, token: &str) -> Result<UserDetails, AuthError> {
    let user: Option<UserDetails> = sqlx::query_as(
        "SELECT u.* FROM user_details u JOIN sessions s ON s.user_id = u.id WHERE s.token = ?"
    )
    .bind(token)
    .fetch_optional(db)
    .await?;

    user.ok_or(AuthError::Unauthorized)
}

/// 表示名・写真の更新（初回ログイン後のプロフィール設定）
pub async fn update_profile(
    db: &DbPool,
    user_id: i64,
    name: Option<&str>,
    photo_url: Option<&str>,
) -> Result<UserDetails, AuthError> {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let name = name.map(str::trim).filter(|n| !n.is_empty());

    sqlx::query(r#"
        UPDATE user_details SET
            name = COALESCE(?, name),
            photo_url = COALESCE(?, photo_url),
            updated_at_ms = ?
        WHERE id = ?
    "#)
    .bind(name)
    .bind(photo_url)
    .bind(now_ms)
    .bind(user_id)
    .execute(db)
    .await?;

    let user: UserDetails = sqlx::query_as("SELECT * FROM user_details WHERE id = ?")
        .bind(user_id)
        .fetch_one(db)
        .await?;

    info!("Profile updated: user_id={}", user_id);
    Ok(user)
}
