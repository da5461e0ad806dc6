//! Auth API Handlers
//! /api/auth エンドポイント - 電話番号 OTP ログイン

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{self, AuthError, AuthStage, IssuedChallenge, VerifiedLogin};
use crate::error::ApiResult;
use crate::models::UserDetails;
use crate::AppState;

// ========================================
// Request / Response Types
// ========================================

#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    pub phone: String,
}

#[derive(Serialize)]
pub struct SendOtpResponse {
    pub success: bool,
    #[serde(flatten)]
    pub challenge: IssuedChallenge,
    pub next: AuthStage,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    pub verification_id: String,
    pub code: String,
}

#[derive(Serialize)]
pub struct VerifyOtpResponse {
    pub success: bool,
    #[serde(flatten)]
    pub login: VerifiedLogin,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: UserDetails,
}

/// `Authorization: Bearer <token>` からトークンを取り出す
fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::Unauthorized)
}

// ========================================
// Handlers
// ========================================

/// POST /api/auth/otp/send - OTP送信
pub async fn send_otp(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendOtpRequest>,
) -> ApiResult<Json<SendOtpResponse>> {
    let challenge = auth::issue_challenge(
        &state.db,
        state.sms.as_ref(),
        &req.phone,
        state.config.otp_ttl_secs,
    )
    .await?;

    Ok(Json(SendOtpResponse {
        success: true,
        challenge,
        next: AuthStage::Otp,
    }))
}

/// POST /api/auth/otp/verify - OTP検証
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyOtpRequest>,
) -> ApiResult<Json<VerifyOtpResponse>> {
    let login = auth::verify_challenge(&state.db, &req.verification_id, &req.code).await?;
    Ok(Json(VerifyOtpResponse {
        success: true,
        login,
    }))
}

/// GET /api/auth/me - ログイン中ユーザー
pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<UserResponse>> {
    let token = bearer_token(&headers)?;
    let user = auth::user_for_token(&state.db, token).await?;
    Ok(Json(UserResponse {
        success: true,
        user,
    }))
}

/// PUT /api/auth/profile - プロフィール設定
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<UserResponse>> {
    let token = bearer_token(&headers)?;
    let user = auth::user_for_token(&state.db, token).await?;
    let user = auth::update_profile(
        &state.db,
        user.id,
        req.name.as_deref(),
        req.photo_url.as_deref(),
    )
    .await?;

    Ok(Json(UserResponse {
        success: true,
        user,
    }))
}
