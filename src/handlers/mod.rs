//! HTTP Handlers

pub mod auth;
pub mod drafts;
pub mod listings;
pub mod media;
pub mod publish;

use axum::response::Json;
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::models::{InvalidVehicleType, VehicleType};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// GET /api/health - ヘルスチェック
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "vehicle-market-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// パスの車種（"car" / "bike"）
pub(crate) fn parse_vehicle(raw: &str) -> ApiResult<VehicleType> {
    raw.parse()
        .map_err(|e: InvalidVehicleType| ApiError::BadRequest(e.to_string()))
}
