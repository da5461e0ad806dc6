//! Listings API Handlers
//! /api/listings エンドポイント（buyer 向け閲覧）

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::handlers::parse_vehicle;
use crate::models::{BuyerListing, VehicleType};
use crate::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

// ========================================
// Response Types
// ========================================

#[derive(Serialize)]
pub struct ListingListResponse {
    pub success: bool,
    pub vehicle: VehicleType,
    pub listings: Vec<BuyerListing>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct ListingDetailResponse {
    pub success: bool,
    pub listing: BuyerListing,
}

// ========================================
// Query Parameters
// ========================================

#[derive(Debug, Deserialize)]
pub struct ListListingsQuery {
    pub city: Option<String>,
    pub limit: Option<i64>,
}

// ========================================
// Handlers
// ========================================

/// GET /api/listings/:vehicle - 一覧取得（新しい順、city で絞り込み）
pub async fn list_listings(
    State(state): State<Arc<AppState>>,
    Path(vehicle): Path<String>,
    Query(query): Query<ListListingsQuery>,
) -> ApiResult<Json<ListingListResponse>> {
    let vehicle = parse_vehicle(&vehicle)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let city = query.city.as_deref().map(str::trim).filter(|c| !c.is_empty());

    let listings: Vec<BuyerListing> = if let Some(city) = city {
        sqlx::query_as(&format!(
            "SELECT * FROM {} WHERE city = ? COLLATE NOCASE ORDER BY created_at_ms DESC, id DESC LIMIT ?",
            vehicle.buyer_table()
        ))
        .bind(city)
        .bind(limit)
        .fetch_all(&state.db)
        .await
    } else {
        sqlx::query_as(&format!(
            "SELECT * FROM {} ORDER BY created_at_ms DESC, id DESC LIMIT ?",
            vehicle.buyer_table()
        ))
        .bind(limit)
        .fetch_all(&state.db)
        .await
    }?;

    let total = listings.len();
    Ok(Json(ListingListResponse {
        success: true,
        vehicle,
        listings,
        total,
    }))
}

/// GET /api/listings/:vehicle/:id - 詳細取得
pub async fn get_listing(
    State(state): State<Arc<AppState>>,
    Path((vehicle, id)): Path<(String, i64)>,
) -> ApiResult<Json<ListingDetailResponse>> {
    let vehicle = parse_vehicle(&vehicle)?;

    let listing: Option<BuyerListing> = sqlx::query_as(&format!(
        "SELECT * FROM {} WHERE id = ?",
        vehicle.buyer_table()
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await?;

    match listing {
        Some(listing) => Ok(Json(ListingDetailResponse {
            success: true,
            listing,
        })),
        None => Err(ApiError::NotFound("Listing not found".to_string())),
    }
}
