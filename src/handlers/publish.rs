//! Publish API Handlers
//! 料金（プロモコード）、書類チェックリスト、掲載

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::checklist::{ChecklistState, DocumentItem};
use crate::draft::update_draft;
use crate::error::{ApiError, ApiResult};
use crate::pricing::{self, Quote};
use crate::publish::{self, Published};
use crate::wizard::WizardStep;
use crate::AppState;

// ========================================
// Request / Response Types
// ========================================

#[derive(Debug, Deserialize)]
pub struct PromoRequest {
    pub code: String,
}

#[derive(Serialize)]
pub struct PricingResponse {
    pub success: bool,
    pub quote: Quote,
}

#[derive(Serialize)]
pub struct ChecklistItemResponse {
    pub item: DocumentItem,
    pub label: &'static str,
}

#[derive(Serialize)]
pub struct ChecklistResponse {
    pub success: bool,
    pub items: Vec<ChecklistItemResponse>,
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    #[serde(default)]
    pub checked: Vec<DocumentItem>,
}

#[derive(Serialize)]
pub struct PublishResponse {
    pub success: bool,
    pub draft_id: String,
    #[serde(flatten)]
    pub published: Published,
}

// ========================================
// Handlers
// ========================================

/// GET /api/drafts/:draft_id/pricing - 現在の料金
pub async fn get_pricing(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
) -> ApiResult<Json<PricingResponse>> {
    let draft = state.drafts.load(&draft_id).await?;
    Ok(Json(PricingResponse {
        success: true,
        quote: draft.pricing,
    }))
}

/// POST /api/drafts/:draft_id/promo - プロモコード適用
pub async fn apply_promo(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
    Json(req): Json<PromoRequest>,
) -> ApiResult<Json<PricingResponse>> {
    // 無効コードの場合は draft を変更しない
    let quote = pricing::apply_promo(&req.code)?;

    let (draft, ()) = update_draft(state.drafts.as_ref(), &draft_id, |d| {
        d.pricing = quote.clone();
        d.cursor.complete(WizardStep::Pricing);
        Ok::<_, ApiError>(())
    })
    .await?;

    info!("Promo applied: draft_id={}, fee={}", draft_id, draft.pricing.fee);
    Ok(Json(PricingResponse {
        success: true,
        quote: draft.pricing,
    }))
}

/// GET /api/drafts/:draft_id/checklist - 表示される書類項目
pub async fn get_checklist(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
) -> ApiResult<Json<ChecklistResponse>> {
    let draft = state.drafts.load(&draft_id).await?;
    let items = ChecklistState::for_draft(&draft)
        .visible()
        .iter()
        .map(|item| ChecklistItemResponse {
            item: *item,
            label: item.label(),
        })
        .collect();

    Ok(Json(ChecklistResponse {
        success: true,
        items,
    }))
}

/// POST /api/drafts/:draft_id/publish - 掲載
pub async fn publish_draft(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
    Json(req): Json<PublishRequest>,
) -> ApiResult<Json<PublishResponse>> {
    let published =
        publish::publish_draft(&state.db, state.drafts.as_ref(), &draft_id, &req.checked).await?;

    Ok(Json(PublishResponse {
        success: true,
        draft_id,
        published,
    }))
}
