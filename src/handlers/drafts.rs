//! Drafts API Handlers
//! /api/drafts エンドポイント - 出品ウィザードの途中状態

use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::draft::{update_draft, DraftListing};
use crate::error::{ApiError, ApiResult};
use crate::handlers::parse_vehicle;
use crate::wizard::{self, Transition, WizardCursor, WizardStep, WizardVariant};
use crate::AppState;

// ========================================
// Request / Response Types
// ========================================

#[derive(Debug, Deserialize)]
pub struct CreateDraftRequest {
    pub vehicle: Option<String>,
    #[serde(default)]
    pub variant: WizardVariant,
}

#[derive(Debug, Deserialize)]
pub struct SetVehicleRequest {
    pub vehicle: String,
}

#[derive(Serialize)]
pub struct DraftResponse {
    pub success: bool,
    pub draft_id: String,
    pub current_step: WizardStep,
    pub draft: DraftListing,
}

#[derive(Serialize)]
pub struct NavigationResponse {
    pub success: bool,
    pub draft_id: String,
    pub transition: Transition,
    pub current_step: WizardStep,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted: bool,
}

fn draft_response(draft_id: String, draft: DraftListing) -> Json<DraftResponse> {
    Json(DraftResponse {
        success: true,
        draft_id,
        current_step: draft.cursor.current(),
        draft,
    })
}

// ========================================
// Handlers
// ========================================

/// POST /api/drafts - Draft作成
pub async fn create_draft(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateDraftRequest>,
) -> ApiResult<Json<DraftResponse>> {
    let vehicle = req.vehicle.as_deref().map(parse_vehicle).transpose()?;
    let draft = DraftListing::new(vehicle, WizardCursor::new(req.variant));
    let draft_id = state.drafts.create(&draft).await?;

    Ok(draft_response(draft_id, draft))
}

/// GET /api/drafts/:draft_id - Draft取得
pub async fn get_draft(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
) -> ApiResult<Json<DraftResponse>> {
    let draft = state.drafts.load(&draft_id).await?;
    Ok(draft_response(draft_id, draft))
}

/// DELETE /api/drafts/:draft_id - Draft破棄
pub async fn delete_draft(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let deleted = state.drafts.clear(&draft_id).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("Draft not found: {}", draft_id)));
    }
    Ok(Json(DeleteResponse {
        success: true,
        deleted,
    }))
}

/// PUT /api/drafts/:draft_id/vehicle - 車種切替
pub async fn set_vehicle(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
    Json(req): Json<SetVehicleRequest>,
) -> ApiResult<Json<DraftResponse>> {
    let vehicle = parse_vehicle(&req.vehicle)?;
    let (draft, ()) = update_draft(state.drafts.as_ref(), &draft_id, |d| {
        d.set_vehicle(vehicle);
        Ok::<_, ApiError>(())
    })
    .await?;

    info!("Draft vehicle set: draft_id={}, vehicle={}", draft_id, vehicle);
    Ok(draft_response(draft_id, draft))
}

/// PUT /api/drafts/:draft_id/steps/:step - ステップ保存（検証 → 置換 → 次へ）
pub async fn save_step(
    State(state): State<Arc<AppState>>,
    Path((draft_id, step)): Path<(String, String)>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<Json<DraftResponse>> {
    let patch = wizard::parse_patch(&step, body)?;
    wizard::validate_patch(&patch)?;
    let completed = wizard::step_of(&patch);

    let (draft, ()) = update_draft(state.drafts.as_ref(), &draft_id, |d| {
        d.apply(patch.clone());
        d.cursor.complete(completed);
        Ok::<_, ApiError>(())
    })
    .await?;

    info!("Draft step saved: draft_id={}, step={}", draft_id, step);
    Ok(draft_response(draft_id, draft))
}

/// POST /api/drafts/:draft_id/next - 1 ステップ進む
pub async fn next_step(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
) -> ApiResult<Json<NavigationResponse>> {
    let (draft, ()) = update_draft(state.drafts.as_ref(), &draft_id, |d| {
        d.cursor.next();
        Ok::<_, ApiError>(())
    })
    .await?;

    Ok(Json(NavigationResponse {
        success: true,
        draft_id,
        transition: Transition::Moved,
        current_step: draft.cursor.current(),
    }))
}

/// POST /api/drafts/:draft_id/back - 1 ステップ戻る（先頭なら exit）
pub async fn back_step(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
) -> ApiResult<Json<NavigationResponse>> {
    let (draft, transition) = update_draft(state.drafts.as_ref(), &draft_id, |d| {
        Ok::<_, ApiError>(d.cursor.back())
    })
    .await?;

    Ok(Json(NavigationResponse {
        success: true,
        draft_id,
        transition,
        current_step: draft.cursor.current(),
    }))
}
