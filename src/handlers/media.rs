//! Media API Handlers
//! POST /api/drafts/:draft_id/media - 写真・動画のアップロード（Multipart）
//!
//! フィールド名 = カテゴリ名（例: "Exterior", "Walkaround"）、各フィールドに 1 ファイル

use axum::{
    extract::{Multipart, Path, State},
    response::Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::media::{self, FailedUpload, IncomingFile, MediaCategory, MediaError, MediaManifest};
use crate::wizard::WizardStep;
use crate::AppState;

#[derive(Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub draft_id: String,
    pub manifest: MediaManifest,
    pub failed: Vec<FailedUpload>,
    pub current_step: WizardStep,
}

/// POST /api/drafts/:draft_id/media
pub async fn upload_media(
    State(state): State<Arc<AppState>>,
    Path(draft_id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let draft = state.drafts.load(&draft_id).await?;
    let vehicle = draft.vehicle.ok_or(MediaError::NoVehicle)?;

    let mut files: Vec<IncomingFile> = Vec::new();

    // multipart フィールドを解析
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!("❌ Field read error: {:?}", e);
        ApiError::BadRequest(format!("Field read error: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();
        let Some(file_name) = field.file_name().map(|s| s.to_string()) else {
            warn!("⚠️  Ignoring non-file field: {}", name);
            continue;
        };

        let category = MediaCategory::parse(vehicle, &name).ok_or_else(|| {
            MediaError::UnknownCategory {
                vehicle,
                name: name.clone(),
            }
        })?;
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let bytes = field.bytes().await.map_err(|e| {
            warn!("❌ File bytes read error: {:?}", e);
            ApiError::BadRequest(format!("File read error: {}", e))
        })?;

        info!("📄 {} / {} ({}, {} bytes)", category.name(), file_name, content_type, bytes.len());
        files.push(IncomingFile {
            category,
            file_name,
            content_type,
            bytes,
        });
    }

    media::validate_batch(vehicle, &files)?;

    let outcome = media::upload_all(Arc::clone(&state.objects), vehicle, files).await;

    // manifest を draft に保存（車種が途中で変わっていないことを確認）
    let (draft, ()) = crate::draft::update_draft(state.drafts.as_ref(), &draft_id, |d| {
        if d.vehicle != Some(vehicle) {
            return Err(ApiError::BadRequest(
                "Vehicle type changed during upload, please upload again".to_string(),
            ));
        }
        d.media = Some(outcome.manifest.clone());
        d.cursor.complete(WizardStep::Media);
        Ok(())
    })
    .await?;

    Ok(Json(UploadResponse {
        success: true,
        draft_id,
        manifest: outcome.manifest,
        failed: outcome.failed,
        current_step: draft.cursor.current(),
    }))
}
