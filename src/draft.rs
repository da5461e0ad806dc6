//! Draft Listing
//! 出品ウィザードの途中状態（1 draft = 1 レコード、schema_version 付き）

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::db::DbPool;
use crate::media::MediaManifest;
use crate::models::VehicleType;
use crate::pricing::Quote;
use crate::wizard::WizardCursor;

/// 保存フォーマットのバージョン
pub const DRAFT_SCHEMA_VERSION: i64 = 1;

// ========================================
// Field Groups（各ステップが丸ごと書き込む単位）
// ========================================

/// Step 1: 登録情報
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub registration_number: String,
    pub rto_state: Option<String>,
    pub rto: Option<String>,
    pub body_type: Option<String>,
    pub engine_cc: Option<i64>,
    pub load_capacity: Option<f64>,
}

/// Step 2: 所有・使用状況
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ownership {
    pub number_of_owners: Option<i64>,
    pub ownership_type: Option<String>,
    pub fuel_type: String,
    pub color: Option<String>,
    pub transmission_type: String,
    pub modifications: Option<String>,
    pub battery_health: Option<String>,
}

/// Step 3: 車両状態
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub warranty_status: Option<String>,
    pub loan_status: Option<String>,
    pub tire_condition: Option<String>,
    pub permit_type: Option<String>,
    pub fitness_certificate: Option<String>,
    pub accident_history: String,
}

/// Step 5: 売主・価格
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Commercial {
    pub seller_name: String,
    pub sell_price: i64,
    pub seller_phone_number: String,
    pub seller_location_city: Option<String>,
    pub preferred_contact_time: Option<String>,
    pub reason_for_sale: Option<String>,
}

/// Step 6: 本人確認
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub aadhaar_number: Option<String>,
    pub pan_number: Option<String>,
    pub live_location: Option<String>,
}

/// Sell form: 車両の基本情報
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleIdentity {
    pub brand: String,
    pub year: i64,
    pub model: String,
    pub variant: Option<String>,
    pub kilometers_driven: Option<i64>,
}

/// ステップ単位の部分更新
#[derive(Debug, Clone, PartialEq)]
pub enum StepPatch {
    Registration(Registration),
    Ownership(Ownership),
    Condition(Condition),
    Commercial(Commercial),
    Identity(Identity),
    VehicleIdentity(VehicleIdentity),
    Features(Vec<String>),
}

// ========================================
// DraftListing
// ========================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftListing {
    pub vehicle: Option<VehicleType>,
    pub cursor: WizardCursor,
    pub registration: Option<Registration>,
    pub ownership: Option<Ownership>,
    pub condition: Option<Condition>,
    pub media: Option<MediaManifest>,
    pub commercial: Option<Commercial>,
    pub identity: Option<Identity>,
    pub vehicle_identity: Option<VehicleIdentity>,
    pub features: Vec<String>,
    pub pricing: Quote,
}

impl DraftListing {
    pub fn new(vehicle: Option<VehicleType>, cursor: WizardCursor) -> Self {
        Self {
            vehicle,
            cursor,
            ..Default::default()
        }
    }

    /// グループ単位で置き換え（後勝ち、マージはしない）
    pub fn apply(&mut self, patch: StepPatch) {
        match patch {
            StepPatch::Registration(v) => self.registration = Some(v),
            StepPatch::Ownership(v) => self.ownership = Some(v),
            StepPatch::Condition(v) => self.condition = Some(v),
            StepPatch::Commercial(v) => self.commercial = Some(v),
            StepPatch::Identity(v) => self.identity = Some(v),
            StepPatch::VehicleIdentity(v) => self.vehicle_identity = Some(v),
            StepPatch::Features(v) => self.features = v,
        }
    }

    /// 車種切替。新しい車種に存在しないメディアカテゴリは破棄する
    pub fn set_vehicle(&mut self, vehicle: VehicleType) {
        if self.vehicle == Some(vehicle) {
            return;
        }
        if let Some(media) = self.media.as_mut() {
            let dropped = media.retain_for(vehicle);
            if !dropped.is_empty() {
                info!("Dropped media categories on vehicle switch: {:?}", dropped);
            }
        }
        self.vehicle = Some(vehicle);
    }
}

// ========================================
// Errors
// ========================================

#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error("Draft not found: {0}")]
    NotFound(String),
    #[error("DB error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("Draft encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Draft {0} is being edited elsewhere, please retry")]
    Conflict(String),
}

// ========================================
// DraftStore（保存先の抽象）
// ========================================

/// 楽観ロックの再試行上限
pub const MAX_UPDATE_ATTEMPTS: usize = 32;

#[async_trait]
pub trait DraftStore: Send + Sync {
    /// 新規作成して draft_id を返す
    async fn create(&self, draft: &DraftListing) -> Result<String, DraftError>;
    /// draft と現在の revision
    async fn load_versioned(&self, draft_id: &str) -> Result<(DraftListing, i64), DraftError>;
    /// revision が `expected_revision` のままなら上書きして true、変わっていたら false
    /// （存在しなければ NotFound）
    async fn save(
        &self,
        draft_id: &str,
        draft: &DraftListing,
        expected_revision: i64,
    ) -> Result<bool, DraftError>;
    /// 削除。存在した場合 true
    async fn clear(&self, draft_id: &str) -> Result<bool, DraftError>;

    async fn load(&self, draft_id: &str) -> Result<DraftListing, DraftError> {
        Ok(self.load_versioned(draft_id).await?.0)
    }
}

/// load → 変更 → save（revision が変わっていたら読み直して再適用）
pub async fn update_draft<T, E, F>(
    store: &dyn DraftStore,
    draft_id: &str,
    mut f: F,
) -> Result<(DraftListing, T), E>
where
    F: FnMut(&mut DraftListing) -> Result<T, E>,
    E: From<DraftError>,
{
    for attempt in 1..=MAX_UPDATE_ATTEMPTS {
        let (mut draft, revision) = store.load_versioned(draft_id).await?;
        let out = f(&mut draft)?;
        if store.save(draft_id, &draft, revision).await? {
            return Ok((draft, out));
        }
        debug!("Draft {} changed concurrently, retrying (attempt {})", draft_id, attempt);
    }

    warn!("⚠️  Gave up updating draft {} after {} attempts", draft_id, MAX_UPDATE_ATTEMPTS);
    Err(DraftError::Conflict(draft_id.to_string()).into())
}

/// 保存済み body の復元。壊れていたら警告して空の draft
fn decode_body(draft_id: &str, schema_version: i64, body: &str) -> DraftListing {
    if schema_version > DRAFT_SCHEMA_VERSION {
        warn!(
            "⚠️  Draft {} has schema_version {} (supported {}), decoding anyway",
            draft_id, schema_version, DRAFT_SCHEMA_VERSION
        );
    }
    match serde_json::from_str(body) {
        Ok(draft) => draft,
        Err(e) => {
            warn!("⚠️  Corrupt draft body for {}: {}, using empty draft", draft_id, e);
            DraftListing::default()
        }
    }
}

fn generate_draft_id() -> String {
    let random_bytes: [u8; 10] = rand::thread_rng().gen();
    let encoded = base32::encode(base32::Alphabet::Crockford, &random_bytes);
    format!("DRAFT_{}", encoded)
}

/// SQLite の drafts テーブルに保存
pub struct SqliteDraftStore {
    db: DbPool,
}

impl SqliteDraftStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DraftStore for SqliteDraftStore {
    async fn create(&self, draft: &DraftListing) -> Result<String, DraftError> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let draft_id = generate_draft_id();
        let body = serde_json::to_string(draft)?;

        sqlx::query(
            "INSERT INTO drafts (draft_id, schema_version, body, created_at_ms, updated_at_ms) VALUES (?, ?, ?, ?, ?)"
        )
        .bind(&draft_id)
        .bind(DRAFT_SCHEMA_VERSION)
        .bind(&body)
        .bind(now_ms)
        .bind(now_ms)
        .execute(&self.db)
        .await?;

        info!("Draft created: draft_id={}", draft_id);
        Ok(draft_id)
    }

    async fn load_versioned(&self, draft_id: &str) -> Result<(DraftListing, i64), DraftError> {
        let row: Option<(i64, String, i64)> = sqlx::query_as(
            "SELECT schema_version, body, revision FROM drafts WHERE draft_id = ?"
        )
        .bind(draft_id)
        .fetch_optional(&self.db)
        .await?;

        let (schema_version, body, revision) =
            row.ok_or_else(|| DraftError::NotFound(draft_id.to_string()))?;
        Ok((decode_body(draft_id, schema_version, &body), revision))
    }

    async fn save(
        &self,
        draft_id: &str,
        draft: &DraftListing,
        expected_revision: i64,
    ) -> Result<bool, DraftError> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let body = serde_json::to_string(draft)?;

        let result = sqlx::query(
            "UPDATE drafts SET schema_version = ?, body = ?, revision = revision + 1, updated_at_ms = ? WHERE draft_id = ? AND revision = ?"
        )
        .bind(DRAFT_SCHEMA_VERSION)
        .bind(&body)
        .bind(now_ms)
        .bind(draft_id)
        .bind(expected_revision)
        .execute(&self.db)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM drafts WHERE draft_id = ?")
            .bind(draft_id)
            .fetch_optional(&self.db)
            .await?;
        match exists {
            Some(_) => Ok(false),
            None => Err(DraftError::NotFound(draft_id.to_string())),
        }
    }

    async fn clear(&self, draft_id: &str) -> Result<bool, DraftError> {
        let result = sqlx::query("DELETE FROM drafts WHERE draft_id = ?")
            .bind(draft_id)
            .execute(&self.db)
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!("Draft cleared: draft_id={}", draft_id);
        }
        Ok(removed)
    }
}

/// プロセス内メモリに保存（body は JSON 文字列のまま、revision と一緒に保持）
#[derive(Default)]
pub struct MemoryDraftStore {
    drafts: RwLock<HashMap<String, (i64, String)>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn create(&self, draft: &DraftListing) -> Result<String, DraftError> {
        let draft_id = generate_draft_id();
        let body = serde_json::to_string(draft)?;
        self.drafts.write().await.insert(draft_id.clone(), (0, body));
        Ok(draft_id)
    }

    async fn load_versioned(&self, draft_id: &str) -> Result<(DraftListing, i64), DraftError> {
        let drafts = self.drafts.read().await;
        let (revision, body) = drafts
            .get(draft_id)
            .ok_or_else(|| DraftError::NotFound(draft_id.to_string()))?;
        Ok((decode_body(draft_id, DRAFT_SCHEMA_VERSION, body), *revision))
    }

    async fn save(
        &self,
        draft_id: &str,
        draft: &DraftListing,
        expected_revision: i64,
    ) -> Result<bool, DraftError> {
        let body = serde_json::to_string(draft)?;
        let mut drafts = self.drafts.write().await;
        match drafts.get_mut(draft_id) {
            Some((revision, _)) if *revision != expected_revision => Ok(false),
            Some(slot) => {
                *slot = (expected_revision + 1, body);
                Ok(true)
            }
            None => Err(DraftError::NotFound(draft_id.to_string())),
        }
    }

    async fn clear(&self, draft_id: &str) -> Result<bool, DraftError> {
        Ok(self.drafts.write().await.remove(draft_id).is_some())
    }
}
