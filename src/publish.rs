//! Publish
//! draft から最終レコードを組み立てて seller テーブルに挿入する

use serde::Serialize;
use tracing::{info, warn};

use crate::checklist::{ChecklistState, DocumentItem};
use crate::db::DbPool;
use crate::draft::{DraftError, DraftListing, DraftStore};
use crate::models::VehicleType;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Vehicle type is not set for this draft")]
    NoVehicle,
    #[error("Please confirm all documents: {}", .0.iter().map(|i| i.label()).collect::<Vec<_>>().join(", "))]
    ChecklistIncomplete(Vec<DocumentItem>),
    #[error("Draft {0} has already been published")]
    AlreadyPublished(String),
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error("DB error: {0}")]
    Database(#[from] sqlx::Error),
}

/// seller テーブル 1 行分（欠けた値は NULL）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SellerRecord {
    pub draft_id: String,
    pub registration_number: Option<String>,
    pub rto_state: Option<String>,
    pub rto: Option<String>,
    pub body_type: Option<String>,
    pub engine_cc: Option<i64>,
    pub load_capacity: Option<f64>,
    pub number_of_owners: Option<i64>,
    pub ownership_type: Option<String>,
    pub fuel_type: Option<String>,
    pub color: Option<String>,
    pub transmission_type: Option<String>,
    pub modifications: Option<String>,
    pub battery_health: Option<String>,
    pub warranty_status: Option<String>,
    pub loan_status: Option<String>,
    pub tire_condition: Option<String>,
    pub permit_type: Option<String>,
    pub fitness_certificate: Option<String>,
    pub accident_history: Option<String>,
    pub seller_name: Option<String>,
    pub sell_price: Option<i64>,
    pub seller_phone_number: Option<String>,
    pub seller_location_city: Option<String>,
    pub preferred_contact_time: Option<String>,
    pub reason_for_sale: Option<String>,
    pub aadhaar_number: Option<String>,
    pub pan_number: Option<String>,
    pub live_location: Option<String>,
    pub brand: Option<String>,
    pub year: Option<i64>,
    pub model: Option<String>,
    pub variant: Option<String>,
    pub kilometers_driven: Option<i64>,
    pub photos: serde_json::Value,
    pub features: Vec<String>,
    pub listing_fee: i64,
    pub promo_code: Option<String>,
}

/// draft → (掲載先の車種, レコード)。車種未設定ならエラー
pub fn assemble(draft_id: &str, draft: &DraftListing) -> Result<(VehicleType, SellerRecord), PublishError> {
    let vehicle = draft.vehicle.ok_or(PublishError::NoVehicle)?;

    let reg = draft.registration.as_ref();
    let own = draft.ownership.as_ref();
    let cond = draft.condition.as_ref();
    let com = draft.commercial.as_ref();
    let ident = draft.identity.as_ref();
    let vid = draft.vehicle_identity.as_ref();

    let photos = draft
        .media
        .clone()
        .unwrap_or_default()
        .photos_object(vehicle);

    let record = SellerRecord {
        draft_id: draft_id.to_string(),
        registration_number: reg.map(|r| r.registration_number.clone()),
        rto_state: reg.and_then(|r| r.rto_state.clone()),
        rto: reg.and_then(|r| r.rto.clone()),
        body_type: reg.and_then(|r| r.body_type.clone()),
        engine_cc: reg.and_then(|r| r.engine_cc),
        load_capacity: reg.and_then(|r| r.load_capacity),
        number_of_owners: own.and_then(|o| o.number_of_owners),
        ownership_type: own.and_then(|o| o.ownership_type.clone()),
        fuel_type: own.map(|o| o.fuel_type.clone()),
        color: own.and_then(|o| o.color.clone()),
        transmission_type: own.map(|o| o.transmission_type.clone()),
        modifications: own.and_then(|o| o.modifications.clone()),
        battery_health: own.and_then(|o| o.battery_health.clone()),
        warranty_status: cond.and_then(|c| c.warranty_status.clone()),
        loan_status: cond.and_then(|c| c.loan_status.clone()),
        tire_condition: cond.and_then(|c| c.tire_condition.clone()),
        permit_type: cond.and_then(|c| c.permit_type.clone()),
        fitness_certificate: cond.and_then(|c| c.fitness_certificate.clone()),
        accident_history: cond.map(|c| c.accident_history.clone()),
        seller_name: com.map(|c| c.seller_name.clone()),
        sell_price: com.map(|c| c.sell_price),
        seller_phone_number: com.map(|c| c.seller_phone_number.clone()),
        seller_location_city: com.and_then(|c| c.seller_location_city.clone()),
        preferred_contact_time: com.and_then(|c| c.preferred_contact_time.clone()),
        reason_for_sale: com.and_then(|c| c.reason_for_sale.clone()),
        aadhaar_number: ident.and_then(|i| i.aadhaar_number.clone()),
        pan_number: ident.and_then(|i| i.pan_number.as_ref().map(|p| p.trim().to_ascii_uppercase())),
        live_location: ident.and_then(|i| i.live_location.clone()),
        brand: vid.map(|v| v.brand.clone()),
        year: vid.map(|v| v.year),
        model: vid.map(|v| v.model.clone()),
        variant: vid.and_then(|v| v.variant.clone()),
        kilometers_driven: vid.and_then(|v| v.kilometers_driven),
        photos,
        features: draft.features.clone(),
        listing_fee: draft.pricing.fee,
        promo_code: draft.pricing.promo_code.clone(),
    };

    Ok((vehicle, record))
}

/// 1 行挿入して id を返す
pub async fn insert_record(
    db: &DbPool,
    vehicle: VehicleType,
    record: &SellerRecord,
) -> Result<i64, PublishError> {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let photos = serde_json::to_string(&record.photos).map_err(DraftError::from)?;
    let features = serde_json::to_string(&record.features).map_err(DraftError::from)?;

    let sql = format!(
        r#"
        INSERT INTO {} (
            draft_id, registration_number, rto_state, rto, body_type, engine_cc, load_capacity,
            number_of_owners, ownership_type, fuel_type, color, transmission_type, modifications, battery_health,
            warranty_status, loan_status, tire_condition, permit_type, fitness_certificate, accident_history,
            seller_name, sell_price, seller_phone_number, seller_location_city, preferred_contact_time, reason_for_sale,
            aadhaar_number, pan_number, live_location,
            brand, year, model, variant, kilometers_driven,
            photos, features, listing_fee, promo_code, created_at_ms
        ) VALUES (
            ?, ?, ?, ?, ?, ?, ?,
            ?, ?, ?, ?, ?, ?, ?,
            ?, ?, ?, ?, ?, ?,
            ?, ?, ?, ?, ?, ?,
            ?, ?, ?,
            ?, ?, ?, ?, ?,
            ?, ?, ?, ?, ?
        )
        "#,
        vehicle.seller_table()
    );

    let result = sqlx::query(&sql)
        .bind(&record.draft_id)
        .bind(&record.registration_number)
        .bind(&record.rto_state)
        .bind(&record.rto)
        .bind(&record.body_type)
        .bind(record.engine_cc)
        .bind(record.load_capacity)
        .bind(record.number_of_owners)
        .bind(&record.ownership_type)
        .bind(&record.fuel_type)
        .bind(&record.color)
        .bind(&record.transmission_type)
        .bind(&record.modifications)
        .bind(&record.battery_health)
        .bind(&record.warranty_status)
        .bind(&record.loan_status)
        .bind(&record.tire_condition)
        .bind(&record.permit_type)
        .bind(&record.fitness_certificate)
        .bind(&record.accident_history)
        .bind(&record.seller_name)
        .bind(record.sell_price)
        .bind(&record.seller_phone_number)
        .bind(&record.seller_location_city)
        .bind(&record.preferred_contact_time)
        .bind(&record.reason_for_sale)
        .bind(&record.aadhaar_number)
        .bind(&record.pan_number)
        .bind(&record.live_location)
        .bind(&record.brand)
        .bind(record.year)
        .bind(&record.model)
        .bind(&record.variant)
        .bind(record.kilometers_driven)
        .bind(&photos)
        .bind(&features)
        .bind(record.listing_fee)
        .bind(&record.promo_code)
        .bind(now_ms)
        .execute(db)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return PublishError::AlreadyPublished(record.draft_id.clone());
                }
            }
            PublishError::Database(e)
        })?;

    Ok(result.last_insert_rowid())
}

#[derive(Debug, Clone, Serialize)]
pub struct Published {
    pub listing_id: i64,
    pub table: &'static str,
    pub vehicle: VehicleType,
}

/// 車種チェック → 書類チェック → 組み立て → 挿入 → draft 削除
///
/// 挿入失敗時は draft をそのまま残す
pub async fn publish_draft(
    db: &DbPool,
    drafts: &dyn DraftStore,
    draft_id: &str,
    checked: &[DocumentItem],
) -> Result<Published, PublishError> {
    let draft = drafts.load(draft_id).await?;

    let (vehicle, record) = assemble(draft_id, &draft)?;

    let checklist = ChecklistState::for_draft(&draft).with_checked(checked.iter().copied());
    if !checklist.can_publish() {
        return Err(PublishError::ChecklistIncomplete(checklist.missing()));
    }

    let listing_id = insert_record(db, vehicle, &record).await?;
    info!(
        "📦 Listing published: draft_id={}, table={}, id={}",
        draft_id,
        vehicle.seller_table(),
        listing_id
    );

    if let Err(e) = drafts.clear(draft_id).await {
        warn!("⚠️  Failed to clear draft {} after publish: {}", draft_id, e);
    }

    Ok(Published {
        listing_id,
        table: vehicle.seller_table(),
        vehicle,
    })
}
