//! Sell Wizard
//! ステップ進行（WizardCursor）とステップ単位のバリデーション

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::draft::{
    Commercial, Condition, Identity, Ownership, Registration, StepPatch, VehicleIdentity,
};

// ========================================
// Steps / Variants
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Registration,
    Ownership,
    Condition,
    Media,
    Commercial,
    Identity,
    VehicleIdentity,
    Pricing,
    Review,
}

impl WizardStep {
    /// URL 上のステップ名（データを持つステップのみ）
    pub fn from_path(name: &str) -> Option<Self> {
        match name {
            "registration" => Some(Self::Registration),
            "ownership" => Some(Self::Ownership),
            "condition" => Some(Self::Condition),
            "commercial" => Some(Self::Commercial),
            "identity" => Some(Self::Identity),
            "vehicle-identity" => Some(Self::VehicleIdentity),
            "features" => Some(Self::Review),
            _ => None,
        }
    }
}

/// ウィザードの種類
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardVariant {
    /// 7 ステップ（登録 → 所有 → 状態 → 写真 → 売主 → 本人確認 → 確認）
    #[default]
    Appointment,
    /// 4 ステップ（車両情報 → 写真 → 料金 → 確認）
    SellForm,
}

impl WizardVariant {
    pub fn steps(&self) -> &'static [WizardStep] {
        use WizardStep::*;
        match self {
            WizardVariant::Appointment => &[
                Registration,
                Ownership,
                Condition,
                Media,
                Commercial,
                Identity,
                Review,
            ],
            WizardVariant::SellForm => &[VehicleIdentity, Media, Pricing, Review],
        }
    }
}

/// back() の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Moved,
    /// step 0 からの back はウィザード終了
    Exit,
}

/// 現在位置（draft と一緒に保存されるのでリロード後も復元される）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardCursor {
    pub variant: WizardVariant,
    pub index: usize,
}

impl WizardCursor {
    pub fn new(variant: WizardVariant) -> Self {
        Self { variant, index: 0 }
    }

    pub fn last_index(&self) -> usize {
        self.variant.steps().len() - 1
    }

    pub fn current(&self) -> WizardStep {
        self.variant.steps()[self.index.min(self.last_index())]
    }

    /// 1 ステップ進む（最後で止まる）。ステップ間の検証はしない
    pub fn next(&mut self) -> WizardStep {
        if self.index < self.last_index() {
            self.index += 1;
        }
        self.current()
    }

    pub fn back(&mut self) -> Transition {
        if self.index == 0 {
            return Transition::Exit;
        }
        self.index -= 1;
        Transition::Moved
    }

    /// step を完了扱いにして、その次まで進める（既に先にいる場合は動かない）
    pub fn complete(&mut self, step: WizardStep) {
        if let Some(pos) = self.variant.steps().iter().position(|s| *s == step) {
            let target = (pos + 1).min(self.last_index());
            if self.index < target {
                self.index = target;
            }
        }
    }
}

// ========================================
// Step Validation
// ========================================

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum StepError {
    #[error("Unknown step: {0}")]
    UnknownStep(String),
    #[error("Malformed {step} form: {message}")]
    Malformed { step: String, message: String },
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> StepError {
    StepError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn require(field: &'static str, value: &str) -> Result<(), StepError> {
    if value.trim().is_empty() {
        return Err(StepError::Missing(field));
    }
    Ok(())
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

/// PAN: 英字5 + 数字4 + 英字1
fn is_pan(value: &str) -> bool {
    let b = value.as_bytes();
    b.len() == 10
        && b[..5].iter().all(u8::is_ascii_uppercase)
        && b[5..9].iter().all(u8::is_ascii_digit)
        && b[9].is_ascii_uppercase()
}

/// URL のステップ名と JSON body から型付きパッチを作る
pub fn parse_patch(step: &str, body: serde_json::Value) -> Result<StepPatch, StepError> {
    let malformed = |e: serde_json::Error| StepError::Malformed {
        step: step.to_string(),
        message: e.to_string(),
    };
    let kind = WizardStep::from_path(step).ok_or_else(|| StepError::UnknownStep(step.to_string()))?;

    let patch = match kind {
        WizardStep::Registration => StepPatch::Registration(serde_json::from_value(body).map_err(malformed)?),
        WizardStep::Ownership => StepPatch::Ownership(serde_json::from_value(body).map_err(malformed)?),
        WizardStep::Condition => StepPatch::Condition(serde_json::from_value(body).map_err(malformed)?),
        WizardStep::Commercial => StepPatch::Commercial(serde_json::from_value(body).map_err(malformed)?),
        WizardStep::Identity => StepPatch::Identity(serde_json::from_value(body).map_err(malformed)?),
        WizardStep::VehicleIdentity => {
            StepPatch::VehicleIdentity(serde_json::from_value(body).map_err(malformed)?)
        }
        WizardStep::Review => {
            #[derive(Deserialize)]
            struct Features {
                features: Vec<String>,
            }
            let f: Features = serde_json::from_value(body).map_err(malformed)?;
            StepPatch::Features(f.features)
        }
        WizardStep::Media | WizardStep::Pricing => {
            return Err(StepError::UnknownStep(step.to_string()));
        }
    };
    Ok(patch)
}

/// パッチが属するステップ
pub fn step_of(patch: &StepPatch) -> WizardStep {
    match patch {
        StepPatch::Registration(_) => WizardStep::Registration,
        StepPatch::Ownership(_) => WizardStep::Ownership,
        StepPatch::Condition(_) => WizardStep::Condition,
        StepPatch::Commercial(_) => WizardStep::Commercial,
        StepPatch::Identity(_) => WizardStep::Identity,
        StepPatch::VehicleIdentity(_) => WizardStep::VehicleIdentity,
        StepPatch::Features(_) => WizardStep::Review,
    }
}

pub fn validate_patch(patch: &StepPatch) -> Result<(), StepError> {
    match patch {
        StepPatch::Registration(r) => validate_registration(r),
        StepPatch::Ownership(o) => validate_ownership(o),
        StepPatch::Condition(c) => validate_condition(c),
        StepPatch::Commercial(c) => validate_commercial(c),
        StepPatch::Identity(i) => validate_identity(i),
        StepPatch::VehicleIdentity(v) => validate_vehicle_identity(v),
        StepPatch::Features(f) => {
            if f.iter().any(|s| s.trim().is_empty()) {
                return Err(invalid("features", "blank feature name"));
            }
            Ok(())
        }
    }
}

fn validate_registration(r: &Registration) -> Result<(), StepError> {
    require("registration_number", &r.registration_number)?;
    if matches!(r.engine_cc, Some(cc) if cc <= 0) {
        return Err(invalid("engine_cc", "must be positive"));
    }
    if matches!(r.load_capacity, Some(c) if c < 0.0 || !c.is_finite()) {
        return Err(invalid("load_capacity", "must be a non-negative number"));
    }
    Ok(())
}

fn validate_ownership(o: &Ownership) -> Result<(), StepError> {
    require("fuel_type", &o.fuel_type)?;
    require("transmission_type", &o.transmission_type)?;
    if matches!(o.number_of_owners, Some(n) if n < 1) {
        return Err(invalid("number_of_owners", "must be at least 1"));
    }
    Ok(())
}

fn validate_condition(c: &Condition) -> Result<(), StepError> {
    require("accident_history", &c.accident_history)
}

fn validate_commercial(c: &Commercial) -> Result<(), StepError> {
    require("seller_name", &c.seller_name)?;
    if c.sell_price <= 0 {
        return Err(invalid("sell_price", "must be greater than 0"));
    }
    if !is_digits(c.seller_phone_number.trim(), 10) {
        return Err(invalid("seller_phone_number", "must be exactly 10 digits"));
    }
    Ok(())
}

fn validate_identity(i: &Identity) -> Result<(), StepError> {
    if let Some(aadhaar) = i.aadhaar_number.as_deref() {
        if !is_digits(&aadhaar.replace(' ', ""), 12) {
            return Err(invalid("aadhaar_number", "must be 12 digits"));
        }
    }
    if let Some(pan) = i.pan_number.as_deref() {
        if !is_pan(&pan.trim().to_ascii_uppercase()) {
            return Err(invalid("pan_number", "must look like ABCDE1234F"));
        }
    }
    Ok(())
}

fn validate_vehicle_identity(v: &VehicleIdentity) -> Result<(), StepError> {
    require("brand", &v.brand)?;
    require("model", &v.model)?;
    let max_year = i64::from(chrono::Utc::now().year()) + 1;
    if v.year < 1900 || v.year > max_year {
        return Err(invalid("year", format!("must be between 1900 and {}", max_year)));
    }
    if matches!(v.kilometers_driven, Some(km) if km < 0) {
        return Err(invalid("kilometers_driven", "must not be negative"));
    }
    Ok(())
}
