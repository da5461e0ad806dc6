//! Data Models
//! VehicleType, 掲載行 (buyer/seller), ユーザー などのデータ構造定義

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ========================================
// VehicleType
// ========================================

/// 車種フラグ（掲載先テーブルとカテゴリ構成を決める）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Car,
    Bike,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Car => "car",
            VehicleType::Bike => "bike",
        }
    }

    /// 閲覧用テーブル
    pub fn buyer_table(&self) -> &'static str {
        match self {
            VehicleType::Car => "car_buyer_listings",
            VehicleType::Bike => "bike_buyer_listings",
        }
    }

    /// 出品（publish）先テーブル
    pub fn seller_table(&self) -> &'static str {
        match self {
            VehicleType::Car => "car_seller_listings",
            VehicleType::Bike => "bike_seller_listings",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid vehicle type: {0:?} (expected \"car\" or \"bike\")")]
pub struct InvalidVehicleType(pub String);

impl FromStr for VehicleType {
    type Err = InvalidVehicleType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "car" => Ok(VehicleType::Car),
            "bike" => Ok(VehicleType::Bike),
            _ => Err(InvalidVehicleType(s.to_string())),
        }
    }
}

// ========================================
// Buyer Listing（閲覧用）
// ========================================

/// Buyer Listing (DB row)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BuyerListing {
    pub id: i64,
    pub brand: String,
    pub model: String,
    pub variant: Option<String>,
    pub year: Option<i64>,
    pub kilometers_driven: Option<i64>,
    pub fuel_type: Option<String>,
    pub transmission_type: Option<String>,
    pub price: i64,
    pub city: Option<String>,
    pub image_url: Option<String>,
    pub created_at_ms: i64,
}

// ========================================
// Seller Listing（出品 / publish 結果）
// ========================================

/// Seller Listing (DB row)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SellerListingRow {
    pub id: i64,
    pub draft_id: String,
    pub registration_number: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub sell_price: Option<i64>,
    pub seller_name: Option<String>,
    pub seller_phone_number: Option<String>,
    pub seller_location_city: Option<String>,
    pub photos: String,
    pub features: String,
    pub listing_fee: i64,
    pub promo_code: Option<String>,
    pub created_at_ms: i64,
}

// ========================================
// User
// ========================================

/// User Details (DB row)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserDetails {
    pub id: i64,
    pub phone_number: String,
    pub name: Option<String>,
    pub photo_url: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// OTP Challenge (DB row)
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OtpChallenge {
    pub verification_id: String,
    pub phone_number: String,
    pub code_sha256: String,
    pub expires_at_ms: i64,
    pub consumed: i32,
    pub attempts: i64,
    pub created_at_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vehicle_type_parses_case_insensitively() {
        assert_eq!("Car".parse::<VehicleType>().unwrap(), VehicleType::Car);
        assert_eq!(" bike ".parse::<VehicleType>().unwrap(), VehicleType::Bike);
        assert!("truck".parse::<VehicleType>().is_err());
        assert!("".parse::<VehicleType>().is_err());
    }

    #[test]
    fn vehicle_type_selects_tables() {
        assert_eq!(VehicleType::Car.seller_table(), "car_seller_listings");
        assert_eq!(VehicleType::Bike.seller_table(), "bike_seller_listings");
        assert_eq!(VehicleType::Bike.buyer_table(), "bike_buyer_listings");
    }
}
