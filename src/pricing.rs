//! Pricing
//! 掲載料とプロモコード

use serde::{Deserialize, Serialize};

/// 掲載料（INR）
pub const LISTING_FEE_INR: i64 = 199;

/// 掲載料が無料になるコード
pub const FREE_LISTING_CODE: &str = "FRIEND";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub base_fee: i64,
    pub fee: i64,
    pub promo_code: Option<String>,
}

impl Default for Quote {
    fn default() -> Self {
        Self {
            base_fee: LISTING_FEE_INR,
            fee: LISTING_FEE_INR,
            promo_code: None,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PromoError {
    #[error("Please enter a promo code")]
    Empty,
    #[error("Invalid promo code: {0}")]
    Invalid(String),
}

/// 前後空白除去 + 大文字化して比較
pub fn apply_promo(input: &str) -> Result<Quote, PromoError> {
    let code = input.trim().to_uppercase();
    if code.is_empty() {
        return Err(PromoError::Empty);
    }
    if code != FREE_LISTING_CODE {
        return Err(PromoError::Invalid(code));
    }
    Ok(Quote {
        base_fee: LISTING_FEE_INR,
        fee: 0,
        promo_code: Some(code),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friend_code_in_any_case_waives_the_fee() {
        for input in ["friend", "FRIEND", " Friend "] {
            let quote = apply_promo(input).unwrap();
            assert_eq!(quote.fee, 0);
            assert_eq!(quote.promo_code.as_deref(), Some("FRIEND"));
        }
    }

    #[test]
    fn other_codes_keep_the_fee() {
        assert_eq!(apply_promo("FRIENDS"), Err(PromoError::Invalid("FRIENDS".into())));
        assert_eq!(apply_promo("  "), Err(PromoError::Empty));
        assert_eq!(Quote::default().fee, 199);
    }
}
