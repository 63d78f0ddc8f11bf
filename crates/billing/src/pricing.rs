//! Managed-service fee preview
//!
//! The quote shown before submission. The backend recomputes the fee at
//! checkout and its figure is the one charged; this number is display-only.

use optiverifi_shared::Grade;
use serde::Serialize;

use crate::settings::{
    default_standard_fee, PricingTable, DEFAULT_MEDIUM_PRICE, MEDIUM_GRADE, STANDARD_TIER,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub base_price: u64,
    pub urgency_fee: u64,
    pub total_price: u64,
}

impl PriceQuote {
    /// Whether the backend's authoritative fee matches this preview
    pub fn matches_charged(&self, charged: f64) -> bool {
        (self.total_price as f64 - charged).abs() < 0.005
    }
}

/// Base fee for a category grade.
///
/// No grade means no base fee. A grade missing from the table, priced at 0,
/// or not recognized by this build is priced as `medium`; a missing or zero
/// `medium` falls back to the compiled-in medium price. The backend prices
/// the same way.
pub fn base_price(grade: Option<Grade>, table: &PricingTable) -> u64 {
    let Some(grade) = grade else {
        return 0;
    };

    grade
        .as_key()
        .and_then(|key| table.grade_price(key))
        .filter(|price| *price > 0)
        .or_else(|| table.grade_price(MEDIUM_GRADE).filter(|price| *price > 0))
        .unwrap_or(DEFAULT_MEDIUM_PRICE)
}

/// Surcharge for an urgency tier; unknown or absent tiers are `standard`
pub fn urgency_fee(tier: Option<&str>, table: &PricingTable) -> u64 {
    tier.filter(|t| !t.is_empty())
        .and_then(|t| table.urgency_fee(t))
        .or_else(|| table.urgency_fee(STANDARD_TIER))
        .map(|f| f.fee)
        .unwrap_or_else(|| default_standard_fee().fee)
}

pub fn compute_price(grade: Option<Grade>, urgency: Option<&str>, table: &PricingTable) -> PriceQuote {
    let base_price = base_price(grade, table);
    let urgency_fee = urgency_fee(urgency, table);

    PriceQuote {
        base_price,
        urgency_fee,
        total_price: base_price.saturating_add(urgency_fee),
    }
}
