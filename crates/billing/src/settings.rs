//! Pricing configuration
//!
//! One table holds every pricing knob the dashboard needs. It starts from the
//! compiled-in defaults below and takes the backend's public settings on top.
//! A map the backend leaves out falls back to the whole default map, not
//! entry by entry.

use indexmap::IndexMap;

use optiverifi_shared::{SystemSettings, UrgencyFee};
use serde::Serialize;

/// Base service fee per category grade
pub const DEFAULT_GRADE_PRICES: [(&str, u64); 3] = [("low", 750), ("medium", 1500), ("high", 2500)];

/// Last-resort base fee for a graded category
pub const DEFAULT_MEDIUM_PRICE: u64 = 1500;

/// Urgency surcharge and turnaround per tier
pub const DEFAULT_URGENCY_FEES: [(&str, u64, &str); 3] = [
    ("standard", 0, "5-7 days"),
    ("expedited", 500, "2-3 days"),
    ("emergency", 1000, "24-48 hrs"),
];

pub const STANDARD_TIER: &str = "standard";
pub const MEDIUM_GRADE: &str = "medium";

/// Price of one extra match credit
pub const DEFAULT_EXTRA_CREDIT_PRICE: u64 = 10;

/// Share of identified savings charged on managed-service completion
pub const DEFAULT_SAVINGS_FEE_PERCENTAGE: f64 = 8.0;

/// One selectable urgency tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrgencyTier {
    pub key: String,
    pub fee: u64,
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricingTable {
    grade_prices: IndexMap<String, u64>,
    urgency_fees: IndexMap<String, UrgencyFee>,
    extra_credit_price: u64,
    savings_fee_percentage: f64,
    currency: String,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            grade_prices: default_grade_prices(),
            urgency_fees: default_urgency_fees(),
            extra_credit_price: DEFAULT_EXTRA_CREDIT_PRICE,
            savings_fee_percentage: DEFAULT_SAVINGS_FEE_PERCENTAGE,
            currency: "usd".to_string(),
        }
    }
}

fn default_grade_prices() -> IndexMap<String, u64> {
    DEFAULT_GRADE_PRICES
        .iter()
        .map(|(grade, price)| (grade.to_string(), *price))
        .collect()
}

fn default_urgency_fees() -> IndexMap<String, UrgencyFee> {
    DEFAULT_URGENCY_FEES
        .iter()
        .map(|(tier, fee, duration)| (tier.to_string(), UrgencyFee::new(*fee, *duration)))
        .collect()
}

/// Default standard tier, used when a supplied table has none
pub fn default_standard_fee() -> UrgencyFee {
    UrgencyFee::new(0, "5-7 days")
}

impl PricingTable {
    /// Build the table from the backend's settings, if any were fetched
    pub fn from_settings(settings: Option<&SystemSettings>) -> Self {
        let mut table = Self::default();
        let Some(settings) = settings else {
            return table;
        };

        if let Some(grades) = &settings.grade_prices {
            table.grade_prices = grades.clone();
        }
        if let Some(fees) = &settings.urgency_fees {
            table.urgency_fees = fees.clone();
        }
        // Zero means "unset" for the credit price
        if let Some(price) = settings.extra_credit_price.filter(|p| *p > 0) {
            table.extra_credit_price = price;
        }
        if let Some(pct) = settings
            .savings_fee_percentage
            .filter(|p| p.is_finite() && *p >= 0.0)
        {
            table.savings_fee_percentage = pct;
        }
        if let Some(currency) = settings.currency.as_deref().filter(|c| !c.is_empty()) {
            table.currency = currency.to_string();
        }

        table
    }

    pub fn grade_price(&self, grade: &str) -> Option<u64> {
        self.grade_prices.get(grade).copied()
    }

    pub fn urgency_fee(&self, tier: &str) -> Option<&UrgencyFee> {
        self.urgency_fees.get(tier)
    }

    pub fn extra_credit_price(&self) -> u64 {
        self.extra_credit_price
    }

    pub fn savings_fee_percentage(&self) -> f64 {
        self.savings_fee_percentage
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Selectable tiers in the order the backend lists them
    pub fn urgency_tiers(&self) -> Vec<UrgencyTier> {
        self.urgency_fees
            .iter()
            .map(|(key, fee)| UrgencyTier {
                key: key.clone(),
                fee: fee.fee,
                duration: fee.duration.clone(),
            })
            .collect()
    }

    /// Tier preselected on the form: the first one listed
    pub fn default_urgency(&self) -> &str {
        self.urgency_fees
            .keys()
            .next()
            .map(String::as_str)
            .unwrap_or(STANDARD_TIER)
    }

    pub fn has_urgency_tier(&self, tier: &str) -> bool {
        self.urgency_fees.contains_key(tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_settings() {
        let table = PricingTable::from_settings(None);
        assert_eq!(table.grade_price("low"), Some(750));
        assert_eq!(table.grade_price("medium"), Some(1500));
        assert_eq!(table.grade_price("high"), Some(2500));
        assert_eq!(table.extra_credit_price(), 10);
        assert_eq!(table.savings_fee_percentage(), 8.0);
    }

    #[test]
    fn test_supplied_map_replaces_whole_default_map() {
        let mut grades = IndexMap::new();
        grades.insert("high".to_string(), 3000);
        let settings = SystemSettings {
            grade_prices: Some(grades),
            ..Default::default()
        };
        let table = PricingTable::from_settings(Some(&settings));
        assert_eq!(table.grade_price("high"), Some(3000));
        assert_eq!(table.grade_price("low"), None);
        // Urgency map was absent, so defaults remain
        assert_eq!(table.urgency_fee("expedited").map(|f| f.fee), Some(500));
    }

    #[test]
    fn test_zero_credit_price_keeps_default() {
        let settings = SystemSettings {
            extra_credit_price: Some(0),
            ..Default::default()
        };
        assert_eq!(
            PricingTable::from_settings(Some(&settings)).extra_credit_price(),
            10
        );
    }

    #[test]
    fn test_default_tiers_in_listed_order() {
        let table = PricingTable::default();
        let keys: Vec<String> = table.urgency_tiers().into_iter().map(|t| t.key).collect();
        assert_eq!(keys, vec!["standard", "expedited", "emergency"]);
        assert_eq!(table.default_urgency(), "standard");
    }

    #[test]
    fn test_supplied_tiers_keep_backend_order() {
        let settings: SystemSettings = serde_json::from_str(
            r#"{"urgencyFees": {
                "priority": {"fee": 300, "duration": "3-4 days"},
                "standard": {"fee": 0, "duration": "5-7 days"},
                "expedited": {"fee": 200, "duration": "2-3 days"}
            }}"#,
        )
        .unwrap();
        let table = PricingTable::from_settings(Some(&settings));
        let keys: Vec<String> = table.urgency_tiers().into_iter().map(|t| t.key).collect();
        assert_eq!(keys, vec!["priority", "standard", "expedited"]);
        assert_eq!(table.default_urgency(), "priority");
    }

    #[test]
    fn test_empty_tier_map_defaults_to_standard() {
        let settings = SystemSettings {
            urgency_fees: Some(IndexMap::new()),
            ..Default::default()
        };
        let table = PricingTable::from_settings(Some(&settings));
        assert!(table.urgency_tiers().is_empty());
        assert_eq!(table.default_urgency(), STANDARD_TIER);
    }
}
