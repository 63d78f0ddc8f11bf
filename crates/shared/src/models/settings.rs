//! Public system settings (pricing knobs owned by the backend)

use indexmap::IndexMap;

use serde::{Deserialize, Serialize};

/// `GET /api/settings/public` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSettings {
    #[serde(default)]
    pub savings_fee_percentage: Option<f64>,
    #[serde(default)]
    pub extra_credit_price: Option<u64>,
    #[serde(default)]
    pub currency: Option<String>,
    /// Base service fee keyed by category grade
    #[serde(default)]
    pub grade_prices: Option<IndexMap<String, u64>>,
    /// Surcharge and turnaround keyed by urgency tier
    #[serde(default)]
    pub urgency_fees: Option<IndexMap<String, UrgencyFee>>,
}

/// Fee and expected turnaround of one urgency tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawUrgencyFee")]
pub struct UrgencyFee {
    pub fee: u64,
    pub duration: String,
}

impl UrgencyFee {
    pub fn new(fee: u64, duration: impl Into<String>) -> Self {
        Self {
            fee,
            duration: duration.into(),
        }
    }
}

/// Older backends send a bare number instead of `{ fee, duration }`
#[derive(Deserialize)]
#[serde(untagged)]
enum RawUrgencyFee {
    Detailed {
        fee: u64,
        #[serde(default)]
        duration: String,
    },
    Flat(u64),
}

impl From<RawUrgencyFee> for UrgencyFee {
    fn from(raw: RawUrgencyFee) -> Self {
        match raw {
            RawUrgencyFee::Detailed { fee, duration } => UrgencyFee { fee, duration },
            RawUrgencyFee::Flat(fee) => UrgencyFee {
                fee,
                duration: String::new(),
            },
        }
    }
}
