//! Categories and subscription plans (public catalog endpoints)

use serde::{Deserialize, Serialize};

/// Coarse risk/complexity class of a sourcing category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Low,
    Medium,
    High,
    /// A grade this build does not know about
    #[serde(other)]
    Unrecognized,
}

impl Grade {
    /// Key used by the backend's `gradePrices` table
    pub fn as_key(&self) -> Option<&'static str> {
        match self {
            Grade::Low => Some("low"),
            Grade::Medium => Some("medium"),
            Grade::High => Some("high"),
            Grade::Unrecognized => None,
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_key().unwrap_or("unrecognized"))
    }
}

/// `GET /api/categories` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub grade: Option<Grade>,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Basic,
    Starter,
    Professional,
}

/// `GET /api/plans` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub plan_type: PlanTier,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub has_annual_pricing: bool,
    #[serde(default)]
    pub annual_price: Option<f64>,
    pub credits: u32,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub max_rollover_credits: Option<u32>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default)]
    pub is_popular: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_grade_is_tolerated() {
        let c: Category =
            serde_json::from_str(r#"{"_id":"c1","name":"Valves","grade":"extreme"}"#).unwrap();
        assert_eq!(c.grade, Some(Grade::Unrecognized));
        assert_eq!(Grade::Unrecognized.as_key(), None);
    }

    #[test]
    fn test_category_without_grade() {
        let c: Category = serde_json::from_str(r#"{"_id":"c2","name":"Other"}"#).unwrap();
        assert_eq!(c.grade, None);
    }
}
