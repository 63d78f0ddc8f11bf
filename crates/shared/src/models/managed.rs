//! Managed ("white-glove") sourcing engagements

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceLevel {
    Commercial,
    Government,
    Regulated,
}

/// Body of `POST /api/managed-services/initiate`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedServiceRequestData {
    pub item_name: String,
    pub category: String,
    pub quantity: String,
    pub description: String,
    pub estimated_spend_range: String,
    pub urgency: String,
    pub compliance_level: ComplianceLevel,
    pub delivery_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_deadline: Option<String>,
}

/// Partial body of `PUT /api/managed-services/:id`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedServiceUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specifications: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
}

impl ManagedServiceUpdate {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.specifications.is_none()
            && self.quantity.is_none()
            && self.delivery_location.is_none()
            && self.budget.is_none()
            && self.deadline.is_none()
            && self.urgency.is_none()
    }
}

/// `data` of a successful initiation call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatedService {
    pub request_id: String,
    pub service_fee_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedService {
    #[serde(rename = "_id", default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    pub category: String,
    #[serde(default)]
    pub specifications: String,
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub delivery_location: String,
    #[serde(default)]
    pub budget: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
    pub status: String,
    /// Raw stage name; interpreted by the billing crate
    pub stage: String,
    #[serde(default)]
    pub urgency: Option<String>,
    #[serde(default)]
    pub urgency_duration: Option<String>,
    #[serde(default)]
    pub days_left: Option<i64>,
    #[serde(default)]
    pub is_overdue: Option<bool>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default)]
    pub service_fee_amount: Option<f64>,
    #[serde(default)]
    pub service_fee_status: Option<String>,
    #[serde(default)]
    pub savings_fee_percentage: Option<f64>,
    #[serde(default)]
    pub savings_fee_amount: Option<f64>,
    #[serde(default)]
    pub savings_fee_status: Option<String>,
    #[serde(default)]
    pub savings_amount: Option<f64>,
    #[serde(default)]
    pub final_report: Option<serde_json::Value>,
}

impl ManagedService {
    pub fn identifier(&self) -> Option<&str> {
        self.id.as_deref().or(self.object_id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_managed_service_accepts_either_id() {
        let json = r#"{
            "_id": "m1", "category": "Valves", "status": "active", "stage": "review",
            "createdAt": "2026-10-01T00:00:00Z", "updatedAt": "2026-10-02T00:00:00Z",
            "serviceFeeAmount": 2000
        }"#;
        let svc: ManagedService = serde_json::from_str(json).unwrap();
        assert_eq!(svc.identifier(), Some("m1"));
        assert_eq!(svc.service_fee_amount, Some(2000.0));
    }

    #[test]
    fn test_update_skips_unset_fields() {
        let update = ManagedServiceUpdate {
            quantity: Some("500 units".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"quantity": "500 units"}));
        assert!(ManagedServiceUpdate::default().is_empty());
    }
}
