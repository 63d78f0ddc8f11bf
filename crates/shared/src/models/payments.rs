//! Checkout sessions and payment records

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Plan identifiers accepted by `POST /api/payments/checkout`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanType {
    #[serde(rename = "one-time")]
    OneTime,
    #[serde(rename = "extra_credit")]
    ExtraCredit,
    #[serde(rename = "starter_monthly")]
    StarterMonthly,
    #[serde(rename = "starter_annual")]
    StarterAnnual,
    #[serde(rename = "professional_monthly")]
    ProfessionalMonthly,
    #[serde(rename = "professional_annual")]
    ProfessionalAnnual,
    #[serde(rename = "enterprise")]
    Enterprise,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::OneTime => "one-time",
            PlanType::ExtraCredit => "extra_credit",
            PlanType::StarterMonthly => "starter_monthly",
            PlanType::StarterAnnual => "starter_annual",
            PlanType::ProfessionalMonthly => "professional_monthly",
            PlanType::ProfessionalAnnual => "professional_annual",
            PlanType::Enterprise => "enterprise",
        }
    }

    /// Only extra credit purchases carry a quantity
    pub fn takes_quantity(&self) -> bool {
        matches!(self, PlanType::ExtraCredit)
    }
}

impl std::fmt::Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Request being paid for, or `"general"` for an unbound top-up
    pub request_id: String,
    pub plan_type: PlanType,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

/// Body of `POST /api/managed-services/payment/create-session`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceFeePaymentRequest {
    /// Managed service being paid for
    pub request_id: String,
    /// Service fee in cents
    pub amount: u64,
    pub email: String,
}

/// Hosted checkout session the browser is redirected to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub plan_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Canceled,
}

/// Payment record as returned by the per-request sync call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub request_id: Option<String>,
    pub amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
    pub plan_type: String,
    pub status: PaymentStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub paid_at: Option<OffsetDateTime>,
}

/// `POST /api/payments/sync` payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    #[serde(default)]
    pub synced_count: u32,
    #[serde(default)]
    pub subscription_updated: bool,
}
