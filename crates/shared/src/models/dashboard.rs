//! Subscription snapshot, credit ledger and sourcing request details

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    Active,
    Expired,
    #[serde(rename = "none", other)]
    NoSubscription,
}

impl SubscriptionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SubscriptionState::Active)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SubscriptionState::Active => "Active",
            SubscriptionState::Expired => "Expired",
            SubscriptionState::NoSubscription => "No Subscription",
        }
    }
}

/// `GET /api/dashboard/subscription` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatus {
    pub subscription_status: SubscriptionState,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub subscription_expires_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub plan_type: Option<String>,
    #[serde(default)]
    pub match_credits: Option<u32>,
}

impl SubscriptionStatus {
    /// Remaining credits, treating an absent count as zero
    pub fn credits(&self) -> u32 {
        self.match_credits.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deducted,
    Added,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditReason {
    MatchGeneration,
    UnlockRequest,
    SubscriptionAllocation,
    TopUp,
    Rollover,
    #[serde(other)]
    Other,
}

/// One immutable entry of the credit ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditTransaction {
    pub id: String,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub request_name: Option<String>,
    #[serde(default)]
    pub request_category: Option<String>,
    #[serde(default)]
    pub match_report_id: Option<String>,
    pub credits_used: u32,
    pub credits_before: u32,
    pub credits_after: u32,
    pub transaction_type: TransactionType,
    pub reason: CreditReason,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    #[serde(alias = "pages", default)]
    pub total_pages: u32,
}

/// `GET /api/dashboard/credit-transactions` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransactionPage {
    pub transactions: Vec<CreditTransaction>,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchReportStatus {
    Pending,
    Completed,
    Unlocked,
    #[serde(other)]
    Unknown,
}

/// Sourcing request as shown on its detail page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfo {
    #[serde(default)]
    pub id: Option<String>,
    /// Some endpoints return the identifier under this name instead
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub status: String,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub timeline: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub requirements: Option<String>,
    #[serde(default)]
    pub matched_count: Option<u32>,
    #[serde(default)]
    pub match_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub match_score: Option<f64>,
    #[serde(default)]
    pub ranking: Option<u32>,
    #[serde(default)]
    pub ai_explanation: Option<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
}

/// `GET /api/requests/:id/details` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDetails {
    pub request: RequestInfo,
    #[serde(default)]
    pub suppliers: Vec<Supplier>,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub status: Option<MatchReportStatus>,
    #[serde(default)]
    pub match_report_status: Option<MatchReportStatus>,
}

impl RequestInfo {
    pub fn identifier(&self) -> Option<&str> {
        self.id.as_deref().or(self.request_id.as_deref())
    }
}

impl RequestDetails {
    /// Report status, preferring the dedicated field over the legacy one
    pub fn report_status(&self) -> Option<MatchReportStatus> {
        self.match_report_status.or(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_none_state() {
        let s: SubscriptionStatus =
            serde_json::from_str(r#"{"subscriptionStatus":"none"}"#).unwrap();
        assert_eq!(s.subscription_status, SubscriptionState::NoSubscription);
        assert_eq!(s.credits(), 0);
        assert!(s.subscription_expires_at.is_none());
    }

    #[test]
    fn test_subscription_with_expiry() {
        let s: SubscriptionStatus = serde_json::from_str(
            r#"{"subscriptionStatus":"active","matchCredits":3,"planType":"starter_monthly",
                "subscriptionExpiresAt":"2026-11-01T00:00:00.000Z"}"#,
        )
        .unwrap();
        assert!(s.subscription_status.is_active());
        assert_eq!(s.credits(), 3);
        assert!(s.subscription_expires_at.is_some());
    }

    #[test]
    fn test_transaction_page_accepts_pages_alias() {
        let json = r#"{
            "transactions": [{
                "id": "t1", "creditsUsed": 1, "creditsBefore": 3, "creditsAfter": 2,
                "transactionType": "deducted", "reason": "unlock_request",
                "createdAt": "2026-10-01T12:00:00Z"
            }],
            "pagination": {"page": 1, "limit": 5, "total": 1, "pages": 1}
        }"#;
        let page: CreditTransactionPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.pagination.total_pages, 1);
        assert_eq!(page.transactions[0].reason, CreditReason::UnlockRequest);
    }

    #[test]
    fn test_request_details_legacy_status() {
        let json = r#"{
            "request": {"requestId": "r1", "category": "Valves", "status": "matched"},
            "isLocked": true,
            "status": "pending"
        }"#;
        let d: RequestDetails = serde_json::from_str(json).unwrap();
        assert_eq!(d.request.identifier(), Some("r1"));
        assert_eq!(d.report_status(), Some(MatchReportStatus::Pending));
    }
}
