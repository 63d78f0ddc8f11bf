//! Billing page: subscription, credits, top-ups and the credit ledger

use axum::{
    extract::{Query, State},
    Json,
};
use optiverifi_billing::{
    plan_top_up, reason_label, reconcile, signed_delta, CheckInputs, CreditSnapshot,
    InvariantChecker, ReconcileOutcome, ReturnMarker, SyncMode, TopUpOrder,
    GENERAL_TOP_UP_REQUEST_ID, MAX_TOP_UP_QUANTITY,
};
use optiverifi_shared::{
    CheckoutRequest, CreditTransaction, Pagination, Plan, PlanTier, PlanType, SubscriptionStatus,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    auth::Session,
    error::{ApiError, ApiResult},
    routes::{ApiResponse, PageUrl},
    state::{AppState, ReconcileScope},
};

const DEFAULT_LEDGER_PAGE_SIZE: u32 = 5;
const MAX_LEDGER_PAGE_SIZE: u32 = 50;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct BillingQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    pub status: String,
    pub is_active: bool,
    pub plan_type: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    pub match_credits: u32,
    /// Subscribed but out of credits
    pub needs_top_up: bool,
}

impl From<&SubscriptionStatus> for SubscriptionView {
    fn from(status: &SubscriptionStatus) -> Self {
        let snapshot = CreditSnapshot::from(status);
        Self {
            status: status.subscription_status.label().to_string(),
            is_active: snapshot.is_subscribed(),
            plan_type: status.plan_type.clone(),
            expires_at: status.subscription_expires_at,
            match_credits: snapshot.match_credits,
            needs_top_up: snapshot.needs_top_up(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUpOffer {
    pub unit_price: u64,
    pub max_quantity: u32,
    pub currency: String,
}

/// Subscription plan as offered on the billing page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOption {
    pub id: PlanType,
    pub name: String,
    pub price: f64,
    pub period: &'static str,
    pub description: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    #[serde(flatten)]
    pub transaction: CreditTransaction,
    pub delta: i64,
    pub reason_label: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingView {
    pub subscription: SubscriptionView,
    pub top_up: TopUpOffer,
    pub plans: Vec<PlanOption>,
    pub transactions: Vec<LedgerEntry>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUpRequest {
    pub quantity: u32,
    pub email: String,
    /// Set when topping up from a request page; forces a single credit
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    pub session_id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<TopUpOrder>,
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Monthly and annual options for each paid tier, in backend order
pub fn plan_options(plans: &[Plan]) -> Vec<PlanOption> {
    let mut options = Vec::new();

    for plan in plans {
        let (monthly, annual) = match plan.plan_type {
            PlanTier::Starter => (PlanType::StarterMonthly, PlanType::StarterAnnual),
            PlanTier::Professional => (PlanType::ProfessionalMonthly, PlanType::ProfessionalAnnual),
            PlanTier::Basic => continue,
        };

        let description = match plan.max_rollover_credits {
            Some(max) if plan.plan_type == PlanTier::Professional => format!(
                "{} matches per month (max {} credits rollover)",
                plan.credits, max
            ),
            _ => format!("{} matches per month", plan.credits),
        };

        options.push(PlanOption {
            id: monthly,
            name: format!("{} Monthly", plan.name),
            price: plan.price,
            period: "/month",
            description: description.clone(),
        });

        if let Some(annual_price) = plan.annual_price.filter(|_| plan.has_annual_pricing) {
            options.push(PlanOption {
                id: annual,
                name: format!("{} Annual", plan.name),
                price: annual_price,
                period: "/year",
                description,
            });
        }
    }

    options
}

fn require_email(email: &str) -> ApiResult<&str> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ApiError::Validation("User email not found".to_string()));
    }
    Ok(email)
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /billing[?topUp=success]
///
/// Returning from a top-up checkout fires one bulk payment sync for this
/// session before the data below is read. The sync is automatic, so a
/// failure is only logged; the payment webhook settles it later.
pub async fn billing_page(
    State(state): State<AppState>,
    session: Session,
    url: PageUrl,
    Query(query): Query<BillingQuery>,
) -> ApiResult<Json<ApiResponse<BillingView>>> {
    let client = state.backend.authenticated(session.token());

    if url.has(ReturnMarker::TopUpSuccess) {
        let guard = state
            .guards
            .guard((session.key().to_string(), ReconcileScope::Billing));
        let outcome = reconcile(
            &guard,
            SyncMode::Background,
            "Could not sync payments",
            client.sync_user_payments(),
        )
        .await;
        if let ReconcileOutcome::Synced(synced) = &outcome {
            let summary = synced.data.clone().unwrap_or_default();
            tracing::info!(
                session = %session.key(),
                synced_count = summary.synced_count,
                subscription_updated = summary.subscription_updated,
                "Top-up payments synced"
            );
        }
    }

    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LEDGER_PAGE_SIZE)
        .clamp(1, MAX_LEDGER_PAGE_SIZE);

    let (subscription, ledger, table, plans) = tokio::join!(
        client.subscription_status(),
        client.credit_transactions(page, limit),
        state.pricing_table(),
        state.backend.plans(),
    );
    let subscription = subscription.map_err(ApiError::backend("Failed to load subscription"))?;
    let ledger = ledger.map_err(ApiError::backend("Failed to load credit transactions"))?;
    let plans = plans.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load plans");
        Vec::new()
    });

    InvariantChecker::run(CheckInputs {
        ledger: Some(&ledger.transactions),
        ..Default::default()
    })
    .log("billing");

    let transactions = ledger
        .transactions
        .into_iter()
        .map(|tx| LedgerEntry {
            delta: signed_delta(&tx),
            reason_label: reason_label(tx.reason),
            transaction: tx,
        })
        .collect();

    let view = BillingView {
        subscription: SubscriptionView::from(&subscription),
        top_up: TopUpOffer {
            unit_price: table.extra_credit_price(),
            max_quantity: MAX_TOP_UP_QUANTITY,
            currency: table.currency().to_string(),
        },
        plans: plan_options(&plans),
        transactions,
        pagination: ledger.pagination,
    };

    Ok(Json(
        ApiResponse::ok(view).with_replace_url(url.without(ReturnMarker::TopUpSuccess)),
    ))
}

/// POST /billing/top-up
pub async fn top_up(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<TopUpRequest>,
) -> ApiResult<Json<ApiResponse<CheckoutView>>> {
    let email = require_email(&body.email)?;
    let request_id = body
        .request_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty() && *id != GENERAL_TOP_UP_REQUEST_ID);

    let table = state.pricing_table().await;
    let order = plan_top_up(body.quantity, request_id.is_some(), table.extra_credit_price())?;

    let checkout = CheckoutRequest {
        request_id: request_id.unwrap_or(GENERAL_TOP_UP_REQUEST_ID).to_string(),
        plan_type: PlanType::ExtraCredit,
        email: email.to_string(),
        quantity: Some(order.quantity),
    };

    let created = state
        .backend
        .authenticated(session.token())
        .create_checkout_session(&checkout)
        .await
        .map_err(ApiError::backend("Failed to create checkout session"))?;

    tracing::info!(
        session = %session.key(),
        quantity = order.quantity,
        estimated_total = order.estimated_total,
        "Top-up checkout created"
    );

    Ok(Json(ApiResponse::ok(CheckoutView {
        session_id: created.session_id,
        url: created.url,
        order: Some(order),
    })))
}
