//! Sourcing request page: match report, unlock and checkout

use axum::{
    extract::{Path, State},
    Json,
};
use optiverifi_billing::{
    plan_top_up, reconcile, require_credit, resolve, Affordance, BillingError, CheckInputs,
    CreditSnapshot, GatedAction, InvariantChecker, Notice, ReconcileOutcome, ReturnMarker,
    SyncMode,
};
use optiverifi_shared::{
    AuthenticatedClient, CheckoutRequest, MatchReportStatus, RequestDetails,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::Session,
    error::{ApiError, ApiResult},
    routes::{billing::CheckoutView, ApiResponse, PageUrl},
    state::{AppState, ReconcileScope},
};

const PAYMENT_SYNC_FAILED: &str =
    "Could not verify payment automatically. Please contact support if this persists.";

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatedOffer {
    pub affordance: Affordance,
    pub title: &'static str,
    pub description: String,
}

impl GatedOffer {
    fn new(snapshot: CreditSnapshot, action: GatedAction) -> Self {
        let affordance = resolve(snapshot, action);
        let description = match affordance {
            Affordance::UseCredit => {
                "Use one of your match credits to unlock this report.".to_string()
            }
            Affordance::BuyExtraCredit { price } => format!(
                "You're out of credits. Buy an extra match for just ${}.",
                price
            ),
            Affordance::PayPerUnlock { .. } => {
                "One-time payment to unlock this specific match report forever.".to_string()
            }
        };
        Self {
            affordance,
            title: affordance.title(),
            description,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    #[serde(flatten)]
    pub details: RequestDetails,
    pub report_status: Option<MatchReportStatus>,
    pub match_credits: u32,
    /// Offer shown while the report is locked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlock: Option<GatedOffer>,
    /// Paid for but not generated yet
    pub can_generate_match: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditActionView {
    /// Remaining credits after the action, as reported by the backend
    pub match_credits: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub email: String,
}

// =============================================================================
// Helper Functions
// =============================================================================

async fn credit_snapshot(client: &AuthenticatedClient<'_>) -> ApiResult<CreditSnapshot> {
    let status = client
        .subscription_status()
        .await
        .map_err(ApiError::backend("Failed to load subscription"))?;
    Ok(CreditSnapshot::from(&status))
}

/// Credits after a credit-spending action; the refresh is best effort
async fn refreshed_credits(client: &AuthenticatedClient<'_>) -> Option<u32> {
    match client.subscription_status().await {
        Ok(status) => Some(status.credits()),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to refresh credits after action");
            None
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /requests/{id}[?payment=success]
///
/// Coming back from checkout with the report still locked, the payment is
/// confirmed with the backend once, then the request and credits are read
/// again so the page shows the unlocked state.
pub async fn request_page(
    State(state): State<AppState>,
    session: Session,
    url: PageUrl,
    Path(request_id): Path<String>,
) -> ApiResult<Json<ApiResponse<RequestView>>> {
    let client = state.backend.authenticated(session.token());
    let mut details = client
        .request_details(&request_id)
        .await
        .map_err(ApiError::backend("Failed to load request"))?;
    let mut notices = Vec::new();

    if url.has(ReturnMarker::PaymentSuccess) && details.is_locked {
        let guard = state.guards.guard((
            session.key().to_string(),
            ReconcileScope::Request(request_id.clone()),
        ));
        let outcome = reconcile(
            &guard,
            SyncMode::Foreground,
            PAYMENT_SYNC_FAILED,
            client.sync_payment_status(&request_id),
        )
        .await;

        match &outcome {
            ReconcileOutcome::Synced(synced) => {
                tracing::info!(
                    request_id = %request_id,
                    payment_status = ?synced.data.as_ref().map(|p| p.status),
                    "Request payment verified"
                );
                notices.push(Notice::success("Payment verified! Unlocking report..."));
                details = client
                    .request_details(&request_id)
                    .await
                    .map_err(ApiError::backend("Failed to load request"))?;
            }
            ReconcileOutcome::Failed { .. } | ReconcileOutcome::Skipped => {}
        }
        notices.extend(outcome.notice().cloned());
    }

    let snapshot = credit_snapshot(&client).await?;
    let report_status = details.report_status();
    let unlock = details
        .is_locked
        .then(|| GatedOffer::new(snapshot, GatedAction::Unlock));

    if let Some(offer) = &unlock {
        InvariantChecker::run(CheckInputs {
            gating: Some((snapshot, offer.affordance)),
            ..Default::default()
        })
        .log("request_page");
    }

    let view = RequestView {
        can_generate_match: report_status == Some(MatchReportStatus::Unlocked),
        report_status,
        match_credits: snapshot.match_credits,
        unlock,
        details,
    };

    Ok(Json(
        ApiResponse::ok(view)
            .with_notices(notices)
            .with_replace_url(url.without(ReturnMarker::PaymentSuccess)),
    ))
}

/// POST /requests/{id}/unlock
pub async fn unlock(
    State(state): State<AppState>,
    session: Session,
    Path(request_id): Path<String>,
) -> ApiResult<Json<ApiResponse<CreditActionView>>> {
    let client = state.backend.authenticated(session.token());
    let snapshot = credit_snapshot(&client).await?;
    require_credit(snapshot, GatedAction::Unlock)?;

    let ack = client
        .unlock_request(&request_id)
        .await
        .map_err(ApiError::backend("Failed to unlock"))?;
    tracing::info!(request_id = %request_id, session = %session.key(), "Request unlocked with credit");

    let view = CreditActionView {
        match_credits: refreshed_credits(&client).await,
    };
    Ok(Json(
        ApiResponse::ok(view).with_message(ack.message.unwrap_or_else(|| "Request unlocked!".to_string())),
    ))
}

/// POST /requests/{id}/generate-match
///
/// A report already paid for (status `unlocked`) needs no credit; anything
/// else goes through the same gate as unlocking.
pub async fn generate_match(
    State(state): State<AppState>,
    session: Session,
    Path(request_id): Path<String>,
) -> ApiResult<Json<ApiResponse<CreditActionView>>> {
    let client = state.backend.authenticated(session.token());
    let (details, credits) = tokio::join!(client.request_details(&request_id), credit_snapshot(&client));
    let details = details.map_err(ApiError::backend("Failed to load request"))?;
    let snapshot = credits?;

    if details.report_status() != Some(MatchReportStatus::Unlocked) {
        require_credit(snapshot, GatedAction::GenerateMatch)?;
    }

    let ack = client
        .generate_match(&request_id)
        .await
        .map_err(ApiError::backend("Failed to generate AI match"))?;
    tracing::info!(request_id = %request_id, "AI match generated");

    let view = CreditActionView {
        match_credits: refreshed_credits(&client).await,
    };
    Ok(Json(ApiResponse::ok(view).with_message(
        ack.message
            .unwrap_or_else(|| "AI match generated successfully!".to_string()),
    )))
}

/// POST /requests/{id}/checkout
///
/// Pay for one report: extra credit for subscribers, one-time otherwise.
/// Refused while a credit is available, since the credit covers it.
pub async fn checkout(
    State(state): State<AppState>,
    session: Session,
    Path(request_id): Path<String>,
    Json(body): Json<CheckoutBody>,
) -> ApiResult<Json<ApiResponse<CheckoutView>>> {
    let email = body.email.trim();
    if email.is_empty() {
        return Err(ApiError::Validation("User email not found".to_string()));
    }

    let client = state.backend.authenticated(session.token());
    let snapshot = credit_snapshot(&client).await?;
    let affordance = resolve(snapshot, GatedAction::Unlock);

    let Some(plan_type) = affordance.checkout_plan() else {
        return Err(BillingError::CreditAvailable.into());
    };
    let order = match (plan_type.takes_quantity(), affordance.price()) {
        (true, Some(price)) => Some(plan_top_up(1, true, price)?),
        _ => None,
    };

    let created = client
        .create_checkout_session(&CheckoutRequest {
            request_id: request_id.clone(),
            plan_type,
            email: email.to_string(),
            quantity: order.map(|o| o.quantity),
        })
        .await
        .map_err(ApiError::backend("Failed to initiate payment"))?;

    tracing::info!(
        request_id = %request_id,
        plan_type = %plan_type,
        "Report checkout created"
    );

    Ok(Json(ApiResponse::ok(CheckoutView {
        session_id: created.session_id,
        url: created.url,
        order,
    })))
}

#[cfg(test)]
mod tests {
    use optiverifi_shared::SubscriptionState;

    use super::*;

    #[test]
    fn test_extra_credit_offer_quotes_its_price() {
        let offer = GatedOffer::new(
            CreditSnapshot {
                match_credits: 0,
                subscription: SubscriptionState::Active,
            },
            GatedAction::Unlock,
        );
        let Affordance::BuyExtraCredit { price } = offer.affordance else {
            panic!("unexpected affordance: {:?}", offer.affordance);
        };
        assert_eq!(
            offer.description,
            format!("You're out of credits. Buy an extra match for just ${}.", price)
        );
    }

    #[test]
    fn test_credit_offer_description() {
        let offer = GatedOffer::new(
            CreditSnapshot {
                match_credits: 2,
                subscription: SubscriptionState::Expired,
            },
            GatedAction::Unlock,
        );
        assert!(offer.affordance.is_credit_action());
        assert!(offer.description.starts_with("Use one of your match credits"));
    }
}
