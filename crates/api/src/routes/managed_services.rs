//! Managed sourcing services: initiation, stage view, edits and savings fee

use axum::{
    extract::{Path, State},
    Json,
};
use optiverifi_billing::{
    compute_price, progress, reconcile, savings_fee_due, service_fee_due, step_position,
    BillingError, ManagedStage, Notice, PriceQuote, ReconcileOutcome, ReturnMarker,
    SavingsFeeDue, ServiceFeeDue, StepView, SyncMode,
};
use optiverifi_shared::{
    ManagedService, ManagedServiceRequestData, ManagedServiceUpdate, ServiceFeePaymentRequest,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::Session,
    error::{ApiError, ApiResult},
    routes::{billing::CheckoutView, ApiResponse, PageUrl},
    state::{AppState, ReconcileScope},
};

const SYNC_FAILED: &str = "Failed to sync payment status";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatedView {
    pub request_id: String,
    /// Fee the backend will charge
    pub service_fee_amount: f64,
    /// Fee previewed before submission
    pub preview: PriceQuote,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageView {
    pub stage: String,
    pub label: String,
    /// -1 before the first step, number of steps once all are done
    pub step_index: i32,
    pub steps: Vec<StepView>,
    pub can_edit: bool,
    pub has_report: bool,
}

impl StageView {
    fn of(raw: &str) -> Self {
        let stage = ManagedStage::parse(raw);
        let position = step_position(&stage);
        Self {
            stage: stage.as_str().to_string(),
            label: stage.label().to_string(),
            step_index: position.index(),
            steps: progress(&stage),
            can_edit: stage.is_editable(),
            has_report: stage.has_report(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceView {
    pub service: ManagedService,
    pub progress: StageView,
    /// Set while the service fee is still to be paid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_fee: Option<ServiceFeeDue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub savings_fee: Option<SavingsFeeDue>,
}

impl ServiceView {
    fn new(service: ManagedService, default_percentage: f64) -> Self {
        Self {
            progress: StageView::of(&service.stage),
            service_fee: service_fee_due(&service).ok(),
            savings_fee: savings_fee_due(&service, default_percentage),
            service,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ServiceFeeBody {
    pub email: String,
}

fn require(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// POST /managed-services
pub async fn initiate(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<ManagedServiceRequestData>,
) -> ApiResult<Json<ApiResponse<InitiatedView>>> {
    require("Item name", &body.item_name)?;
    require("Category", &body.category)?;
    require("Quantity", &body.quantity)?;
    require("Delivery location", &body.delivery_location)?;

    let (table, categories) = tokio::join!(state.pricing_table(), state.backend.categories());
    let grade = categories
        .map_err(ApiError::backend("Failed to load categories"))?
        .into_iter()
        .find(|c| c.id == body.category || c.name.eq_ignore_ascii_case(&body.category))
        .and_then(|c| c.grade);
    let preview = compute_price(grade, Some(body.urgency.as_str()), &table);

    let initiated = state
        .backend
        .authenticated(session.token())
        .initiate_managed_service(&body)
        .await
        .map_err(ApiError::backend("Failed to submit request"))?;

    if !preview.matches_charged(initiated.service_fee_amount) {
        tracing::warn!(
            request_id = %initiated.request_id,
            preview = preview.total_price,
            charged = initiated.service_fee_amount,
            "Service fee preview differs from backend fee"
        );
    }

    Ok(Json(ApiResponse::ok(InitiatedView {
        request_id: initiated.request_id,
        service_fee_amount: initiated.service_fee_amount,
        preview,
    })))
}

/// GET /managed-services/{id}[?payment=success]
///
/// After a service-fee or savings-fee checkout the payment is synced once,
/// after a short wait that gives the webhook a chance to land first.
pub async fn service_page(
    State(state): State<AppState>,
    session: Session,
    url: PageUrl,
    Path(service_id): Path<String>,
) -> ApiResult<Json<ApiResponse<ServiceView>>> {
    let client = state.backend.authenticated(session.token());
    let mut notices = Vec::new();
    let mut synced_service = None;

    if url.has(ReturnMarker::PaymentSuccess) {
        let guard = state.guards.guard((
            session.key().to_string(),
            ReconcileScope::ManagedService(service_id.clone()),
        ));
        let delay = state.config.payment_sync_delay;
        let outcome = reconcile(&guard, SyncMode::Foreground, SYNC_FAILED, async {
            tokio::time::sleep(delay).await;
            client.sync_managed_service_payment(&service_id).await
        })
        .await;

        match outcome {
            ReconcileOutcome::Synced(synced) => {
                tracing::info!(service_id = %service_id, "Managed service payment synced");
                notices.push(Notice::success(
                    synced
                        .message
                        .unwrap_or_else(|| "Payment status synced successfully".to_string()),
                ));
                synced_service = synced.data;
            }
            ReconcileOutcome::Failed { notice } => notices.extend(notice),
            ReconcileOutcome::Skipped => {}
        }
    }

    let service = match synced_service {
        Some(service) => service,
        None => client
            .managed_service(&service_id)
            .await
            .map_err(ApiError::backend("Failed to load request"))?,
    };
    let table = state.pricing_table().await;

    Ok(Json(
        ApiResponse::ok(ServiceView::new(service, table.savings_fee_percentage()))
            .with_notices(notices)
            .with_replace_url(url.without(ReturnMarker::PaymentSuccess)),
    ))
}

/// PUT /managed-services/{id}
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Path(service_id): Path<String>,
    Json(body): Json<ManagedServiceUpdate>,
) -> ApiResult<Json<ApiResponse<ServiceView>>> {
    if body.is_empty() {
        return Err(ApiError::Validation("Nothing to update".to_string()));
    }
    if let Some(urgency) = &body.urgency {
        let table = state.pricing_table().await;
        if !table.has_urgency_tier(urgency) {
            return Err(ApiError::Validation(format!("Unknown urgency: {}", urgency)));
        }
    }

    let client = state.backend.authenticated(session.token());
    let current = client
        .managed_service(&service_id)
        .await
        .map_err(ApiError::backend("Failed to load request"))?;

    let stage = ManagedStage::parse(&current.stage);
    if !stage.is_editable() {
        return Err(BillingError::NotEditable(stage.label().to_string()).into());
    }

    let updated = client
        .update_managed_service(&service_id, &body)
        .await
        .map_err(ApiError::backend("Failed to update request"))?;
    let table = state.pricing_table().await;

    Ok(Json(
        ApiResponse::ok(ServiceView::new(updated, table.savings_fee_percentage()))
            .with_message("Request updated successfully"),
    ))
}

/// POST /managed-services/{id}/savings-fee
pub async fn savings_fee(
    State(state): State<AppState>,
    session: Session,
    Path(service_id): Path<String>,
) -> ApiResult<Json<ApiResponse<CheckoutView>>> {
    let client = state.backend.authenticated(session.token());
    let (service, table) = tokio::join!(client.managed_service(&service_id), state.pricing_table());
    let service = service.map_err(ApiError::backend("Failed to load request"))?;

    let due = savings_fee_due(&service, table.savings_fee_percentage())
        .ok_or(BillingError::SavingsFeeNotDue)?;

    let created = client
        .create_savings_fee_session(&service_id)
        .await
        .map_err(ApiError::backend("Failed to create payment session"))?;

    tracing::info!(
        service_id = %service_id,
        savings = due.savings_amount,
        percentage = due.percentage,
        "Savings fee checkout created"
    );

    Ok(Json(ApiResponse::ok(CheckoutView {
        session_id: created.session_id,
        url: created.url,
        order: None,
    })))
}

/// POST /managed-services/{id}/service-fee
///
/// Checkout for the fee set at initiation. Only a request still awaiting
/// payment can be paid, and the amount is always the backend's.
pub async fn service_fee(
    State(state): State<AppState>,
    session: Session,
    Path(service_id): Path<String>,
    Json(body): Json<ServiceFeeBody>,
) -> ApiResult<Json<ApiResponse<CheckoutView>>> {
    let email = body.email.trim();
    if email.is_empty() {
        return Err(ApiError::Validation(
            "Email not found. Please contact support.".to_string(),
        ));
    }

    let client = state.backend.authenticated(session.token());
    let service = client
        .managed_service(&service_id)
        .await
        .map_err(ApiError::backend("Failed to load request"))?;
    let due = service_fee_due(&service)?;

    let created = client
        .create_service_fee_session(&ServiceFeePaymentRequest {
            request_id: service_id.clone(),
            amount: due.amount_cents,
            email: email.to_string(),
        })
        .await
        .map_err(ApiError::backend("Failed to create payment session"))?;

    tracing::info!(
        service_id = %service_id,
        amount_cents = due.amount_cents,
        "Service fee checkout created"
    );

    Ok(Json(
        ApiResponse::ok(CheckoutView {
            session_id: created.session_id,
            url: created.url,
            order: None,
        })
        .with_message("Redirecting to payment..."),
    ))
}
