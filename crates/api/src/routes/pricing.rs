//! Managed-service fee preview

use axum::{
    extract::{Query, State},
    Json,
};
use optiverifi_billing::{compute_price, InvariantChecker, PriceQuote, UrgencyTier};
use optiverifi_shared::Grade;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    routes::ApiResponse,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    /// Category id or name; its grade is used when `grade` is absent
    pub category: Option<String>,
    pub grade: Option<Grade>,
    pub urgency: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteView {
    pub grade: Option<Grade>,
    pub urgency: String,
    pub quote: PriceQuote,
    pub urgency_tiers: Vec<UrgencyTier>,
    pub currency: String,
}

/// GET /api/pricing/quote
pub async fn quote(
    State(state): State<AppState>,
    Query(query): Query<QuoteQuery>,
) -> ApiResult<Json<ApiResponse<QuoteView>>> {
    let table = state.pricing_table().await;

    let grade = match (query.grade, query.category.as_deref()) {
        (Some(grade), _) => Some(grade),
        (None, Some(category)) if !category.is_empty() => {
            let categories = state
                .backend
                .categories()
                .await
                .map_err(ApiError::backend("Failed to load categories"))?;
            categories
                .iter()
                .find(|c| c.id == category || c.name.eq_ignore_ascii_case(category))
                .and_then(|c| c.grade)
        }
        _ => None,
    };

    let urgency = query
        .urgency
        .filter(|u| table.has_urgency_tier(u))
        .unwrap_or_else(|| table.default_urgency().to_string());
    let quote = compute_price(grade, Some(urgency.as_str()), &table);

    if let Some(violation) = InvariantChecker::check_quote(&quote) {
        tracing::error!(invariant = %violation.invariant, "{}", violation.description);
    }

    Ok(Json(ApiResponse::ok(QuoteView {
        grade,
        urgency,
        quote,
        urgency_tiers: table.urgency_tiers(),
        currency: table.currency().to_string(),
    })))
}
