//! API routes

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    middleware,
    routing::{get, post},
    Json, Router,
};
use optiverifi_billing::{Notice, ReturnMarker};
use serde::Serialize;
use serde_json::{json, Value};
use time::OffsetDateTime;

use crate::{auth::session_guard, state::AppState};

pub mod billing;
pub mod managed_services;
pub mod pricing;
pub mod requests;


pub fn create_router(state: AppState) -> Router {
    let pages = Router::new()
        // Pricing preview
        .route("/api/pricing/quote", get(pricing::quote))
        // Billing
        .route("/billing", get(billing::billing_page))
        .route("/billing/top-up", post(billing::top_up))
        // Sourcing requests
        .route("/requests/{id}", get(requests::request_page))
        .route("/requests/{id}/unlock", post(requests::unlock))
        .route("/requests/{id}/generate-match", post(requests::generate_match))
        .route("/requests/{id}/checkout", post(requests::checkout))
        // Managed services
        .route("/managed-services", post(managed_services::initiate))
        .route(
            "/managed-services/{id}",
            get(managed_services::service_page).put(managed_services::update),
        )
        .route(
            "/managed-services/{id}/service-fee",
            post(managed_services::service_fee),
        )
        .route(
            "/managed-services/{id}/savings-fee",
            post(managed_services::savings_fee),
        )
        .layer(middleware::from_fn_with_state(state.clone(), session_guard));

    Router::new()
        .route("/health", get(health))
        .merge(pages)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": OffsetDateTime::now_utc().unix_timestamp(),
    }))
}

// =============================================================================
// Shared response shapes
// =============================================================================

/// Success body used by every route: `{ success, message?, data, notices?, replaceUrl? }`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<Notice>,
    /// Page URL with the checkout return marker removed; the browser swaps
    /// it in without a navigation so a reload cannot re-trigger the sync
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace_url: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
            notices: Vec::new(),
            replace_url: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_notices(mut self, notices: Vec<Notice>) -> Self {
        self.notices = notices;
        self
    }

    pub fn with_replace_url(mut self, url: Option<String>) -> Self {
        self.replace_url = url;
        self
    }
}

/// Path and raw query of the page being rendered
#[derive(Debug, Clone)]
pub struct PageUrl {
    path: String,
    query: Option<String>,
}

impl PageUrl {
    pub fn has(&self, marker: ReturnMarker) -> bool {
        marker.is_present(self.query.as_deref())
    }

    /// Replacement URL, only when the marker was there to remove
    pub fn without(&self, marker: ReturnMarker) -> Option<String> {
        self.has(marker)
            .then(|| marker.strip(&self.path, self.query.as_deref()))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for PageUrl {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self {
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(String::from),
        })
    }
}
