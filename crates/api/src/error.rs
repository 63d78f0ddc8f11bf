//! API error type and its HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use optiverifi_billing::BillingError;
use optiverifi_shared::BackendError;
use serde_json::json;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Marker left in response extensions when the backend refused the session.
/// The session layer turns it into a cookie reset and a login redirect.
#[derive(Debug, Clone, Copy)]
pub struct SessionRejected;

#[derive(Debug, Error)]
pub enum ApiError {
    /// No token cookie on a page that needs one
    #[error("Authentication required")]
    MissingSession { path: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    Billing(#[from] BillingError),

    /// Backend failure; `fallback` is shown unless the backend sent a message
    #[error("{source}")]
    Backend {
        source: BackendError,
        fallback: &'static str,
    },
}

impl ApiError {
    pub fn backend(fallback: &'static str) -> impl FnOnce(BackendError) -> ApiError {
        move |source| ApiError::Backend { source, fallback }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingSession { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Billing(BillingError::Backend(e)) | ApiError::Backend { source: e, .. } => {
                backend_status(e)
            }
            ApiError::Billing(BillingError::NotEditable(_))
            | ApiError::Billing(BillingError::ServiceFeeNotDue(_))
            | ApiError::Billing(BillingError::ServiceFeeMissing) => StatusCode::CONFLICT,
            ApiError::Billing(BillingError::NoCreditsAvailable)
            | ApiError::Billing(BillingError::CreditAvailable)
            | ApiError::Billing(BillingError::SavingsFeeNotDue) => StatusCode::CONFLICT,
            ApiError::Billing(BillingError::InvalidQuantity) => StatusCode::BAD_REQUEST,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Backend { source, fallback } => source.user_message(fallback),
            ApiError::Billing(BillingError::Backend(source)) => {
                source.user_message("Something went wrong. Please try again.")
            }
            other => other.to_string(),
        }
    }

    fn is_session_rejected(&self) -> bool {
        match self {
            ApiError::Backend { source, .. } | ApiError::Billing(BillingError::Backend(source)) => {
                source.is_auth_failure()
            }
            _ => false,
        }
    }
}

fn backend_status(e: &BackendError) -> StatusCode {
    match e {
        BackendError::Unauthorized { status } | BackendError::Api { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        BackendError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
        BackendError::Transport(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();

        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "Request failed");
        } else {
            tracing::warn!(error = %self, status = %status, "Request refused");
        }

        let body = Json(json!({
            "success": false,
            "message": message,
        }));

        let mut response = (status, body).into_response();
        if self.is_session_rejected() {
            response.extensions_mut().insert(SessionRejected);
        }
        if let ApiError::MissingSession { path } = self {
            response.extensions_mut().insert(MissingSessionAt(path));
        }
        response
    }
}

/// Page (path and query) of a request that arrived without a session
#[derive(Debug, Clone)]
pub struct MissingSessionAt(pub String);
