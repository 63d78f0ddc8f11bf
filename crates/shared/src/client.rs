//! HTTP client for the marketplace backend
//!
//! Two credential modes mirror how the backend is called from the browser:
//! public calls carry no auth header, authenticated calls carry the session's
//! bearer token. Every authenticated 401/403 is reported as
//! [`BackendError::Unauthorized`] so callers can clear the session once.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use url::Url;

use crate::error::{BackendError, BackendResult};
use crate::models::{
    Category, CheckoutRequest, CheckoutSession, CreditTransactionPage, Envelope,
    InitiatedService, ManagedService, ManagedServiceRequestData, ManagedServiceUpdate, Payment,
    Plan, RequestDetails, ServiceFeePaymentRequest, SubscriptionStatus, SyncSummary,
    SystemSettings,
};

/// Attempts after the first one for idempotent reads
const READ_RETRIES: usize = 2;

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Error body shape used by the backend on non-2xx responses
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Message returned by mutation endpoints that carry no data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub message: Option<String>,
}

/// Result of a sync call: the backend's message plus the refreshed record
#[derive(Debug, Clone)]
pub struct Synced<T> {
    pub message: Option<String>,
    pub data: Option<T>,
}

#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: Url,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> BackendResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| BackendError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::InvalidUrl(config.base_url.clone()));
        }

        let http = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Scope calls to one session's bearer token
    pub fn authenticated<'a>(&'a self, token: &'a str) -> AuthenticatedClient<'a> {
        AuthenticatedClient {
            backend: self,
            token,
        }
    }

    /// Build an endpoint URL from path segments; segments are percent-encoded
    fn endpoint(&self, segments: &[&str]) -> BackendResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> BackendResult<RequestBuilder> {
        let url = self.endpoint(segments)?;
        Ok(self.http.request(method, url))
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        authenticated: bool,
    ) -> BackendResult<Envelope<T>> {
        let response = builder.send().await?;
        let status = response.status();

        if authenticated && matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            tracing::warn!(status = %status, url = %response.url(), "Backend rejected session token");
            return Err(BackendError::Unauthorized {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let url = response.url().clone();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_default();
            tracing::debug!(status = %status, url = %url, message = %message, "Backend call failed");
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope = response.json::<Envelope<T>>().await?;
        envelope.accepted()
    }

    async fn get_with_retry<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        token: Option<&str>,
    ) -> BackendResult<T> {
        let strategy = ExponentialBackoff::from_millis(10)
            .max_delay(Duration::from_millis(500))
            .map(jitter)
            .take(READ_RETRIES);

        RetryIf::spawn(
            strategy,
            || async {
                let mut builder = self.request(Method::GET, segments)?;
                if let Some(token) = token {
                    builder = builder.bearer_auth(token);
                }
                self.execute::<T>(builder, token.is_some())
                    .await?
                    .into_data()
            },
            |e: &BackendError| {
                let retry = e.is_transient();
                if retry {
                    tracing::debug!(error = %e, "Retrying backend read");
                }
                retry
            },
        )
        .await
    }

    // =========================================================================
    // Public endpoints
    // =========================================================================

    /// `GET /api/settings/public`
    pub async fn system_settings(&self) -> BackendResult<SystemSettings> {
        self.get_with_retry(&["api", "settings", "public"], None)
            .await
    }

    /// `GET /api/categories`
    pub async fn categories(&self) -> BackendResult<Vec<Category>> {
        self.get_with_retry(&["api", "categories"], None).await
    }

    /// `GET /api/plans`
    pub async fn plans(&self) -> BackendResult<Vec<Plan>> {
        self.get_with_retry(&["api", "plans"], None).await
    }
}

/// Backend calls made on behalf of one signed-in user
pub struct AuthenticatedClient<'a> {
    backend: &'a BackendClient,
    token: &'a str,
}

impl AuthenticatedClient<'_> {
    fn request(&self, method: Method, segments: &[&str]) -> BackendResult<RequestBuilder> {
        Ok(self
            .backend
            .request(method, segments)?
            .bearer_auth(self.token))
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> BackendResult<Envelope<T>> {
        self.backend.execute(builder, true).await
    }

    async fn sync<T: DeserializeOwned>(&self, segments: &[&str]) -> BackendResult<Synced<T>> {
        let envelope = self
            .send::<T>(self.request(Method::POST, segments)?)
            .await?;
        Ok(Synced {
            message: envelope.message,
            data: envelope.data,
        })
    }

    // =========================================================================
    // Dashboard
    // =========================================================================

    /// `GET /api/dashboard/subscription`
    pub async fn subscription_status(&self) -> BackendResult<SubscriptionStatus> {
        self.backend
            .get_with_retry(&["api", "dashboard", "subscription"], Some(self.token))
            .await
    }

    /// `GET /api/dashboard/credit-transactions`
    pub async fn credit_transactions(
        &self,
        page: u32,
        limit: u32,
    ) -> BackendResult<CreditTransactionPage> {
        let builder = self
            .request(Method::GET, &["api", "dashboard", "credit-transactions"])?
            .query(&[("page", page), ("limit", limit)]);
        self.send(builder).await?.into_data()
    }

    // =========================================================================
    // Sourcing requests
    // =========================================================================

    /// `GET /api/requests/:id/details`
    pub async fn request_details(&self, request_id: &str) -> BackendResult<RequestDetails> {
        let builder = self.request(Method::GET, &["api", "requests", request_id, "details"])?;
        self.send(builder).await?.into_data()
    }

    /// `POST /api/requests/:id/unlock` (spends one credit)
    pub async fn unlock_request(&self, request_id: &str) -> BackendResult<Acknowledgement> {
        let builder = self.request(Method::POST, &["api", "requests", request_id, "unlock"])?;
        let envelope = self.send::<serde_json::Value>(builder).await?;
        Ok(Acknowledgement {
            message: envelope.message,
        })
    }

    /// `POST /api/requests/:id/generate-match`
    pub async fn generate_match(&self, request_id: &str) -> BackendResult<Acknowledgement> {
        let builder = self.request(
            Method::POST,
            &["api", "requests", request_id, "generate-match"],
        )?;
        let envelope = self.send::<serde_json::Value>(builder).await?;
        Ok(Acknowledgement {
            message: envelope.message,
        })
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// `POST /api/payments/checkout`
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> BackendResult<CheckoutSession> {
        let builder = self
            .request(Method::POST, &["api", "payments", "checkout"])?
            .json(request);
        self.send(builder).await?.into_data()
    }

    /// `POST /api/payments/:requestId/sync`; idempotent on the backend
    pub async fn sync_payment_status(&self, request_id: &str) -> BackendResult<Synced<Payment>> {
        self.sync(&["api", "payments", request_id, "sync"]).await
    }

    /// `POST /api/payments/sync`; reconciles every pending payment of the user
    pub async fn sync_user_payments(&self) -> BackendResult<Synced<SyncSummary>> {
        self.sync(&["api", "payments", "sync"]).await
    }

    // =========================================================================
    // Managed services
    // =========================================================================

    /// `POST /api/managed-services/initiate`
    pub async fn initiate_managed_service(
        &self,
        data: &ManagedServiceRequestData,
    ) -> BackendResult<InitiatedService> {
        let builder = self
            .request(Method::POST, &["api", "managed-services", "initiate"])?
            .json(data);
        self.send(builder).await?.into_data()
    }

    /// `GET /api/managed-services/:id`
    pub async fn managed_service(&self, service_id: &str) -> BackendResult<ManagedService> {
        let builder = self.request(Method::GET, &["api", "managed-services", service_id])?;
        self.send(builder).await?.into_data()
    }

    /// `PUT /api/managed-services/:id`
    pub async fn update_managed_service(
        &self,
        service_id: &str,
        update: &ManagedServiceUpdate,
    ) -> BackendResult<ManagedService> {
        let builder = self
            .request(Method::PUT, &["api", "managed-services", service_id])?
            .json(update);
        self.send(builder).await?.into_data()
    }

    /// `POST /api/managed-services/:id/sync-payment`
    pub async fn sync_managed_service_payment(
        &self,
        service_id: &str,
    ) -> BackendResult<Synced<ManagedService>> {
        self.sync(&["api", "managed-services", service_id, "sync-payment"])
            .await
    }

    /// `POST /api/managed-services/payment/create-session`
    pub async fn create_service_fee_session(
        &self,
        request: &ServiceFeePaymentRequest,
    ) -> BackendResult<CheckoutSession> {
        let builder = self
            .request(
                Method::POST,
                &["api", "managed-services", "payment", "create-session"],
            )?
            .json(request);
        self.send(builder).await?.into_data()
    }

    /// `POST /api/managed-services/:id/savings-fee/payment`
    pub async fn create_savings_fee_session(
        &self,
        service_id: &str,
    ) -> BackendResult<CheckoutSession> {
        let builder = self.request(
            Method::POST,
            &["api", "managed-services", service_id, "savings-fee", "payment"],
        )?;
        self.send(builder).await?.into_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PlanType, SubscriptionState};

    fn client_for(server: &mockito::ServerGuard) -> BackendClient {
        BackendClient::new(&BackendConfig {
            base_url: server.url(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_public_settings_call_has_no_auth_header() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/settings/public")
            .match_header("authorization", mockito::Matcher::Missing)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":true,"data":{"extraCreditPrice":10,"savingsFeePercentage":8}}"#)
            .create_async()
            .await;

        let settings = client_for(&server).system_settings().await.unwrap();
        assert_eq!(settings.extra_credit_price, Some(10));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_authenticated_call_sends_bearer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/dashboard/subscription")
            .match_header("authorization", "Bearer tok-123")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":true,"data":{"subscriptionStatus":"active","matchCredits":2}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let status = client
            .authenticated("tok-123")
            .subscription_status()
            .await
            .unwrap();
        assert_eq!(status.subscription_status, SubscriptionState::Active);
        assert_eq!(status.credits(), 2);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_forbidden_maps_to_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/payments/sync")
            .with_status(403)
            .with_body(r#"{"success":false,"message":"Forbidden"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .authenticated("expired")
            .sync_user_payments()
            .await
            .unwrap_err();
        assert!(err.is_auth_failure());
    }

    #[tokio::test]
    async fn test_error_body_message_is_kept() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/payments/checkout")
            .with_status(400)
            .with_body(r#"{"success":false,"message":"Quantity must be positive"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .authenticated("tok")
            .create_checkout_session(&CheckoutRequest {
                request_id: "general".into(),
                plan_type: PlanType::ExtraCredit,
                email: "buyer@example.com".into(),
                quantity: Some(0),
            })
            .await
            .unwrap_err();
        assert_eq!(err.user_message("fallback"), "Quantity must be positive");
        assert_eq!(err.status(), Some(400));
    }

    #[tokio::test]
    async fn test_path_segments_are_encoded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/payments/a%2Fb/sync")
            .with_status(200)
            .with_body(r#"{"success":true,"message":"Already synced"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let synced = client
            .authenticated("tok")
            .sync_payment_status("a/b")
            .await
            .unwrap();
        assert_eq!(synced.message.as_deref(), Some("Already synced"));
        assert!(synced.data.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unsuccessful_envelope_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/managed-services/m1/sync-payment")
            .with_status(200)
            .with_body(r#"{"success":false,"message":"No completed payment found"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .authenticated("tok")
            .sync_managed_service_payment("m1")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected(ref m) if m == "No completed payment found"));
    }

    #[tokio::test]
    async fn test_service_fee_session_posts_cents() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/managed-services/payment/create-session")
            .match_header("authorization", "Bearer tok")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "requestId": "m1",
                "amount": 200000,
                "email": "buyer@example.com"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":true,"data":{"sessionId":"cs_9","url":"https://pay.example/cs_9"}}"#)
            .create_async()
            .await;

        let session = client_for(&server)
            .authenticated("tok")
            .create_service_fee_session(&ServiceFeePaymentRequest {
                request_id: "m1".into(),
                amount: 200_000,
                email: "buyer@example.com".into(),
            })
            .await
            .unwrap();
        assert_eq!(session.session_id, "cs_9");
        mock.assert_async().await;
    }

    #[test]
    fn test_rejects_non_base_url() {
        let result = BackendClient::new(&BackendConfig {
            base_url: "mailto:ops@example.com".into(),
            timeout: Duration::from_secs(1),
        });
        assert!(matches!(result, Err(BackendError::InvalidUrl(_))));
    }
}
