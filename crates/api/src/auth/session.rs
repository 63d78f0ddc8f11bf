//! Session token handling
//!
//! The dashboard never sees credentials: the browser holds the backend's
//! bearer token in a cookie and every authenticated backend call forwards it.
//! When the backend rejects the token (401/403) the cookie is cleared once,
//! here, and the browser is sent to the login page unless it is already on
//! one of the pages that work without a session.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        header::{AUTHORIZATION, COOKIE, LOCATION, SET_COOKIE},
        request::Parts,
        HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};
use url::form_urlencoded;

use crate::error::{ApiError, MissingSessionAt, SessionRejected};
use crate::state::AppState;

/// Pages that stay put when the backend rejects the session
pub const SESSIONLESS_PATHS: [&str; 3] = ["/login", "/verify", "/create-password"];

pub const LOGIN_PATH: &str = "/login";

/// Bearer token of the current browser session
#[derive(Clone)]
pub struct Session {
    token: String,
    key: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("key", &self.key).finish()
    }
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        let key = fingerprint(&token);
        Self { token, key }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Stable, non-reversible identifier for keying per-session state
    pub fn key(&self) -> &str {
        &self.key
    }
}

fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    // 16 bytes is plenty to tell sessions apart
    hex::encode(&digest[..16])
}

/// Value of cookie `name` from the request's `Cookie` headers
pub fn cookie_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|h| h.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, v)| *k == name && !v.is_empty())
        .map(|(_, v)| v.to_string())
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .map(String::from)
}

impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Cookie first, the Authorization header for non-browser callers
        cookie_value(parts, &state.config.token_cookie)
            .or_else(|| bearer_token(parts))
            .map(Session::new)
            .ok_or_else(|| ApiError::MissingSession {
                path: parts
                    .uri
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| parts.uri.path().to_string()),
            })
    }
}

fn is_sessionless(path: &str) -> bool {
    SESSIONLESS_PATHS.contains(&path)
}

fn clear_cookie_header(name: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax",
        name
    ))
    .ok()
}

fn redirect_to_login(return_to: Option<&str>) -> Response {
    let location = match return_to {
        Some(path) => format!(
            "{}?{}",
            LOGIN_PATH,
            form_urlencoded::Serializer::new(String::new())
                .append_pair("redirect", path)
                .finish()
        ),
        None => LOGIN_PATH.to_string(),
    };

    match HeaderValue::from_str(&location) {
        Ok(value) => (StatusCode::SEE_OTHER, [(LOCATION, value)]).into_response(),
        Err(_) => StatusCode::UNAUTHORIZED.into_response(),
    }
}

/// Router-level layer: the single place that reacts to a missing or
/// rejected session.
pub async fn session_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    if let Some(MissingSessionAt(page)) = response.extensions().get::<MissingSessionAt>() {
        tracing::debug!(path = %page, "No session cookie, redirecting to login");
        return redirect_to_login(Some(page.as_str()));
    }

    if response.extensions().get::<SessionRejected>().is_none() {
        return response;
    }

    tracing::warn!(path = %path, "Backend rejected session, clearing token");

    let mut response = if is_sessionless(&path) {
        response
    } else {
        redirect_to_login(None)
    };
    if let Some(cookie) = clear_cookie_header(&state.config.token_cookie) {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    response
}
