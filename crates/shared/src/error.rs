//! Backend client error types

use thiserror::Error;

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend rejected the bearer token (401 or 403)
    #[error("Backend rejected credentials (status {status})")]
    Unauthorized { status: u16 },

    /// Non-2xx response other than an auth failure
    #[error("Backend error ({status}): {message}")]
    Api { status: u16, message: String },

    /// 2xx response carrying `success: false`
    #[error("{0}")]
    Rejected(String),

    #[error("Backend response did not include data")]
    MissingData,

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

impl BackendError {
    /// True when the session token should be discarded
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, BackendError::Unauthorized { .. })
    }

    /// Transport failures worth retrying for idempotent reads
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Message suitable for a user-facing notification.
    ///
    /// Server-provided messages pass through; anything else becomes `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            BackendError::Api { message, .. } | BackendError::Rejected(message)
                if !message.is_empty() =>
            {
                message.clone()
            }
            _ => fallback.to_string(),
        }
    }

    /// HTTP status reported by the backend, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Unauthorized { status } | BackendError::Api { status, .. } => {
                Some(*status)
            }
            BackendError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
