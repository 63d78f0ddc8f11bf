use serde::Deserialize;

use crate::error::{BackendError, BackendResult};

/// Response wrapper used by every backend endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Reject `success: false`, otherwise hand back the envelope untouched
    pub fn accepted(self) -> BackendResult<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(BackendError::Rejected(
                self.message
                    .unwrap_or_else(|| "Request was not successful".to_string()),
            ))
        }
    }

    /// Extract `data`, failing when the backend left it out
    pub fn into_data(self) -> BackendResult<T> {
        self.accepted()?.data.ok_or(BackendError::MissingData)
    }
}
