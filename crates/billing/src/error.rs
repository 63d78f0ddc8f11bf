//! Billing error types

use optiverifi_shared::BackendError;
use thiserror::Error;

pub type BillingResult<T> = Result<T, BillingError>;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Please select at least 1 credit")]
    InvalidQuantity,

    #[error("No match credits available for this action")]
    NoCreditsAvailable,

    #[error("Use a match credit instead of paying for this report")]
    CreditAvailable,

    #[error("Request can no longer be edited (stage: {0})")]
    NotEditable(String),

    #[error("No savings fee is due for this request")]
    SavingsFeeNotDue,

    #[error("Service fee is not payable at this stage (stage: {0})")]
    ServiceFeeNotDue(String),

    #[error("Service fee amount not found. Please contact support.")]
    ServiceFeeMissing,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl BillingError {
    /// True for refusals decided locally, before any backend call
    pub fn is_precondition(&self) -> bool {
        !matches!(self, BillingError::Backend(_))
    }
}
