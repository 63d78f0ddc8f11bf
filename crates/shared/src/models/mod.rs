//! Wire models for the marketplace backend.
//!
//! Field names follow the backend's camelCase JSON. Anything the backend may
//! omit is optional or defaulted so a partial payload still deserializes.

pub mod catalog;
pub mod dashboard;
pub mod envelope;
pub mod managed;
pub mod payments;
pub mod settings;

pub use catalog::{Category, Grade, Plan, PlanTier};
pub use dashboard::{
    CreditReason, CreditTransaction, CreditTransactionPage, MatchReportStatus, Pagination,
    RequestDetails, RequestInfo, SubscriptionState, SubscriptionStatus, Supplier,
    TransactionType,
};
pub use envelope::Envelope;
pub use managed::{
    ComplianceLevel, InitiatedService, ManagedService, ManagedServiceRequestData,
    ManagedServiceUpdate,
};
pub use payments::{
    CheckoutRequest, CheckoutSession, Payment, PaymentStatus, PlanType, ServiceFeePaymentRequest,
    SyncSummary,
};
pub use settings::{SystemSettings, UrgencyFee};
