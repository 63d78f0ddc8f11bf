// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Optiverifi Billing Module
//!
//! Pricing and payment logic shared by every dashboard page.
//!
//! ## Features
//!
//! - **Pricing Table**: compiled-in defaults overlaid with the backend's
//!   public settings, in one place
//! - **Fee Preview**: managed-service base fee by category grade plus urgency
//!   surcharge (display-only; checkout is priced by the backend)
//! - **Credit Gating**: use a credit, buy an extra credit, or pay per unlock
//! - **Top-ups**: quantity rules and estimated totals for credit purchases
//! - **Stage Display**: managed-service progress bar and next actions
//! - **Reconciliation**: single-fire payment sync after checkout redirects
//! - **Invariants**: consistency checks over quotes and the credit ledger

pub mod credits;
pub mod error;
pub mod invariants;
pub mod pricing;
pub mod reconcile;
pub mod settings;
pub mod stages;


// Credits
pub use credits::{
    plan_top_up, reason_label, require_credit, resolve, signed_delta, Affordance,
    CreditSnapshot, GatedAction, TopUpOrder, GENERAL_TOP_UP_REQUEST_ID, MAX_TOP_UP_QUANTITY,
    PAY_PER_UNLOCK_PRICE, SUBSCRIBER_UNLOCK_PRICE,
};

// Error
pub use error::{BillingError, BillingResult};

// Invariants
pub use invariants::{
    CheckInputs, InvariantCheckSummary, InvariantChecker, InvariantViolation, ViolationSeverity,
};

// Pricing
pub use pricing::{compute_price, PriceQuote};

// Reconciliation
pub use reconcile::{
    reconcile, GuardRegistry, Notice, NoticeLevel, ReconcileOutcome, ReturnMarker, SyncEvent,
    SyncGuard, SyncMode, SyncState,
};

// Settings
pub use settings::{PricingTable, UrgencyTier};

// Stages
pub use stages::{
    progress, savings_fee_due, service_fee_due, step_position, ManagedStage, SavingsFeeDue,
    ServiceFeeDue, StepPosition, StepStatus, StepView, PROGRESS_STEPS,
};
