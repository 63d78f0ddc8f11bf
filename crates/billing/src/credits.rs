//! Credit- and subscription-gated actions
//!
//! Decides which unlock affordance a user is offered from the two numbers the
//! backend reports: remaining match credits and subscription state. This is a
//! UI decision only; the backend enforces the real entitlement.

use optiverifi_shared::{
    CreditReason, CreditTransaction, PlanType, SubscriptionState, SubscriptionStatus,
    TransactionType,
};
use serde::Serialize;

use crate::error::{BillingError, BillingResult};

/// Per-unlock price for active subscribers who ran out of credits
pub const SUBSCRIBER_UNLOCK_PRICE: u64 = 10;

/// Per-unlock price without an active subscription
pub const PAY_PER_UNLOCK_PRICE: u64 = 49;

/// Largest credit top-up accepted in one checkout
pub const MAX_TOP_UP_QUANTITY: u32 = 100;

/// Checkout `requestId` for top-ups not tied to a request
pub const GENERAL_TOP_UP_REQUEST_ID: &str = "general";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatedAction {
    Unlock,
    GenerateMatch,
}

/// What the user is offered for a gated action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Affordance {
    /// Spend one of the remaining credits
    UseCredit,
    /// Subscriber with no credits left buys one at the subscriber rate
    BuyExtraCredit { price: u64 },
    /// Non-subscriber pays for this one report
    PayPerUnlock { price: u64 },
}

impl Affordance {
    pub fn is_credit_action(&self) -> bool {
        matches!(self, Affordance::UseCredit)
    }

    /// Plan to request from checkout, or `None` when a credit covers it
    pub fn checkout_plan(&self) -> Option<PlanType> {
        match self {
            Affordance::UseCredit => None,
            Affordance::BuyExtraCredit { .. } => Some(PlanType::ExtraCredit),
            Affordance::PayPerUnlock { .. } => Some(PlanType::OneTime),
        }
    }

    pub fn price(&self) -> Option<u64> {
        match self {
            Affordance::UseCredit => None,
            Affordance::BuyExtraCredit { price } | Affordance::PayPerUnlock { price } => {
                Some(*price)
            }
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Affordance::UseCredit => "Use 1 Credit",
            Affordance::BuyExtraCredit { .. } => "Buy Extra Match",
            Affordance::PayPerUnlock { .. } => "Pay Per Match",
        }
    }
}

/// The part of the subscription snapshot the resolver looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditSnapshot {
    pub match_credits: u32,
    pub subscription: SubscriptionState,
}

impl From<&SubscriptionStatus> for CreditSnapshot {
    fn from(status: &SubscriptionStatus) -> Self {
        Self {
            match_credits: status.credits(),
            subscription: status.subscription_status,
        }
    }
}

impl CreditSnapshot {
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_active()
    }

    /// Out of credits while subscribed: show the top-up prompt
    pub fn needs_top_up(&self) -> bool {
        self.match_credits == 0 && self.is_subscribed()
    }
}

/// Both gated actions follow the same rule; the action is kept for logging
/// and for callers that label the prompt differently.
pub fn resolve(snapshot: CreditSnapshot, action: GatedAction) -> Affordance {
    let affordance = if snapshot.match_credits > 0 {
        Affordance::UseCredit
    } else if snapshot.is_subscribed() {
        Affordance::BuyExtraCredit {
            price: SUBSCRIBER_UNLOCK_PRICE,
        }
    } else {
        Affordance::PayPerUnlock {
            price: PAY_PER_UNLOCK_PRICE,
        }
    };

    tracing::trace!(
        action = ?action,
        credits = snapshot.match_credits,
        subscribed = snapshot.is_subscribed(),
        affordance = ?affordance,
        "Resolved gated action"
    );

    affordance
}

/// Refuse a credit-spending action the resolver would not offer
pub fn require_credit(snapshot: CreditSnapshot, action: GatedAction) -> BillingResult<()> {
    if resolve(snapshot, action).is_credit_action() {
        Ok(())
    } else {
        Err(BillingError::NoCreditsAvailable)
    }
}

/// Planned credit purchase, before the backend prices it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUpOrder {
    pub quantity: u32,
    pub unit_price: u64,
    /// Estimate only; the checkout session decides what is charged
    pub estimated_total: u64,
}

/// Validate and normalize a credit top-up.
///
/// A top-up bound to one request always buys exactly one credit. Otherwise
/// the quantity must be at least one and is capped at
/// [`MAX_TOP_UP_QUANTITY`].
pub fn plan_top_up(requested: u32, bound_to_request: bool, unit_price: u64) -> BillingResult<TopUpOrder> {
    let quantity = if bound_to_request {
        1
    } else if requested == 0 {
        return Err(BillingError::InvalidQuantity);
    } else {
        requested.min(MAX_TOP_UP_QUANTITY)
    };

    Ok(TopUpOrder {
        quantity,
        unit_price,
        estimated_total: unit_price.saturating_mul(u64::from(quantity)),
    })
}

/// Signed change in credits recorded by a ledger entry
pub fn signed_delta(tx: &CreditTransaction) -> i64 {
    let used = i64::from(tx.credits_used);
    match tx.transaction_type {
        TransactionType::Added => used,
        TransactionType::Deducted | TransactionType::Expired => -used,
    }
}

pub fn reason_label(reason: CreditReason) -> &'static str {
    match reason {
        CreditReason::MatchGeneration => "AI Match Generation",
        CreditReason::UnlockRequest => "Unlock Request",
        CreditReason::SubscriptionAllocation => "Subscription Allocation",
        CreditReason::TopUp => "Top Up",
        CreditReason::Rollover => "Rollover",
        CreditReason::Other => "Other",
    }
}
