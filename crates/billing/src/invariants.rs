//! Billing Invariants Module
//!
//! Consistency checks over the numbers the dashboard computes or displays.
//! They never block a page; violations are logged so drift between the
//! dashboard's preview logic and the backend shows up early.
//!
//! ## Checks
//!
//! 1. **Quote arithmetic**: `total = base + urgency fee`
//! 2. **Ledger arithmetic**: each entry's before/after counts agree with its
//!    type and amount
//! 3. **Ledger continuity**: adjacent entries (newest first) chain
//! 4. **Credit gating**: no credit action offered without credits

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use optiverifi_shared::{CreditTransaction, TransactionType};

use crate::credits::{Affordance, CreditSnapshot};
use crate::pricing::PriceQuote;

/// Result of running a single invariant check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantViolation {
    /// Which invariant was violated
    pub invariant: String,
    /// Human-readable description of the violation
    pub description: String,
    /// Additional context for debugging
    pub context: serde_json::Value,
    pub severity: ViolationSeverity,
}

/// Severity of an invariant violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationSeverity {
    /// Critical - a price shown to the user is wrong
    Critical,
    /// High - ledger data contradicts itself
    High,
    /// Medium - potential issue, should investigate
    Medium,
    /// Low - informational
    Low,
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViolationSeverity::Critical => write!(f, "CRITICAL"),
            ViolationSeverity::High => write!(f, "HIGH"),
            ViolationSeverity::Medium => write!(f, "MEDIUM"),
            ViolationSeverity::Low => write!(f, "LOW"),
        }
    }
}

/// Summary of all invariant checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvariantCheckSummary {
    #[serde(with = "time::serde::rfc3339")]
    pub checked_at: OffsetDateTime,
    pub checks_run: usize,
    pub checks_passed: usize,
    pub checks_failed: usize,
    pub violations: Vec<InvariantViolation>,
    pub healthy: bool,
}

impl InvariantCheckSummary {
    /// Emit one log line per violation at a level matching its severity
    pub fn log(&self, scope: &str) {
        for v in &self.violations {
            match v.severity {
                ViolationSeverity::Critical | ViolationSeverity::High => tracing::error!(
                    scope = scope,
                    invariant = %v.invariant,
                    severity = %v.severity,
                    context = %v.context,
                    "{}",
                    v.description
                ),
                ViolationSeverity::Medium | ViolationSeverity::Low => tracing::warn!(
                    scope = scope,
                    invariant = %v.invariant,
                    severity = %v.severity,
                    context = %v.context,
                    "{}",
                    v.description
                ),
            }
        }
    }
}

/// Inputs for a full run; each is optional so a page checks what it has
#[derive(Debug, Default)]
pub struct CheckInputs<'a> {
    pub quote: Option<&'a PriceQuote>,
    pub ledger: Option<&'a [CreditTransaction]>,
    pub gating: Option<(CreditSnapshot, Affordance)>,
}

/// Stateless runner for the checks above
pub struct InvariantChecker;

impl InvariantChecker {
    pub fn run(inputs: CheckInputs<'_>) -> InvariantCheckSummary {
        let mut violations = Vec::new();
        let mut checks_run = 0;

        if let Some(quote) = inputs.quote {
            checks_run += 1;
            violations.extend(Self::check_quote(quote));
        }
        if let Some(ledger) = inputs.ledger {
            checks_run += 2;
            violations.extend(Self::check_ledger_arithmetic(ledger));
            violations.extend(Self::check_ledger_continuity(ledger));
        }
        if let Some((snapshot, affordance)) = inputs.gating {
            checks_run += 1;
            violations.extend(Self::check_gating(snapshot, affordance));
        }

        let checks_failed = violations
            .iter()
            .map(|v| &v.invariant)
            .collect::<std::collections::HashSet<_>>()
            .len();

        InvariantCheckSummary {
            checked_at: OffsetDateTime::now_utc(),
            checks_run,
            checks_passed: checks_run - checks_failed,
            checks_failed,
            healthy: violations.is_empty(),
            violations,
        }
    }

    /// Invariant 1: total equals base plus urgency fee
    pub fn check_quote(quote: &PriceQuote) -> Option<InvariantViolation> {
        let expected = quote.base_price.checked_add(quote.urgency_fee);
        if expected == Some(quote.total_price) {
            return None;
        }

        Some(InvariantViolation {
            invariant: "quote_total_is_sum".to_string(),
            description: format!(
                "Quote total {} does not equal base {} + urgency {}",
                quote.total_price, quote.base_price, quote.urgency_fee
            ),
            context: serde_json::json!({
                "base_price": quote.base_price,
                "urgency_fee": quote.urgency_fee,
                "total_price": quote.total_price,
            }),
            severity: ViolationSeverity::Critical,
        })
    }

    /// Invariant 2: `after = before - used` for deductions and expiries,
    /// `after = before + used` for additions
    pub fn check_ledger_arithmetic(ledger: &[CreditTransaction]) -> Vec<InvariantViolation> {
        ledger
            .iter()
            .filter_map(|tx| {
                let before = i64::from(tx.credits_before);
                let used = i64::from(tx.credits_used);
                let expected = match tx.transaction_type {
                    TransactionType::Added => before + used,
                    TransactionType::Deducted | TransactionType::Expired => before - used,
                };
                (expected != i64::from(tx.credits_after)).then(|| InvariantViolation {
                    invariant: "ledger_entry_arithmetic".to_string(),
                    description: format!(
                        "Credit transaction {} records {} -> {} for {} credits ({:?})",
                        tx.id, tx.credits_before, tx.credits_after, tx.credits_used, tx.transaction_type
                    ),
                    context: serde_json::json!({
                        "transaction_id": tx.id,
                        "expected_after": expected,
                    }),
                    severity: ViolationSeverity::High,
                })
            })
            .collect()
    }

    /// Invariant 3: newest-first entries chain (`older.after == newer.before`)
    ///
    /// Informational only: pages may straddle concurrent writes.
    pub fn check_ledger_continuity(ledger: &[CreditTransaction]) -> Vec<InvariantViolation> {
        ledger
            .windows(2)
            .filter_map(|pair| {
                let (newer, older) = (&pair[0], &pair[1]);
                (newer.created_at >= older.created_at && older.credits_after != newer.credits_before)
                    .then(|| InvariantViolation {
                        invariant: "ledger_continuity".to_string(),
                        description: format!(
                            "Transaction {} starts at {} credits but previous {} ended at {}",
                            newer.id, newer.credits_before, older.id, older.credits_after
                        ),
                        context: serde_json::json!({
                            "newer": newer.id,
                            "older": older.id,
                        }),
                        severity: ViolationSeverity::Low,
                    })
            })
            .collect()
    }

    /// Invariant 4: a credit action is offered only when credits remain
    pub fn check_gating(snapshot: CreditSnapshot, affordance: Affordance) -> Option<InvariantViolation> {
        if !(affordance.is_credit_action() && snapshot.match_credits == 0) {
            return None;
        }

        Some(InvariantViolation {
            invariant: "credit_gating".to_string(),
            description: "Credit action offered with zero credits".to_string(),
            context: serde_json::json!({
                "match_credits": snapshot.match_credits,
                "subscription_active": snapshot.is_subscribed(),
            }),
            severity: ViolationSeverity::Critical,
        })
    }
}

#[cfg(test)]
mod tests {
    use optiverifi_shared::{CreditReason, SubscriptionState};
    use time::macros::datetime;

    use super::*;

    fn tx(id: &str, kind: TransactionType, used: u32, before: u32, after: u32, at: OffsetDateTime) -> CreditTransaction {
        CreditTransaction {
            id: id.to_string(),
            request_id: None,
            request_name: None,
            request_category: None,
            match_report_id: None,
            credits_used: used,
            credits_before: before,
            credits_after: after,
            transaction_type: kind,
            reason: CreditReason::UnlockRequest,
            notes: None,
            created_at: at,
        }
    }

    #[test]
    fn test_consistent_ledger_is_healthy() {
        let ledger = vec![
            tx("t2", TransactionType::Deducted, 1, 5, 4, datetime!(2026-10-02 0:00 UTC)),
            tx("t1", TransactionType::Added, 5, 0, 5, datetime!(2026-10-01 0:00 UTC)),
        ];
        let summary = InvariantChecker::run(CheckInputs {
            ledger: Some(&ledger),
            ..Default::default()
        });
        assert!(summary.healthy, "{:?}", summary.violations);
        assert_eq!(summary.checks_run, 2);
    }

    #[test]
    fn test_bad_arithmetic_is_flagged() {
        let ledger = vec![tx("t1", TransactionType::Expired, 2, 3, 3, datetime!(2026-10-01 0:00 UTC))];
        let violations = InvariantChecker::check_ledger_arithmetic(&ledger);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].severity, ViolationSeverity::High);
    }

    #[test]
    fn test_gap_in_chain_is_low_severity() {
        let ledger = vec![
            tx("t2", TransactionType::Deducted, 1, 7, 6, datetime!(2026-10-02 0:00 UTC)),
            tx("t1", TransactionType::Added, 5, 0, 5, datetime!(2026-10-01 0:00 UTC)),
        ];
        let violations = InvariantChecker::check_ledger_continuity(&ledger);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].severity, ViolationSeverity::Low);
    }

    #[test]
    fn test_gating_violation() {
        let snapshot = CreditSnapshot {
            match_credits: 0,
            subscription: SubscriptionState::Active,
        };
        assert!(InvariantChecker::check_gating(snapshot, Affordance::UseCredit).is_some());
        assert!(InvariantChecker::check_gating(snapshot, Affordance::BuyExtraCredit { price: 10 }).is_none());
    }

    #[test]
    fn test_bad_quote_is_critical() {
        let quote = PriceQuote {
            base_price: 1500,
            urgency_fee: 500,
            total_price: 1500,
        };
        let summary = InvariantChecker::run(CheckInputs {
            quote: Some(&quote),
            ..Default::default()
        });
        assert!(!summary.healthy);
        assert_eq!(summary.checks_failed, 1);
        assert_eq!(summary.violations[0].severity, ViolationSeverity::Critical);
    }
}
