//! Managed-service stage display
//!
//! Stages are advanced by the backend only. This module maps the stage name
//! onto the progress bar and derives what the customer may do next.

use optiverifi_shared::ManagedService;
use serde::Serialize;

use crate::error::{BillingError, BillingResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagedStage {
    PaymentPending,
    Review,
    RfqPrep,
    SupplierOutreach,
    CollectingQuotes,
    Negotiating,
    ReportReady,
    FinalReport,
    Completed,
    Unrecognized(String),
}

impl ManagedStage {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "payment_pending" => ManagedStage::PaymentPending,
            "review" => ManagedStage::Review,
            "rfq_prep" => ManagedStage::RfqPrep,
            "supplier_outreach" => ManagedStage::SupplierOutreach,
            "collecting_quotes" => ManagedStage::CollectingQuotes,
            "negotiating" => ManagedStage::Negotiating,
            "report_ready" => ManagedStage::ReportReady,
            "final_report" => ManagedStage::FinalReport,
            "completed" => ManagedStage::Completed,
            other => ManagedStage::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ManagedStage::PaymentPending => "payment_pending",
            ManagedStage::Review => "review",
            ManagedStage::RfqPrep => "rfq_prep",
            ManagedStage::SupplierOutreach => "supplier_outreach",
            ManagedStage::CollectingQuotes => "collecting_quotes",
            ManagedStage::Negotiating => "negotiating",
            ManagedStage::ReportReady => "report_ready",
            ManagedStage::FinalReport => "final_report",
            ManagedStage::Completed => "completed",
            ManagedStage::Unrecognized(raw) => raw,
        }
    }

    /// Human label, falling back to the raw name
    pub fn label(&self) -> &str {
        PROGRESS_STEPS
            .iter()
            .find(|s| s.id == self.as_str())
            .map(|s| s.label)
            .unwrap_or_else(|| match self {
                ManagedStage::PaymentPending => "Payment Pending",
                ManagedStage::FinalReport | ManagedStage::Completed => "Completed",
                _ => self.as_str(),
            })
    }

    /// Customer edits are accepted until sourcing work starts
    pub fn is_editable(&self) -> bool {
        matches!(self, ManagedStage::PaymentPending | ManagedStage::Review)
    }

    pub fn has_report(&self) -> bool {
        matches!(self, ManagedStage::ReportReady | ManagedStage::FinalReport)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageStep {
    pub id: &'static str,
    pub label: &'static str,
}

/// Progress bar steps in display order
pub const PROGRESS_STEPS: [StageStep; 6] = [
    StageStep { id: "review", label: "Project Review" },
    StageStep { id: "rfq_prep", label: "RFQ Preparation" },
    StageStep { id: "supplier_outreach", label: "Supplier Outreach" },
    StageStep { id: "collecting_quotes", label: "Collecting Quotes" },
    StageStep { id: "negotiating", label: "Negotiating Terms" },
    StageStep { id: "report_ready", label: "Final Report" },
];

/// Where a stage sits relative to the progress bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPosition {
    /// Not started (awaiting payment, or a stage this build does not know)
    BeforeStart,
    At(usize),
    /// Every step is done
    PastEnd,
}

impl StepPosition {
    /// Numeric index: -1 before the bar, `len` past the end
    pub fn index(&self) -> i32 {
        match self {
            StepPosition::BeforeStart => -1,
            StepPosition::At(i) => *i as i32,
            StepPosition::PastEnd => PROGRESS_STEPS.len() as i32,
        }
    }
}

pub fn step_position(stage: &ManagedStage) -> StepPosition {
    match stage {
        ManagedStage::FinalReport | ManagedStage::Completed => StepPosition::PastEnd,
        ManagedStage::PaymentPending => StepPosition::BeforeStart,
        other => PROGRESS_STEPS
            .iter()
            .position(|s| s.id == other.as_str())
            .map(StepPosition::At)
            .unwrap_or(StepPosition::BeforeStart),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Done,
    Current,
    Upcoming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepView {
    pub id: &'static str,
    pub label: &'static str,
    pub status: StepStatus,
}

/// Status of every progress step for the given stage
pub fn progress(stage: &ManagedStage) -> Vec<StepView> {
    let current = step_position(stage).index();
    PROGRESS_STEPS
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let i = i as i32;
            let status = if i < current {
                StepStatus::Done
            } else if i == current {
                StepStatus::Current
            } else {
                StepStatus::Upcoming
            };
            StepView {
                id: step.id,
                label: step.label,
                status,
            }
        })
        .collect()
}

/// Savings fee owed before the full report is released
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsFeeDue {
    pub savings_amount: f64,
    pub fee_amount: Option<f64>,
    pub percentage: f64,
}

/// `Some` when the report is ready, savings were found and the fee is unpaid
pub fn savings_fee_due(service: &ManagedService, default_percentage: f64) -> Option<SavingsFeeDue> {
    let stage = ManagedStage::parse(&service.stage);
    let savings = service.savings_amount.unwrap_or(0.0);
    let paid = service.savings_fee_status.as_deref() == Some("paid");

    if !stage.has_report() || savings <= 0.0 || paid {
        return None;
    }

    Some(SavingsFeeDue {
        savings_amount: savings,
        fee_amount: service.savings_fee_amount,
        percentage: service
            .savings_fee_percentage
            .unwrap_or(default_percentage),
    })
}

/// Service fee owed before a managed request enters review
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceFeeDue {
    /// Fee set by the backend at initiation, in dollars
    pub amount: f64,
    /// Same fee in cents, as the checkout call expects it
    pub amount_cents: u64,
}

/// Service fee to charge, refused unless the request awaits payment and the
/// backend has set a fee. The local preview quote is never used here.
pub fn service_fee_due(service: &ManagedService) -> BillingResult<ServiceFeeDue> {
    let stage = ManagedStage::parse(&service.stage);
    let paid = service.service_fee_status.as_deref() == Some("paid");
    if stage != ManagedStage::PaymentPending || paid {
        return Err(BillingError::ServiceFeeNotDue(stage.label().to_string()));
    }

    let amount = service
        .service_fee_amount
        .filter(|a| a.is_finite() && *a > 0.0)
        .ok_or(BillingError::ServiceFeeMissing)?;

    Ok(ServiceFeeDue {
        amount,
        amount_cents: (amount * 100.0).round() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(stage: &str, fee: Option<f64>, fee_status: Option<&str>) -> ManagedService {
        let mut json = serde_json::json!({
            "_id": "m1", "category": "Valves", "status": "active", "stage": stage,
            "createdAt": "2026-10-01T00:00:00Z", "updatedAt": "2026-10-01T00:00:00Z"
        });
        if let Some(fee) = fee {
            json["serviceFeeAmount"] = fee.into();
        }
        if let Some(status) = fee_status {
            json["serviceFeeStatus"] = status.into();
        }
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_service_fee_due_while_payment_pending() {
        let due = service_fee_due(&service("payment_pending", Some(2000.5), None)).unwrap();
        assert_eq!(due.amount, 2000.5);
        assert_eq!(due.amount_cents, 200_050);
    }

    #[test]
    fn test_service_fee_refused_outside_payment_pending() {
        let err = service_fee_due(&service("review", Some(2000.0), None)).unwrap_err();
        assert!(matches!(err, BillingError::ServiceFeeNotDue(ref s) if s == "Project Review"));
        assert!(service_fee_due(&service("payment_pending", Some(2000.0), Some("paid"))).is_err());
    }

    #[test]
    fn test_service_fee_missing_amount() {
        assert!(matches!(
            service_fee_due(&service("payment_pending", None, None)),
            Err(BillingError::ServiceFeeMissing)
        ));
        assert!(matches!(
            service_fee_due(&service("payment_pending", Some(0.0), None)),
            Err(BillingError::ServiceFeeMissing)
        ));
    }

    #[test]
    fn test_payment_pending_precedes_everything() {
        assert_eq!(step_position(&ManagedStage::PaymentPending).index(), -1);
        assert_eq!(step_position(&ManagedStage::Review).index(), 0);
    }

    #[test]
    fn test_index_non_decreasing_through_pipeline() {
        let order = [
            "payment_pending",
            "review",
            "rfq_prep",
            "supplier_outreach",
            "collecting_quotes",
            "negotiating",
            "report_ready",
            "final_report",
        ];
        let indices: Vec<i32> = order
            .iter()
            .map(|s| step_position(&ManagedStage::parse(s)).index())
            .collect();
        assert!(indices.windows(2).all(|w| w[0] <= w[1]), "{:?}", indices);
        assert_eq!(indices.last(), Some(&6));
    }

    #[test]
    fn test_completed_is_past_end() {
        assert_eq!(step_position(&ManagedStage::Completed), StepPosition::PastEnd);
        assert!(progress(&ManagedStage::Completed)
            .iter()
            .all(|s| s.status == StepStatus::Done));
    }

    #[test]
    fn test_unknown_stage_falls_back_before_start() {
        let stage = ManagedStage::parse("on_hold");
        assert_eq!(stage, ManagedStage::Unrecognized("on_hold".into()));
        assert_eq!(step_position(&stage).index(), -1);
        assert_eq!(stage.label(), "on_hold");
    }

    #[test]
    fn test_progress_marks_current_step() {
        let steps = progress(&ManagedStage::SupplierOutreach);
        assert_eq!(steps[1].status, StepStatus::Done);
        assert_eq!(steps[2].status, StepStatus::Current);
        assert_eq!(steps[3].status, StepStatus::Upcoming);
    }

    #[test]
    fn test_editable_stages() {
        assert!(ManagedStage::PaymentPending.is_editable());
        assert!(ManagedStage::Review.is_editable());
        assert!(!ManagedStage::RfqPrep.is_editable());
        assert!(!ManagedStage::Unrecognized("review ".into()).is_editable());
    }
}
