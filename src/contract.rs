//! Smart-contract rules evaluated before every state change.
//!
//! Every rule is a pure predicate over a [`Shipment`]: no rule mutates state,
//! and a denial is a plain `false` for the calling service to report.
use super::event::Event;
use super::shipment::{Shipment, Status, TimeStamp};
use chrono::Utc;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearanceDecision {
    Approve,
    Reject,
}

impl ClearanceDecision {
    /// Status a shipment takes once the decision is recorded.
    pub fn resulting_status(&self) -> Status {
        match self {
            ClearanceDecision::Approve => Status::Other("CLEARED".into()),
            ClearanceDecision::Reject => Status::Other("HELD_BY_CUSTOMS".into()),
        }
    }
}

impl FromStr for ClearanceDecision {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "APPROVE" => Ok(ClearanceDecision::Approve),
            "REJECT" => Ok(ClearanceDecision::Reject),
            other => Err(anyhow::anyhow!("unknown clearance decision: {other}")),
        }
    }
}

impl fmt::Display for ClearanceDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClearanceDecision::Approve => f.write_str("APPROVE"),
            ClearanceDecision::Reject => f.write_str("REJECT"),
        }
    }
}

/// DELIVERED is absorbing: only DELIVERED -> DELIVERED is allowed from it.
pub fn can_update_status(shipment: &Shipment, new_status: &Status) -> bool {
    !(shipment.status.is_terminal() && !new_status.is_terminal())
}

pub fn can_trigger_payment(shipment: &Shipment) -> bool {
    shipment.status == Status::Delivered
}

pub fn can_raise_dispute(shipment: &Shipment) -> bool {
    shipment.status != Status::Delivered
}

/// Decision must be APPROVE or REJECT. Nothing is allowed after delivery,
/// REJECT is always allowed before it, APPROVE only from a customs-relevant status.
pub fn validate_customs_clearance(shipment: &Shipment, decision: &str) -> bool {
    let Ok(decision) = decision.parse::<ClearanceDecision>() else {
        return false;
    };

    match (&shipment.status, decision) {
        (Status::Delivered, _) => false,
        (_, ClearanceDecision::Reject) => true,
        (
            Status::Created | Status::InTransit | Status::AtBorder | Status::AtWarehouse,
            ClearanceDecision::Approve,
        ) => true,
        (_, ClearanceDecision::Approve) => false,
    }
}

pub fn trigger_insurance_claim(shipment: &Shipment) -> bool {
    trigger_insurance_claim_at(shipment, &TimeStamp::new())
}

/// Claim fires on damage, on late delivery, or when the deadline `now` has
/// passed without a delivery. Checked in that order.
pub fn trigger_insurance_claim_at(shipment: &Shipment, now: &TimeStamp<Utc>) -> bool {
    if shipment.status == Status::Damaged {
        return true;
    }

    match (&shipment.expected_delivery, &shipment.actual_delivery) {
        (Some(expected), Some(actual)) => actual > expected,
        (Some(expected), None) => now > expected,
        _ => false,
    }
}

pub fn verify_ledger_integrity(shipment: &Shipment) -> bool {
    verify_event_sequence(&shipment.events)
}

/// Timestamps must strictly increase, no duplicates and no going backwards.
pub fn verify_event_sequence(events: &[Event]) -> bool {
    events
        .windows(2)
        .all(|pair| pair[1].timestamp > pair[0].timestamp)
}
