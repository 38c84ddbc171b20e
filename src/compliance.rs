//! Read-side reporting plus the compliance actions that annotate a shipment
use super::access::{Actor, Capability};
use super::contract::{self, ClearanceDecision};
use super::documents::DocumentStore;
use super::error::ShipmentError;
use super::event::{Event, EventKind};
use super::ledger::LedgerStore;
use super::locks::ShipmentLocks;
use super::report::Report;
use super::shipment::{Shipment, Status, TimeStamp};
use chrono::Utc;
use std::fmt;
use std::fmt::Write;
use std::sync::Arc;

/// A compliance action either lands on the ledger or is turned down by the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Recorded(Event),
    Rejected(String),
}

impl Outcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, Outcome::Recorded(_))
    }
    pub fn message(&self) -> String {
        match self {
            Outcome::Recorded(event) => event.description.clone(),
            Outcome::Rejected(reason) => reason.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentCheck {
    Valid,
    Failed,
    NotFound,
}

impl fmt::Display for DocumentCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentCheck::Valid => f.write_str("VALID"),
            DocumentCheck::Failed => f.write_str("FAILED"),
            DocumentCheck::NotFound => f.write_str("NOT FOUND"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// A broken ledger outranks missing paperwork.
    pub fn classify(integrity_ok: bool, has_documents: bool) -> Self {
        match (integrity_ok, has_documents) {
            (false, _) => RiskLevel::High,
            (true, false) => RiskLevel::Medium,
            (true, true) => RiskLevel::Low,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => f.write_str("LOW RISK"),
            RiskLevel::Medium => f.write_str("MEDIUM RISK"),
            RiskLevel::High => f.write_str("HIGH RISK"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryFilter {
    status: Option<Status>,
    origin: Option<String>,
    destination: Option<String>,
}

impl SummaryFilter {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }
    pub fn set_origin(mut self, origin: &str) -> Self {
        self.origin = Some(origin.to_string());
        self
    }
    pub fn set_destination(mut self, destination: &str) -> Self {
        self.destination = Some(destination.to_string());
        self
    }
    /// Places compare case-insensitively.
    pub fn matches(&self, shipment: &Shipment) -> bool {
        let place = |wanted: &Option<String>, actual: &str| {
            wanted
                .as_ref()
                .is_none_or(|wanted| wanted.eq_ignore_ascii_case(actual))
        };

        self.status.as_ref().is_none_or(|s| *s == shipment.status)
            && place(&self.origin, &shipment.origin)
            && place(&self.destination, &shipment.destination)
    }
}

pub struct ComplianceService {
    ledger: Arc<dyn LedgerStore>,
    documents: Arc<dyn DocumentStore>,
    locks: Arc<ShipmentLocks>,
}

impl ComplianceService {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        documents: Arc<dyn DocumentStore>,
        locks: Arc<ShipmentLocks>,
    ) -> Self {
        Self {
            ledger,
            documents,
            locks,
        }
    }

    fn load_shipment(&self, shipment_id: &str) -> anyhow::Result<Shipment> {
        let shipment = self
            .ledger
            .get(shipment_id)?
            .ok_or_else(|| ShipmentError::NotFound(format!("shipment {shipment_id}")))?;
        Ok(shipment)
    }

    /// Human-readable projection of a shipment; never errors on an unknown id
    pub fn query_status(&self, actor: &Actor, shipment_id: &str) -> anyhow::Result<String> {
        actor.authorize(Capability::QueryShipment)?;

        let Some(shipment) = self.ledger.get(shipment_id)? else {
            tracing::debug!(%shipment_id, "query for unknown shipment");
            return Ok(format!("Shipment not found: {shipment_id}"));
        };
        let events = self.ledger.events_for(shipment_id)?;

        let optional = |stamp: &Option<TimeStamp<Utc>>| match stamp {
            Some(stamp) => stamp.to_string(),
            None => "-".to_string(),
        };

        let mut out = String::new();
        writeln!(out, "Shipment ID: {}", shipment.id)?;
        writeln!(out, "Origin: {}", shipment.origin)?;
        writeln!(out, "Destination: {}", shipment.destination)?;
        writeln!(out, "Description: {}", shipment.description)?;
        writeln!(out, "Current Status: {}", shipment.status)?;
        writeln!(out, "Created: {}", shipment.created_at)?;
        writeln!(out, "Expected Delivery: {}", optional(&shipment.expected_delivery))?;
        writeln!(out, "Actual Delivery: {}", optional(&shipment.actual_delivery))?;
        writeln!(out, "Documents: {}", shipment.documents.len())?;
        writeln!(out)?;
        writeln!(out, "Events:")?;
        for event in &events {
            writeln!(out, "- {}", event.audit_line())?;
        }

        Ok(out)
    }

    /// Chronological `timestamp | status | description` lines from the ledger
    pub fn generate_audit_trail(&self, actor: &Actor, shipment_id: &str) -> anyhow::Result<Report> {
        actor.authorize(Capability::Audit)?;

        let shipment = self.load_shipment(shipment_id)?;
        let events = self.ledger.events_for(&shipment.id)?;

        let body = if events.is_empty() {
            format!("No events recorded for shipment {shipment_id}.")
        } else {
            events
                .iter()
                .map(Event::audit_line)
                .collect::<Vec<_>>()
                .join("\n")
        };

        Ok(Report::new(format!("Audit Trail: {shipment_id}"), body))
    }

    pub fn log_dispute(
        &self,
        actor: &Actor,
        shipment_id: &str,
        description: &str,
    ) -> anyhow::Result<Outcome> {
        actor.authorize(Capability::RaiseDispute)?;

        let lock = self.locks.handle(shipment_id);
        let _guard = lock.lock();

        let shipment = self.load_shipment(shipment_id)?;
        if !contract::can_raise_dispute(&shipment) {
            tracing::warn!(%shipment_id, "dispute rejected after delivery");
            return Ok(Outcome::Rejected(format!(
                "Dispute rejected: shipment {shipment_id} is already {}",
                shipment.status
            )));
        }

        self.annotate(
            shipment,
            actor,
            None,
            format!("Dispute logged by {}: {description}", actor.name),
            EventKind::DisputeRaised,
        )
    }

    /// Record a customs APPROVE / REJECT decision
    pub fn approve_clearance(
        &self,
        actor: &Actor,
        shipment_id: &str,
        decision: &str,
    ) -> anyhow::Result<Outcome> {
        actor.authorize(Capability::CustomsClearance)?;

        let lock = self.locks.handle(shipment_id);
        let _guard = lock.lock();

        let shipment = self.load_shipment(shipment_id)?;
        let allowed = contract::validate_customs_clearance(&shipment, decision);

        let decision = match decision.parse::<ClearanceDecision>() {
            Ok(parsed) if allowed => parsed,
            _ => {
                tracing::warn!(%shipment_id, %decision, status = %shipment.status, "clearance rejected");
                return Ok(Outcome::Rejected(format!(
                    "Clearance {} rejected for shipment {shipment_id} in status {}",
                    decision.trim().to_uppercase(),
                    shipment.status
                )));
            }
        };

        self.annotate(
            shipment,
            actor,
            Some(decision.resulting_status()),
            format!("Customs clearance {decision} by {}", actor.name),
            EventKind::ClearanceDecided {
                approved: decision == ClearanceDecision::Approve,
            },
        )
    }

    /// Recompute the digest of the named document and compare with the one captured at upload
    pub fn verify_document(
        &self,
        actor: &Actor,
        shipment_id: &str,
        document_name: &str,
    ) -> anyhow::Result<DocumentCheck> {
        actor.authorize(Capability::Audit)?;

        let shipment = self.load_shipment(shipment_id)?;
        let Some(document) = shipment.document_named(document_name) else {
            return Ok(DocumentCheck::NotFound);
        };

        let check = match self.documents.fetch(&document.document_id)? {
            Some(content) if document.matches(&content) => DocumentCheck::Valid,
            // missing content counts as tampering
            _ => DocumentCheck::Failed,
        };

        if check == DocumentCheck::Failed {
            tracing::warn!(%shipment_id, document_id = %document.document_id, "document failed verification");
        }

        Ok(check)
    }

    /// File an insurance claim when damage, late delivery or a missed deadline is on record
    pub fn evaluate_insurance_claim(
        &self,
        actor: &Actor,
        shipment_id: &str,
    ) -> anyhow::Result<Outcome> {
        actor.authorize(Capability::FileInsuranceClaim)?;

        let lock = self.locks.handle(shipment_id);
        let _guard = lock.lock();

        let shipment = self.load_shipment(shipment_id)?;

        if shipment
            .events
            .iter()
            .any(|event| event.kind == EventKind::InsuranceClaimed)
        {
            return Ok(Outcome::Rejected(format!(
                "Insurance claim already filed for shipment {shipment_id}"
            )));
        }
        if !contract::trigger_insurance_claim(&shipment) {
            return Ok(Outcome::Rejected(format!(
                "No insurance claim conditions met for shipment {shipment_id}"
            )));
        }

        self.annotate(
            shipment,
            actor,
            None,
            format!("Insurance claim filed by {}", actor.name),
            EventKind::InsuranceClaimed,
        )
    }

    /// HIGH when the ledger history is broken, MEDIUM when no documents are attached
    pub fn assess_fraud_risk(&self, actor: &Actor, shipment_id: &str) -> anyhow::Result<RiskLevel> {
        actor.authorize(Capability::Audit)?;

        let shipment = self.load_shipment(shipment_id)?;
        let risk = self.risk_of(&shipment)?;
        tracing::debug!(%shipment_id, %risk, "fraud risk assessed");

        Ok(risk)
    }

    pub fn generate_compliance_summary(
        &self,
        actor: &Actor,
        filter: &SummaryFilter,
    ) -> anyhow::Result<Report> {
        actor.authorize(Capability::Audit)?;

        let shipments: Vec<Shipment> = self
            .ledger
            .all_shipments()?
            .into_values()
            .filter(|shipment| filter.matches(shipment))
            .collect();

        let title = "Compliance Summary";
        if shipments.is_empty() {
            return Ok(Report::new(title, "No shipments match the filter."));
        }

        let disputes: usize = shipments
            .iter()
            .flat_map(|shipment| &shipment.events)
            .filter(|event| event.kind == EventKind::DisputeRaised)
            .count();

        let mut rows = Vec::with_capacity(shipments.len());
        for shipment in &shipments {
            rows.push((shipment, self.risk_of(shipment)?));
        }
        let integrity_failures = rows
            .iter()
            .filter(|(_, risk)| *risk == RiskLevel::High)
            .count();

        let mut body = String::new();
        writeln!(body, "Shipments: {}", shipments.len())?;
        writeln!(body, "Delivered: {}", count(&shipments, Shipment::is_delivered))?;
        writeln!(body, "Damaged: {}", count(&shipments, |s| s.status == Status::Damaged))?;
        writeln!(body, "Disputes: {disputes}")?;
        writeln!(body, "Insurance claims due: {}", count(&shipments, contract::trigger_insurance_claim))?;
        writeln!(body, "Integrity failures: {integrity_failures}")?;
        writeln!(body)?;
        for (shipment, risk) in rows {
            writeln!(
                body,
                "{} | {} | {} -> {} | {}",
                shipment.id, shipment.status, shipment.origin, shipment.destination, risk
            )?;
        }

        Ok(Report::new(title, body))
    }

    /// Flag a customs issue on the ledger without touching the status
    pub fn raise_customs_alert(
        &self,
        actor: &Actor,
        shipment_id: &str,
        issue: &str,
    ) -> anyhow::Result<Outcome> {
        actor.authorize(Capability::CustomsClearance)?;

        if issue.trim().is_empty() {
            return Err(ShipmentError::InvalidInput("customs alert has no issue".into()).into());
        }

        let lock = self.locks.handle(shipment_id);
        let _guard = lock.lock();

        let shipment = self.load_shipment(shipment_id)?;
        tracing::warn!(%shipment_id, actor = %actor.id, %issue, "customs alert raised");

        self.annotate(
            shipment,
            actor,
            None,
            format!("Customs alert by {}: {issue}", actor.name),
            EventKind::CustomsAlert,
        )
    }

    // ledger and embedded history both intact, and the stored status matches the last event
    fn integrity_ok(&self, shipment: &Shipment) -> anyhow::Result<bool> {
        let events = self.ledger.events_for(&shipment.id)?;

        let in_step = match events.last() {
            Some(last) => last.status == shipment.status,
            None => shipment.events.is_empty(),
        };

        Ok(in_step
            && contract::verify_event_sequence(&events)
            && contract::verify_ledger_integrity(shipment))
    }

    fn risk_of(&self, shipment: &Shipment) -> anyhow::Result<RiskLevel> {
        Ok(RiskLevel::classify(
            self.integrity_ok(shipment)?,
            !shipment.documents.is_empty(),
        ))
    }

    // append a non-transition event, optionally moving the status with it
    fn annotate(
        &self,
        mut shipment: Shipment,
        actor: &Actor,
        status: Option<Status>,
        description: String,
        kind: EventKind,
    ) -> anyhow::Result<Outcome> {
        let status = status.unwrap_or_else(|| shipment.status.clone());
        let event = Event::next(&shipment, &actor.id, status, description, kind)?;
        shipment.record(event.clone());

        self.ledger.commit(&shipment, &event)?;
        tracing::info!(shipment_id = %shipment.id, actor = %actor.id, status = %shipment.status, "{}", event.description);

        Ok(Outcome::Recorded(event))
    }
}

fn count(shipments: &[Shipment], predicate: impl Fn(&Shipment) -> bool) -> usize {
    shipments.iter().filter(|shipment| predicate(shipment)).count()
}
