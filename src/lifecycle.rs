//! Service layer API for shipment lifecycle operations
use super::access::{Actor, Capability};
use super::contract;
use super::documents::DocumentStore;
use super::error::ShipmentError;
use super::event::{Event, EventKind};
use super::ledger::LedgerStore;
use super::locks::ShipmentLocks;
use super::payment::{self, PaymentGateway, PaymentReceipt};
use super::shipment::{Document, Shipment, Status, TimeStamp};
use super::utils;
use chrono::Utc;
use std::sync::Arc;

/// Payout released for a shipment with no quoted amount, in cents.
pub const DEFAULT_PAYOUT_CENTS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    NotDue,
    Dispatched(PaymentReceipt),
    Failed(String),
}

/// Result of a committed status change.
#[derive(Debug, Clone)]
pub struct Transition {
    pub shipment: Shipment,
    pub event: Event,
    pub payment: PaymentStatus,
}

pub struct LifecycleService {
    ledger: Arc<dyn LedgerStore>,
    documents: Arc<dyn DocumentStore>,
    payments: Arc<dyn PaymentGateway>,
    locks: Arc<ShipmentLocks>,
    default_payout: u64,
}

impl LifecycleService {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        documents: Arc<dyn DocumentStore>,
        payments: Arc<dyn PaymentGateway>,
        locks: Arc<ShipmentLocks>,
    ) -> Self {
        Self {
            ledger,
            documents,
            payments,
            locks,
            default_payout: DEFAULT_PAYOUT_CENTS,
        }
    }

    pub fn with_default_payout(mut self, cents: u64) -> Self {
        self.default_payout = cents;
        self
    }

    fn load_shipment(&self, shipment_id: &str) -> anyhow::Result<Shipment> {
        let shipment = self
            .ledger
            .get(shipment_id)?
            .ok_or_else(|| ShipmentError::NotFound(format!("shipment {shipment_id}")))?;
        Ok(shipment)
    }

    /// Register a new shipment in CREATED state
    pub fn create_shipment(
        &self,
        actor: &Actor,
        origin: &str,
        destination: &str,
        description: &str,
    ) -> anyhow::Result<Shipment> {
        actor.authorize(Capability::CreateShipment)?;

        let mut shipment =
            Shipment::new(utils::new_shipment_id()?, origin, destination, description);

        let event = Event::next(
            &shipment,
            &actor.id,
            Status::Created,
            format!("Shipment created by {}", actor.name),
            EventKind::Created,
        )?;
        shipment.record(event.clone());

        self.ledger.commit(&shipment, &event)?;
        tracing::info!(shipment_id = %shipment.id, actor = %actor.id, %origin, %destination, "shipment created");

        Ok(shipment)
    }

    /// Move a shipment to `new_status` if the contract allows it
    pub fn update_status(
        &self,
        actor: &Actor,
        shipment_id: &str,
        new_status: Status,
        description: &str,
    ) -> anyhow::Result<Transition> {
        actor.authorize(Capability::UpdateStatus)?;

        self.transition(
            actor,
            shipment_id,
            new_status,
            description.to_string(),
            EventKind::StatusChanged,
            |_| {},
        )
    }

    /// Buyer-side delivery confirmation, stamps the actual delivery time
    pub fn confirm_delivery(&self, actor: &Actor, shipment_id: &str) -> anyhow::Result<Transition> {
        actor.authorize(Capability::ConfirmDelivery)?;

        self.transition(
            actor,
            shipment_id,
            Status::Delivered,
            format!("Delivery confirmed by {}", actor.name),
            EventKind::DeliveryConfirmed,
            |shipment| {
                shipment.actual_delivery.get_or_insert_with(TimeStamp::new);
            },
        )
    }

    /// Set the date the shipment is expected to arrive by
    pub fn schedule_delivery(
        &self,
        actor: &Actor,
        shipment_id: &str,
        expected: TimeStamp<Utc>,
    ) -> anyhow::Result<Shipment> {
        actor.authorize(Capability::UpdateStatus)?;

        let lock = self.locks.handle(shipment_id);
        let _guard = lock.lock();

        let mut shipment = self.load_shipment(shipment_id)?;
        if shipment.is_delivered() {
            return Err(ShipmentError::Rejected(format!(
                "shipment {shipment_id} is already delivered"
            ))
            .into());
        }

        let description = format!("Delivery expected by {expected}");
        shipment.expected_delivery = Some(expected);

        let event = Event::next(
            &shipment,
            &actor.id,
            shipment.status.clone(),
            description,
            EventKind::DeliveryScheduled,
        )?;
        shipment.record(event.clone());

        self.ledger.commit(&shipment, &event)?;
        tracing::info!(%shipment_id, actor = %actor.id, "delivery scheduled");

        Ok(shipment)
    }

    /// Fix the amount, in cents, released once the shipment is delivered
    pub fn quote_payout(
        &self,
        actor: &Actor,
        shipment_id: &str,
        amount: u64,
    ) -> anyhow::Result<Shipment> {
        actor.authorize(Capability::CreateShipment)?;

        if amount == 0 {
            return Err(ShipmentError::InvalidInput("payout amount must be positive".into()).into());
        }

        let lock = self.locks.handle(shipment_id);
        let _guard = lock.lock();

        let mut shipment = self.load_shipment(shipment_id)?;
        if shipment.is_delivered() {
            return Err(ShipmentError::Rejected(format!(
                "shipment {shipment_id} is already delivered"
            ))
            .into());
        }

        shipment.payout_amount = Some(amount);
        let event = Event::next(
            &shipment,
            &actor.id,
            shipment.status.clone(),
            format!("Payout of {} quoted by {}", payment::format_amount(amount), actor.name),
            EventKind::PayoutQuoted { amount },
        )?;
        shipment.record(event.clone());

        self.ledger.commit(&shipment, &event)?;
        tracing::info!(%shipment_id, actor = %actor.id, amount, "payout quoted");

        Ok(shipment)
    }

    /// Store document content off-chain and attach its digest to the shipment
    pub fn upload_document(
        &self,
        actor: &Actor,
        shipment_id: &str,
        name: &str,
        content: &[u8],
    ) -> anyhow::Result<Document> {
        actor.authorize(Capability::UploadDocument)?;

        if name.trim().is_empty() {
            return Err(ShipmentError::InvalidInput("document name is empty".into()).into());
        }

        let lock = self.locks.handle(shipment_id);
        let _guard = lock.lock();

        let mut shipment = self.load_shipment(shipment_id)?;

        let document = Document::new(
            utils::new_document_id()?,
            shipment.id.clone(),
            name.to_string(),
            content,
        );
        self.documents.store(&document.document_id, content)?;
        shipment.attach_document(document.clone());

        let event = Event::next(
            &shipment,
            &actor.id,
            shipment.status.clone(),
            format!("Document {name} added by {}", actor.name),
            EventKind::DocumentAdded {
                document_id: document.document_id.clone(),
                digest: document.digest.clone(),
            },
        )?;
        shipment.record(event.clone());

        self.ledger.commit(&shipment, &event)?;
        tracing::info!(%shipment_id, document_id = %document.document_id, digest = %document.digest, "document uploaded");

        Ok(document)
    }

    // load -> rule check -> commit -> payout, all under the shipment's lock
    fn transition(
        &self,
        actor: &Actor,
        shipment_id: &str,
        new_status: Status,
        description: String,
        kind: EventKind,
        prepare: impl FnOnce(&mut Shipment),
    ) -> anyhow::Result<Transition> {
        // a hand-built Other("delivered") must still count as DELIVERED
        let new_status = Status::parse(new_status.as_str());

        let lock = self.locks.handle(shipment_id);
        let _guard = lock.lock();

        let mut shipment = self.load_shipment(shipment_id)?;

        if !contract::can_update_status(&shipment, &new_status) {
            tracing::warn!(%shipment_id, current = %shipment.status, requested = %new_status, "status change rejected");
            return Err(ShipmentError::Rejected(format!(
                "shipment {shipment_id} cannot move from {} to {new_status}",
                shipment.status
            ))
            .into());
        }

        let was_delivered = shipment.is_delivered();
        prepare(&mut shipment);

        let event = Event::next(&shipment, &actor.id, new_status, description, kind)?;
        shipment.record(event.clone());

        self.ledger.commit(&shipment, &event)?;
        tracing::info!(%shipment_id, status = %shipment.status, actor = %actor.id, "status updated");

        let payment = if !was_delivered && contract::can_trigger_payment(&shipment) {
            self.release_payment(actor, &mut shipment)
        } else {
            PaymentStatus::NotDue
        };

        Ok(Transition {
            shipment,
            event,
            payment,
        })
    }

    // the delivery is already committed, so failures here are reported, not raised
    fn release_payment(&self, actor: &Actor, shipment: &mut Shipment) -> PaymentStatus {
        let amount = shipment.payout_amount.unwrap_or(self.default_payout);
        let receipt = match self.payments.process_payment(shipment, amount) {
            Ok(receipt) => receipt,
            Err(err) => {
                tracing::error!(shipment_id = %shipment.id, error = %err, "payment failed");
                return PaymentStatus::Failed(err.to_string());
            }
        };

        match self.file_receipt(actor, shipment, &receipt) {
            Ok(()) => PaymentStatus::Dispatched(receipt),
            Err(err) => {
                tracing::error!(shipment_id = %shipment.id, transaction_id = %receipt.transaction_id, error = %err, "receipt not filed");
                PaymentStatus::Failed(format!(
                    "payment {} released but its receipt was not filed: {err}",
                    receipt.transaction_id
                ))
            }
        }
    }

    fn file_receipt(
        &self,
        actor: &Actor,
        shipment: &mut Shipment,
        receipt: &PaymentReceipt,
    ) -> anyhow::Result<()> {
        let content = receipt.content();
        let document = Document::new(
            utils::new_document_id()?,
            shipment.id.clone(),
            receipt.document_name(),
            content.as_bytes(),
        );
        self.documents.store(&document.document_id, content.as_bytes())?;

        let mut updated = shipment.clone();
        updated.attach_document(document.clone());
        let event = Event::next(
            &updated,
            &actor.id,
            updated.status.clone(),
            format!(
                "Payment of {} released, receipt {}",
                payment::format_amount(receipt.amount),
                document.name
            ),
            EventKind::PaymentReleased {
                transaction_id: receipt.transaction_id.clone(),
                amount: receipt.amount,
                document_id: document.document_id.clone(),
            },
        )?;
        updated.record(event.clone());

        self.ledger.commit(&updated, &event)?;
        tracing::info!(shipment_id = %updated.id, document_id = %document.document_id, "receipt filed");

        *shipment = updated;
        Ok(())
    }
}
