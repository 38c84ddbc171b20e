//! Ledger persistence for shipments and their event histories
use super::event::Event;
use super::shipment::Shipment;
use anyhow::Context;
use parking_lot::RwLock;
use sled::Transactional;
use sled::transaction::TransactionError;
use std::collections::{BTreeMap, HashMap};

/// Storage contract the services write through. Events are append-only and
/// come back in insertion order; shipments may be overwritten whole.
pub trait LedgerStore: Send + Sync {
    fn put(&self, shipment: &Shipment) -> anyhow::Result<()>;
    fn get(&self, shipment_id: &str) -> anyhow::Result<Option<Shipment>>;
    fn append_event(&self, event: &Event) -> anyhow::Result<()>;
    fn events_for(&self, shipment_id: &str) -> anyhow::Result<Vec<Event>>;
    fn all_shipments(&self) -> anyhow::Result<BTreeMap<String, Shipment>>;

    /// Record `event` and the shipment state it produced.
    fn commit(&self, shipment: &Shipment, event: &Event) -> anyhow::Result<()> {
        self.append_event(event)?;
        self.put(shipment)
    }
}

pub struct SledLedger {
    instance: sled::Db,
    shipments: sled::Tree,
    events: sled::Tree,
}

impl SledLedger {
    pub fn new(instance: sled::Db) -> anyhow::Result<Self> {
        let shipments = instance.open_tree("shipments")?;
        let events = instance.open_tree("events")?;
        Ok(Self {
            instance,
            shipments,
            events,
        })
    }

    fn event_prefix(shipment_id: &str) -> Vec<u8> {
        let mut prefix = shipment_id.as_bytes().to_vec();
        prefix.push(b'/');
        prefix
    }

    // sled ids are monotonic, so keys sort in append order under the prefix
    fn event_key(&self, shipment_id: &str) -> anyhow::Result<Vec<u8>> {
        let mut key = Self::event_prefix(shipment_id);
        key.extend_from_slice(&self.instance.generate_id()?.to_be_bytes());
        Ok(key)
    }
}

impl LedgerStore for SledLedger {
    fn put(&self, shipment: &Shipment) -> anyhow::Result<()> {
        self.shipments
            .insert(shipment.id.as_bytes(), minicbor::to_vec(shipment)?)?;
        Ok(())
    }

    fn get(&self, shipment_id: &str) -> anyhow::Result<Option<Shipment>> {
        match self.shipments.get(shipment_id.as_bytes())? {
            Some(bytes) => {
                let shipment = minicbor::decode(&bytes)
                    .with_context(|| format!("failed to decode shipment {shipment_id}"))?;
                Ok(Some(shipment))
            }
            None => Ok(None),
        }
    }

    fn append_event(&self, event: &Event) -> anyhow::Result<()> {
        let (hash, cbor) = event.build()?;
        self.events.insert(self.event_key(&event.shipment_id)?, cbor)?;
        tracing::debug!(shipment_id = %event.shipment_id, event_hash = %hash, "event appended");
        Ok(())
    }

    fn events_for(&self, shipment_id: &str) -> anyhow::Result<Vec<Event>> {
        self.events
            .scan_prefix(Self::event_prefix(shipment_id))
            .values()
            .map(|value| {
                let bytes = value?;
                minicbor::decode(&bytes).context("failed to decode event")
            })
            .collect()
    }

    fn all_shipments(&self) -> anyhow::Result<BTreeMap<String, Shipment>> {
        self.shipments
            .iter()
            .values()
            .map(|value| {
                let bytes = value?;
                let shipment: Shipment =
                    minicbor::decode(&bytes).context("failed to decode shipment")?;
                Ok((shipment.id.clone(), shipment))
            })
            .collect()
    }

    fn commit(&self, shipment: &Shipment, event: &Event) -> anyhow::Result<()> {
        let (hash, event_cbor) = event.build()?;
        let shipment_cbor = minicbor::to_vec(shipment)?;
        let event_key = self.event_key(&event.shipment_id)?;

        (&self.shipments, &self.events)
            .transaction(|(shipments, events)| {
                events.insert(event_key.as_slice(), event_cbor.as_slice())?;
                shipments.insert(shipment.id.as_bytes(), shipment_cbor.as_slice())?;
                Ok(())
            })
            .map_err(|err: TransactionError| {
                anyhow::anyhow!("ledger commit failed for {}: {err}", shipment.id)
            })?;

        tracing::debug!(shipment_id = %shipment.id, event_hash = %hash, "ledger commit");
        Ok(())
    }
}

/// Process-local ledger, nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    shipments: RwLock<HashMap<String, Shipment>>,
    events: RwLock<HashMap<String, Vec<Event>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedger {
    fn put(&self, shipment: &Shipment) -> anyhow::Result<()> {
        self.shipments
            .write()
            .insert(shipment.id.clone(), shipment.clone());
        Ok(())
    }

    fn get(&self, shipment_id: &str) -> anyhow::Result<Option<Shipment>> {
        Ok(self.shipments.read().get(shipment_id).cloned())
    }

    fn append_event(&self, event: &Event) -> anyhow::Result<()> {
        self.events
            .write()
            .entry(event.shipment_id.clone())
            .or_default()
            .push(event.clone());
        Ok(())
    }

    fn events_for(&self, shipment_id: &str) -> anyhow::Result<Vec<Event>> {
        Ok(self
            .events
            .read()
            .get(shipment_id)
            .cloned()
            .unwrap_or_default())
    }

    fn all_shipments(&self) -> anyhow::Result<BTreeMap<String, Shipment>> {
        Ok(self
            .shipments
            .read()
            .iter()
            .map(|(id, shipment)| (id.clone(), shipment.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::shipment::Status;

    fn recorded(shipment: &mut Shipment, status: Status) -> Event {
        let event =
            Event::next(shipment, "user_1", status, "moved", EventKind::StatusChanged).unwrap();
        shipment.record(event.clone());
        event
    }

    #[test]
    fn sled_events_keep_insertion_order_per_shipment() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = SledLedger::new(sled::open(dir.path().join("ledger.db")).unwrap()).unwrap();

        let mut first = Shipment::new("ship_a".into(), "A", "B", "one");
        let mut second = Shipment::new("ship_ab".into(), "A", "B", "two");

        let e1 = recorded(&mut first, Status::InTransit);
        let e2 = recorded(&mut second, Status::AtBorder);
        let e3 = recorded(&mut first, Status::AtWarehouse);

        ledger.commit(&first, &e1).unwrap();
        ledger.commit(&second, &e2).unwrap();
        ledger.commit(&first, &e3).unwrap();

        assert_eq!(ledger.events_for("ship_a").unwrap(), vec![e1, e3]);
        assert_eq!(ledger.events_for("ship_ab").unwrap(), vec![e2]);
        assert_eq!(ledger.get("ship_a").unwrap(), Some(first));
        assert_eq!(ledger.all_shipments().unwrap().len(), 2);
        assert!(ledger.get("ship_missing").unwrap().is_none());
    }

    #[test]
    fn memory_ledger_does_not_deduplicate() {
        let ledger = MemoryLedger::new();
        let mut shipment = Shipment::new("ship_a".into(), "A", "B", "one");
        let event = recorded(&mut shipment, Status::InTransit);

        ledger.append_event(&event).unwrap();
        ledger.append_event(&event).unwrap();

        assert_eq!(ledger.events_for("ship_a").unwrap().len(), 2);
        assert!(ledger.events_for("ship_b").unwrap().is_empty());
    }
}
