use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One mutex per shipment id. Writers hold it across load, decide and commit
/// so updates to the same shipment are serialized; other ids are unaffected.
/// Entries nobody holds a handle to are dropped on the next `handle` call.
#[derive(Debug, Default)]
pub struct ShipmentLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ShipmentLocks {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn handle(&self, shipment_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        // a count of one means only the map still refers to it
        locks.retain(|id, lock| id == shipment_id || Arc::strong_count(lock) > 1);
        locks.entry(shipment_id.to_string()).or_default().clone()
    }
    /// Ids currently tracked, held or not yet pruned.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}
