//! Actors, roles and the capability table consulted before any rule check
use super::error::ShipmentError;
use super::utils;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Shipper,
    LogisticsProvider,
    Warehouse,
    Buyer,
    CustomsOfficer,
    Auditor,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    CreateShipment,
    UpdateStatus,
    UploadDocument,
    ConfirmDelivery,
    QueryShipment,
    RaiseDispute,
    CustomsClearance,
    Audit,
    FileInsuranceClaim,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self {
            Capability::CreateShipment => "create shipments",
            Capability::UpdateStatus => "update shipment status",
            Capability::UploadDocument => "upload documents",
            Capability::ConfirmDelivery => "confirm delivery",
            Capability::QueryShipment => "query shipments",
            Capability::RaiseDispute => "raise disputes",
            Capability::CustomsClearance => "decide customs clearance",
            Capability::Audit => "audit shipments",
            Capability::FileInsuranceClaim => "file insurance claims",
        };
        f.write_str(action)
    }
}

/// The (role, capability) table. Admin holds every capability.
pub fn permits(role: Role, capability: Capability) -> bool {
    use Capability::*;
    use Role::*;

    match (role, capability) {
        (Admin, _) => true,
        (_, QueryShipment) => true,
        (Shipper, CreateShipment) => true,
        (Shipper | LogisticsProvider | Warehouse, UpdateStatus) => true,
        // auditors only read
        (Auditor, UploadDocument) => false,
        (_, UploadDocument) => true,
        (Buyer, ConfirmDelivery) => true,
        (Buyer | Shipper, RaiseDispute) => true,
        (CustomsOfficer, CustomsClearance) => true,
        (Auditor | CustomsOfficer, Audit) => true,
        (Shipper | Buyer | Auditor, FileInsuranceClaim) => true,
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String, // bech32 encoded uuid7
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(name: &str, role: Role) -> anyhow::Result<Self> {
        Ok(Self {
            id: utils::new_user_id()?,
            name: name.to_string(),
            role,
        })
    }
    pub fn can(&self, capability: Capability) -> bool {
        permits(self.role, capability)
    }
    pub fn authorize(&self, capability: Capability) -> Result<(), ShipmentError> {
        if self.can(capability) {
            return Ok(());
        }
        tracing::warn!(actor = %self.id, role = ?self.role, %capability, "unauthorized");
        Err(ShipmentError::Unauthorized {
            actor: self.name.clone(),
            capability,
        })
    }
}

/// Process-scoped registry of signed-in actors. Created at start-up, handed to
/// whoever needs it, and cleared at shutdown.
#[derive(Debug, Default)]
pub struct SessionStore {
    actors: RwLock<HashMap<String, Actor>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn sign_in(&self, name: &str, role: Role) -> anyhow::Result<Actor> {
        let actor = Actor::new(name, role)?;
        self.actors.write().insert(actor.id.clone(), actor.clone());
        tracing::debug!(actor = %actor.id, ?role, "signed in");
        Ok(actor)
    }
    pub fn get(&self, id: &str) -> Option<Actor> {
        self.actors.read().get(id).cloned()
    }
    pub fn sign_out(&self, id: &str) -> Option<Actor> {
        self.actors.write().remove(id)
    }
    pub fn len(&self) -> usize {
        self.actors.read().len()
    }
    pub fn is_empty(&self) -> bool {
        self.actors.read().is_empty()
    }
    pub fn clear(&self) {
        self.actors.write().clear();
    }
}
