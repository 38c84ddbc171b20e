use crate::access::Capability;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ShipmentError {
    #[error("Actor {actor} is not authorized to {capability}")]
    Unauthorized { actor: String, capability: Capability },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Smart contract rejected the request: {0}")]
    Rejected(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
