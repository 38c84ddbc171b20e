//! Utility functions for identifiers

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

pub fn new_shipment_id() -> anyhow::Result<String> {
    new_uuid_to_bech32("ship_")
}

pub fn new_event_id() -> anyhow::Result<String> {
    new_uuid_to_bech32("evt_")
}

pub fn new_document_id() -> anyhow::Result<String> {
    new_uuid_to_bech32("doc_")
}

pub fn new_transaction_id() -> anyhow::Result<String> {
    new_uuid_to_bech32("txn_")
}

pub fn new_user_id() -> anyhow::Result<String> {
    new_uuid_to_bech32("user_")
}
