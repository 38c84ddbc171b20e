pub mod access;
pub mod compliance;
pub mod config;
pub mod contract;
pub mod documents;
pub mod error;
pub mod event;
pub mod ledger;
pub mod lifecycle;
pub mod locks;
pub mod payment;
pub mod report;
pub mod shipment;
pub mod utils;
