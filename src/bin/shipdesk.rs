use shipment_ledger::{
    access::{Role, SessionStore},
    compliance::{ComplianceService, SummaryFilter},
    config::Config,
    documents::SledDocumentStore,
    ledger::SledLedger,
    lifecycle::LifecycleService,
    locks::ShipmentLocks,
    payment::{DeadlineGateway, LedgerPayouts},
    shipment::Status,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .init();

    let db = config.open_sled()?;
    let ledger = Arc::new(SledLedger::new(db.clone())?);
    let documents = Arc::new(SledDocumentStore::new(&db)?);
    let locks = Arc::new(ShipmentLocks::new());
    let payouts = Arc::new(DeadlineGateway::new(
        Arc::new(LedgerPayouts::new()),
        config.payment_timeout(),
    ));

    let lifecycle = LifecycleService::new(
        ledger.clone(),
        documents.clone(),
        payouts,
        locks.clone(),
    )
    .with_default_payout(config.default_payout_cents);
    let compliance = ComplianceService::new(ledger, documents, locks);

    let sessions = SessionStore::new();
    let shipper = sessions.sign_in("alice", Role::Shipper)?;
    let customs = sessions.sign_in("carlos", Role::CustomsOfficer)?;
    let buyer = sessions.sign_in("bianca", Role::Buyer)?;
    let auditor = sessions.sign_in("audrey", Role::Auditor)?;

    let shipment =
        lifecycle.create_shipment(&shipper, "Toronto", "Vancouver", "Maple syrup, 40 crates")?;
    lifecycle.upload_document(&shipper, &shipment.id, "invoice.pdf", b"INV-0001 40 crates")?;
    lifecycle.quote_payout(&shipper, &shipment.id, 184_000)?;
    lifecycle.update_status(&shipper, &shipment.id, Status::InTransit, "Left Toronto depot")?;
    lifecycle.update_status(&shipper, &shipment.id, Status::AtBorder, "Reached inspection")?;

    let alert = compliance.raise_customs_alert(&customs, &shipment.id, "Seal number differs from manifest")?;
    tracing::info!(outcome = %alert.message(), "customs alert");

    let clearance = compliance.approve_clearance(&customs, &shipment.id, "APPROVE")?;
    tracing::info!(outcome = %clearance.message(), "clearance");

    let delivered = lifecycle.confirm_delivery(&buyer, &shipment.id)?;
    tracing::info!(payment = ?delivered.payment, "delivery confirmed");

    println!("{}", compliance.query_status(&buyer, &shipment.id)?);
    println!("{}", compliance.generate_audit_trail(&auditor, &shipment.id)?);
    println!(
        "invoice.pdf: {}",
        compliance.verify_document(&auditor, &shipment.id, "invoice.pdf")?
    );
    println!(
        "{}",
        compliance.generate_compliance_summary(&auditor, &SummaryFilter::new())?
    );

    sessions.clear();
    db.flush()?;

    Ok(())
}
