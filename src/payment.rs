//! Payout trigger fired when a shipment is delivered
use super::shipment::{Shipment, TimeStamp};
use super::utils;
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

pub trait PaymentGateway: Send + Sync {
    /// Release `amount` cents for `shipment`, returning the gateway's receipt.
    fn process_payment(&self, shipment: &Shipment, amount: u64) -> anyhow::Result<PaymentReceipt>;
}

/// Proof of a released payout. Its text form is filed as a shipment document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub transaction_id: String,
    pub shipment_id: String,
    pub amount: u64,
    pub issued_at: TimeStamp<Utc>,
}

impl PaymentReceipt {
    pub fn new(shipment_id: &str, amount: u64) -> anyhow::Result<Self> {
        Ok(Self {
            transaction_id: utils::new_transaction_id()?,
            shipment_id: shipment_id.to_string(),
            amount,
            issued_at: TimeStamp::new(),
        })
    }
    pub fn document_name(&self) -> String {
        format!("receipt-{}.txt", self.transaction_id)
    }
    pub fn content(&self) -> String {
        format!(
            "Receipt for transaction {}\nShipment: {}\nAmount: {}\nIssued: {}\n",
            self.transaction_id,
            self.shipment_id,
            format_amount(self.amount),
            self.issued_at
        )
    }
}

/// Cents rendered as `units.cc`.
pub fn format_amount(cents: u64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

/// Gateway that records each payout it is asked for and logs it.
#[derive(Debug, Default)]
pub struct LedgerPayouts {
    paid: Mutex<Vec<PaymentReceipt>>,
}

impl LedgerPayouts {
    pub fn new() -> Self {
        Self::default()
    }
    /// Shipment ids paid out so far, in call order.
    pub fn payouts(&self) -> Vec<String> {
        self.paid
            .lock()
            .iter()
            .map(|receipt| receipt.shipment_id.clone())
            .collect()
    }
    pub fn receipts(&self) -> Vec<PaymentReceipt> {
        self.paid.lock().clone()
    }
}

impl PaymentGateway for LedgerPayouts {
    fn process_payment(&self, shipment: &Shipment, amount: u64) -> anyhow::Result<PaymentReceipt> {
        if amount == 0 {
            anyhow::bail!("payout for {} has no amount", shipment.id);
        }
        let receipt = PaymentReceipt::new(&shipment.id, amount)?;
        self.paid.lock().push(receipt.clone());
        tracing::info!(shipment_id = %shipment.id, transaction_id = %receipt.transaction_id, amount, "payout released");
        Ok(receipt)
    }
}

/// Bounds a gateway call. The inner call runs on its own thread and is
/// abandoned, not cancelled, once `timeout` elapses.
pub struct DeadlineGateway<G> {
    inner: Arc<G>,
    timeout: Duration,
}

impl<G: PaymentGateway + 'static> DeadlineGateway<G> {
    pub fn new(inner: Arc<G>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl<G: PaymentGateway + 'static> PaymentGateway for DeadlineGateway<G> {
    fn process_payment(&self, shipment: &Shipment, amount: u64) -> anyhow::Result<PaymentReceipt> {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let shipment = shipment.clone();

        std::thread::spawn(move || {
            // receiver may be gone after a timeout
            let _ = tx.send(inner.process_payment(&shipment, amount));
        });

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(anyhow::anyhow!(
                "payment gateway timed out after {:?}",
                self.timeout
            )),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(anyhow::anyhow!("payment gateway worker exited without a result"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowGateway(Duration);

    impl PaymentGateway for SlowGateway {
        fn process_payment(&self, shipment: &Shipment, amount: u64) -> anyhow::Result<PaymentReceipt> {
            std::thread::sleep(self.0);
            PaymentReceipt::new(&shipment.id, amount)
        }
    }

    #[test]
    fn deadline_passes_fast_calls_through() {
        let payouts = Arc::new(LedgerPayouts::new());
        let gateway = DeadlineGateway::new(payouts.clone(), Duration::from_secs(5));
        let shipment = Shipment::new("ship_1".into(), "A", "B", "C");

        let receipt = gateway.process_payment(&shipment, 12_500).unwrap();
        assert_eq!(payouts.payouts(), vec!["ship_1".to_string()]);
        assert_eq!(payouts.receipts(), vec![receipt]);
    }

    #[test]
    fn deadline_fails_slow_calls() {
        let gateway = DeadlineGateway::new(
            Arc::new(SlowGateway(Duration::from_millis(500))),
            Duration::from_millis(20),
        );
        let shipment = Shipment::new("ship_1".into(), "A", "B", "C");

        let err = gateway.process_payment(&shipment, 100).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn zero_amount_is_refused() {
        let payouts = LedgerPayouts::new();
        let shipment = Shipment::new("ship_1".into(), "A", "B", "C");

        assert!(payouts.process_payment(&shipment, 0).is_err());
        assert!(payouts.payouts().is_empty());
    }

    #[test]
    fn receipt_text_carries_transaction_and_amount() {
        let receipt = PaymentReceipt::new("ship_1", 10_005).unwrap();

        assert!(receipt.transaction_id.starts_with("txn_"));
        assert_eq!(receipt.document_name(), format!("receipt-{}.txt", receipt.transaction_id));
        let content = receipt.content();
        assert!(content.contains("Shipment: ship_1"));
        assert!(content.contains("Amount: 100.05"));
    }
}
