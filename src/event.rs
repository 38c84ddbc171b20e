use super::shipment::{Shipment, Status, TimeStamp};
use super::utils;
use chrono::Utc;

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct Event {
    #[n(0)]
    pub event_id: String,
    #[n(1)]
    pub shipment_id: String, // a reference to [`Shipment`], never an owner
    #[n(2)]
    pub status: Status, // shipment status after this event
    #[n(3)]
    pub description: String,
    #[n(4)]
    pub recorded_by: String,
    #[n(5)]
    pub timestamp: TimeStamp<Utc>,
    #[n(6)]
    pub kind: EventKind,
}

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub enum EventKind {
    #[n(0)]
    Created,
    #[n(1)]
    StatusChanged,
    #[n(2)]
    DocumentAdded {
        #[n(0)]
        document_id: String,
        #[n(1)]
        digest: String,
    },
    #[n(3)]
    DisputeRaised,
    #[n(4)]
    ClearanceDecided {
        #[n(0)]
        approved: bool,
    },
    #[n(5)]
    DeliveryConfirmed,
    #[n(6)]
    InsuranceClaimed,
    #[n(7)]
    DeliveryScheduled,
    #[n(8)]
    CustomsAlert,
    #[n(9)]
    PayoutQuoted {
        #[n(0)]
        amount: u64,
    },
    #[n(10)]
    PaymentReleased {
        #[n(0)]
        transaction_id: String,
        #[n(1)]
        amount: u64,
        #[n(2)]
        document_id: String,
    },
}

impl Event {
    /// Next event for `shipment`, timestamped strictly after its last one.
    pub fn next(
        shipment: &Shipment,
        recorded_by: &str,
        status: Status,
        description: impl Into<String>,
        kind: EventKind,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            event_id: utils::new_event_id()?,
            shipment_id: shipment.id.clone(),
            status,
            description: description.into(),
            recorded_by: recorded_by.to_string(),
            timestamp: shipment.next_timestamp(),
            kind,
        })
    }
    pub fn with_timestamp(mut self, timestamp: TimeStamp<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
    pub fn build(&self) -> anyhow::Result<(String, Vec<u8>)> {
        let cbor = minicbor::to_vec(self)?;
        let hash = sha256::digest(cbor.as_slice());

        Ok((hash, cbor))
    }
    /// `timestamp | STATUS | description` on a single line.
    pub fn audit_line(&self) -> String {
        let status = self.status.as_str().replace(['\r', '\n'], " ");
        let description = self.description.replace(['\r', '\n'], " ");
        format!("{} | {status} | {description}", self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consecutive_events_are_strictly_ordered() {
        let mut shipment = Shipment::new("ship_1".into(), "Toronto", "Vancouver", "Lumber");

        for status in ["IN_TRANSIT", "AT_BORDER", "AT_WAREHOUSE"] {
            let event = Event::next(
                &shipment,
                "user_1",
                Status::parse(status),
                "moved",
                EventKind::StatusChanged,
            )
            .unwrap();
            shipment.record(event);
        }

        let stamps: Vec<_> = shipment.events.iter().map(|e| e.timestamp.clone()).collect();
        assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(shipment.status, Status::AtWarehouse);
    }

    #[test]
    fn audit_line_flattens_multiline_descriptions() {
        let shipment = Shipment::new("ship_1".into(), "A", "B", "C");
        let event = Event::next(
            &shipment,
            "user_1",
            Status::Created,
            "first\nsecond",
            EventKind::Created,
        )
        .unwrap();

        let line = event.audit_line();
        assert_eq!(line.lines().count(), 1);
        assert!(line.ends_with("| CREATED | first second"));
    }

    #[test]
    fn audit_line_flattens_a_hand_built_status() {
        let shipment = Shipment::new("ship_1".into(), "A", "B", "C");
        let event = Event::next(
            &shipment,
            "user_1",
            Status::Other("ON\nHOLD".into()),
            "waiting",
            EventKind::StatusChanged,
        )
        .unwrap();

        let line = event.audit_line();
        assert_eq!(line.lines().count(), 1);
        assert!(line.ends_with("| ON HOLD | waiting"));
    }

    #[test]
    fn build_hash_matches_encoding() {
        let shipment = Shipment::new("ship_1".into(), "A", "B", "C");
        let event =
            Event::next(&shipment, "user_1", Status::Created, "created", EventKind::Created)
                .unwrap();

        let (hash, cbor) = event.build().unwrap();
        assert_eq!(hash, sha256::digest(cbor.as_slice()));

        let decoded: Event = minicbor::decode(&cbor).unwrap();
        assert_eq!(decoded, event);
    }
}
