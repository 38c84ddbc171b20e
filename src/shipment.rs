//! Core shipment, document, status and timestamp types
use super::event::Event;
use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

// `Utc` itself is not ordered, so a derive would never apply
impl PartialOrd for TimeStamp<Utc> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeStamp<Utc> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_datetime_utc().cmp(&other.to_datetime_utc())
    }
}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        min: u32,
        sec: u32,
    ) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(TimeStamp)
    }
    /// The current time, bumped forward when needed so that it strictly exceeds `prev`.
    pub fn next_after(prev: Option<&TimeStamp<Utc>>) -> Self {
        let now = Self::new();
        match prev {
            Some(prev) if now <= *prev => TimeStamp(prev.0 + Duration::nanoseconds(1)),
            _ => now,
        }
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TimeStamp<Utc> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// Shipment status. The six recognized symbols carry rule semantics, anything
/// else is kept verbatim (upper-cased) in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    Created,
    InTransit,
    AtBorder,
    AtWarehouse,
    Damaged,
    Delivered,
    Other(String),
}

impl Status {
    /// Case-insensitive parse, surrounding whitespace ignored. Control
    /// characters are replaced by spaces so a status always stays on one line.
    pub fn parse(symbol: &str) -> Self {
        let symbol: String = symbol
            .trim()
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect();
        let symbol = symbol.to_uppercase();
        match symbol.as_str() {
            "CREATED" => Status::Created,
            "IN_TRANSIT" => Status::InTransit,
            "AT_BORDER" => Status::AtBorder,
            "AT_WAREHOUSE" => Status::AtWarehouse,
            "DAMAGED" => Status::Damaged,
            "DELIVERED" => Status::Delivered,
            _ => Status::Other(symbol),
        }
    }
    pub fn as_str(&self) -> &str {
        match self {
            Status::Created => "CREATED",
            Status::InTransit => "IN_TRANSIT",
            Status::AtBorder => "AT_BORDER",
            Status::AtWarehouse => "AT_WAREHOUSE",
            Status::Damaged => "DAMAGED",
            Status::Delivered => "DELIVERED",
            Status::Other(symbol) => symbol,
        }
    }
    pub fn is_terminal(&self) -> bool {
        *self == Status::Delivered
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Status {
    fn from(value: &str) -> Self {
        Status::parse(value)
    }
}

impl<C> minicbor::Encode<C> for Status {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.str(self.as_str())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Status {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        Ok(Status::parse(d.str()?))
    }
}

// Content itself lives off-chain, keyed by document_id
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Document {
    #[n(0)]
    pub document_id: String,
    #[n(1)]
    pub shipment_id: String,
    #[n(2)]
    pub name: String,
    #[n(3)]
    pub digest: String, // sha256 hex of the content at upload time
    #[n(4)]
    pub uploaded_at: TimeStamp<Utc>,
}

impl Document {
    pub fn new(document_id: String, shipment_id: String, name: String, content: &[u8]) -> Self {
        Self {
            document_id,
            shipment_id,
            name,
            digest: Self::digest_of(content),
            uploaded_at: TimeStamp::new(),
        }
    }
    pub fn digest_of(content: &[u8]) -> String {
        sha256::digest(content)
    }
    /// True when `content` hashes to the digest captured at upload.
    pub fn matches(&self, content: &[u8]) -> bool {
        Self::digest_of(content) == self.digest
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Shipment {
    #[n(0)]
    pub id: String, // bech32 encoded uuid7, immutable
    #[n(1)]
    pub origin: String,
    #[n(2)]
    pub destination: String,
    #[n(3)]
    pub description: String,
    #[n(4)]
    pub status: Status,
    #[n(5)]
    pub created_at: TimeStamp<Utc>,
    #[n(6)]
    pub expected_delivery: Option<TimeStamp<Utc>>,
    #[n(7)]
    pub actual_delivery: Option<TimeStamp<Utc>>,
    #[n(8)]
    pub events: Vec<Event>, // append-only, chronological
    #[n(9)]
    pub documents: Vec<Document>,
    #[n(10)]
    pub payout_amount: Option<u64>, // cents, released on delivery
}

impl Shipment {
    pub fn new(id: String, origin: &str, destination: &str, description: &str) -> Self {
        Self {
            id,
            origin: origin.to_string(),
            destination: destination.to_string(),
            description: description.to_string(),
            status: Status::Created,
            created_at: TimeStamp::new(),
            expected_delivery: None,
            actual_delivery: None,
            events: vec![],
            documents: vec![],
            payout_amount: None,
        }
    }
    pub fn set_expected_delivery(mut self, date: TimeStamp<Utc>) -> Self {
        self.expected_delivery = Some(date);
        self
    }
    pub fn set_actual_delivery(mut self, date: TimeStamp<Utc>) -> Self {
        self.actual_delivery = Some(date);
        self
    }
    pub fn is_delivered(&self) -> bool {
        self.status.is_terminal()
    }
    pub fn last_event(&self) -> Option<&Event> {
        self.events.last()
    }
    /// A timestamp strictly after the last recorded event.
    pub fn next_timestamp(&self) -> TimeStamp<Utc> {
        TimeStamp::next_after(self.last_event().map(|event| &event.timestamp))
    }
    /// Apply an event: its status becomes the shipment's status.
    pub fn record(&mut self, event: Event) {
        self.status = event.status.clone();
        self.events.push(event);
    }
    pub fn attach_document(&mut self, document: Document) {
        self.documents.push(document);
    }
    /// Most recently attached document with the given name.
    pub fn document_named(&self, name: &str) -> Option<&Document> {
        self.documents.iter().rev().find(|doc| doc.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn next_after_bumps_past_a_future_timestamp() {
        let future = TimeStamp::from(Utc::now() + Duration::seconds(60));
        let next = TimeStamp::next_after(Some(&future));

        assert!(next > future);
        assert_eq!(
            next.to_datetime_utc() - future.to_datetime_utc(),
            Duration::nanoseconds(1)
        );
    }

    #[test]
    fn timestamps_order_by_instant() {
        let earlier = TimeStamp::new_with(2024, 3, 1, 8, 0, 0).unwrap();
        let later = TimeStamp::new_with(2024, 3, 1, 8, 0, 1).unwrap();

        assert!(earlier < later);
        assert!(later > earlier);
        assert_eq!(earlier.cmp(&earlier.clone()), Ordering::Equal);
        assert_eq!(
            vec![later.clone(), earlier.clone()].into_iter().max(),
            Some(later)
        );
    }

    #[test]
    fn status_parse_keeps_symbols_on_one_line() {
        assert_eq!(Status::parse("on\nhold"), Status::Other("ON HOLD".into()));
        assert_eq!(Status::parse("in\r\ttransit").as_str(), "IN  TRANSIT");
        assert_eq!(Status::parse("delivered\n"), Status::Delivered);
    }

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!(Status::parse("in_transit"), Status::InTransit);
        assert_eq!(Status::parse(" Delivered "), Status::Delivered);
        assert_eq!(Status::parse("cleared"), Status::Other("CLEARED".into()));
        assert_eq!(Status::parse("at_border").to_string(), "AT_BORDER");
    }

    #[test]
    fn shipment_cbor_roundtrip_keeps_other_status() {
        let mut shipment = Shipment::new("ship_1".into(), "Toronto", "Vancouver", "Maple syrup");
        shipment.status = Status::Other("HELD_BY_CUSTOMS".into());

        let encoded = minicbor::to_vec(&shipment).unwrap();
        let decoded: Shipment = minicbor::decode(&encoded).unwrap();

        assert_eq!(shipment, decoded);
    }
}
