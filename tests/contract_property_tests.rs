//! Property-based tests for the smart-contract rules
//!
//! The rules gate every state change, so these tests sweep them across the
//! whole status vocabulary (including unrecognized symbols and odd casing)
//! instead of a few hand-picked shipments.

use proptest::prelude::*;
use shipment_ledger::{
    contract,
    shipment::{Shipment, Status, TimeStamp},
};

/// Strategy for any status, recognized or not
fn status_strategy() -> impl Strategy<Value = Status> {
    prop_oneof![
        Just(Status::Created),
        Just(Status::InTransit),
        Just(Status::AtBorder),
        Just(Status::AtWarehouse),
        Just(Status::Damaged),
        Just(Status::Delivered),
        "[A-Z_]{1,12}".prop_map(|s| Status::parse(&s)),
    ]
}

/// A recognized symbol rendered with random casing
fn cased_symbol_strategy() -> impl Strategy<Value = (String, Status)> {
    (status_strategy(), any::<u64>()).prop_map(|(status, seed)| {
        let symbol: String = status
            .as_str()
            .chars()
            .enumerate()
            .map(|(i, c)| {
                if seed >> (i % 64) & 1 == 1 {
                    c.to_ascii_lowercase()
                } else {
                    c
                }
            })
            .collect();
        (symbol, status)
    })
}

fn shipment_in(status: Status) -> Shipment {
    let mut shipment = Shipment::new("ship_prop".into(), "Toronto", "Vancouver", "Goods");
    shipment.status = status;
    shipment
}

proptest! {
    /// Once delivered, nothing but DELIVERED is accepted
    #[test]
    fn delivered_is_absorbing(next in status_strategy()) {
        let shipment = shipment_in(Status::Delivered);
        prop_assert_eq!(contract::can_update_status(&shipment, &next), next == Status::Delivered);
    }

    /// Before delivery every transition is allowed
    #[test]
    fn undelivered_accepts_anything(
        current in status_strategy().prop_filter("not delivered", |s| *s != Status::Delivered),
        next in status_strategy(),
    ) {
        prop_assert!(contract::can_update_status(&shipment_in(current), &next));
    }

    /// REJECT is allowed for every status but DELIVERED
    #[test]
    fn reject_allowed_unless_delivered(current in status_strategy(), casing in "[rR][eE][jJ][eE][cC][tT]") {
        let delivered = current == Status::Delivered;
        prop_assert_eq!(
            contract::validate_customs_clearance(&shipment_in(current), &casing),
            !delivered
        );
    }

    /// APPROVE only from the customs-relevant statuses
    #[test]
    fn approve_only_from_customs_statuses(current in status_strategy()) {
        let expected = matches!(
            current,
            Status::Created | Status::InTransit | Status::AtBorder | Status::AtWarehouse
        );
        prop_assert_eq!(
            contract::validate_customs_clearance(&shipment_in(current), "APPROVE"),
            expected
        );
    }

    /// Anything that is not APPROVE/REJECT is denied
    #[test]
    fn unknown_decisions_are_denied(current in status_strategy(), decision in "[a-z]{0,10}") {
        prop_assume!(decision != "approve" && decision != "reject");
        prop_assert!(!contract::validate_customs_clearance(&shipment_in(current), &decision));
    }

    /// Status symbols parse regardless of case
    #[test]
    fn status_parse_ignores_case((symbol, status) in cased_symbol_strategy()) {
        prop_assert_eq!(Status::parse(&symbol), status);
    }

    /// A late delivery always triggers a claim, an early one never does
    #[test]
    fn late_delivery_triggers_claim(delay_secs in -86_400i64..86_400) {
        prop_assume!(delay_secs != 0);
        let expected = TimeStamp::new_with(2024, 6, 1, 12, 0, 0).unwrap();
        let actual = TimeStamp::from(expected.to_datetime_utc() + chrono::Duration::seconds(delay_secs));

        let shipment = shipment_in(Status::Delivered)
            .set_expected_delivery(expected)
            .set_actual_delivery(actual);

        prop_assert_eq!(contract::trigger_insurance_claim(&shipment), delay_secs > 0);
    }
}
