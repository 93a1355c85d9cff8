//! Pure, DB-free property tests (spec.md §8) for the total order on
//! `Position` and `Command` validation - no Postgres instance required.

use eventstore::{Command, Error, Position};
use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::json;

fn arb_position() -> impl Strategy<Value = Position> {
    (0i64..1_000_000, any::<i32>()).prop_map(|(whole, in_tx_order)| Position::new(Decimal::new(whole, 2), in_tx_order))
}

proptest! {
    /// P2 (restricted to the ordering law itself): `(position, in_tx_order)`
    /// is a strict total order - trichotomy holds for any pair.
    #[test]
    fn position_ordering_is_a_strict_total_order(a in arb_position(), b in arb_position()) {
        let lt = a < b;
        let gt = a > b;
        let eq = a == b;
        prop_assert_eq!([lt, gt, eq].iter().filter(|x| **x).count(), 1);
    }

    #[test]
    fn position_ordering_is_transitive(a in arb_position(), b in arb_position(), c in arb_position()) {
        if a < b && b < c {
            prop_assert!(a < c);
        }
    }

    /// A blank required field always produces `InvalidArgument`, regardless
    /// of which field is blank or what the others contain.
    #[test]
    fn command_validation_rejects_any_blank_required_field(
        instance_id in "[a-z0-9-]{0,8}",
        aggregate_type in "[a-z0-9-]{0,8}",
        aggregate_id in "[a-z0-9-]{0,8}",
        event_type in "[a-z0-9-]{0,8}",
        creator in "[a-z0-9-]{0,8}",
        owner in "[a-z0-9-]{0,8}",
    ) {
        let any_blank = [&instance_id, &aggregate_type, &aggregate_id, &event_type, &creator, &owner]
            .iter()
            .any(|field| field.is_empty());

        let command = Command {
            instance_id,
            aggregate_type,
            aggregate_id,
            event_type,
            revision: Some(1),
            payload: json!({}),
            creator,
            owner,
            unique_constraints: vec![],
        };

        match command.validate() {
            Ok(()) => prop_assert!(!any_blank),
            Err(Error::InvalidArgument(_)) => prop_assert!(any_blank),
            Err(other) => prop_assert!(false, "unexpected error variant: {other:?}"),
        }
    }
}
