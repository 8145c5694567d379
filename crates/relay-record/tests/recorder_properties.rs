use proptest::prelude::*;
use relay_record::{ChangeRecorder, MutationEvent, TrackedField};

fn attribute() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("name"),
        Just("timezone"),
        Just("email"),
        Just("password"),
        Just("remember_token"),
    ]
}

proptest! {
    #[test]
    fn prop_record_carries_identity_and_exactly_the_dirty_tracked_fields(
        local in "[a-z]{1,12}",
        dirty in proptest::collection::btree_set(attribute(), 0..5),
        value in "[A-Za-z/_ ]{1,20}",
    ) {
        let identity = format!("{local}@example.com");
        let mut event = MutationEvent::new(identity.clone())
            .with_value("name", "unchanged")
            .with_value("timezone", "UTC");
        for attr in &dirty {
            event = event.with_change(*attr, value.clone());
        }

        let record = ChangeRecorder::new().record(&event).unwrap();

        prop_assert_eq!(record.identity(), identity.as_str());
        for field in TrackedField::ALL {
            let expected = dirty.contains(field.attribute()).then_some(value.as_str());
            prop_assert_eq!(record.get(field), expected);
        }
    }
}
