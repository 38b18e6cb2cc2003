use super::*;

crate::define_id! {
    /// Test-only ID type.
    pub struct TestId;
}

#[test]
fn id_newtype_round_trips_through_strings() {
    let id = TestId::new("g-42");
    assert_eq!(id.as_str(), "g-42");
    assert_eq!(id.to_string(), "g-42");
    assert_eq!(id, "g-42");
    assert_eq!(TestId::from("g-42".to_string()), id);
}

#[test]
fn sequential_id_gen_counts_up() {
    let ids = SequentialIdGen::new("goal");
    assert_eq!(ids.next(), "goal-1");
    assert_eq!(ids.next(), "goal-2");
}

#[test]
fn uuid_id_gen_is_unique() {
    let ids = UuidIdGen;
    assert_ne!(ids.next(), ids.next());
}
