//! Strong-typed UUID identifiers for all domain entities.

define_id!(TargetId, "Strong typed identifier for a target under test");
define_id!(
    ContextId,
    "Strong typed identifier for one immutable target-context version"
);
define_id!(MissionId, "Strong typed identifier for a mission");
define_id!(
    ActionId,
    "Strong typed identifier for a recorded mission action"
);
define_id!(
    RequestId,
    "Strong typed identifier for a persisted HTTP request"
);
define_id!(
    EntryId,
    "Strong typed identifier for a technique library entry"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_strings() {
        let id = TargetId::new();
        let parsed: TargetId = id.as_str().parse().expect("parse own display output");
        assert_eq!(id, parsed);
    }

    #[test]
    fn distinct_ids_are_unequal() {
        assert_ne!(MissionId::new(), MissionId::new());
    }
}
