//! Property-based tests for the uniqueness predicate.
//!
//! ## Test Categories
//! 1. **Absence**: a target without a replica is never unique
//! 2. **Local state**: a target whose replica is not AVAILABLE is never unique
//! 3. **Sole copy**: exactly one AVAILABLE replica at the target is unique
//! 4. **Shared copy**: two or more AVAILABLE replicas are never unique

use std::collections::BTreeMap;

use proptest::prelude::*;
use urc_core::{FileId, ReplicaRecord, ReplicaState, is_unique};

const TARGET: &str = "TARGET_RSE";

// ─────────────────────────────────────────────────────────────────────────────
// Proptest Strategies
// ─────────────────────────────────────────────────────────────────────────────

fn any_state() -> impl Strategy<Value = ReplicaState> {
    prop_oneof![
        Just(ReplicaState::Available),
        Just(ReplicaState::Unavailable),
        Just(ReplicaState::Copying),
        Just(ReplicaState::BeingDeleted),
        Just(ReplicaState::Bad),
        Just(ReplicaState::TemporaryUnavailable),
        "[A-Z]{3,8}".prop_map(|s| ReplicaState::parse(&s)),
    ]
}

fn non_available_state() -> impl Strategy<Value = ReplicaState> {
    any_state().prop_filter("must not be AVAILABLE", |s| !s.is_available())
}

/// Other endpoints (never the target) with arbitrary states.
fn remote_locations(
    state: impl Strategy<Value = ReplicaState>,
) -> impl Strategy<Value = BTreeMap<String, ReplicaState>> {
    prop::collection::btree_map("SITE_[A-Z]{1,4}", state, 0..8)
}

fn record(locations: BTreeMap<String, ReplicaState>) -> ReplicaRecord {
    ReplicaRecord {
        file: FileId::new("scope", "file"),
        locations,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn absent_target_is_never_unique(locations in remote_locations(any_state())) {
        prop_assert!(!is_unique(TARGET, &record(locations)));
    }

    #[test]
    fn non_available_target_is_never_unique(
        local in non_available_state(),
        mut locations in remote_locations(any_state()),
    ) {
        locations.insert(TARGET.to_string(), local);
        prop_assert!(!is_unique(TARGET, &record(locations)));
    }

    #[test]
    fn sole_available_target_is_unique(mut locations in remote_locations(non_available_state())) {
        locations.insert(TARGET.to_string(), ReplicaState::Available);
        prop_assert!(is_unique(TARGET, &record(locations)));
    }

    #[test]
    fn shared_available_copy_is_never_unique(
        other in "SITE_[A-Z]{1,4}",
        mut locations in remote_locations(any_state()),
    ) {
        locations.insert(other, ReplicaState::Available);
        locations.insert(TARGET.to_string(), ReplicaState::Available);
        prop_assert!(!is_unique(TARGET, &record(locations)));
    }
}
