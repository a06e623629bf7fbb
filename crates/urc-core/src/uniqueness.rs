//! Single-copy detection.

use crate::ReplicaRecord;

/// Decide whether `target` holds the sole AVAILABLE copy of a file.
///
/// A file is unique at `target` when `target` has a replica, that replica is
/// AVAILABLE, and no other endpoint in the federation has an AVAILABLE replica.
/// Pure: safe to call from any number of tasks without synchronization.
#[must_use]
pub fn is_unique(target: &str, record: &ReplicaRecord) -> bool {
    match record.state_at(target) {
        Some(state) if state.is_available() => {}
        _ => return false,
    }

    let mut available = record.available_endpoints();
    matches!(
        (available.next(), available.next()),
        (Some(only), None) if only == target
    )
}
