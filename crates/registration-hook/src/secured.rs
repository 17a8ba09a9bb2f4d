//! Retirement of orphaned secured registrations.
//!
//! Every plain endpoint `A` may have a TLS-fronted sibling `A-secured`. When a
//! resolution no longer produces the sibling, a previous invocation may still
//! have it registered, so it is deregistered before the new records go in.

use std::collections::HashSet;

use crate::service::{ServiceRecord, SECURED_SUFFIX};

/// Deregistration-only records for every secured identity that no longer has
/// a counterpart among `records`.
pub fn orphaned_secured(records: &[ServiceRecord]) -> Vec<ServiceRecord> {
    let (secured, plain): (Vec<&ServiceRecord>, Vec<&ServiceRecord>) =
        records.iter().partition(|record| record.is_secured());
    let secured: HashSet<&str> = secured.iter().map(|record| record.id.as_str()).collect();

    plain
        .iter()
        .map(|record| format!("{}{SECURED_SUFFIX}", record.id))
        .filter(|id| !secured.contains(id.as_str()))
        .map(ServiceRecord::deregistration)
        .collect()
}
