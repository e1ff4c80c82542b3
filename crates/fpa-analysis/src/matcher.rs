//! First-match rule evaluation
//!
//! A packet tuple walks the snapshot in evaluation order and the first rule
//! whose source, destination, and service all cover it wins. Every consumer
//! that needs to know "which rule handles this traffic" goes through here so
//! classification and traffic association can never disagree.

use fpa_common::{Rule, TrafficTuple};

use crate::snapshot::PolicySnapshot;

/// Index of the first rule matching the tuple, in evaluation order
pub fn first_match_index(snap: &PolicySnapshot, tuple: &TrafficTuple) -> Option<usize> {
    for (idx, resolved) in snap.iter().enumerate().map(|(i, (_, r))| (i, r)) {
        if resolved.source.contains_ip(tuple.src)
            && resolved.destination.contains_ip(tuple.dst)
            && resolved.service.matches(&tuple.protocol, tuple.dst_port)
        {
            return Some(idx);
        }
    }
    None
}

/// First rule matching the tuple
pub fn first_match<'a>(snap: &'a PolicySnapshot, tuple: &TrafficTuple) -> Option<&'a Rule> {
    first_match_index(snap, tuple).map(|idx| snap.rule(idx))
}
