//! Log-to-rule association
//!
//! An entry carrying a vendor ACE hash maps directly to the rule with that
//! hash; everything else goes through the shared first-match evaluation, so
//! association can never disagree with shadow analysis. Deny entries feed
//! the repeated-pattern counter and credit an explicit deny rule when one
//! matches; an allow entry whose evaluation lands on a deny rule (or on
//! nothing) is unmatched.

use std::collections::HashMap;
use std::net::IpAddr;

use uuid::Uuid;

use fpa_analysis::{first_match_index, PolicySnapshot};
use fpa_common::{Action, Protocol, RuleUsage, TrafficLogEntry, TrafficTuple};

/// A denied tuple, aggregated across entries
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DenyKey {
    /// Source address
    pub src: IpAddr,
    /// Destination address
    pub dst: IpAddr,
    /// Protocol
    pub proto: Protocol,
    /// Destination port, when the record carried one
    pub port: Option<u16>,
}

/// Aggregated association result for one batch
#[derive(Debug, Default)]
pub struct Association {
    /// Usage per rule id
    pub per_rule: HashMap<Uuid, RuleUsage>,
    /// Denied tuples with repeat counts, most frequent first
    pub denied_patterns: Vec<(DenyKey, u64)>,
    /// Denied entries seen
    pub denied: u64,
    /// Allow entries the rule base does not explain
    pub unmatched: u64,
    /// Entries mapped through the vendor hash
    pub direct: u64,
    /// Entries mapped through first-match evaluation
    pub heuristic: u64,
}

/// Associate parsed entries with the snapshot's rules
pub fn associate(snap: &PolicySnapshot, entries: &[TrafficLogEntry]) -> Association {
    let mut out = Association::default();
    let mut patterns: HashMap<DenyKey, u64> = HashMap::new();

    for entry in entries {
        match entry.action {
            Action::Deny => {
                out.denied += 1;
                let key = DenyKey {
                    src: entry.src,
                    dst: entry.dst,
                    proto: entry.protocol.clone(),
                    port: entry.dst_port,
                };
                *patterns.entry(key).or_insert(0) += 1;

                if let Some(idx) = map_entry(snap, entry, &mut out) {
                    let rule = snap.rule(idx);
                    if rule.action == Action::Deny {
                        out.per_rule.entry(rule.id).or_default().record(entry);
                    }
                }
            }
            Action::Allow => match map_entry(snap, entry, &mut out) {
                Some(idx) if snap.rule(idx).action == Action::Allow => {
                    out.per_rule
                        .entry(snap.rule(idx).id)
                        .or_default()
                        .record(entry);
                }
                _ => out.unmatched += 1,
            },
        }
    }

    out.denied_patterns = patterns.into_iter().collect();
    out.denied_patterns.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then_with(|| a.0.src.cmp(&b.0.src))
            .then_with(|| a.0.dst.cmp(&b.0.dst))
            .then_with(|| a.0.port.cmp(&b.0.port))
    });
    out
}

fn map_entry(
    snap: &PolicySnapshot,
    entry: &TrafficLogEntry,
    out: &mut Association,
) -> Option<usize> {
    if let Some(hash) = &entry.rule_hash {
        if let Some(idx) = snap.index_of_hash(hash) {
            out.direct += 1;
            return Some(idx);
        }
    }
    let tuple = TrafficTuple::from(entry);
    let idx = first_match_index(snap, &tuple);
    if idx.is_some() {
        out.heuristic += 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use fpa_common::{parse_net, parse_svc, ObjectTable, Rule};

    fn rule(device: Uuid, pos: u32, src: &str, dst: &str, svc: &str, action: Action) -> Rule {
        Rule::new(
            device,
            "OUTSIDE-IN",
            pos,
            parse_net(src).unwrap(),
            parse_net(dst).unwrap(),
            parse_svc(svc).unwrap(),
            action,
        )
    }

    fn snapshot(rules: Vec<Rule>) -> PolicySnapshot {
        let device = rules[0].device;
        PolicySnapshot::from_rules(device, rules, ObjectTable::new()).unwrap()
    }

    fn allow_entry(src: &str, dst: &str, port: u16) -> TrafficLogEntry {
        TrafficLogEntry {
            timestamp: None,
            src: src.parse().unwrap(),
            dst: dst.parse().unwrap(),
            protocol: Protocol::Tcp,
            src_port: Some(51000),
            dst_port: Some(port),
            action: Action::Allow,
            bytes: 100,
            rule_hash: None,
        }
    }

    fn deny_entry(src: &str, dst: &str) -> TrafficLogEntry {
        TrafficLogEntry {
            timestamp: None,
            src: src.parse().unwrap(),
            dst: dst.parse().unwrap(),
            protocol: Protocol::Icmp,
            src_port: None,
            dst_port: None,
            action: Action::Deny,
            bytes: 0,
            rule_hash: None,
        }
    }

    #[test]
    fn test_hash_maps_directly_even_when_tuple_would_not() {
        let device = Uuid::new_v4();
        let hashed = rule(device, 1, "any", "host 10.0.0.5", "tcp/443", Action::Allow)
            .with_hash("0xcafe0001");
        let hashed_id = hashed.id;
        let snap = snapshot(vec![hashed]);

        // Tuple targets a different host; only the hash can map it.
        let mut entry = allow_entry("198.51.100.7", "10.0.0.99", 443);
        entry.rule_hash = Some("0xcafe0001".to_string());

        let assoc = associate(&snap, &[entry]);
        assert_eq!(assoc.direct, 1);
        assert_eq!(assoc.heuristic, 0);
        assert_eq!(assoc.unmatched, 0);
        assert_eq!(assoc.per_rule[&hashed_id].hits, 1);
    }

    #[test]
    fn test_first_match_credits_allow_rule() {
        let device = Uuid::new_v4();
        let web = rule(device, 1, "any", "host 10.0.0.5", "tcp/443", Action::Allow);
        let web_id = web.id;
        let snap = snapshot(vec![web]);

        let assoc = associate(
            &snap,
            &[
                allow_entry("198.51.100.7", "10.0.0.5", 443),
                allow_entry("198.51.100.8", "10.0.0.5", 443),
            ],
        );
        assert_eq!(assoc.heuristic, 2);
        let usage = &assoc.per_rule[&web_id];
        assert_eq!(usage.hits, 2);
        assert_eq!(usage.bytes, 200);
        assert_eq!(usage.sources.len(), 2);
        assert!(usage.services.contains("tcp/443"));
    }

    #[test]
    fn test_allow_entry_landing_on_deny_is_unmatched() {
        let device = Uuid::new_v4();
        let snap = snapshot(vec![rule(
            device,
            1,
            "any",
            "host 10.0.0.5",
            "ip",
            Action::Deny,
        )]);
        let assoc = associate(&snap, &[allow_entry("198.51.100.7", "10.0.0.5", 443)]);
        assert_eq!(assoc.unmatched, 1);
        assert!(assoc.per_rule.is_empty());
    }

    #[test]
    fn test_allow_entry_without_match_is_unmatched() {
        let device = Uuid::new_v4();
        let snap = snapshot(vec![rule(
            device,
            1,
            "any",
            "host 10.0.0.5",
            "tcp/443",
            Action::Allow,
        )]);
        let assoc = associate(&snap, &[allow_entry("198.51.100.7", "172.16.0.9", 80)]);
        assert_eq!(assoc.unmatched, 1);
    }

    #[test]
    fn test_deny_entries_feed_patterns_and_credit_explicit_deny() {
        let device = Uuid::new_v4();
        let blocker = rule(device, 1, "any", "host 10.20.50.110", "ip", Action::Deny);
        let blocker_id = blocker.id;
        let snap = snapshot(vec![blocker]);

        let entries = vec![
            deny_entry("10.1.0.162", "10.20.50.110"),
            deny_entry("10.1.0.162", "10.20.50.110"),
            deny_entry("10.1.0.163", "10.20.50.110"),
        ];
        let assoc = associate(&snap, &entries);

        assert_eq!(assoc.denied, 3);
        assert_eq!(assoc.per_rule[&blocker_id].hits, 3);
        assert_eq!(assoc.denied_patterns.len(), 2);
        // Most frequent pattern first.
        assert_eq!(assoc.denied_patterns[0].1, 2);
        assert_eq!(
            assoc.denied_patterns[0].0.src,
            "10.1.0.162".parse::<IpAddr>().unwrap()
        );
    }
}
