//! Merge candidate discovery and execution
//!
//! Rules in the same ACL with equal action that agree on exactly two of
//! {source, destination, service} can collapse into one rule whose remaining
//! dimension is the union of the members. Discovery only proposes groups;
//! execution builds a full replacement rule vector so the caller can swap it
//! in atomically.

use std::collections::{HashMap, HashSet};
use std::fmt;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use fpa_common::{Action, NetPredicate, ResolvedNet, ResolvedSvc, Rule, SvcPredicate};

use crate::snapshot::PolicySnapshot;

/// The one predicate dimension that differs across group members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeDimension {
    /// Members differ only in source
    Source,
    /// Members differ only in destination
    Destination,
    /// Members differ only in service
    Service,
}

impl MergeDimension {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeDimension::Source => "source",
            MergeDimension::Destination => "destination",
            MergeDimension::Service => "service",
        }
    }
}

impl fmt::Display for MergeDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estimated effort of carrying out a merge
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum MergeComplexity {
    /// Every varying predicate is a single host or single port
    Low,
    /// Some varying predicate spans a network or port range
    Medium,
    /// Some varying predicate references a named object
    High,
}

/// A set of rules that can collapse into one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeGroup {
    /// Stable id: sha256 over the ordered member rule ids
    pub id: String,
    /// Owning device
    pub device: Uuid,
    /// ACL the members belong to
    pub rule_name: String,
    /// Shared action
    pub action: Action,
    /// Dimension that differs across members
    pub varying: MergeDimension,
    /// Shared source, absent when source is the varying dimension
    pub shared_source: Option<String>,
    /// Shared destination, absent when destination is the varying dimension
    pub shared_destination: Option<String>,
    /// Shared service, absent when service is the varying dimension
    pub shared_service: Option<String>,
    /// Member rule ids in evaluation order
    pub members: Vec<Uuid>,
    /// Rules eliminated if the group is merged
    pub potential_savings: usize,
    /// Estimated merge effort
    pub complexity: MergeComplexity,
}

/// Result of executing one or more merges
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeOutcome {
    /// Total rules eliminated
    pub merged_count: usize,
}

#[derive(PartialEq, Eq, Hash)]
struct BucketKey {
    name: String,
    action: Action,
    fixed_net: Option<ResolvedNet>,
    fixed_net2: Option<ResolvedNet>,
    fixed_svc: Option<ResolvedSvc>,
}

#[derive(PartialEq, Eq, Hash)]
enum VaryKey {
    Net(ResolvedNet),
    Svc(ResolvedSvc),
}

/// Discover merge candidates in the snapshot.
///
/// Each rule joins at most one group; dimensions claim rules in the order
/// source, destination, service. Within a bucket, members repeating an
/// already-seen varying value are left out (such pairs are redundancy, not
/// consolidation material).
pub fn find_merge_groups(snap: &PolicySnapshot) -> Vec<MergeGroup> {
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut groups: Vec<(usize, MergeGroup)> = Vec::new();

    for varying in [
        MergeDimension::Source,
        MergeDimension::Destination,
        MergeDimension::Service,
    ] {
        let mut buckets: HashMap<BucketKey, Vec<(usize, VaryKey)>> = HashMap::new();

        for (idx, (rule, resolved)) in snap.iter().enumerate() {
            if claimed.contains(&idx) {
                continue;
            }
            let (key, vary) = match varying {
                MergeDimension::Source => (
                    BucketKey {
                        name: rule.name.clone(),
                        action: rule.action,
                        fixed_net: Some(resolved.destination.clone()),
                        fixed_net2: None,
                        fixed_svc: Some(resolved.service.clone()),
                    },
                    VaryKey::Net(resolved.source.clone()),
                ),
                MergeDimension::Destination => (
                    BucketKey {
                        name: rule.name.clone(),
                        action: rule.action,
                        fixed_net: Some(resolved.source.clone()),
                        fixed_net2: None,
                        fixed_svc: Some(resolved.service.clone()),
                    },
                    VaryKey::Net(resolved.destination.clone()),
                ),
                MergeDimension::Service => (
                    BucketKey {
                        name: rule.name.clone(),
                        action: rule.action,
                        fixed_net: Some(resolved.source.clone()),
                        fixed_net2: Some(resolved.destination.clone()),
                        fixed_svc: None,
                    },
                    VaryKey::Svc(resolved.service.clone()),
                ),
            };
            buckets.entry(key).or_default().push((idx, vary));
        }

        for members in buckets.into_values() {
            let mut seen: HashSet<VaryKey> = HashSet::new();
            let mut kept: Vec<usize> = Vec::new();
            for (idx, vary) in members {
                if seen.insert(vary) {
                    kept.push(idx);
                }
            }
            if kept.len() < 2 {
                continue;
            }
            let group = build_group(snap, varying, &kept);
            debug!(
                group = %group.id,
                varying = %group.varying,
                members = group.members.len(),
                "merge candidate"
            );
            for idx in &kept {
                claimed.insert(*idx);
            }
            groups.push((kept[0], group));
        }
    }

    groups.sort_by_key(|(first_idx, _)| *first_idx);
    groups.into_iter().map(|(_, g)| g).collect()
}

fn build_group(snap: &PolicySnapshot, varying: MergeDimension, members: &[usize]) -> MergeGroup {
    let first = snap.rule(members[0]);

    let mut hasher = Sha256::new();
    for idx in members {
        hasher.update(snap.rule(*idx).id.as_bytes());
    }
    let id = hex::encode(hasher.finalize());

    let complexity = members
        .iter()
        .map(|&idx| {
            let rule = snap.rule(idx);
            match varying {
                MergeDimension::Source => net_complexity(&rule.source),
                MergeDimension::Destination => net_complexity(&rule.destination),
                MergeDimension::Service => svc_complexity(&rule.service),
            }
        })
        .max()
        .unwrap_or(MergeComplexity::Low);

    MergeGroup {
        id,
        device: snap.device(),
        rule_name: first.name.clone(),
        action: first.action,
        varying,
        shared_source: match varying {
            MergeDimension::Source => None,
            _ => Some(first.source.to_string()),
        },
        shared_destination: match varying {
            MergeDimension::Destination => None,
            _ => Some(first.destination.to_string()),
        },
        shared_service: match varying {
            MergeDimension::Service => None,
            _ => Some(first.service.to_string()),
        },
        members: members.iter().map(|&idx| snap.rule(idx).id).collect(),
        potential_savings: members.len() - 1,
        complexity,
    }
}

fn net_complexity(pred: &NetPredicate) -> MergeComplexity {
    match pred {
        NetPredicate::Object(_) => MergeComplexity::High,
        NetPredicate::List(items) => items
            .iter()
            .map(net_complexity)
            .max()
            .unwrap_or(MergeComplexity::Low),
        NetPredicate::Host(_) => MergeComplexity::Low,
        NetPredicate::Net(net) => {
            let single = match net {
                IpNetwork::V4(n) => n.prefix() == 32,
                IpNetwork::V6(n) => n.prefix() == 128,
            };
            if single {
                MergeComplexity::Low
            } else {
                MergeComplexity::Medium
            }
        }
        _ => MergeComplexity::Medium,
    }
}

fn svc_complexity(pred: &SvcPredicate) -> MergeComplexity {
    match pred {
        SvcPredicate::Object(_) => MergeComplexity::High,
        SvcPredicate::List(items) => items
            .iter()
            .map(svc_complexity)
            .max()
            .unwrap_or(MergeComplexity::Low),
        SvcPredicate::Proto(_) => MergeComplexity::Low,
        SvcPredicate::Port { span, .. } if span.lo == span.hi => MergeComplexity::Low,
        _ => MergeComplexity::Medium,
    }
}

fn union_net<'a>(preds: impl Iterator<Item = &'a NetPredicate>) -> NetPredicate {
    let mut parts: Vec<NetPredicate> = Vec::new();
    for pred in preds {
        if !parts.contains(pred) {
            parts.push(pred.clone());
        }
    }
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        NetPredicate::List(parts)
    }
}

fn union_svc<'a>(preds: impl Iterator<Item = &'a SvcPredicate>) -> SvcPredicate {
    let mut parts: Vec<SvcPredicate> = Vec::new();
    for pred in preds {
        if !parts.contains(pred) {
            parts.push(pred.clone());
        }
    }
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        SvcPredicate::List(parts)
    }
}

/// Apply merge groups to a rule list, producing the replacement vector.
///
/// Members are removed and one consolidated rule per group is inserted at the
/// earliest member's position; positions are renumbered afterwards. Groups
/// whose members no longer resolve (the rule list moved on since discovery)
/// are skipped. Returns the new vector and the number of rules eliminated.
pub fn apply_merge(rules: &[Rule], groups: &[MergeGroup]) -> (Vec<Rule>, usize) {
    let index_of: HashMap<Uuid, usize> = rules
        .iter()
        .enumerate()
        .map(|(idx, rule)| (rule.id, idx))
        .collect();

    let mut removed: HashSet<usize> = HashSet::new();
    let mut replacements: Vec<Rule> = Vec::new();
    let mut merged_count = 0usize;

    for group in groups {
        let mut member_idx: Vec<usize> = group
            .members
            .iter()
            .filter_map(|id| index_of.get(id).copied())
            .filter(|idx| !removed.contains(idx))
            .collect();
        member_idx.sort_unstable();
        member_idx.dedup();
        if member_idx.len() < 2 {
            warn!(group = %group.id, "merge group no longer applies, skipping");
            continue;
        }

        let mut merged = rules[member_idx[0]].clone();
        merged.id = Uuid::new_v4();
        merged.hash = None;
        merged.raw = None;
        merged.hits = member_idx.iter().map(|&idx| rules[idx].hits).sum();
        merged.last_hit = member_idx.iter().filter_map(|&idx| rules[idx].last_hit).max();
        match group.varying {
            MergeDimension::Source => {
                merged.source = union_net(member_idx.iter().map(|&idx| &rules[idx].source));
            }
            MergeDimension::Destination => {
                merged.destination = union_net(member_idx.iter().map(|&idx| &rules[idx].destination));
            }
            MergeDimension::Service => {
                merged.service = union_svc(member_idx.iter().map(|&idx| &rules[idx].service));
            }
        }

        merged_count += member_idx.len() - 1;
        removed.extend(member_idx.iter().copied());
        replacements.push(merged);
    }

    let mut out: Vec<Rule> = rules
        .iter()
        .enumerate()
        .filter(|(idx, _)| !removed.contains(idx))
        .map(|(_, rule)| rule.clone())
        .collect();
    out.extend(replacements);
    out.sort_by_key(|rule| rule.position);
    for (idx, rule) in out.iter_mut().enumerate() {
        rule.position = idx as u32 + 1;
    }

    (out, merged_count)
}
