//! Traffic log model and per-rule usage aggregation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;
use uuid::Uuid;

use crate::finding::Severity;
use crate::predicate::Protocol;
use crate::rule::Action;

/// One parsed traffic log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficLogEntry {
    /// Timestamp from the log line, when one parsed
    pub timestamp: Option<DateTime<Utc>>,
    /// Source address
    pub src: IpAddr,
    /// Destination address
    pub dst: IpAddr,
    /// Transport protocol
    pub protocol: Protocol,
    /// Source port, when the record carries one
    pub src_port: Option<u16>,
    /// Destination port, when the record carries one
    pub dst_port: Option<u16>,
    /// Allow or deny as reported by the device
    pub action: Action,
    /// Bytes transferred, zero when unreported
    pub bytes: u64,
    /// Vendor rule hash carried by the record, for direct mapping
    pub rule_hash: Option<String>,
}

/// The fields of a log record the matcher evaluates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficTuple {
    /// Source address
    pub src: IpAddr,
    /// Destination address
    pub dst: IpAddr,
    /// Transport protocol
    pub protocol: Protocol,
    /// Destination port, when known
    pub dst_port: Option<u16>,
}

impl TrafficTuple {
    /// Tuple from explicit fields
    pub fn new(src: IpAddr, dst: IpAddr, protocol: Protocol, dst_port: Option<u16>) -> Self {
        Self {
            src,
            dst,
            protocol,
            dst_port,
        }
    }
}

impl From<&TrafficLogEntry> for TrafficTuple {
    fn from(entry: &TrafficLogEntry) -> Self {
        Self {
            src: entry.src,
            dst: entry.dst,
            protocol: entry.protocol.clone(),
            dst_port: entry.dst_port,
        }
    }
}

/// Observed usage of one rule across an ingested log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleUsage {
    /// Records credited to the rule
    pub hits: u64,
    /// Bytes across credited records
    pub bytes: u64,
    /// Latest credited record timestamp
    pub last_seen: Option<DateTime<Utc>>,
    /// Distinct `proto/port` service keys observed
    pub services: BTreeSet<String>,
    /// Distinct source addresses observed
    pub sources: BTreeSet<IpAddr>,
}

impl RuleUsage {
    /// Credit one log record to the rule
    pub fn record(&mut self, entry: &TrafficLogEntry) {
        self.hits += 1;
        self.bytes += entry.bytes;
        if entry.timestamp > self.last_seen {
            self.last_seen = entry.timestamp;
        }
        self.services.insert(format!(
            "{}/{}",
            entry.protocol,
            entry.dst_port.unwrap_or(0)
        ));
        self.sources.insert(entry.src);
    }
}

/// Tuning advice category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// Broad allow rule observed carrying only narrow traffic
    OverPermissive,
    /// `any` source observed from a small set of hosts
    TightenScope,
    /// A fixed tuple denied repeatedly; candidate allow for review
    FrequentDeny,
    /// Many sources in one subnet; candidate network object
    Consolidation,
}

impl RecommendationKind {
    /// snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationKind::OverPermissive => "over_permissive",
            RecommendationKind::TightenScope => "tighten_scope",
            RecommendationKind::FrequentDeny => "frequent_deny",
            RecommendationKind::Consolidation => "consolidation",
        }
    }
}

/// Advisory change proposal; the engine never applies these itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Advice category
    pub kind: RecommendationKind,
    /// How urgent the advice is
    pub severity: Severity,
    /// Rule the advice is about, when about one rule
    pub rule: Option<Uuid>,
    /// Label of that rule
    pub rule_name: Option<String>,
    /// What was observed
    pub description: String,
    /// What to do about it
    pub suggestion: String,
    /// Equivalent vendor command text
    pub commands: Vec<String>,
}

/// Outcome of ingesting one traffic log against a rule snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrafficStats {
    /// Records parsed successfully
    pub total_entries: u64,
    /// Records the device reported as denied
    pub denied: u64,
    /// Allowed records no allow rule accounts for
    pub unmatched: u64,
    /// Recognized lines dropped for unusable fields
    pub malformed: u64,
    /// Records mapped by vendor rule hash
    pub direct_mapped: u64,
    /// Records mapped by matcher simulation
    pub heuristic_mapped: u64,
    /// Per-rule usage aggregates
    pub per_rule: HashMap<Uuid, RuleUsage>,
    /// Tuning advice derived from the aggregates
    pub recommendations: Vec<Recommendation>,
}
