//! # FPA Common - Shared Policy Model
//!
//! Foundation types for the firewall policy analysis workspace:
//!
//! - **Predicate algebra**: tagged source/destination/service constraints
//!   with `overlaps` / `contains` / `equals` over normalized sets
//! - **Object model**: named networks, services, and groups with cycle-safe
//!   resolution
//! - **Rule model**: canonical rules with evaluation order and usage counters
//! - **Findings**: immutable observations with severity and risk tiers
//! - **Traffic model**: parsed log records and per-rule usage aggregates
//!
//! Analysis engines consume these types through immutable snapshots; nothing
//! in this crate mutates shared state.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod finding;
pub mod object;
pub mod predicate;
pub mod rule;
pub mod traffic;

pub use config::{AnalysisConfig, TunerConfig};
pub use error::{FpaError, FpaResult};
pub use finding::{Analysis, AnalysisSummary, Finding, FindingFilter, FindingKind, RiskTier, Severity};
pub use object::{FwObject, ObjectDef, ObjectTable};
pub use predicate::{
    parse_net, parse_svc, AddrSpan, NetPredicate, PortSpan, Protocol, ResolvedNet, ResolvedSvc,
    SvcItem, SvcPredicate,
};
pub use rule::{Action, Rule};
pub use traffic::{
    Recommendation, RecommendationKind, RuleUsage, TrafficLogEntry, TrafficStats, TrafficTuple,
};

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counter for engine statistics
#[derive(Debug, Default)]
pub struct AtomicCounter(AtomicU64);

impl AtomicCounter {
    /// Create new counter
    pub const fn new(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    /// Increment and return previous value
    #[inline(always)]
    pub fn inc(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    /// Add value and return previous
    #[inline(always)]
    pub fn add(&self, val: u64) -> u64 {
        self.0.fetch_add(val, Ordering::Relaxed)
    }

    /// Get current value
    #[inline(always)]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}
