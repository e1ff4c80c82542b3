//! Engine configuration
//!
//! Plain structs with defaults; callers own where the values come from.

use serde::{Deserialize, Serialize};

/// Knobs for the classifier and risk checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Days without a hit before an otherwise-used rule counts as inactive
    pub retention_days: i64,
    /// IPv4 prefix length below which a network counts as broad
    pub broad_prefix_v4: u8,
    /// Ports treated as management services when exposed broadly
    pub management_ports: Vec<u16>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            broad_prefix_v4: 24,
            management_ports: vec![22, 23, 135, 139, 445, 1433, 3306, 3389, 5432, 5900],
        }
    }
}

/// Knobs for traffic-driven tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunerConfig {
    /// Denied-tuple count above which a review candidate is proposed
    pub frequent_deny_threshold: u64,
    /// Most denied patterns considered per batch, busiest first
    pub max_deny_patterns: usize,
    /// Distinct sources in one subnet before consolidation is proposed
    pub consolidation_threshold: usize,
    /// Most distinct services a broad rule may carry and still be split
    pub max_observed_services: usize,
    /// Most distinct sources an `any` source may see and still be tightened
    pub max_observed_sources: usize,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            frequent_deny_threshold: 5,
            max_deny_patterns: 5,
            consolidation_threshold: 3,
            max_observed_services: 5,
            max_observed_sources: 10,
        }
    }
}
