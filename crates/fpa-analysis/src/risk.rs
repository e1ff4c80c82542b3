//! Severity-weighted risk scoring
//!
//! A pure function of the finding multiset: start from 100 and subtract the
//! severity weight of every finding, clamping at zero. Tiering is display
//! sugar over the score.

use fpa_common::{Finding, RiskTier};

/// Aggregate risk score in [0, 100]
pub fn score(findings: &[Finding]) -> u8 {
    let penalty: u32 = findings.iter().map(|f| f.severity.weight()).sum();
    100u32.saturating_sub(penalty) as u8
}

/// Display tier for a score
pub fn tier(score: u8) -> RiskTier {
    RiskTier::from_score(score)
}
