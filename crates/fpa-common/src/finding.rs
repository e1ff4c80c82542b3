//! Findings and analysis results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Weighted severity of a finding
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Immediate exposure, dominates the risk score
    Critical,
    /// Serious problem, usually a masked or contradicted intent
    High,
    /// Hygiene problem worth scheduled cleanup
    Medium,
    /// Cosmetic or housekeeping
    Low,
}

impl Severity {
    /// Deduction applied to the risk score per finding
    pub fn weight(&self) -> u32 {
        match self {
            Severity::Critical => 25,
            Severity::High => 10,
            Severity::Medium => 5,
            Severity::Low => 1,
        }
    }

    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification a finding belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Rule never matches traffic, or has not for longer than the retention
    /// window
    Unused,
    /// Exact duplicate of an earlier rule with the same action
    Redundant,
    /// Fully covered by an earlier rule; this rule can never fire
    Shadowed,
    /// Overly permissive allow
    HighRisk,
    /// Housekeeping opportunity (unreferenced objects and the like)
    Optimization,
    /// Policy hygiene violation (broad networks and the like)
    Compliance,
}

impl FindingKind {
    /// snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::Unused => "unused",
            FindingKind::Redundant => "redundant",
            FindingKind::Shadowed => "shadowed",
            FindingKind::HighRisk => "high_risk",
            FindingKind::Optimization => "optimization",
            FindingKind::Compliance => "compliance",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable observation produced by a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Classification
    pub kind: FindingKind,
    /// Severity used for scoring
    pub severity: Severity,
    /// Rule the finding is about, when it is about one rule
    pub rule: Option<Uuid>,
    /// Human-readable statement of the problem
    pub message: String,
    /// Suggested remediation
    pub recommendation: String,
    /// Configuration line being flagged
    pub rule_excerpt: Option<String>,
}

impl Finding {
    /// New finding without a rule reference
    pub fn new(
        kind: FindingKind,
        severity: Severity,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            rule: None,
            message: message.into(),
            recommendation: recommendation.into(),
            rule_excerpt: None,
        }
    }

    /// Attach the rule the finding refers to
    pub fn with_rule(mut self, rule: Uuid) -> Self {
        self.rule = Some(rule);
        self
    }

    /// Attach the flagged configuration line
    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.rule_excerpt = Some(excerpt.into());
        self
    }
}

/// Criteria for narrowing a finding list; empty filter matches everything
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindingFilter {
    /// Keep findings of this kind
    pub kind: Option<FindingKind>,
    /// Keep findings of this severity
    pub severity: Option<Severity>,
    /// Keep findings about this rule
    pub rule: Option<Uuid>,
}

impl FindingFilter {
    /// True when the finding satisfies every set criterion
    pub fn matches(&self, finding: &Finding) -> bool {
        if let Some(kind) = self.kind {
            if finding.kind != kind {
                return false;
            }
        }
        if let Some(severity) = self.severity {
            if finding.severity != severity {
                return false;
            }
        }
        if let Some(rule) = self.rule {
            if finding.rule != Some(rule) {
                return false;
            }
        }
        true
    }
}

/// Qualitative band for a risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    /// Score 90 and above
    Excellent,
    /// Score 70 to 89
    Good,
    /// Score 50 to 69
    Fair,
    /// Score below 50
    Critical,
}

impl RiskTier {
    /// Band for a clamped score
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => RiskTier::Excellent,
            70..=89 => RiskTier::Good,
            50..=69 => RiskTier::Fair,
            _ => RiskTier::Critical,
        }
    }

    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Excellent => "excellent",
            RiskTier::Good => "good",
            RiskTier::Fair => "fair",
            RiskTier::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate counters for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Rules examined
    pub total_rules: usize,
    /// Findings produced
    pub total_findings: usize,
    /// Rules flagged unused
    pub unused: usize,
    /// Rules flagged redundant
    pub redundant: usize,
    /// Rules flagged shadowed
    pub shadowed: usize,
    /// High-risk findings
    pub high_risk: usize,
    /// Clamped risk score, 0 to 100
    pub score: u8,
    /// Band the score falls in
    pub tier: RiskTier,
}

impl AnalysisSummary {
    /// Bucket findings by kind and attach the score
    pub fn from_findings(total_rules: usize, findings: &[Finding], score: u8) -> Self {
        let mut unused = 0;
        let mut redundant = 0;
        let mut shadowed = 0;
        let mut high_risk = 0;
        for finding in findings {
            match finding.kind {
                FindingKind::Unused => unused += 1,
                FindingKind::Redundant => redundant += 1,
                FindingKind::Shadowed => shadowed += 1,
                FindingKind::HighRisk => high_risk += 1,
                _ => {}
            }
        }
        Self {
            total_rules,
            total_findings: findings.len(),
            unused,
            redundant,
            shadowed,
            high_risk,
            score,
            tier: RiskTier::from_score(score),
        }
    }
}

/// Result of one analysis run; prior runs are retained for history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Run identifier
    pub id: Uuid,
    /// Device analyzed
    pub device: Uuid,
    /// When the run happened
    pub timestamp: DateTime<Utc>,
    /// Findings in rule-position order
    pub findings: Vec<Finding>,
    /// Aggregate counters and score
    pub summary: AnalysisSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_weights() {
        assert_eq!(Severity::Critical.weight(), 25);
        assert_eq!(Severity::High.weight(), 10);
        assert_eq!(Severity::Medium.weight(), 5);
        assert_eq!(Severity::Low.weight(), 1);
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(RiskTier::from_score(100), RiskTier::Excellent);
        assert_eq!(RiskTier::from_score(90), RiskTier::Excellent);
        assert_eq!(RiskTier::from_score(89), RiskTier::Good);
        assert_eq!(RiskTier::from_score(70), RiskTier::Good);
        assert_eq!(RiskTier::from_score(69), RiskTier::Fair);
        assert_eq!(RiskTier::from_score(50), RiskTier::Fair);
        assert_eq!(RiskTier::from_score(49), RiskTier::Critical);
        assert_eq!(RiskTier::from_score(0), RiskTier::Critical);
    }

    #[test]
    fn test_filter() {
        let rule = Uuid::new_v4();
        let finding = Finding::new(
            FindingKind::Shadowed,
            Severity::High,
            "covered by an earlier rule",
            "reorder or remove",
        )
        .with_rule(rule);

        assert!(FindingFilter::default().matches(&finding));
        assert!(FindingFilter {
            kind: Some(FindingKind::Shadowed),
            ..Default::default()
        }
        .matches(&finding));
        assert!(!FindingFilter {
            kind: Some(FindingKind::Unused),
            ..Default::default()
        }
        .matches(&finding));
        assert!(FindingFilter {
            severity: Some(Severity::High),
            rule: Some(rule),
            ..Default::default()
        }
        .matches(&finding));
        assert!(!FindingFilter {
            rule: Some(Uuid::new_v4()),
            ..Default::default()
        }
        .matches(&finding));
    }

    #[test]
    fn test_summary_buckets() {
        let findings = vec![
            Finding::new(FindingKind::Unused, Severity::Low, "a", "b"),
            Finding::new(FindingKind::Unused, Severity::Low, "c", "d"),
            Finding::new(FindingKind::Shadowed, Severity::High, "e", "f"),
            Finding::new(FindingKind::Compliance, Severity::Medium, "g", "h"),
        ];
        let summary = AnalysisSummary::from_findings(10, &findings, 83);
        assert_eq!(summary.total_rules, 10);
        assert_eq!(summary.total_findings, 4);
        assert_eq!(summary.unused, 2);
        assert_eq!(summary.shadowed, 1);
        assert_eq!(summary.redundant, 0);
        assert_eq!(summary.tier, RiskTier::Good);
    }
}
