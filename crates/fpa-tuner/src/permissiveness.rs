//! Rule breadth ranking
//!
//! Scores every allow rule by how much of the traffic space it admits,
//! independent of observed usage. The ranking answers "which rules would
//! hurt most if abused" and is meant to be read top-down.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fpa_analysis::PolicySnapshot;
use fpa_common::Action;

/// Breadth band for one rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissivenessLevel {
    /// Fully scoped in every dimension
    Low,
    /// Broad in one dimension
    Medium,
    /// Broad in two dimensions
    High,
    /// Effectively unrestricted
    Critical,
}

/// How broadly one allow rule is scoped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permissiveness {
    /// Rule being scored
    pub rule: Uuid,
    /// ACL label of that rule
    pub rule_name: String,
    /// 0 (fully scoped) to 100 (open in every dimension)
    pub score: u8,
    /// Band the score falls in
    pub level: PermissivenessLevel,
    /// Which dimensions are open
    pub reasons: Vec<String>,
}

/// Score every allow rule's breadth, widest first
///
/// Weights favor the source dimension: an open source admits unknown peers,
/// an open destination leaks reach, an open service widens an already
/// admitted path. A rule open in all three gets a bonus that pins it to the
/// top of the ranking.
pub fn rank(snap: &PolicySnapshot) -> Vec<Permissiveness> {
    let mut out = Vec::new();
    for (rule, resolved) in snap.iter() {
        if rule.action != Action::Allow {
            continue;
        }
        let mut score = 0u8;
        let mut reasons = Vec::new();
        if resolved.source.is_any() {
            score += 40;
            reasons.push("source is any".to_string());
        }
        if resolved.destination.is_any() {
            score += 30;
            reasons.push("destination is any".to_string());
        }
        if resolved.service.is_any() {
            score += 20;
            reasons.push("service is any".to_string());
        }
        if score == 90 {
            score = 100;
            reasons.push("open in every dimension".to_string());
        }
        out.push(Permissiveness {
            rule: rule.id,
            rule_name: rule.name.clone(),
            score,
            level: level_for(score),
            reasons,
        });
    }
    out.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.rule_name.cmp(&b.rule_name))
            .then_with(|| a.rule.cmp(&b.rule))
    });
    out
}

/// The Medium band starts at the lightest single open dimension (service,
/// weight 20), so any one `any` lands in Medium and Low is reserved for
/// fully scoped rules.
fn level_for(score: u8) -> PermissivenessLevel {
    if score >= 90 {
        PermissivenessLevel::Critical
    } else if score >= 60 {
        PermissivenessLevel::High
    } else if score >= 20 {
        PermissivenessLevel::Medium
    } else {
        PermissivenessLevel::Low
    }
}
