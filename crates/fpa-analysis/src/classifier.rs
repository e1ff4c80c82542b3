//! Rule classification pass
//!
//! Walks a snapshot in evaluation order and emits findings for risky
//! exposure, broad network definitions, unused rules, redundant and shadowed
//! pairs, and object definitions no rule references. The pass is pure over
//! the snapshot: it never mutates rules and is safe to run concurrently with
//! other passes.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use fpa_common::{Action, AnalysisConfig, Finding, FindingKind, ResolvedNet, Rule, Severity};

use crate::snapshot::{PolicySnapshot, ResolvedRule};

/// Produce findings for every rule in the snapshot
pub fn classify(snap: &PolicySnapshot, cfg: &AnalysisConfig) -> Vec<Finding> {
    let now = Utc::now();
    let mut findings = Vec::new();

    for (idx, (rule, resolved)) in snap.iter().enumerate() {
        check_exposure(rule, resolved, cfg, &mut findings);
        check_breadth(rule, resolved, cfg, &mut findings);
        check_usage(rule, resolved, cfg, now, &mut findings);
        check_prior_overlap(snap, idx, &mut findings);
    }

    check_object_usage(snap, &mut findings);

    debug!(
        rules = snap.len(),
        findings = findings.len(),
        "classification pass complete"
    );
    findings
}

fn is_broad(net: &ResolvedNet, cfg: &AnalysisConfig) -> bool {
    net.is_any() || net.is_broad_v4(cfg.broad_prefix_v4)
}

/// Graded exposure check on allow rules. At most one finding per rule; the
/// most severe applicable grade wins.
fn check_exposure(
    rule: &Rule,
    resolved: &ResolvedRule,
    cfg: &AnalysisConfig,
    out: &mut Vec<Finding>,
) {
    if rule.action != Action::Allow {
        return;
    }
    let src_any = resolved.source.is_any();
    let dst_any = resolved.destination.is_any();
    let svc_any = resolved.service.is_any();

    if src_any && dst_any && svc_any {
        out.push(
            Finding::new(
                FindingKind::HighRisk,
                Severity::Critical,
                format!(
                    "rule '{}' at position {} allows any source to any destination on any service",
                    rule.name, rule.position
                ),
                "restrict source and destination immediately; this rule allows open access",
            )
            .with_rule(rule.id)
            .with_excerpt(rule.excerpt()),
        );
        return;
    }

    // Explicit management services only; service-any rules are graded by the
    // any-source/any-destination branches instead.
    if !svc_any && is_broad(&resolved.source, cfg) {
        let exposed = cfg
            .management_ports
            .iter()
            .copied()
            .find(|port| resolved.service.covers_port(*port));
        if let Some(port) = exposed {
            out.push(
                Finding::new(
                    FindingKind::HighRisk,
                    Severity::Critical,
                    format!(
                        "rule '{}' at position {} opens management port {} to a broad source",
                        rule.name, rule.position, port
                    ),
                    "limit management access to dedicated administrative networks",
                )
                .with_rule(rule.id)
                .with_excerpt(rule.excerpt()),
            );
            return;
        }
    }

    if dst_any {
        out.push(
            Finding::new(
                FindingKind::HighRisk,
                Severity::High,
                format!(
                    "rule '{}' at position {} allows traffic to any destination",
                    rule.name, rule.position
                ),
                "scope the destination to specific networks",
            )
            .with_rule(rule.id)
            .with_excerpt(rule.excerpt()),
        );
        return;
    }

    if src_any {
        out.push(
            Finding::new(
                FindingKind::HighRisk,
                Severity::Medium,
                format!(
                    "rule '{}' at position {} accepts traffic from any source",
                    rule.name, rule.position
                ),
                "verify this service needs to be globally accessible",
            )
            .with_rule(rule.id)
            .with_excerpt(rule.excerpt()),
        );
    }
}

/// Supernet check: a defined (non-any) address set wider than the configured
/// prefix on either side
fn check_breadth(
    rule: &Rule,
    resolved: &ResolvedRule,
    cfg: &AnalysisConfig,
    out: &mut Vec<Finding>,
) {
    let sides = [
        ("source", &resolved.source),
        ("destination", &resolved.destination),
    ];
    for (side, net) in sides {
        if net.is_any() || !net.is_broad_v4(cfg.broad_prefix_v4) {
            continue;
        }
        out.push(
            Finding::new(
                FindingKind::Compliance,
                Severity::Medium,
                format!(
                    "broad network range in {} of rule '{}' at position {}",
                    side, rule.name, rule.position
                ),
                format!(
                    "ensure address ranges wider than /{} are intended",
                    cfg.broad_prefix_v4
                ),
            )
            .with_rule(rule.id)
            .with_excerpt(rule.excerpt()),
        );
    }
}

fn check_usage(
    rule: &Rule,
    resolved: &ResolvedRule,
    cfg: &AnalysisConfig,
    now: DateTime<Utc>,
    out: &mut Vec<Finding>,
) {
    let reason = if rule.hits == 0 {
        "zero hits recorded".to_string()
    } else {
        let days = match rule.last_hit {
            Some(last) => (now - last).num_days(),
            None => return,
        };
        if days <= cfg.retention_days {
            return;
        }
        format!("inactive for {} days", days)
    };

    let severity = if rule.action == Action::Allow && is_broad(&resolved.destination, cfg) {
        Severity::Medium
    } else {
        Severity::Low
    };
    out.push(
        Finding::new(
            FindingKind::Unused,
            severity,
            format!(
                "rule '{}' at position {}: {}",
                rule.name, rule.position, reason
            ),
            "consider removing or disabling this rule",
        )
        .with_rule(rule.id)
        .with_excerpt(rule.excerpt()),
    );
}

/// Pairwise redundancy/shadowing against earlier rules in the same ACL.
/// The first earlier rule that covers this one decides the finding; later
/// covers are unreachable under first-match evaluation.
fn check_prior_overlap(snap: &PolicySnapshot, idx: usize, out: &mut Vec<Finding>) {
    let rule = snap.rule(idx);
    let resolved = snap.resolved(idx);

    for prior_idx in 0..idx {
        let prior = snap.rule(prior_idx);
        if prior.name != rule.name {
            continue;
        }
        let prior_res = snap.resolved(prior_idx);

        let equal = prior_res.source.equals(&resolved.source)
            && prior_res.destination.equals(&resolved.destination)
            && prior_res.service.equals(&resolved.service);
        if equal && prior.action == rule.action {
            debug!(rule = %rule.id, prior = %prior.id, "redundant pair");
            out.push(
                Finding::new(
                    FindingKind::Redundant,
                    Severity::Low,
                    format!(
                        "rule '{}' at position {} duplicates the rule at position {}",
                        rule.name, rule.position, prior.position
                    ),
                    "remove this rule; it provides no additional access control",
                )
                .with_rule(rule.id)
                .with_excerpt(rule.excerpt()),
            );
            return;
        }

        let covered = prior_res.source.contains(&resolved.source)
            && prior_res.destination.contains(&resolved.destination)
            && prior_res.service.contains(&resolved.service);
        if covered {
            let (severity, recommendation) = if prior.action != rule.action {
                (
                    Severity::High,
                    "reorder the rules; this rule can never take effect",
                )
            } else {
                (
                    Severity::Medium,
                    "remove or reorder this rule; an earlier rule already covers it",
                )
            };
            debug!(rule = %rule.id, prior = %prior.id, "shadowed pair");
            out.push(
                Finding::new(
                    FindingKind::Shadowed,
                    severity,
                    format!(
                        "rule '{}' at position {} is shadowed by the rule at position {}",
                        rule.name, rule.position, prior.position
                    ),
                    recommendation,
                )
                .with_rule(rule.id)
                .with_excerpt(rule.excerpt()),
            );
            return;
        }
    }
}

/// Objects (including group members, transitively) referenced by no rule
fn check_object_usage(snap: &PolicySnapshot, out: &mut Vec<Finding>) {
    if snap.objects().is_empty() {
        return;
    }
    let mut roots = BTreeSet::new();
    for rule in snap.rules() {
        rule.source.collect_object_refs(&mut roots);
        rule.destination.collect_object_refs(&mut roots);
        rule.service.collect_object_refs(&mut roots);
    }
    let reached = snap.objects().closure_of(&roots);

    let mut unreferenced: Vec<&str> = snap
        .objects()
        .names()
        .filter(|name| !reached.contains(*name))
        .collect();
    unreferenced.sort_unstable();

    for name in unreferenced {
        out.push(Finding::new(
            FindingKind::Optimization,
            Severity::Low,
            format!("object '{}' is not referenced by any rule", name),
            "remove the unused object definition",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use fpa_common::{parse_net, parse_svc, FwObject, ObjectTable};
    use uuid::Uuid;

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
        .with_hits(1)
    }

    fn snapshot(rules: Vec<Rule>) -> PolicySnapshot {
        let device = rules[0].device;
        PolicySnapshot::from_rules(device, rules, ObjectTable::new()).unwrap()
    }

    fn of_kind(findings: &[Finding], kind: FindingKind) -> Vec<&Finding> {
        findings.iter().filter(|f| f.kind == kind).collect()
    }

    #[test]
    fn test_any_any_allow_is_critical() {
        let device = Uuid::new_v4();
        let snap = snapshot(vec![rule(device, 1, "any", "any", "ip", Action::Allow)]);
        let findings = classify(&snap, &AnalysisConfig::default());
        let risky = of_kind(&findings, FindingKind::HighRisk);
        assert_eq!(risky.len(), 1);
        assert_eq!(risky[0].severity, Severity::Critical);
    }

    #[test]
    fn test_deny_rules_skip_exposure_checks() {
        let device = Uuid::new_v4();
        let snap = snapshot(vec![rule(device, 1, "any", "any", "ip", Action::Deny)]);
        let findings = classify(&snap, &AnalysisConfig::default());
        assert!(of_kind(&findings, FindingKind::HighRisk).is_empty());
    }

    #[test]
    fn test_management_port_to_broad_source_is_critical() {
        let device = Uuid::new_v4();
        let snap = snapshot(vec![rule(
            device,
            1,
            "any",
            "host 10.0.0.5",
            "tcp/3389",
            Action::Allow,
        )]);
        let findings = classify(&snap, &AnalysisConfig::default());
        let risky = of_kind(&findings, FindingKind::HighRisk);
        assert_eq!(risky.len(), 1);
        assert_eq!(risky[0].severity, Severity::Critical);
        assert!(risky[0].message.contains("3389"));
    }

    #[test]
    fn test_destination_any_grades_high() {
        let device = Uuid::new_v4();
        let snap = snapshot(vec![rule(
            device,
            1,
            "host 10.0.0.5",
            "any",
            "tcp/443",
            Action::Allow,
        )]);
        let findings = classify(&snap, &AnalysisConfig::default());
        let risky = of_kind(&findings, FindingKind::HighRisk);
        assert_eq!(risky.len(), 1);
        assert_eq!(risky[0].severity, Severity::High);
    }

    #[test]
    fn test_source_any_grades_medium() {
        let device = Uuid::new_v4();
        let snap = snapshot(vec![rule(
            device,
            1,
            "any",
            "host 10.0.0.5",
            "tcp/443",
            Action::Allow,
        )]);
        let findings = classify(&snap, &AnalysisConfig::default());
        let risky = of_kind(&findings, FindingKind::HighRisk);
        assert_eq!(risky.len(), 1);
        assert_eq!(risky[0].severity, Severity::Medium);
    }

    #[test]
    fn test_supernet_flags_each_broad_side() {
        let device = Uuid::new_v4();
        let snap = snapshot(vec![rule(
            device,
            1,
            "10.0.0.0/8",
            "172.16.0.0/12",
            "tcp/443",
            Action::Allow,
        )]);
        let findings = classify(&snap, &AnalysisConfig::default());
        let broad = of_kind(&findings, FindingKind::Compliance);
        assert_eq!(broad.len(), 2);
        assert!(broad.iter().all(|f| f.severity == Severity::Medium));
    }

    #[test]
    fn test_narrow_networks_pass_supernet_check() {
        let device = Uuid::new_v4();
        let snap = snapshot(vec![rule(
            device,
            1,
            "10.1.2.0/24",
            "host 10.0.0.5",
            "tcp/443",
            Action::Allow,
        )]);
        let findings = classify(&snap, &AnalysisConfig::default());
        assert!(of_kind(&findings, FindingKind::Compliance).is_empty());
    }

    #[test]
    fn test_zero_hits_is_unused_low() {
        let device = Uuid::new_v4();
        let mut r = rule(device, 1, "10.1.2.0/24", "host 10.0.0.5", "tcp/443", Action::Deny);
        r.hits = 0;
        let snap = snapshot(vec![r]);
        let findings = classify(&snap, &AnalysisConfig::default());
        let unused = of_kind(&findings, FindingKind::Unused);
        assert_eq!(unused.len(), 1);
        assert_eq!(unused[0].severity, Severity::Low);
        assert!(unused[0].message.contains("zero hits"));
    }

    #[test]
    fn test_unused_broad_destination_allow_escalates() {
        let device = Uuid::new_v4();
        let mut r = rule(device, 1, "host 10.0.0.5", "any", "tcp/443", Action::Allow);
        r.hits = 0;
        let snap = snapshot(vec![r]);
        let findings = classify(&snap, &AnalysisConfig::default());
        let unused = of_kind(&findings, FindingKind::Unused);
        assert_eq!(unused.len(), 1);
        assert_eq!(unused[0].severity, Severity::Medium);
    }

    #[test]
    fn test_stale_rule_is_unused() {
        let device = Uuid::new_v4();
        let r = rule(device, 1, "10.1.2.0/24", "host 10.0.0.5", "tcp/443", Action::Deny)
            .with_hits(50)
            .with_last_hit(Utc::now() - Duration::days(45));
        let snap = snapshot(vec![r]);
        let findings = classify(&snap, &AnalysisConfig::default());
        let unused = of_kind(&findings, FindingKind::Unused);
        assert_eq!(unused.len(), 1);
        assert!(unused[0].message.contains("inactive for 45 days"));
    }

    #[test]
    fn test_recently_hit_rule_is_not_unused() {
        let device = Uuid::new_v4();
        let r = rule(device, 1, "10.1.2.0/24", "host 10.0.0.5", "tcp/443", Action::Deny)
            .with_hits(50)
            .with_last_hit(Utc::now() - Duration::days(3));
        let snap = snapshot(vec![r]);
        let findings = classify(&snap, &AnalysisConfig::default());
        assert!(of_kind(&findings, FindingKind::Unused).is_empty());
    }

    #[test]
    fn test_duplicate_pair_flags_later_rule_once() {
        let device = Uuid::new_v4();
        let first = rule(device, 1, "any", "host 10.0.0.5", "tcp/443", Action::Allow);
        let second = rule(device, 2, "any", "host 10.0.0.5", "tcp/443", Action::Allow);
        let second_id = second.id;
        let snap = snapshot(vec![first, second]);
        let findings = classify(&snap, &AnalysisConfig::default());
        let redundant = of_kind(&findings, FindingKind::Redundant);
        assert_eq!(redundant.len(), 1);
        assert_eq!(redundant[0].rule, Some(second_id));
        assert!(of_kind(&findings, FindingKind::Shadowed).is_empty());
    }

    #[test]
    fn test_shadow_with_differing_action_is_high() {
        let device = Uuid::new_v4();
        let blocker = rule(device, 1, "any", "host 10.0.0.5", "ip", Action::Deny);
        let masked = rule(device, 2, "10.0.0.0/8", "host 10.0.0.5", "tcp/80", Action::Allow);
        let masked_id = masked.id;
        let snap = snapshot(vec![blocker, masked]);
        let findings = classify(&snap, &AnalysisConfig::default());
        let shadowed = of_kind(&findings, FindingKind::Shadowed);
        assert_eq!(shadowed.len(), 1);
        assert_eq!(shadowed[0].severity, Severity::High);
        assert_eq!(shadowed[0].rule, Some(masked_id));
    }

    #[test]
    fn test_specific_before_general_is_clean() {
        let device = Uuid::new_v4();
        let snap = snapshot(vec![
            rule(device, 1, "any", "host 10.0.0.5", "tcp/443", Action::Allow),
            rule(device, 2, "any", "host 10.0.0.5", "ip", Action::Allow),
        ]);
        let findings = classify(&snap, &AnalysisConfig::default());
        assert!(of_kind(&findings, FindingKind::Shadowed).is_empty());
        assert!(of_kind(&findings, FindingKind::Redundant).is_empty());
    }

    #[test]
    fn test_general_before_specific_shadows_medium() {
        let device = Uuid::new_v4();
        let general = rule(device, 1, "any", "host 10.0.0.5", "ip", Action::Allow);
        let specific = rule(device, 2, "any", "host 10.0.0.5", "tcp/443", Action::Allow);
        let specific_id = specific.id;
        let snap = snapshot(vec![general, specific]);
        let findings = classify(&snap, &AnalysisConfig::default());
        let shadowed = of_kind(&findings, FindingKind::Shadowed);
        assert_eq!(shadowed.len(), 1);
        assert_eq!(shadowed[0].severity, Severity::Medium);
        assert_eq!(shadowed[0].rule, Some(specific_id));
    }

    #[test]
    fn test_pairwise_checks_stay_within_acl() {
        let device = Uuid::new_v4();
        let first = rule(device, 1, "any", "host 10.0.0.5", "tcp/443", Action::Allow);
        let mut second = rule(device, 2, "any", "host 10.0.0.5", "tcp/443", Action::Allow);
        second.name = "DMZ-IN".to_string();
        let snap = snapshot(vec![first, second]);
        let findings = classify(&snap, &AnalysisConfig::default());
        assert!(of_kind(&findings, FindingKind::Redundant).is_empty());
        assert!(of_kind(&findings, FindingKind::Shadowed).is_empty());
    }

    #[test]
    fn test_unreferenced_objects_flagged() {
        let device = Uuid::new_v4();
        let objects = ObjectTable::from_objects(vec![
            FwObject::network("DMZ", parse_net("192.168.100.0/24").unwrap()),
            FwObject::network("LEGACY_NET", parse_net("192.168.200.0/24").unwrap()),
            FwObject::group("DMZ_GROUP", vec!["DMZ".to_string()]),
        ]);
        let mut r = rule(device, 1, "any", "host 10.0.0.5", "tcp/443", Action::Allow);
        r.destination = fpa_common::NetPredicate::Object("DMZ_GROUP".to_string());
        let snap = PolicySnapshot::from_rules(device, vec![r], objects).unwrap();
        let findings = classify(&snap, &AnalysisConfig::default());
        let unused_objects = of_kind(&findings, FindingKind::Optimization);
        assert_eq!(unused_objects.len(), 1);
        assert!(unused_objects[0].message.contains("LEGACY_NET"));
    }
}
