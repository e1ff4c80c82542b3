//! Usage-driven tuning advice
//!
//! Derives advisory changes from one batch of associated traffic. Advice is
//! emitted in rule position order, then denied-pattern order, so repeated
//! runs over the same batch produce identical output. Nothing here mutates
//! the rule set; every proposal ships as vendor command text for review.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};

use fpa_analysis::PolicySnapshot;
use fpa_common::{
    Action, PortSpan, Protocol, Recommendation, RecommendationKind, ResolvedSvc, Rule, RuleUsage,
    Severity, SvcItem, TunerConfig,
};

use crate::associate::Association;

/// Derive tuning advice from one associated batch
pub fn recommend(
    snap: &PolicySnapshot,
    assoc: &Association,
    cfg: &TunerConfig,
) -> Vec<Recommendation> {
    let mut out = Vec::new();
    for (rule, resolved) in snap.iter() {
        let usage = match assoc.per_rule.get(&rule.id) {
            Some(usage) => usage,
            None => continue,
        };
        let any_src = resolved.source.is_any();
        let any_dst = resolved.destination.is_any();
        if rule.action == Action::Allow && (any_src || any_dst) {
            over_permissive(rule, &resolved.service, usage, cfg, &mut out);
            if any_src {
                tighten_scope(rule, usage, cfg, &mut out);
            }
        }
        consolidation(rule, usage, cfg, &mut out);
    }
    frequent_denies(snap, assoc, cfg, &mut out);
    out
}

/// A broad allow rule whose observed traffic fits a strictly narrower
/// service set can be split into per-service rules plus a deny remainder.
fn over_permissive(
    rule: &Rule,
    allowed: &ResolvedSvc,
    usage: &RuleUsage,
    cfg: &TunerConfig,
    out: &mut Vec<Recommendation>,
) {
    if usage.services.is_empty() || usage.services.len() > cfg.max_observed_services {
        return;
    }
    let observed = observed_services(usage);
    if !allowed.contains(&observed) || allowed.equals(&observed) {
        return;
    }

    let mut commands = Vec::new();
    for key in &usage.services {
        let (proto, port) = match split_service_key(key) {
            Some(parts) => parts,
            None => continue,
        };
        let eq = match port {
            Some(p) => format!(" eq {}", p),
            None => String::new(),
        };
        commands.push(format!(
            "access-list {} line 1 extended permit {} {} {}{}",
            rule.name, proto, rule.source, rule.destination, eq
        ));
    }
    commands.push(format!(
        "access-list {} extended deny {} {} {}",
        rule.name, rule.service, rule.source, rule.destination
    ));
    commands.push(format!("no {}", rule.excerpt()));

    let keys: Vec<&str> = usage.services.iter().map(|s| s.as_str()).collect();
    out.push(Recommendation {
        kind: RecommendationKind::OverPermissive,
        severity: Severity::Medium,
        rule: Some(rule.id),
        rule_name: Some(rule.name.clone()),
        description: format!(
            "rule '{}' at position {} allows {} but observed traffic uses only: {}",
            rule.name,
            rule.position,
            rule.service,
            keys.join(", ")
        ),
        suggestion: "split into rules for the observed services and deny the remainder"
            .to_string(),
        commands,
    });
}

/// An `any` source that only ever sees a handful of hosts can be replaced
/// with a network group of those hosts.
fn tighten_scope(rule: &Rule, usage: &RuleUsage, cfg: &TunerConfig, out: &mut Vec<Recommendation>) {
    if usage.sources.is_empty() || usage.sources.len() > cfg.max_observed_sources {
        return;
    }
    let group = format!("OG_TIGHTEN_{}", &rule.id.simple().to_string()[..8]);

    let mut commands = vec![format!("object-group network {}", group)];
    for src in &usage.sources {
        commands.push(format!(" network-object host {}", src));
    }
    commands.push("exit".to_string());
    commands.push(format!(
        "access-list {} line 1 extended permit {} object-group {} {}",
        rule.name, rule.service, group, rule.destination
    ));

    let shown: Vec<String> = usage.sources.iter().take(5).map(|s| s.to_string()).collect();
    let listed = if usage.sources.len() > shown.len() {
        format!("{} and {} more", shown.join(", "), usage.sources.len() - shown.len())
    } else {
        shown.join(", ")
    };
    out.push(Recommendation {
        kind: RecommendationKind::TightenScope,
        severity: Severity::Medium,
        rule: Some(rule.id),
        rule_name: Some(rule.name.clone()),
        description: format!(
            "rule '{}' accepts any source but traffic arrives from only {} hosts: {}",
            rule.name,
            usage.sources.len(),
            listed
        ),
        suggestion: "replace the any source with a group of the observed hosts, placed above the broad rule".to_string(),
        commands,
    });
}

/// Several observed sources inside one /24 suggest a network object.
fn consolidation(rule: &Rule, usage: &RuleUsage, cfg: &TunerConfig, out: &mut Vec<Recommendation>) {
    if usage.sources.len() < cfg.consolidation_threshold {
        return;
    }
    let mut subnets: BTreeMap<u32, u64> = BTreeMap::new();
    for src in &usage.sources {
        if let IpAddr::V4(v4) = src {
            *subnets.entry(u32::from(*v4) & 0xffff_ff00).or_insert(0) += 1;
        }
    }
    for (net, count) in subnets {
        if (count as usize) < cfg.consolidation_threshold {
            continue;
        }
        let base = Ipv4Addr::from(net);
        let o = base.octets();
        let group = format!("OG_NET_{}_{}_{}_{}_24", o[0], o[1], o[2], o[3]);
        let commands = vec![
            format!("object-group network {}", group),
            format!(" network-object {} 255.255.255.0", base),
            "exit".to_string(),
            format!(
                "access-list {} line 1 extended {} {} object-group {} {}",
                rule.name, rule.action, rule.service, group, rule.destination
            ),
        ];
        out.push(Recommendation {
            kind: RecommendationKind::Consolidation,
            severity: Severity::Low,
            rule: Some(rule.id),
            rule_name: Some(rule.name.clone()),
            description: format!(
                "{} distinct sources hitting rule '{}' sit inside {}/24",
                count, rule.name, base
            ),
            suggestion: "group the subnet into a network object and use it as the rule source"
                .to_string(),
            commands,
        });
    }
}

/// A tuple denied over and over is a candidate allow, flagged for review
/// rather than silently proposed into the permit path.
fn frequent_denies(
    snap: &PolicySnapshot,
    assoc: &Association,
    cfg: &TunerConfig,
    out: &mut Vec<Recommendation>,
) {
    let acl = snap
        .rules()
        .first()
        .map(|r| r.name.clone())
        .unwrap_or_else(|| "OUTSIDE-IN".to_string());
    for (key, count) in assoc.denied_patterns.iter().take(cfg.max_deny_patterns) {
        if *count <= cfg.frequent_deny_threshold {
            continue;
        }
        let eq = match key.port {
            Some(p) => format!(" eq {}", p),
            None => String::new(),
        };
        out.push(Recommendation {
            kind: RecommendationKind::FrequentDeny,
            severity: Severity::Low,
            rule: None,
            rule_name: None,
            description: format!(
                "traffic from {} to {} on {}/{} was denied {} times",
                key.src,
                key.dst,
                key.proto,
                key.port.unwrap_or(0),
                count
            ),
            suggestion: "verify whether this flow is legitimate; if so add an explicit allow"
                .to_string(),
            commands: vec![format!(
                "access-list {} line 1 extended permit {} host {} host {}{}",
                acl, key.proto, key.src, key.dst, eq
            )],
        });
    }
}

fn observed_services(usage: &RuleUsage) -> ResolvedSvc {
    let mut items = Vec::new();
    for key in &usage.services {
        if let Some((proto, port)) = split_service_key(key) {
            items.push(SvcItem {
                proto,
                ports: port.map(PortSpan::single),
            });
        }
    }
    ResolvedSvc::from_items(items)
}

/// Split a `proto/port` usage key; port 0 stands for "no port recorded".
fn split_service_key(key: &str) -> Option<(Protocol, Option<u16>)> {
    let (proto_tok, port_tok) = key.split_once('/')?;
    let proto =
        Protocol::parse(proto_tok).unwrap_or_else(|| Protocol::Other(proto_tok.to_string()));
    let port: u16 = port_tok.parse().ok()?;
    Some((proto, if port == 0 { None } else { Some(port) }))
}
