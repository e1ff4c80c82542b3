//! Run-scoped immutable view of one device's rules
//!
//! Every analysis pass and every traffic association runs against a
//! `PolicySnapshot`: the rule list in evaluation order plus each rule's
//! predicates already resolved through the object table. Resolution happens
//! once here; an unusable object graph fails construction, so no pass ever
//! starts on a half-resolved rule set.

use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use fpa_common::{FpaResult, ObjectTable, ResolvedNet, ResolvedSvc, Rule};

/// A rule's three predicates in normalized set form
#[derive(Debug, Clone)]
pub struct ResolvedRule {
    /// Resolved source set
    pub source: ResolvedNet,
    /// Resolved destination set
    pub destination: ResolvedNet,
    /// Resolved service set
    pub service: ResolvedSvc,
}

/// Immutable arena consumed by the matcher, classifier, merger, and tuner
#[derive(Debug)]
pub struct PolicySnapshot {
    device: Uuid,
    rules: Arc<Vec<Rule>>,
    resolved: Vec<ResolvedRule>,
    objects: Arc<ObjectTable>,
    by_hash: HashMap<String, usize>,
}

impl PolicySnapshot {
    /// Resolve every rule against the table and freeze the result.
    ///
    /// Callers usually hand a position-sorted list; the order is restored
    /// here if they did not.
    pub fn build(
        device: Uuid,
        rules: Arc<Vec<Rule>>,
        objects: Arc<ObjectTable>,
    ) -> FpaResult<Self> {
        let sorted = rules.windows(2).all(|w| w[0].position <= w[1].position);
        let rules = if sorted {
            rules
        } else {
            let mut owned = rules.as_ref().clone();
            owned.sort_by_key(|r| r.position);
            Arc::new(owned)
        };

        let mut resolved = Vec::with_capacity(rules.len());
        for rule in rules.iter() {
            resolved.push(ResolvedRule {
                source: objects.resolve_net(&rule.source)?,
                destination: objects.resolve_net(&rule.destination)?,
                service: objects.resolve_svc(&rule.service)?,
            });
        }

        let mut by_hash = HashMap::new();
        for (idx, rule) in rules.iter().enumerate() {
            if let Some(hash) = &rule.hash {
                by_hash.entry(hash.clone()).or_insert(idx);
            }
        }

        Ok(Self {
            device,
            rules,
            resolved,
            objects,
            by_hash,
        })
    }

    /// Build from owned parts; convenience for tests and direct callers
    pub fn from_rules(device: Uuid, rules: Vec<Rule>, objects: ObjectTable) -> FpaResult<Self> {
        Self::build(device, Arc::new(rules), Arc::new(objects))
    }

    /// Device the snapshot belongs to
    pub fn device(&self) -> Uuid {
        self.device
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when the snapshot holds no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in evaluation order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rule at an evaluation index
    pub fn rule(&self, idx: usize) -> &Rule {
        &self.rules[idx]
    }

    /// Resolved predicates for the rule at an evaluation index
    pub fn resolved(&self, idx: usize) -> &ResolvedRule {
        &self.resolved[idx]
    }

    /// Object table the snapshot was resolved against
    pub fn objects(&self) -> &ObjectTable {
        &self.objects
    }

    /// Evaluation index of the rule carrying a vendor hash
    pub fn index_of_hash(&self, hash: &str) -> Option<usize> {
        self.by_hash.get(hash).copied()
    }

    /// Rules paired with their resolved predicates, in evaluation order
    pub fn iter(&self) -> impl Iterator<Item = (&Rule, &ResolvedRule)> {
        self.rules.iter().zip(self.resolved.iter())
    }
}
