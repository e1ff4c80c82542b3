//! Unified-context generation
//!
//! Pure builder: two passes over the input contexts produce one new
//! [`MigrationContext`]. Pass one decides every object's final name and
//! fails on any collision; pass two emits objects and rules with references
//! rewritten. Nothing is emitted on failure, so the inputs are always left
//! exactly as given.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use fpa_common::{FpaError, FpaResult, FwObject, NetPredicate, ObjectDef, Rule, SvcPredicate};

use crate::conflicts::{object_instances, same_definition};
use crate::{renamed_in, MigrationContext};

/// How conflicting object names are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStrategy {
    /// Suffix each conflicting instance with its origin context name
    AutoRenameContext,
}

impl MigrationStrategy {
    /// Parse the wire spelling of a strategy
    pub fn parse(token: &str) -> FpaResult<Self> {
        match token.trim() {
            "auto_rename_context" => Ok(MigrationStrategy::AutoRenameContext),
            other => Err(FpaError::UnknownStrategy(other.to_string())),
        }
    }

    /// Wire spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStrategy::AutoRenameContext => "auto_rename_context",
        }
    }
}

impl fmt::Display for MigrationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn rewrite_net(pred: &NetPredicate, renames: &HashMap<String, String>) -> NetPredicate {
    match pred {
        NetPredicate::Object(name) => NetPredicate::Object(
            renames.get(name).cloned().unwrap_or_else(|| name.clone()),
        ),
        NetPredicate::List(items) => NetPredicate::List(
            items.iter().map(|item| rewrite_net(item, renames)).collect(),
        ),
        other => other.clone(),
    }
}

fn rewrite_svc(pred: &SvcPredicate, renames: &HashMap<String, String>) -> SvcPredicate {
    match pred {
        SvcPredicate::Object(name) => SvcPredicate::Object(
            renames.get(name).cloned().unwrap_or_else(|| name.clone()),
        ),
        SvcPredicate::List(items) => SvcPredicate::List(
            items.iter().map(|item| rewrite_svc(item, renames)).collect(),
        ),
        other => other.clone(),
    }
}

fn rewrite_members(members: &[String], renames: &HashMap<String, String>) -> Vec<String> {
    members
        .iter()
        .map(|name| renames.get(name).cloned().unwrap_or_else(|| name.clone()))
        .collect()
}

/// Combine contexts into one unified context named `target`.
///
/// Identical definitions of a shared name fold into one object; differing
/// definitions are renamed per `strategy`, and every rule and group-member
/// reference follows the rename of its origin context. Rules concatenate in
/// input order, each context's relative order preserved, positions
/// renumbered from 1. Fails with [`FpaError::AmbiguousResolution`] when two
/// objects would end up with the same final name; the inputs are never
/// modified either way.
pub fn execute_migration(
    contexts: &[MigrationContext],
    strategy: MigrationStrategy,
    target: &str,
) -> FpaResult<MigrationContext> {
    // Pass one: final name per (context, object), plus the emission plan.
    // Emission is (final name, origin context, definition); member rewrite
    // waits until every rename is known.
    let mut renames: HashMap<String, HashMap<String, String>> = contexts
        .iter()
        .map(|ctx| (ctx.name.clone(), HashMap::new()))
        .collect();
    let mut plan: Vec<(String, String, ObjectDef)> = Vec::new();
    let mut final_names: HashSet<String> = HashSet::new();

    for (name, instances) in object_instances(contexts) {
        let first_def = instances[0].1;
        let folds = instances.iter().all(|(_, def)| same_definition(def, first_def));
        if folds {
            if !final_names.insert(name.clone()) {
                return Err(FpaError::AmbiguousResolution { name });
            }
            let origin = instances[0].0;
            plan.push((name, origin.to_string(), first_def.clone()));
        } else {
            for (ctx, def) in instances {
                let new_name = match strategy {
                    MigrationStrategy::AutoRenameContext => renamed_in(&name, ctx),
                };
                debug!(object = %name, context = %ctx, renamed = %new_name, "conflict renamed");
                if !final_names.insert(new_name.clone()) {
                    return Err(FpaError::AmbiguousResolution { name: new_name });
                }
                if let Some(map) = renames.get_mut(ctx) {
                    map.insert(name.clone(), new_name.clone());
                }
                plan.push((new_name, ctx.to_string(), (*def).clone()));
            }
        }
    }

    // Pass two: emit objects with group members rewritten through their
    // origin context, then rules in input order with references rewritten.
    let empty = HashMap::new();
    let objects: Vec<FwObject> = plan
        .into_iter()
        .map(|(final_name, origin, def)| {
            let map = renames.get(&origin).unwrap_or(&empty);
            let def = match def {
                ObjectDef::Group(members) => ObjectDef::Group(rewrite_members(&members, map)),
                other => other,
            };
            FwObject {
                name: final_name,
                def,
            }
        })
        .collect();

    let device = Uuid::new_v4();
    let mut rules = Vec::new();
    let mut position = 0u32;
    for ctx in contexts {
        let map = renames.get(&ctx.name).unwrap_or(&empty);
        let mut ordered: Vec<&Rule> = ctx.rules.iter().collect();
        ordered.sort_by_key(|rule| rule.position);
        for rule in ordered {
            position += 1;
            let mut unified = rule.clone();
            unified.id = Uuid::new_v4();
            unified.device = device;
            unified.position = position;
            unified.source = rewrite_net(&rule.source, map);
            unified.destination = rewrite_net(&rule.destination, map);
            unified.service = rewrite_svc(&rule.service, map);
            rules.push(unified);
        }
    }

    info!(
        target = %target,
        contexts = contexts.len(),
        objects = objects.len(),
        rules = rules.len(),
        "unified context generated"
    );
    Ok(MigrationContext::new(target, objects, rules))
}
