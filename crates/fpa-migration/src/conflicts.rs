//! Cross-context object conflict analysis
//!
//! An object name defined in more than one context is a conflict only when
//! the definitions differ; identical definitions fold into one shared
//! object. The review is advisory and reports, for every conflicting
//! instance, the name it would take under context renaming.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use fpa_common::ObjectDef;

use crate::{renamed_in, MigrationContext};

/// One context's definition of a conflicting name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictInstance {
    /// Context the definition came from
    pub context: String,
    /// The definition as written there
    pub def: ObjectDef,
    /// Name this instance would take after rename resolution
    pub renamed: String,
}

/// An object name defined differently across contexts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectConflict {
    /// The contested name
    pub name: String,
    /// Every context's definition, in input-context order
    pub instances: Vec<ConflictInstance>,
}

/// An object name that migrates unchanged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanObject {
    /// The object name
    pub name: String,
    /// Contexts defining it; more than one means identical definitions fold
    pub contexts: Vec<String>,
}

/// Pre-commit migration review: conflicts with their candidate resolutions,
/// plus the clean remainder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictReview {
    /// Names needing resolution
    pub conflicts: Vec<ObjectConflict>,
    /// Names that migrate as-is
    pub clean: Vec<CleanObject>,
    /// Total rules across the input contexts
    pub rule_count: usize,
}

impl ConflictReview {
    /// Number of names needing resolution
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    /// Number of names that migrate unchanged
    pub fn clean_count(&self) -> usize {
        self.clean.len()
    }

    /// True when the contexts can unify without any rename
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Two definitions count as identical when they describe the same set;
/// group member order is not significant.
pub(crate) fn same_definition(a: &ObjectDef, b: &ObjectDef) -> bool {
    match (a, b) {
        (ObjectDef::Group(x), ObjectDef::Group(y)) => {
            let mut x = x.clone();
            let mut y = y.clone();
            x.sort();
            y.sort();
            x == y
        }
        _ => a == b,
    }
}

/// Object names in first-appearance order, each with its per-context
/// definitions.
pub(crate) fn object_instances<'a>(
    contexts: &'a [MigrationContext],
) -> Vec<(String, Vec<(&'a str, &'a ObjectDef)>)> {
    let mut order: Vec<String> = Vec::new();
    let mut by_name: HashMap<String, Vec<(&str, &ObjectDef)>> = HashMap::new();
    for ctx in contexts {
        for obj in &ctx.objects {
            let entry = by_name.entry(obj.name.clone()).or_default();
            if entry.is_empty() {
                order.push(obj.name.clone());
            }
            entry.push((ctx.name.as_str(), &obj.def));
        }
    }
    order
        .into_iter()
        .map(|name| {
            let instances = by_name.remove(&name).unwrap_or_default();
            (name, instances)
        })
        .collect()
}

/// Compare object definitions across contexts and report what a migration
/// would have to resolve. Inputs are read, never modified.
pub fn analyze_conflicts(contexts: &[MigrationContext]) -> ConflictReview {
    let mut conflicts = Vec::new();
    let mut clean = Vec::new();

    for (name, instances) in object_instances(contexts) {
        let first_def = instances[0].1;
        let all_same = instances.iter().all(|(_, def)| same_definition(def, first_def));
        if all_same {
            clean.push(CleanObject {
                name,
                contexts: instances.iter().map(|(ctx, _)| ctx.to_string()).collect(),
            });
        } else {
            debug!(object = %name, contexts = instances.len(), "definition conflict");
            conflicts.push(ObjectConflict {
                instances: instances
                    .iter()
                    .map(|(ctx, def)| ConflictInstance {
                        context: ctx.to_string(),
                        def: (*def).clone(),
                        renamed: renamed_in(&name, ctx),
                    })
                    .collect(),
                name,
            });
        }
    }

    let rule_count = contexts.iter().map(|ctx| ctx.rules.len()).sum();
    info!(
        contexts = contexts.len(),
        conflicts = conflicts.len(),
        clean = clean.len(),
        rules = rule_count,
        "conflict review complete"
    );
    ConflictReview {
        conflicts,
        clean,
        rule_count,
    }
}
