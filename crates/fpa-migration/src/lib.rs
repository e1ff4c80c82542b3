//! Multi-Context Policy Migration
//!
//! Combines the rule sets of several independent firewall contexts into one
//! unified policy, the way a device consolidation collapses per-tenant
//! configs onto a single chassis.
//!
//! Two operations, both pure over their inputs:
//!
//! - [`analyze_conflicts`] — pre-commit review: which object names are
//!   defined differently across contexts, and what each instance would be
//!   renamed to.
//! - [`execute_migration`] — build the unified context: identical
//!   definitions fold into one shared object, conflicting ones are renamed
//!   per the chosen [`MigrationStrategy`], and every rule reference follows
//!   the rename. Input contexts are never touched; a failed migration
//!   returns an error and emits nothing.

#![warn(missing_docs)]

pub mod conflicts;
pub mod unify;

pub use conflicts::{
    analyze_conflicts, CleanObject, ConflictInstance, ConflictReview, ObjectConflict,
};
pub use unify::{execute_migration, MigrationStrategy};

use serde::{Deserialize, Serialize};

use fpa_common::{FwObject, Rule};

/// A named bundle of objects and rules from one source device.
///
/// Contexts are immutable inputs to the resolver: it reads them and emits a
/// new unified context, it never rewrites one in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationContext {
    /// Context name, used to derive rename suffixes
    pub name: String,
    /// Named objects declared in this context
    pub objects: Vec<FwObject>,
    /// Rules in this context, ordered by position
    pub rules: Vec<Rule>,
}

impl MigrationContext {
    /// Bundle a context from its parts
    pub fn new(name: impl Into<String>, objects: Vec<FwObject>, rules: Vec<Rule>) -> Self {
        Self {
            name: name.into(),
            objects,
            rules,
        }
    }
}

/// Suffix derived from a context name: upper-cased, non-alphanumerics
/// stripped. `edge-fw-1` becomes `EDGEFW1`.
pub(crate) fn context_suffix(ctx: &str) -> String {
    ctx.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Name a conflicting object instance would take under context renaming
pub(crate) fn renamed_in(name: &str, ctx: &str) -> String {
    format!("{}_{}", name, context_suffix(ctx))
}
