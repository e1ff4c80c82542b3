//! Rule model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::predicate::{NetPredicate, SvcPredicate};

/// What a matching rule does with the traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Traffic is permitted
    Allow,
    /// Traffic is dropped
    Deny,
}

impl Default for Action {
    fn default() -> Self {
        Action::Deny
    }
}

impl Action {
    /// Normalize a vendor action word; `permit`/`allow` and `deny`/`drop`
    /// are the accepted spellings.
    pub fn parse(token: &str) -> Option<Action> {
        match token.trim().to_ascii_lowercase().as_str() {
            "permit" | "allow" => Some(Action::Allow),
            "deny" | "drop" => Some(Action::Deny),
            _ => None,
        }
    }

    /// Keyword used in generated command text
    pub fn as_command(&self) -> &'static str {
        match self {
            Action::Allow => "permit",
            Action::Deny => "deny",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_command())
    }
}

/// One firewall rule in the canonical model
///
/// `position` gives the total evaluation order within a context; the matcher
/// walks positions ascending and the first covering rule wins. `name` is the
/// ACL or policy label the rule belongs to; ordering checks are scoped to
/// rules sharing a name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Stable identifier
    pub id: Uuid,
    /// Device the rule belongs to
    pub device: Uuid,
    /// ACL / policy label
    pub name: String,
    /// Source address constraint
    pub source: NetPredicate,
    /// Destination address constraint
    pub destination: NetPredicate,
    /// Service constraint
    pub service: SvcPredicate,
    /// Allow or deny
    pub action: Action,
    /// Lifetime hit counter as reported by the device
    pub hits: u64,
    /// When the rule last matched traffic, if ever
    pub last_hit: Option<DateTime<Utc>>,
    /// Evaluation order, unique within the context
    pub position: u32,
    /// Vendor rule hash, used for direct log-to-rule mapping
    pub hash: Option<String>,
    /// Original configuration line, kept for finding excerpts
    pub raw: Option<String>,
}

impl Rule {
    /// New rule with zeroed usage counters
    pub fn new(
        device: Uuid,
        name: impl Into<String>,
        position: u32,
        source: NetPredicate,
        destination: NetPredicate,
        service: SvcPredicate,
        action: Action,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            device,
            name: name.into(),
            source,
            destination,
            service,
            action,
            hits: 0,
            last_hit: None,
            position,
            hash: None,
            raw: None,
        }
    }

    /// Set the hit counter
    pub fn with_hits(mut self, hits: u64) -> Self {
        self.hits = hits;
        self
    }

    /// Set the last-hit timestamp
    pub fn with_last_hit(mut self, at: DateTime<Utc>) -> Self {
        self.last_hit = Some(at);
        self
    }

    /// Set the vendor rule hash
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    /// Keep the original configuration line
    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    /// Line quoted in findings: the raw configuration text when available,
    /// otherwise a synthesized equivalent.
    pub fn excerpt(&self) -> String {
        match &self.raw {
            Some(raw) => raw.trim().to_string(),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "access-list {} extended {} {} {} {}",
            self.name, self.action, self.service, self.source, self.destination
        )
    }
}
