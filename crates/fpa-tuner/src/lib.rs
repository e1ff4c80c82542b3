//! Traffic-Driven Policy Tuning
//!
//! Turns raw firewall syslog into per-rule usage evidence and advisory
//! rule changes.
//!
//! # Pipeline
//!
//! ```text
//!   raw syslog ──► SyslogParser ──► TrafficLogEntry batch
//!                                        │
//!                       PolicySnapshot   ▼
//!                       ─────────────► associate ──► per-rule usage,
//!                                        │           denied patterns
//!                                        ▼
//!                                    recommend ──► Recommendation list
//! ```
//!
//! Association reuses the analysis matcher, so an entry is credited to
//! exactly the rule a shadow check would say catches it. [`TrafficIngest`]
//! glues the pipeline onto a managed device store.

#![warn(missing_docs)]

pub mod associate;
pub mod ingest;
pub mod permissiveness;
pub mod recommend;
pub mod syslog;

pub use associate::{associate, Association, DenyKey};
pub use ingest::{TrafficIngest, TrafficTuner};
pub use permissiveness::{rank, Permissiveness, PermissivenessLevel};
pub use recommend::recommend;
pub use syslog::{ParsedLog, SyslogParser};
