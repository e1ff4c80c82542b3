//! Policy Analysis Engine
//!
//! Classifies firewall rule sets, scores their risk, and proposes merges.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    AnalysisService                       │
//! │                                                          │
//! │  ┌────────────┐  snapshot   ┌────────────┐  findings    │
//! │  │ DeviceStore│───────────►│ Classifier │─────────┐    │
//! │  │ (ArcSwap)  │             └────────────┘         ▼    │
//! │  └────────────┘  snapshot   ┌────────────┐   ┌────────┐ │
//! │        ▲        ───────────►│   Merger   │   │  Risk  │ │
//! │        │ swap               └─────┬──────┘   │ Scorer │ │
//! │        └──── execute_merge ───────┘          └────────┘ │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Every pass runs against an immutable [`PolicySnapshot`]; the matcher is
//! the single first-match-wins implementation shared by shadow confirmation
//! and traffic association.

#![warn(missing_docs)]

pub mod classifier;
pub mod matcher;
pub mod merger;
pub mod risk;
pub mod service;
pub mod snapshot;
pub mod store;

pub use matcher::{first_match, first_match_index};
pub use merger::{
    apply_merge, find_merge_groups, MergeComplexity, MergeDimension, MergeGroup, MergeOutcome,
};
pub use service::{AnalysisService, ServiceStats};
pub use snapshot::{PolicySnapshot, ResolvedRule};
pub use store::{DeviceEntry, DeviceStore};
