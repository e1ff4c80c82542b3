//! Analysis service facade
//!
//! Owns the device store, the run history, and the merge-candidate cache,
//! and wires the passes together: snapshot, classify, score, summarize.
//! Returned values are owned clones; mutating them never affects a future
//! run.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use fpa_common::{
    Analysis, AnalysisConfig, AnalysisSummary, AtomicCounter, Finding, FindingFilter, FpaError,
    FpaResult, ObjectTable, Rule,
};

use crate::classifier;
use crate::merger::{self, MergeGroup, MergeOutcome};
use crate::risk;
use crate::snapshot::PolicySnapshot;
use crate::store::DeviceStore;

/// Service-level counters
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    /// Registered devices
    pub devices: usize,
    /// Analyses retained in history
    pub analyses: usize,
    /// Analysis runs since start
    pub runs_total: u64,
    /// Rules eliminated by merges since start
    pub merges_total: u64,
}

/// Facade over the device store and the analysis passes
pub struct AnalysisService {
    store: DeviceStore,
    config: AnalysisConfig,
    runs: RwLock<Vec<Analysis>>,
    merge_cache: RwLock<HashMap<String, MergeGroup>>,
    runs_total: AtomicCounter,
    merges_total: AtomicCounter,
}

impl AnalysisService {
    /// Create a service with the given analysis policy
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            store: DeviceStore::new(),
            config,
            runs: RwLock::new(Vec::new()),
            merge_cache: RwLock::new(HashMap::new()),
            runs_total: AtomicCounter::new(0),
            merges_total: AtomicCounter::new(0),
        }
    }

    /// Underlying registry, for direct inspection
    pub fn store(&self) -> &DeviceStore {
        &self.store
    }

    /// Register a device's canonical rule and object model
    pub fn load_device(
        &self,
        name: impl Into<String>,
        rules: Vec<Rule>,
        objects: ObjectTable,
    ) -> Uuid {
        self.store.insert(name, rules, objects)
    }

    /// Register under a caller-chosen device id
    pub fn load_device_with_id(
        &self,
        id: Uuid,
        name: impl Into<String>,
        rules: Vec<Rule>,
        objects: ObjectTable,
    ) {
        self.store.insert_with_id(id, name, rules, objects);
    }

    /// Immutable snapshot of a device's current rules
    pub fn snapshot(&self, device: Uuid) -> FpaResult<PolicySnapshot> {
        self.store.snapshot(device)
    }

    /// Run the full classification pass and record the result.
    ///
    /// A device with zero rules yields an empty finding list and a perfect
    /// score.
    pub fn run_analysis(&self, device: Uuid) -> FpaResult<Analysis> {
        let snap = self.store.snapshot(device)?;
        let findings = classifier::classify(&snap, &self.config);
        let score = risk::score(&findings);
        let summary = AnalysisSummary::from_findings(snap.len(), &findings, score);
        let analysis = Analysis {
            id: Uuid::new_v4(),
            device,
            timestamp: Utc::now(),
            findings,
            summary,
        };

        self.runs.write().push(analysis.clone());
        self.runs_total.inc();
        info!(
            device = %device,
            rules = snap.len(),
            findings = analysis.summary.total_findings,
            score = analysis.summary.score,
            "analysis complete"
        );
        Ok(analysis)
    }

    /// A recorded run by id
    pub fn analysis(&self, id: Uuid) -> FpaResult<Analysis> {
        self.runs
            .read()
            .iter()
            .find(|run| run.id == id)
            .cloned()
            .ok_or(FpaError::AnalysisNotFound(id))
    }

    /// Findings of a recorded run, optionally narrowed by a filter
    pub fn findings(
        &self,
        analysis: Uuid,
        filter: Option<&FindingFilter>,
    ) -> FpaResult<Vec<Finding>> {
        let run = self.analysis(analysis)?;
        Ok(match filter {
            Some(f) => run.findings.into_iter().filter(|x| f.matches(x)).collect(),
            None => run.findings,
        })
    }

    /// Run history for a device, oldest first
    pub fn analyses(&self, device: Uuid) -> Vec<Analysis> {
        self.runs
            .read()
            .iter()
            .filter(|run| run.device == device)
            .cloned()
            .collect()
    }

    /// Discover merge candidates for one device, or every registered device
    pub fn merge_groups(&self, device: Option<Uuid>) -> FpaResult<Vec<MergeGroup>> {
        let targets: Vec<Uuid> = match device {
            Some(id) => vec![id],
            None => self.store.devices().into_iter().map(|(id, _)| id).collect(),
        };

        let mut out = Vec::new();
        for target in targets {
            let snap = self.store.snapshot(target)?;
            let groups = merger::find_merge_groups(&snap);
            let mut cache = self.merge_cache.write();
            for group in &groups {
                cache.insert(group.id.clone(), group.clone());
            }
            out.extend(groups);
        }
        Ok(out)
    }

    /// Execute previously discovered merge groups.
    ///
    /// The full replacement rule vector is built per device before any swap;
    /// an unknown group id fails the whole request without touching rules.
    /// Remaining cached candidates for an updated device are invalidated.
    pub fn execute_merge(&self, group_ids: &[String]) -> FpaResult<MergeOutcome> {
        let mut by_device: HashMap<Uuid, Vec<MergeGroup>> = HashMap::new();
        {
            let cache = self.merge_cache.read();
            for id in group_ids {
                let group = cache
                    .get(id)
                    .ok_or_else(|| FpaError::MergeGroupNotFound(id.clone()))?;
                by_device
                    .entry(group.device)
                    .or_default()
                    .push(group.clone());
            }
        }

        let mut merged_count = 0usize;
        for (device, groups) in by_device {
            let entry = self.store.get(device)?;
            let rules = entry.rules();
            let (new_rules, count) = merger::apply_merge(&rules, &groups);
            entry.swap_rules(new_rules);
            self.merge_cache.write().retain(|_, g| g.device != device);
            merged_count += count;
            info!(device = %device, merged = count, "merge executed");
        }

        self.merges_total.add(merged_count as u64);
        Ok(MergeOutcome { merged_count })
    }

    /// Current service counters
    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            devices: self.store.len(),
            analyses: self.runs.read().len(),
            runs_total: self.runs_total.get(),
            merges_total: self.merges_total.get(),
        }
    }
}

impl Default for AnalysisService {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}
