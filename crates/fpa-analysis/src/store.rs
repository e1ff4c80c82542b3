//! Per-device rule storage with atomic hot swaps
//!
//! Readers load a consistent `Arc` of the current rule list; writers swap
//! the whole list atomically. Merge execution and rule loads are
//! copy-on-write swaps, so an analysis running on a snapshot never observes
//! a half-applied change.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use uuid::Uuid;

use fpa_common::{FpaError, FpaResult, ObjectTable, Rule};

use crate::snapshot::PolicySnapshot;

/// One device's rule set and object table (atomically swappable)
pub struct DeviceEntry {
    /// Display name
    pub name: String,
    rules: ArcSwap<Vec<Rule>>,
    objects: ArcSwap<ObjectTable>,
    /// Version for change detection
    version: AtomicU64,
}

impl DeviceEntry {
    fn new(name: String, mut rules: Vec<Rule>, objects: ObjectTable) -> Self {
        rules.sort_by_key(|r| r.position);
        Self {
            name,
            rules: ArcSwap::from_pointee(rules),
            objects: ArcSwap::from_pointee(objects),
            version: AtomicU64::new(1),
        }
    }

    /// Current change counter
    #[inline(always)]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Current rules, position order
    pub fn rules(&self) -> Arc<Vec<Rule>> {
        self.rules.load_full()
    }

    /// Current object table
    pub fn objects(&self) -> Arc<ObjectTable> {
        self.objects.load_full()
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.load().len()
    }

    /// True when the device carries no rules
    pub fn is_empty(&self) -> bool {
        self.rules.load().is_empty()
    }

    /// Atomically replace the rule list
    pub fn swap_rules(&self, mut rules: Vec<Rule>) {
        rules.sort_by_key(|r| r.position);
        self.rules.store(Arc::new(rules));
        self.version.fetch_add(1, Ordering::Release);
    }
}

/// Device registry; concurrent reads, per-device atomic swaps
pub struct DeviceStore {
    devices: DashMap<Uuid, Arc<DeviceEntry>>,
}

impl DeviceStore {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            devices: DashMap::new(),
        }
    }

    /// Register a device, generating its id
    pub fn insert(&self, name: impl Into<String>, rules: Vec<Rule>, objects: ObjectTable) -> Uuid {
        let id = Uuid::new_v4();
        self.insert_with_id(id, name, rules, objects);
        id
    }

    /// Register a device under a caller-chosen id, replacing any previous
    /// entry with that id
    pub fn insert_with_id(
        &self,
        id: Uuid,
        name: impl Into<String>,
        rules: Vec<Rule>,
        objects: ObjectTable,
    ) {
        let entry = Arc::new(DeviceEntry::new(name.into(), rules, objects));
        self.devices.insert(id, entry);
    }

    /// Entry for a device
    pub fn get(&self, device: Uuid) -> FpaResult<Arc<DeviceEntry>> {
        self.devices
            .get(&device)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(FpaError::DeviceNotFound(device))
    }

    /// Immutable snapshot of a device's current rules, predicates resolved
    pub fn snapshot(&self, device: Uuid) -> FpaResult<PolicySnapshot> {
        let entry = self.get(device)?;
        PolicySnapshot::build(device, entry.rules(), entry.objects())
    }

    /// Replace a device's rule list
    pub fn swap_rules(&self, device: Uuid, rules: Vec<Rule>) -> FpaResult<()> {
        let entry = self.get(device)?;
        entry.swap_rules(rules);
        Ok(())
    }

    /// Registered devices as (id, name), sorted by name
    pub fn devices(&self) -> Vec<(Uuid, String)> {
        let mut out: Vec<(Uuid, String)> = self
            .devices
            .iter()
            .map(|entry| (*entry.key(), entry.value().name.clone()))
            .collect();
        out.sort_by(|a, b| a.1.cmp(&b.1));
        out
    }

    /// Number of registered devices
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// True when no devices are registered
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}
