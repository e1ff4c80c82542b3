//! Named objects and their resolution
//!
//! Rules reference reusable named objects (networks, services, and groups of
//! other objects). Resolution flattens a predicate through the table into its
//! normalized set form. A cycle or a dangling name is a hard error: the graph
//! is unusable and the caller must not produce partial results from it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::error::{FpaError, FpaResult};
use crate::predicate::{AddrSpan, NetPredicate, ResolvedNet, ResolvedSvc, SvcItem, SvcPredicate};

/// Definition carried by a named object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectDef {
    /// Address constraint
    Network(NetPredicate),
    /// Service constraint
    Service(SvcPredicate),
    /// Group of other objects, by name
    Group(Vec<String>),
}

/// Named firewall object; names are unique within a context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FwObject {
    /// Object name as written in the configuration
    pub name: String,
    /// What the name stands for
    pub def: ObjectDef,
}

impl FwObject {
    /// Network object
    pub fn network(name: impl Into<String>, pred: NetPredicate) -> Self {
        Self {
            name: name.into(),
            def: ObjectDef::Network(pred),
        }
    }

    /// Service object
    pub fn service(name: impl Into<String>, pred: SvcPredicate) -> Self {
        Self {
            name: name.into(),
            def: ObjectDef::Service(pred),
        }
    }

    /// Group object holding member names
    pub fn group(name: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            name: name.into(),
            def: ObjectDef::Group(members),
        }
    }
}

/// Lookup table for one rule context
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectTable {
    objects: HashMap<String, FwObject>,
}

impl ObjectTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a flat object list; a repeated name keeps the last
    /// definition, matching how vendor configs re-declare objects.
    pub fn from_objects(objects: Vec<FwObject>) -> Self {
        let mut table = Self::new();
        for obj in objects {
            table.insert(obj);
        }
        table
    }

    /// Insert or replace one object
    pub fn insert(&mut self, obj: FwObject) {
        if self.objects.contains_key(&obj.name) {
            debug!(object = %obj.name, "object redefined, keeping latest definition");
        }
        self.objects.insert(obj.name.clone(), obj);
    }

    /// Look up an object by name
    pub fn get(&self, name: &str) -> Option<&FwObject> {
        self.objects.get(name)
    }

    /// All object names, unordered
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(|s| s.as_str())
    }

    /// Number of objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True when the table holds no objects
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Resolve an address predicate to its normalized set form
    pub fn resolve_net(&self, pred: &NetPredicate) -> FpaResult<ResolvedNet> {
        let mut stack = Vec::new();
        let mut any = false;
        let mut spans = Vec::new();
        self.net_into(pred, &mut stack, &mut any, &mut spans)?;
        Ok(if any {
            ResolvedNet::Any
        } else {
            ResolvedNet::from_spans(spans)
        })
    }

    /// Resolve a service predicate to its normalized set form
    pub fn resolve_svc(&self, pred: &SvcPredicate) -> FpaResult<ResolvedSvc> {
        let mut stack = Vec::new();
        let mut any = false;
        let mut items = Vec::new();
        self.svc_into(pred, &mut stack, &mut any, &mut items)?;
        Ok(if any {
            ResolvedSvc::Any
        } else {
            ResolvedSvc::from_items(items)
        })
    }

    fn net_into(
        &self,
        pred: &NetPredicate,
        stack: &mut Vec<String>,
        any: &mut bool,
        spans: &mut Vec<AddrSpan>,
    ) -> FpaResult<()> {
        match pred {
            NetPredicate::Any => *any = true,
            NetPredicate::Host(ip) => spans.push(AddrSpan::from_ip(*ip)),
            NetPredicate::Net(net) => spans.push(AddrSpan::from_net(net)),
            NetPredicate::Range(lo, hi) => spans.push(AddrSpan::from_range(*lo, *hi)?),
            NetPredicate::List(items) => {
                for item in items {
                    self.net_into(item, stack, any, spans)?;
                }
            }
            NetPredicate::Object(name) => self.net_object_into(name, stack, any, spans)?,
        }
        Ok(())
    }

    fn net_object_into(
        &self,
        name: &str,
        stack: &mut Vec<String>,
        any: &mut bool,
        spans: &mut Vec<AddrSpan>,
    ) -> FpaResult<()> {
        if stack.iter().any(|seen| seen == name) {
            return Err(FpaError::InvalidObjectGraph {
                object: name.to_string(),
                reason: "circular reference".to_string(),
            });
        }
        let obj = self.get(name).ok_or_else(|| FpaError::InvalidObjectGraph {
            object: name.to_string(),
            reason: "dangling reference".to_string(),
        })?;
        stack.push(name.to_string());
        let result = match &obj.def {
            ObjectDef::Network(pred) => self.net_into(pred, stack, any, spans),
            ObjectDef::Group(members) => {
                let mut res = Ok(());
                for member in members {
                    res = self.net_object_into(member, stack, any, spans);
                    if res.is_err() {
                        break;
                    }
                }
                res
            }
            ObjectDef::Service(_) => Err(FpaError::InvalidObjectGraph {
                object: name.to_string(),
                reason: "service object referenced in an address position".to_string(),
            }),
        };
        stack.pop();
        result
    }

    fn svc_into(
        &self,
        pred: &SvcPredicate,
        stack: &mut Vec<String>,
        any: &mut bool,
        items: &mut Vec<SvcItem>,
    ) -> FpaResult<()> {
        match pred {
            SvcPredicate::Any => *any = true,
            SvcPredicate::Proto(proto) => items.push(SvcItem {
                proto: proto.clone(),
                ports: None,
            }),
            SvcPredicate::Port { proto, span } => items.push(SvcItem {
                proto: proto.clone(),
                ports: Some(*span),
            }),
            SvcPredicate::List(list) => {
                for item in list {
                    self.svc_into(item, stack, any, items)?;
                }
            }
            SvcPredicate::Object(name) => self.svc_object_into(name, stack, any, items)?,
        }
        Ok(())
    }

    fn svc_object_into(
        &self,
        name: &str,
        stack: &mut Vec<String>,
        any: &mut bool,
        items: &mut Vec<SvcItem>,
    ) -> FpaResult<()> {
        if stack.iter().any(|seen| seen == name) {
            return Err(FpaError::InvalidObjectGraph {
                object: name.to_string(),
                reason: "circular reference".to_string(),
            });
        }
        let obj = self.get(name).ok_or_else(|| FpaError::InvalidObjectGraph {
            object: name.to_string(),
            reason: "dangling reference".to_string(),
        })?;
        stack.push(name.to_string());
        let result = match &obj.def {
            ObjectDef::Service(pred) => self.svc_into(pred, stack, any, items),
            ObjectDef::Group(members) => {
                let mut res = Ok(());
                for member in members {
                    res = self.svc_object_into(member, stack, any, items);
                    if res.is_err() {
                        break;
                    }
                }
                res
            }
            ObjectDef::Network(_) => Err(FpaError::InvalidObjectGraph {
                object: name.to_string(),
                reason: "network object referenced in a service position".to_string(),
            }),
        };
        stack.pop();
        result
    }

    /// Expand a set of root object names to everything reachable through
    /// group membership. Dangling members are skipped; resolution has its
    /// own error path for those.
    pub fn closure_of(&self, roots: &BTreeSet<String>) -> BTreeSet<String> {
        let mut reached = BTreeSet::new();
        let mut pending: Vec<String> = roots.iter().cloned().collect();
        while let Some(name) = pending.pop() {
            if !reached.insert(name.clone()) {
                continue;
            }
            if let Some(FwObject {
                def: ObjectDef::Group(members),
                ..
            }) = self.get(&name)
            {
                pending.extend(members.iter().cloned());
            }
        }
        reached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::parse_net;

    fn table() -> ObjectTable {
        ObjectTable::from_objects(vec![
            FwObject::network("WEB1", parse_net("host 10.0.0.1").unwrap()),
            FwObject::network("WEB2", parse_net("host 10.0.0.2").unwrap()),
            FwObject::group(
                "WEB_FARM",
                vec!["WEB1".to_string(), "WEB2".to_string()],
            ),
            FwObject::service(
                "HTTPS",
                crate::predicate::parse_svc("tcp/443").unwrap(),
            ),
        ])
    }

    #[test]
    fn test_group_resolves_to_member_union() {
        let table = table();
        let resolved = table
            .resolve_net(&NetPredicate::Object("WEB_FARM".to_string()))
            .unwrap();
        assert!(resolved.contains_ip("10.0.0.1".parse().unwrap()));
        assert!(resolved.contains_ip("10.0.0.2".parse().unwrap()));
        assert!(!resolved.contains_ip("10.0.0.3".parse().unwrap()));
    }

    #[test]
    fn test_dangling_reference_fails() {
        let table = table();
        let err = table
            .resolve_net(&NetPredicate::Object("MISSING".to_string()))
            .unwrap_err();
        assert!(matches!(err, FpaError::InvalidObjectGraph { .. }));
        assert!(err.to_string().contains("dangling"));
    }

    #[test]
    fn test_circular_reference_fails() {
        let table = ObjectTable::from_objects(vec![
            FwObject::group("A", vec!["B".to_string()]),
            FwObject::group("B", vec!["A".to_string()]),
        ]);
        let err = table
            .resolve_net(&NetPredicate::Object("A".to_string()))
            .unwrap_err();
        assert!(matches!(err, FpaError::InvalidObjectGraph { .. }));
        assert!(err.to_string().contains("circular"));
    }

    #[test]
    fn test_diamond_reference_is_legal() {
        let table = ObjectTable::from_objects(vec![
            FwObject::network("LEAF", parse_net("10.1.0.0/24").unwrap()),
            FwObject::group("LEFT", vec!["LEAF".to_string()]),
            FwObject::group("RIGHT", vec!["LEAF".to_string()]),
            FwObject::group("TOP", vec!["LEFT".to_string(), "RIGHT".to_string()]),
        ]);
        let resolved = table
            .resolve_net(&NetPredicate::Object("TOP".to_string()))
            .unwrap();
        assert!(resolved.contains_ip("10.1.0.9".parse().unwrap()));
    }

    #[test]
    fn test_type_mismatch_fails() {
        let table = table();
        assert!(table
            .resolve_net(&NetPredicate::Object("HTTPS".to_string()))
            .is_err());
        assert!(table
            .resolve_svc(&SvcPredicate::Object("WEB1".to_string()))
            .is_err());
    }

    #[test]
    fn test_closure_expands_groups() {
        let table = table();
        let mut roots = BTreeSet::new();
        roots.insert("WEB_FARM".to_string());
        let closure = table.closure_of(&roots);
        assert!(closure.contains("WEB1"));
        assert!(closure.contains("WEB2"));
        assert!(!closure.contains("HTTPS"));
    }
}
