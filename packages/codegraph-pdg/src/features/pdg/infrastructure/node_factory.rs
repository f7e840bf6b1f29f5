//! Node Factory
//!
//! Memoizing registry from `(kind, owner, key)` to the unique node for that
//! identity. Insertion goes through the `DashMap` entry API, so two threads
//! racing on one identity converge on whichever node was inserted first.

use crate::features::pdg::domain::{NodeId, NodeKey, NodeKind, NodeRef, PdgNode};
use crate::shared::models::ProcedureId;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Logical identity of a node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeIdentity {
    pub kind: NodeKind,
    pub owner: Option<ProcedureId>,
    pub key: NodeKey,
}

#[derive(Debug, Default)]
pub struct NodeFactory {
    registry: DashMap<NodeIdentity, NodeRef>,
    by_id: DashMap<NodeId, NodeRef>,
    next_id: AtomicU32,
}

impl NodeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_or_create(
        &self,
        kind: NodeKind,
        owner: Option<&ProcedureId>,
        key: NodeKey,
        label: &dyn Fn() -> String,
    ) -> NodeRef {
        let identity = NodeIdentity {
            kind,
            owner: owner.cloned(),
            key,
        };
        if let Some(existing) = self.registry.get(&identity) {
            return existing.clone();
        }

        let node = self
            .registry
            .entry(identity.clone())
            .or_insert_with(|| {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                Arc::new(PdgNode::new(id, identity.kind, identity.owner, identity.key, label()))
            })
            .clone();
        // Another thread may have indexed it already
        self.by_id.entry(node.id()).or_insert_with(|| node.clone());
        node
    }

    pub fn find(&self, kind: NodeKind, owner: Option<&ProcedureId>, key: &NodeKey) -> Option<NodeRef> {
        let identity = NodeIdentity {
            kind,
            owner: owner.cloned(),
            key: key.clone(),
        };
        self.registry.get(&identity).map(|n| n.clone())
    }

    pub fn get(&self, id: NodeId) -> Option<NodeRef> {
        self.by_id.get(&id).map(|n| n.clone())
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Snapshot of all nodes in id order
    pub fn nodes(&self) -> Vec<NodeRef> {
        let mut nodes: Vec<NodeRef> = self.registry.iter().map(|e| e.value().clone()).collect();
        nodes.sort_by_key(|n| n.id());
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::ValueId;
    use rayon::prelude::*;

    #[test]
    fn test_same_identity_same_node() {
        let factory = NodeFactory::new();
        let owner = ProcedureId::new("A.f()V");
        let a = factory.find_or_create(NodeKind::LocalValue, Some(&owner), NodeKey::Value(ValueId(1)), &|| "v1".into());
        let b = factory.find_or_create(NodeKind::LocalValue, Some(&owner), NodeKey::Value(ValueId(1)), &|| "other".into());

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.label(), "v1");
        assert_eq!(factory.len(), 1);
    }

    #[test]
    fn test_kind_and_owner_disambiguate() {
        let factory = NodeFactory::new();
        let f = ProcedureId::new("f");
        let g = ProcedureId::new("g");
        let key = NodeKey::Value(ValueId(0));
        let a = factory.find_or_create(NodeKind::LocalValue, Some(&f), key.clone(), &String::new);
        let b = factory.find_or_create(NodeKind::LocalValue, Some(&g), key.clone(), &String::new);
        let c = factory.find_or_create(NodeKind::BaseValue, Some(&f), key.clone(), &String::new);

        assert_ne!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(factory.find(NodeKind::LocalValue, Some(&g), &key).map(|n| n.id()), Some(b.id()));
        assert!(factory.find(NodeKind::PcMerge, Some(&g), &key).is_none());
    }

    #[test]
    fn test_concurrent_creation_converges() {
        let factory = NodeFactory::new();
        let owner = ProcedureId::new("f");
        let ids: Vec<NodeId> = (0..64)
            .into_par_iter()
            .map(|i| {
                factory
                    .find_or_create(NodeKind::LocalValue, Some(&owner), NodeKey::Value(ValueId(i % 4)), &|| {
                        format!("v{}", i % 4)
                    })
                    .id()
            })
            .collect();

        assert_eq!(factory.len(), 4);
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(*id, ids[i % 4]);
        }
        for node in factory.nodes() {
            assert!(Arc::ptr_eq(&node, &factory.get(node.id()).unwrap()));
        }
    }
}
