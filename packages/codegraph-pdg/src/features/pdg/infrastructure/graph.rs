//! Program Dependence Graph store
//!
//! Global multigraph populated concurrently by every per-procedure edge
//! pass. Nodes and edges are only ever added. The edge set is a set: a
//! second insertion of an identical edge is reported to the caller instead
//! of stored twice.

use super::node_factory::NodeFactory;
use crate::features::pdg::domain::{EdgeKey, EdgeKind, NodeId, NodeKey, NodeKind, NodeRef, PdgEdge};
use crate::features::pdg::ports::GraphStore;
use crate::shared::models::ProcedureId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Default)]
pub struct ProgramDependenceGraph {
    nodes: NodeFactory,
    edges: DashMap<EdgeKey, PdgEdge>,
    outgoing: DashMap<NodeId, Vec<EdgeKey>>,
    incoming: DashMap<NodeId, Vec<EdgeKey>>,
    /// Merge target → every contributor ever requested for it
    merges: Mutex<FxHashMap<NodeId, FxHashSet<NodeId>>>,
}

/// Counts per kind, for logging and tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdgStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes_by_kind: Vec<(NodeKind, usize)>,
    pub edges_by_kind: Vec<(EdgeKind, usize)>,
}

impl ProgramDependenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: NodeId) -> Option<NodeRef> {
        self.nodes.get(id)
    }

    /// All nodes in id order
    pub fn nodes(&self) -> Vec<NodeRef> {
        self.nodes.nodes()
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<NodeRef> {
        self.nodes().into_iter().filter(|n| n.kind() == kind).collect()
    }

    /// Nodes owned by one procedure
    pub fn nodes_of(&self, procedure: &ProcedureId) -> Vec<NodeRef> {
        self.nodes()
            .into_iter()
            .filter(|n| n.owner() == Some(procedure))
            .collect()
    }

    pub fn edges(&self) -> Vec<PdgEdge> {
        let mut edges: Vec<PdgEdge> = self.edges.iter().map(|e| e.value().clone()).collect();
        edges.sort_by_key(|e| (e.source.id(), e.target.id(), e.kind));
        edges
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> Vec<PdgEdge> {
        self.edges().into_iter().filter(|e| e.kind == kind).collect()
    }

    /// Outgoing edges of a node (its dependents)
    pub fn edges_from(&self, id: NodeId) -> Vec<PdgEdge> {
        self.collect_adjacent(&self.outgoing, id)
    }

    /// Incoming edges of a node (its dependencies)
    pub fn edges_to(&self, id: NodeId) -> Vec<PdgEdge> {
        self.collect_adjacent(&self.incoming, id)
    }

    fn collect_adjacent(&self, index: &DashMap<NodeId, Vec<EdgeKey>>, id: NodeId) -> Vec<PdgEdge> {
        let keys = match index.get(&id) {
            Some(keys) => keys.clone(),
            None => return Vec::new(),
        };
        keys.iter()
            .filter_map(|k| self.edges.get(k).map(|e| e.value().clone()))
            .collect()
    }

    pub fn contains_edge(&self, source: NodeId, target: NodeId, kind: EdgeKind) -> bool {
        self.outgoing
            .get(&source)
            .map(|keys| keys.iter().any(|k| k.target == target && k.kind == kind))
            .unwrap_or(false)
    }

    /// Contributors recorded for a merge target, sorted by id
    pub fn merge_contributors(&self, target: NodeId) -> Vec<NodeId> {
        let merges = self.merges.lock();
        let mut contributors: Vec<NodeId> = merges
            .get(&target)
            .map(|c| c.iter().copied().collect())
            .unwrap_or_default();
        contributors.sort_unstable();
        contributors
    }

    /// Recorded `(target, contributor)` pairs lacking a `MERGE` edge
    pub fn unmerged_contributions(&self) -> Vec<(NodeId, NodeId)> {
        let merges = self.merges.lock();
        let mut missing = Vec::new();
        for (target, contributors) in merges.iter() {
            for source in contributors {
                if !self.contains_edge(*source, *target, EdgeKind::Merge) {
                    missing.push((*target, *source));
                }
            }
        }
        missing.sort_unstable();
        missing
    }

    pub fn stats(&self) -> PdgStats {
        let mut nodes_by_kind: FxHashMap<NodeKind, usize> = FxHashMap::default();
        for node in self.nodes() {
            *nodes_by_kind.entry(node.kind()).or_default() += 1;
        }
        let mut edges_by_kind: FxHashMap<EdgeKind, usize> = FxHashMap::default();
        for edge in self.edges.iter() {
            *edges_by_kind.entry(edge.kind).or_default() += 1;
        }
        let mut nodes_by_kind: Vec<_> = nodes_by_kind.into_iter().collect();
        nodes_by_kind.sort();
        let mut edges_by_kind: Vec<_> = edges_by_kind.into_iter().collect();
        edges_by_kind.sort();

        PdgStats {
            node_count: self.node_count(),
            edge_count: self.edge_count(),
            nodes_by_kind,
            edges_by_kind,
        }
    }

    /// Export as a petgraph graph (node weights are node ids)
    pub fn to_petgraph(&self) -> DiGraph<NodeId, EdgeKind> {
        let mut graph = DiGraph::with_capacity(self.node_count(), self.edge_count());
        let mut index: FxHashMap<NodeId, NodeIndex> = FxHashMap::default();
        for node in self.nodes() {
            index.insert(node.id(), graph.add_node(node.id()));
        }
        for edge in self.edges() {
            if let (Some(&s), Some(&t)) = (index.get(&edge.source.id()), index.get(&edge.target.id())) {
                graph.add_edge(s, t, edge.kind);
            }
        }
        graph
    }
}

impl GraphStore for ProgramDependenceGraph {
    fn find_or_create(
        &self,
        kind: NodeKind,
        owner: Option<&ProcedureId>,
        key: NodeKey,
        label: &dyn Fn() -> String,
    ) -> NodeRef {
        self.nodes.find_or_create(kind, owner, key, label)
    }

    fn find(&self, kind: NodeKind, owner: Option<&ProcedureId>, key: &NodeKey) -> Option<NodeRef> {
        self.nodes.find(kind, owner, key)
    }

    fn add_edge(&self, edge: PdgEdge) -> bool {
        let key = edge.key();
        match self.edges.entry(key.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(edge);
                self.outgoing.entry(key.source).or_default().push(key.clone());
                self.incoming.entry(key.target).or_default().push(key);
                true
            }
        }
    }

    fn record_merge(&self, target: &NodeRef, contributors: &[NodeRef]) {
        let mut merges = self.merges.lock();
        merges
            .entry(target.id())
            .or_default()
            .extend(contributors.iter().map(|c| c.id()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::pdg::domain::{CallSiteLabel, SummaryPart};
    use crate::shared::models::{CallSiteId, ValueId};

    fn value(pdg: &ProgramDependenceGraph, v: u32) -> NodeRef {
        pdg.find_or_create(NodeKind::LocalValue, Some(&ProcedureId::new("f")), NodeKey::Value(ValueId(v)), &|| format!("v{}", v))
    }

    #[test]
    fn test_edge_set_semantics() {
        let pdg = ProgramDependenceGraph::new();
        let a = value(&pdg, 0);
        let b = value(&pdg, 1);

        assert!(pdg.add_edge(PdgEdge::new(&a, &b, EdgeKind::Exp)));
        assert!(!pdg.add_edge(PdgEdge::new(&a, &b, EdgeKind::Exp)));
        assert!(pdg.add_edge(PdgEdge::new(&a, &b, EdgeKind::Copy)));
        let caller = ProcedureId::new("g");
        assert!(pdg.add_edge(PdgEdge::new(&a, &b, EdgeKind::Copy).labelled(CallSiteLabel::exit(&caller, CallSiteId(0)))));

        assert_eq!(pdg.edge_count(), 3);
        assert_eq!(pdg.edges_from(a.id()).len(), 3);
        assert_eq!(pdg.edges_to(b.id()).len(), 3);
        assert!(pdg.edges_to(a.id()).is_empty());
        assert_eq!(pdg.edges_of_kind(EdgeKind::Copy).len(), 2);
    }

    #[test]
    fn test_merge_audit() {
        let pdg = ProgramDependenceGraph::new();
        let a = value(&pdg, 0);
        let b = value(&pdg, 1);
        let m = pdg.find_or_create(NodeKind::PcMerge, Some(&ProcedureId::new("f")), NodeKey::Summary(SummaryPart::EntryPc), &|| "m".into());

        pdg.record_merge(&m, &[a.clone(), b.clone()]);
        pdg.add_edge(PdgEdge::new(&a, &m, EdgeKind::Merge));
        assert_eq!(pdg.unmerged_contributions(), vec![(m.id(), b.id())]);

        pdg.add_edge(PdgEdge::new(&b, &m, EdgeKind::Merge));
        assert!(pdg.unmerged_contributions().is_empty());
        assert_eq!(pdg.merge_contributors(m.id()), vec![a.id(), b.id()]);
    }

    #[test]
    fn test_petgraph_export() {
        let pdg = ProgramDependenceGraph::new();
        let a = value(&pdg, 0);
        let b = value(&pdg, 1);
        pdg.add_edge(PdgEdge::new(&a, &b, EdgeKind::Exp));

        let graph = pdg.to_petgraph();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(pdg.stats().edges_by_kind, vec![(EdgeKind::Exp, 1)]);
    }
}
