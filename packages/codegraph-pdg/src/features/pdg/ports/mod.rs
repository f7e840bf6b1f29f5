//! PDG Ports
//!
//! Interfaces to the collaborators the engine consumes (call graph, type
//! hierarchy, exception facts, reachability, heap locations) and the
//! injectable node/edge store it produces into.

use super::domain::{NodeKey, NodeKind, NodeRef, PdgEdge};
use crate::features::points_to::AbstractLocation;
use crate::shared::models::{BlockId, CallSiteId, FieldRef, ProcedureId, TypeName, ValueId};
use std::sync::Arc;

/// Resolved call graph
pub trait CallGraphProvider: Send + Sync {
    /// Every procedure the call site may dispatch to
    fn possible_targets(&self, caller: &ProcedureId, call_site: CallSiteId) -> Vec<ProcedureId>;
}

/// Class/subtype queries
pub trait TypeHierarchy: Send + Sync {
    /// True when a value of type `sub` may be stored in a variable of type `sup`
    fn is_assignable_from(&self, sup: &TypeName, sub: &TypeName) -> bool;
}

/// Which exceptions are possible where
pub trait ExceptionOracle: Send + Sync {
    /// Whether the implicit exception `exception` may be raised in `block`
    fn can_throw(&self, exception: &TypeName, block: BlockId, procedure: &ProcedureId) -> bool;

    fn can_procedure_throw_any_exception(&self, procedure: &ProcedureId) -> bool;

    /// Exception types that may flow along the exceptional edge `from → to`
    fn exceptions(&self, from: BlockId, to: BlockId, procedure: &ProcedureId) -> Vec<TypeName>;

    /// Whether a call to `procedure` may return normally
    fn can_terminate_normally(&self, _procedure: &ProcedureId) -> bool {
        true
    }
}

pub trait ReachabilityOracle: Send + Sync {
    /// True when control can never flow along `from → to`
    fn is_unreachable(&self, from: BlockId, to: BlockId, procedure: &ProcedureId) -> bool;
}

/// Heap abstraction targeted by field and array accesses
pub trait LocationOracle: Send + Sync {
    fn locations_for_field(
        &self,
        receiver: Option<ValueId>,
        field: &FieldRef,
        procedure: &ProcedureId,
    ) -> Vec<Arc<AbstractLocation>>;

    fn locations_for_array_contents(
        &self,
        array: ValueId,
        procedure: &ProcedureId,
    ) -> Vec<Arc<AbstractLocation>>;
}

/// Bundle of the oracles one analysis run consults
#[derive(Clone)]
pub struct AnalysisOracles {
    pub call_graph: Arc<dyn CallGraphProvider>,
    pub hierarchy: Arc<dyn TypeHierarchy>,
    pub exceptions: Arc<dyn ExceptionOracle>,
    pub reachability: Arc<dyn ReachabilityOracle>,
    pub locations: Arc<dyn LocationOracle>,
}

impl AnalysisOracles {
    pub fn with_hierarchy(mut self, hierarchy: Arc<dyn TypeHierarchy>) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    pub fn with_exceptions(mut self, exceptions: Arc<dyn ExceptionOracle>) -> Self {
        self.exceptions = exceptions;
        self
    }

    pub fn with_reachability(mut self, reachability: Arc<dyn ReachabilityOracle>) -> Self {
        self.reachability = reachability;
        self
    }

    pub fn with_locations(mut self, locations: Arc<dyn LocationOracle>) -> Self {
        self.locations = locations;
        self
    }
}

/// Thread-safe node registry and edge set shared by every procedure analysis
///
/// Implementations must give first-writer-wins semantics: racing
/// `find_or_create` calls for one identity all observe the same node.
pub trait GraphStore: Send + Sync {
    /// Node for `(kind, owner, key)`; `label` runs only when the node is new
    fn find_or_create(
        &self,
        kind: NodeKind,
        owner: Option<&ProcedureId>,
        key: NodeKey,
        label: &dyn Fn() -> String,
    ) -> NodeRef;

    fn find(&self, kind: NodeKind, owner: Option<&ProcedureId>, key: &NodeKey) -> Option<NodeRef>;

    /// Inserts the edge; returns false if an identical edge was already present
    fn add_edge(&self, edge: PdgEdge) -> bool;

    /// Records the full contributor set of a merge request for auditing
    fn record_merge(&self, target: &NodeRef, contributors: &[NodeRef]);
}
