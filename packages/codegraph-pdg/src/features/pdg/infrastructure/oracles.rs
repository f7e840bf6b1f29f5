//! Reference oracle implementations
//!
//! Small, explicit implementations of the PDG ports for tests and for
//! clients without a pointer analysis of their own. Each one is either
//! conservative (everything may happen) or driven by facts registered up
//! front.

use crate::features::pdg::ports::{
    AnalysisOracles, CallGraphProvider, ExceptionOracle, LocationOracle, ReachabilityOracle,
    TypeHierarchy,
};
use crate::features::points_to::{AbstractLocation, LocationFactory};
use crate::shared::models::{
    BlockId, CallSiteId, FieldRef, ImplicitException, Instruction, ProcedureId, Program, TypeName,
    ValueId, OBJECT, THROWABLE,
};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

impl AnalysisOracles {
    /// Conservative oracles around a call graph: every exception possible,
    /// every edge reachable, field-based heap locations, java.lang hierarchy
    pub fn conservative(call_graph: Arc<dyn CallGraphProvider>) -> Self {
        Self {
            call_graph,
            hierarchy: Arc::new(NominalHierarchy::with_java_lang()),
            exceptions: Arc::new(ConservativeExceptions),
            reachability: Arc::new(AllReachable),
            locations: Arc::new(FieldBasedLocations::default()),
        }
    }
}

/// Call graph backed by a hash map of call-site targets
#[derive(Debug, Clone, Default)]
pub struct SimpleCallGraph {
    targets: FxHashMap<(ProcedureId, CallSiteId), Vec<ProcedureId>>,
}

impl SimpleCallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every call site of `program` to its declared target only
    pub fn from_declared_targets(program: &Program) -> Self {
        let mut graph = Self::new();
        for procedure in program.procedures() {
            let Some(body) = &procedure.body else { continue };
            for (_, instruction) in body.instruction_locs() {
                if let Instruction::Invoke {
                    declared_target,
                    call_site,
                    ..
                } = instruction
                {
                    graph.add_target(procedure.id().clone(), *call_site, declared_target.clone());
                }
            }
        }
        graph
    }

    pub fn add_target(
        &mut self,
        caller: impl Into<ProcedureId>,
        call_site: CallSiteId,
        callee: impl Into<ProcedureId>,
    ) -> &mut Self {
        let callee = callee.into();
        let targets = self.targets.entry((caller.into(), call_site)).or_default();
        if !targets.contains(&callee) {
            targets.push(callee);
        }
        self
    }

    pub fn edge_count(&self) -> usize {
        self.targets.values().map(|v| v.len()).sum()
    }
}

impl CallGraphProvider for SimpleCallGraph {
    fn possible_targets(&self, caller: &ProcedureId, call_site: CallSiteId) -> Vec<ProcedureId> {
        self.targets
            .get(&(caller.clone(), call_site))
            .cloned()
            .unwrap_or_default()
    }
}

/// Explicit supertype table; every type is assignable to itself and to `Object`
#[derive(Debug, Clone, Default)]
pub struct NominalHierarchy {
    supertypes: FxHashMap<TypeName, Vec<TypeName>>,
}

impl NominalHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preloaded with the implicit exception classes and their ancestors
    pub fn with_java_lang() -> Self {
        let mut hierarchy = Self::new();
        hierarchy
            .extend("java.lang.Exception", THROWABLE)
            .extend("java.lang.Error", THROWABLE)
            .extend("java.lang.RuntimeException", "java.lang.Exception")
            .extend("java.lang.LinkageError", "java.lang.Error")
            .extend("java.lang.IndexOutOfBoundsException", "java.lang.RuntimeException")
            .extend(
                ImplicitException::ArrayIndexOutOfBounds.class_name(),
                "java.lang.IndexOutOfBoundsException",
            )
            .extend(ImplicitException::ClassNotFound.class_name(), "java.lang.LinkageError");
        for exception in [
            ImplicitException::NullPointer,
            ImplicitException::ClassCast,
            ImplicitException::Arithmetic,
            ImplicitException::NegativeArraySize,
            ImplicitException::ArrayStore,
        ] {
            hierarchy.extend(exception.class_name(), "java.lang.RuntimeException");
        }
        hierarchy
    }

    /// Declare `sub` a direct subtype of `sup`
    pub fn extend(&mut self, sub: &str, sup: &str) -> &mut Self {
        let parents = self.supertypes.entry(TypeName::new(sub)).or_default();
        let sup = TypeName::new(sup);
        if !parents.contains(&sup) {
            parents.push(sup);
        }
        self
    }
}

impl TypeHierarchy for NominalHierarchy {
    fn is_assignable_from(&self, sup: &TypeName, sub: &TypeName) -> bool {
        if sup == sub || sup.as_str() == OBJECT {
            return true;
        }
        let mut seen = FxHashSet::default();
        let mut stack = vec![sub];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(parents) = self.supertypes.get(current) {
                for parent in parents {
                    if parent == sup {
                        return true;
                    }
                    stack.push(parent);
                }
            }
        }
        false
    }
}

/// Every implicit exception is possible and every edge admits `Throwable`
#[derive(Debug, Clone, Copy, Default)]
pub struct ConservativeExceptions;

impl ExceptionOracle for ConservativeExceptions {
    fn can_throw(&self, _exception: &TypeName, _block: BlockId, _procedure: &ProcedureId) -> bool {
        true
    }

    fn can_procedure_throw_any_exception(&self, _procedure: &ProcedureId) -> bool {
        true
    }

    fn exceptions(&self, _from: BlockId, _to: BlockId, _procedure: &ProcedureId) -> Vec<TypeName> {
        vec![TypeName::throwable()]
    }
}

/// Conservative defaults narrowed by registered facts
#[derive(Debug, Clone, Default)]
pub struct ExceptionTable {
    impossible_everywhere: FxHashSet<TypeName>,
    impossible_in_block: FxHashSet<(ProcedureId, BlockId, TypeName)>,
    non_throwing: FxHashSet<ProcedureId>,
    non_returning: FxHashSet<ProcedureId>,
    edge_types: FxHashMap<(ProcedureId, BlockId, BlockId), Vec<TypeName>>,
}

impl ExceptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Oracle under which no implicit exception is ever raised
    pub fn no_implicit_exceptions() -> Self {
        let mut table = Self::new();
        for exception in ImplicitException::ALL {
            table.never(exception);
        }
        table
    }

    pub fn never(&mut self, exception: ImplicitException) -> &mut Self {
        self.impossible_everywhere.insert(exception.type_name());
        self
    }

    pub fn never_in(
        &mut self,
        procedure: impl Into<ProcedureId>,
        block: BlockId,
        exception: ImplicitException,
    ) -> &mut Self {
        self.impossible_in_block
            .insert((procedure.into(), block, exception.type_name()));
        self
    }

    pub fn non_throwing(&mut self, procedure: impl Into<ProcedureId>) -> &mut Self {
        self.non_throwing.insert(procedure.into());
        self
    }

    pub fn non_returning(&mut self, procedure: impl Into<ProcedureId>) -> &mut Self {
        self.non_returning.insert(procedure.into());
        self
    }

    /// Restrict the exception types flowing along one exceptional edge
    pub fn edge_admits(
        &mut self,
        procedure: impl Into<ProcedureId>,
        from: BlockId,
        to: BlockId,
        types: &[&str],
    ) -> &mut Self {
        self.edge_types.insert(
            (procedure.into(), from, to),
            types.iter().map(TypeName::new).collect(),
        );
        self
    }
}

impl ExceptionOracle for ExceptionTable {
    fn can_throw(&self, exception: &TypeName, block: BlockId, procedure: &ProcedureId) -> bool {
        !self.impossible_everywhere.contains(exception)
            && !self
                .impossible_in_block
                .contains(&(procedure.clone(), block, exception.clone()))
    }

    fn can_procedure_throw_any_exception(&self, procedure: &ProcedureId) -> bool {
        !self.non_throwing.contains(procedure)
    }

    fn exceptions(&self, from: BlockId, to: BlockId, procedure: &ProcedureId) -> Vec<TypeName> {
        self.edge_types
            .get(&(procedure.clone(), from, to))
            .cloned()
            .unwrap_or_else(|| vec![TypeName::throwable()])
    }

    fn can_terminate_normally(&self, procedure: &ProcedureId) -> bool {
        !self.non_returning.contains(procedure)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllReachable;

impl ReachabilityOracle for AllReachable {
    fn is_unreachable(&self, _from: BlockId, _to: BlockId, _procedure: &ProcedureId) -> bool {
        false
    }
}

/// Flow edges known to be dead
#[derive(Debug, Clone, Default)]
pub struct DeadEdges {
    dead: FxHashSet<(ProcedureId, BlockId, BlockId)>,
}

impl DeadEdges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, procedure: impl Into<ProcedureId>, from: BlockId, to: BlockId) -> &mut Self {
        self.dead.insert((procedure.into(), from, to));
        self
    }
}

impl ReachabilityOracle for DeadEdges {
    fn is_unreachable(&self, from: BlockId, to: BlockId, procedure: &ProcedureId) -> bool {
        self.dead.contains(&(procedure.clone(), from, to))
    }
}

/// One location per field and one for all array contents
#[derive(Debug, Clone, Default)]
pub struct FieldBasedLocations {
    factory: Arc<LocationFactory>,
}

impl FieldBasedLocations {
    pub fn new(factory: Arc<LocationFactory>) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &Arc<LocationFactory> {
        &self.factory
    }
}

impl LocationOracle for FieldBasedLocations {
    fn locations_for_field(
        &self,
        _receiver: Option<ValueId>,
        field: &FieldRef,
        _procedure: &ProcedureId,
    ) -> Vec<Arc<AbstractLocation>> {
        vec![self.factory.field(field)]
    }

    fn locations_for_array_contents(
        &self,
        _array: ValueId,
        _procedure: &ProcedureId,
    ) -> Vec<Arc<AbstractLocation>> {
        vec![self.factory.array_contents()]
    }
}

/// Heap oracle that knows nothing; every access falls back to location summaries
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocations;

impl LocationOracle for NoLocations {
    fn locations_for_field(
        &self,
        _receiver: Option<ValueId>,
        _field: &FieldRef,
        _procedure: &ProcedureId,
    ) -> Vec<Arc<AbstractLocation>> {
        Vec::new()
    }

    fn locations_for_array_contents(
        &self,
        _array: ValueId,
        _procedure: &ProcedureId,
    ) -> Vec<Arc<AbstractLocation>> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hierarchy_java_lang() {
        let h = NominalHierarchy::with_java_lang();
        let npe = ImplicitException::NullPointer.type_name();
        assert!(h.is_assignable_from(&TypeName::throwable(), &npe));
        assert!(h.is_assignable_from(&TypeName::new("java.lang.RuntimeException"), &npe));
        assert!(!h.is_assignable_from(&TypeName::new("java.lang.Error"), &npe));
        assert!(h.is_assignable_from(
            &TypeName::new("java.lang.Error"),
            &ImplicitException::ClassNotFound.type_name()
        ));
        assert!(h.is_assignable_from(&TypeName::new(OBJECT), &TypeName::new("Foo")));
    }

    #[test]
    fn test_call_graph_dedups() {
        let mut cg = SimpleCallGraph::new();
        cg.add_target("f", CallSiteId(0), "g")
            .add_target("f", CallSiteId(0), "g")
            .add_target("f", CallSiteId(0), "h");
        assert_eq!(cg.edge_count(), 2);
        assert!(cg.possible_targets(&ProcedureId::new("f"), CallSiteId(1)).is_empty());
    }

    #[test]
    fn test_exception_table() {
        let mut table = ExceptionTable::new();
        table
            .never_in("f", BlockId(2), ImplicitException::NullPointer)
            .non_throwing("g");
        let f = ProcedureId::new("f");
        let npe = ImplicitException::NullPointer.type_name();
        assert!(!table.can_throw(&npe, BlockId(2), &f));
        assert!(table.can_throw(&npe, BlockId(3), &f));
        assert!(!table.can_procedure_throw_any_exception(&ProcedureId::new("g")));
        assert_eq!(table.exceptions(BlockId(2), BlockId(1), &f), vec![TypeName::throwable()]);
    }
}
