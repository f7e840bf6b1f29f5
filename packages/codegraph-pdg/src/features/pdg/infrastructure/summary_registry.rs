//! Procedure summary registry
//!
//! One [`ProcedureSummary`] per procedure for the whole run. Callers and the
//! procedure's own analysis may race to create it; the entry API makes the
//! first insertion win and everyone else reads that one.

use crate::features::pdg::domain::{Context, NodeKey, NodeKind, ProcedureSummary, SummaryPart};
use crate::features::pdg::ports::GraphStore;
use crate::shared::models::{ProcedureId, ProcedureSignature, ValueType};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

#[derive(Debug, Default)]
pub struct SummaryRegistry {
    summaries: DashMap<ProcedureId, Arc<ProcedureSummary>>,
    created: AtomicUsize,
    primitive_formals: bool,
}

impl SummaryRegistry {
    pub fn new(primitive_formals: bool) -> Self {
        Self {
            primitive_formals,
            ..Default::default()
        }
    }

    pub fn get(&self, procedure: &ProcedureId) -> Option<Arc<ProcedureSummary>> {
        self.summaries.get(procedure).map(|s| s.clone())
    }

    pub fn get_or_create(
        &self,
        signature: &ProcedureSignature,
        store: &dyn GraphStore,
    ) -> Arc<ProcedureSummary> {
        if let Some(existing) = self.summaries.get(&signature.id) {
            return existing.clone();
        }
        self.summaries
            .entry(signature.id.clone())
            .or_insert_with(|| {
                self.created.fetch_add(1, Ordering::Relaxed);
                trace!(procedure = %signature.id, "creating procedure summary");
                Arc::new(build_summary(signature, store, self.primitive_formals))
            })
            .clone()
    }

    /// Number of summaries built so far (never more than one per procedure)
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }
}

fn build_summary(
    signature: &ProcedureSignature,
    store: &dyn GraphStore,
    primitive_formals: bool,
) -> ProcedureSummary {
    let owner = Some(&signature.id);
    let id = &signature.id;
    let node = |kind: NodeKind, part: SummaryPart, label: String| {
        store.find_or_create(kind, owner, NodeKey::Summary(part), &|| label.clone())
    };

    let entry_pc = node(NodeKind::PcOther, SummaryPart::EntryPc, format!("entry pc {}", id));
    let normal_pc = node(NodeKind::PcOther, SummaryPart::NormalExitPc, format!("normal exit pc {}", id));
    let exceptional_pc = node(
        NodeKind::PcOther,
        SummaryPart::ExceptionalExitPc,
        format!("exceptional exit pc {}", id),
    );
    let return_node = signature
        .returns_value()
        .then(|| node(NodeKind::OtherExpression, SummaryPart::ReturnValue, format!("return {}", id)));
    let exception = node(NodeKind::ExceptionMerge, SummaryPart::Exception, format!("exception {}", id));

    let formals = signature
        .params
        .iter()
        .enumerate()
        .map(|(i, ty)| match ty {
            ValueType::Primitive(_) if !primitive_formals => None,
            _ => Some(node(NodeKind::LocalValue, SummaryPart::Formal(i), format!("formal {} {}", i, id))),
        })
        .collect();

    ProcedureSummary {
        procedure: id.clone(),
        entry: Arc::new(Context::normal(entry_pc)),
        normal_exit: Arc::new(Context::new(return_node, None, normal_pc)),
        exceptional_exit: Arc::new(Context::exceptional(exception, exceptional_pc)),
        formals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::pdg::infrastructure::graph::ProgramDependenceGraph;
    use crate::shared::models::PrimitiveType;

    fn signature() -> ProcedureSignature {
        ProcedureSignature::new(
            "A.f(ILjava/lang/String;)I",
            vec![ValueType::Primitive(PrimitiveType::Int), ValueType::reference("java.lang.String")],
            ValueType::Primitive(PrimitiveType::Int),
        )
    }

    #[test]
    fn test_created_once() {
        let pdg = ProgramDependenceGraph::new();
        let registry = SummaryRegistry::new(false);
        let a = registry.get_or_create(&signature(), &pdg);
        let b = registry.get_or_create(&signature(), &pdg);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.created(), 1);
    }

    #[test]
    fn test_summary_shape() {
        let pdg = ProgramDependenceGraph::new();
        let summary = SummaryRegistry::new(false).get_or_create(&signature(), &pdg);

        assert!(summary.formal(0).is_none());
        assert!(summary.formal(1).is_some());
        assert!(summary.return_node().is_some());
        assert!(summary.exception_node().is_some());
        assert!(summary.entry.is_plain());
        assert!(summary.exceptional_exit.return_node().is_none());
    }

    #[test]
    fn test_primitive_formals_opt_in() {
        let pdg = ProgramDependenceGraph::new();
        let summary = SummaryRegistry::new(true).get_or_create(&signature(), &pdg);
        assert!(summary.formal(0).is_some());
    }

    #[test]
    fn test_void_has_no_return_node() {
        let pdg = ProgramDependenceGraph::new();
        let sig = ProcedureSignature::new("A.g()V", vec![], ValueType::Void);
        let summary = SummaryRegistry::new(false).get_or_create(&sig, &pdg);
        assert!(summary.return_node().is_none());
    }
}
