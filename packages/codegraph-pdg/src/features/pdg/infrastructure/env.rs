//! Shared inputs of one procedure's node and edge passes

use super::summary_registry::SummaryRegistry;
use crate::config::PdgConfig;
use crate::errors::{CodegraphError, Result};
use crate::features::pdg::domain::{NodeKey, NodeKind, NodeRef, ProcedureSummary};
use crate::features::pdg::ports::{AnalysisOracles, GraphStore};
use crate::shared::models::{Procedure, ProcedureId, Program, ValueId};
use rustc_hash::FxHashSet;
use tracing::warn;

#[derive(Clone, Copy)]
pub struct PassEnv<'a> {
    pub store: &'a dyn GraphStore,
    pub summaries: &'a SummaryRegistry,
    pub program: &'a Program,
    pub oracles: &'a AnalysisOracles,
    pub config: &'a PdgConfig,
}

impl<'a> PassEnv<'a> {
    /// Fails in strict mode, logs otherwise
    pub fn violation(&self, procedure: &ProcedureId, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        if self.config.strict_invariants {
            return Err(CodegraphError::invariant(procedure, message));
        }
        warn!(procedure = %procedure, "invariant violated: {}", message);
        Ok(())
    }
}

/// Node standing for an SSA value: the summary formal for tracked
/// parameters, a base value for constants, a local value otherwise
pub fn value_node(
    store: &dyn GraphStore,
    procedure: &Procedure,
    summary: &ProcedureSummary,
    value: ValueId,
) -> NodeRef {
    if let Some(formal) = procedure.param_index(value).and_then(|i| summary.formal(i)) {
        return formal.clone();
    }
    let owner = Some(procedure.id());
    match procedure.constants.get(&value) {
        Some(constant) => store.find_or_create(NodeKind::BaseValue, owner, NodeKey::Value(value), &|| {
            constant.to_string()
        }),
        None => store.find_or_create(NodeKind::LocalValue, owner, NodeKey::Value(value), &|| {
            value.to_string()
        }),
    }
}

/// Value nodes for `values`, duplicates removed, order kept
pub fn value_nodes(
    store: &dyn GraphStore,
    procedure: &Procedure,
    summary: &ProcedureSummary,
    values: &[ValueId],
) -> Vec<NodeRef> {
    unique_nodes(values.iter().map(|v| value_node(store, procedure, summary, *v)))
}

pub fn unique_nodes(nodes: impl IntoIterator<Item = NodeRef>) -> Vec<NodeRef> {
    let mut seen = FxHashSet::default();
    nodes.into_iter().filter(|n| seen.insert(n.id())).collect()
}
