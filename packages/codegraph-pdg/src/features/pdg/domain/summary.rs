//! Procedure summaries: the fixed boundary nodes shared by every caller

use super::context::ContextRef;
use super::node::NodeRef;
use crate::shared::models::ProcedureId;

#[derive(Debug)]
pub struct ProcedureSummary {
    pub procedure: ProcedureId,
    /// PC at procedure entry
    pub entry: ContextRef,
    /// Normal-exit PC plus the return node for non-void procedures
    pub normal_exit: ContextRef,
    /// Exceptional-exit PC plus the escaping exception value
    pub exceptional_exit: ContextRef,
    /// One slot per parameter; `None` where no formal node is tracked
    pub formals: Vec<Option<NodeRef>>,
}

impl ProcedureSummary {
    pub fn formal(&self, index: usize) -> Option<&NodeRef> {
        self.formals.get(index).and_then(|f| f.as_ref())
    }

    pub fn return_node(&self) -> Option<&NodeRef> {
        self.normal_exit.return_node()
    }

    pub fn exception_node(&self) -> Option<&NodeRef> {
        self.exceptional_exit.exception_node()
    }
}
