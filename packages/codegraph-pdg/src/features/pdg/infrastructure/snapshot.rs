//! Node-pass results handed to the edge pass
//!
//! Everything the edge pass needs is frozen here once the node pass reaches
//! its fixpoint; the edge pass only reads it.

use crate::features::flow_graph::FlowEdgeKind;
use crate::features::pdg::domain::{CallSiteLabel, ContextRef, NodeRef, ProcedureSummary};
use crate::shared::models::{BlockId, CallSiteId, ImplicitException, InstructionLoc, Procedure};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// One CFG edge, distinguished by kind (a block may reach the exit both ways)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowEdge {
    pub from: BlockId,
    pub to: BlockId,
    pub kind: FlowEdgeKind,
}

/// Outcome of one possible implicit exception, modeled as a boolean branch
#[derive(Debug, Clone)]
pub struct ExceptionBranch {
    pub exception: ImplicitException,
    pub reason: String,
    pub deciding: Vec<NodeRef>,
    pub before: ContextRef,
    /// True branch: exception object plus true PC
    pub thrown: ContextRef,
    /// False branch: execution continues
    pub not_thrown: ContextRef,
}

#[derive(Debug, Clone)]
pub struct BranchRecord {
    pub before: ContextRef,
    pub deciding: Vec<NodeRef>,
    pub true_pc: NodeRef,
    pub false_pc: NodeRef,
}

#[derive(Debug, Clone)]
pub struct SwitchRecord {
    pub before: ContextRef,
    pub scrutinee: NodeRef,
    /// One PC per distinct target block
    pub cases: Vec<(BlockId, NodeRef)>,
}

/// Heap locations an instruction reads or writes
#[derive(Debug, Clone)]
pub struct HeapAccess {
    pub locations: Vec<NodeRef>,
    /// Per-instruction store expression, writes only
    pub store: Option<NodeRef>,
}

#[derive(Debug, Clone)]
pub struct CalleeLink {
    pub summary: Arc<ProcedureSummary>,
    pub returns_normally: bool,
    pub may_throw: bool,
}

#[derive(Debug, Clone)]
pub struct CallRecord {
    pub site: CallSiteId,
    /// Context after the receiver null check
    pub after_receiver_check: ContextRef,
    pub callees: Vec<CalleeLink>,
    /// `(argument index, formal-assignment node, actual value node)`
    pub formal_assignments: Vec<(usize, NodeRef, NodeRef)>,
    pub result: Option<NodeRef>,
    pub normal_join: Option<NodeRef>,
    pub exceptional_join: Option<NodeRef>,
    pub callee_normal_pc: Option<NodeRef>,
    pub callee_exceptional_pc: Option<NodeRef>,
    pub callee_return: Option<NodeRef>,
    pub callee_exception: Option<NodeRef>,
}

/// A merge node and everything that must flow into it
#[derive(Debug, Clone)]
pub struct MergeRecord {
    pub target: NodeRef,
    pub contributors: Vec<NodeRef>,
    pub label: Option<CallSiteLabel>,
}

/// Frozen result of a node pass
#[derive(Debug)]
pub struct NodePassResult {
    pub procedure: Arc<Procedure>,
    pub summary: Arc<ProcedureSummary>,
    /// Context flowing into each reachable instruction
    pub instruction_inputs: FxHashMap<InstructionLoc, ContextRef>,
    /// Most recent confluence context of each reachable block
    pub block_inputs: FxHashMap<BlockId, ContextRef>,
    /// Context at each block's terminator (donor of PC restoration)
    pub terminal_contexts: FxHashMap<BlockId, ContextRef>,
    pub edge_outputs: FxHashMap<FlowEdge, ContextRef>,
    /// Implicit-exception branches of each instruction, in check order
    pub exception_branches: FxHashMap<InstructionLoc, Vec<ExceptionBranch>>,
    pub branches: FxHashMap<InstructionLoc, BranchRecord>,
    pub switches: FxHashMap<InstructionLoc, SwitchRecord>,
    pub heap_accesses: FxHashMap<InstructionLoc, HeapAccess>,
    pub calls: FxHashMap<InstructionLoc, CallRecord>,
    pub merges: Vec<MergeRecord>,
    /// Confluence blocks whose PC was taken from a dominating block
    pub restorations: FxHashMap<BlockId, BlockId>,
    pub skipped_call_sites: Vec<CallSiteId>,
    pub iterations: usize,
}

impl NodePassResult {
    pub fn exception_branch(
        &self,
        loc: InstructionLoc,
        exception: ImplicitException,
    ) -> Option<&ExceptionBranch> {
        self.exception_branches
            .get(&loc)
            .and_then(|chain| chain.iter().find(|b| b.exception == exception))
    }

    pub fn block_context(&self, block: BlockId) -> Option<&ContextRef> {
        self.block_inputs.get(&block)
    }

    pub fn terminal_context(&self, block: BlockId) -> Option<&ContextRef> {
        self.terminal_contexts.get(&block)
    }

    /// Context leaving `from` towards `to`, normal edge first
    pub fn edge_context(&self, from: BlockId, to: BlockId) -> Option<&ContextRef> {
        [FlowEdgeKind::Normal, FlowEdgeKind::Exceptional]
            .into_iter()
            .find_map(|kind| self.edge_outputs.get(&FlowEdge { from, to, kind }))
    }
}
