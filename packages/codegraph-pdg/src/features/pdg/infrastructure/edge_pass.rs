//! Edge Pass
//!
//! Emits every dependency edge of one procedure from the frozen node-pass
//! snapshot. Mirrors the node pass instruction by instruction but never
//! decides control state; all contexts come from [`NodePassResult`].

use super::env::{unique_nodes, value_node, value_nodes, PassEnv};
use super::snapshot::{CallRecord, FlowEdge, NodePassResult};
use crate::errors::{CodegraphError, Result};
use crate::features::flow_graph::{ControlFlowGraph, FlowEdgeKind};
use crate::features::pdg::domain::{CallSiteLabel, ContextRef, EdgeKind, NodeRef, PdgEdge};
use crate::shared::models::{Instruction, InstructionLoc, ProcedureId, ValueId};
use tracing::{debug, trace};

pub struct EdgePass<'a> {
    env: PassEnv<'a>,
    nodes: &'a NodePassResult,
    cfg: &'a ControlFlowGraph,
    added: usize,
}

impl<'a> EdgePass<'a> {
    pub fn new(env: PassEnv<'a>, nodes: &'a NodePassResult) -> Result<Self> {
        let cfg = nodes.procedure.body.as_ref().ok_or_else(|| {
            CodegraphError::invalid_cfg(nodes.procedure.id(), "procedure has no body to analyze")
        })?;
        Ok(Self {
            env,
            nodes,
            cfg,
            added: 0,
        })
    }

    fn id(&self) -> &'a ProcedureId {
        let nodes: &'a NodePassResult = self.nodes;
        nodes.procedure.id()
    }

    /// Emit all edges; returns how many were added to the store
    pub fn run(mut self) -> Result<usize> {
        let cfg = self.cfg;
        for &block in cfg.reverse_postorder() {
            if !self.nodes.block_inputs.contains_key(&block) {
                continue;
            }
            for (i, instruction) in cfg.block(block).instructions.iter().enumerate() {
                let loc = InstructionLoc::new(block, i);
                let Some(input) = self.nodes.instruction_inputs.get(&loc) else {
                    continue;
                };
                let after = self.exception_chain(loc, input)?;
                self.instruction(loc, instruction, &after)?;
            }
        }
        self.post()?;
        debug!(procedure = %self.id(), edges = self.added, "edge pass finished");
        Ok(self.added)
    }

    fn emit(
        &mut self,
        source: &NodeRef,
        target: &NodeRef,
        kind: EdgeKind,
        label: Option<&CallSiteLabel>,
    ) -> Result<()> {
        let mut edge = PdgEdge::new(source, target, kind);
        if let Some(label) = label {
            edge = edge.labelled(label.clone());
        }
        trace!(procedure = %self.id(), edge = %edge, "edge");
        if self.env.store.add_edge(edge) {
            self.added += 1;
            Ok(())
        } else {
            self.env.violation(
                self.id(),
                format!(
                    "duplicate {} edge {} -> {}",
                    kind,
                    source.label(),
                    target.label()
                ),
            )
        }
    }

    fn value(&self, value: ValueId) -> NodeRef {
        value_node(self.env.store, &self.nodes.procedure, &self.nodes.summary, value)
    }

    fn values(&self, values: &[ValueId]) -> Vec<NodeRef> {
        value_nodes(self.env.store, &self.nodes.procedure, &self.nodes.summary, values)
    }

    /// Edges of the implicit-exception branches; returns the context that
    /// survives every check
    fn exception_chain(&mut self, loc: InstructionLoc, input: &ContextRef) -> Result<ContextRef> {
        let nodes: &'a NodePassResult = self.nodes;
        let mut after = input.clone();
        let Some(chain) = nodes.exception_branches.get(&loc) else {
            return Ok(after);
        };
        for branch in chain {
            let thrown = branch.thrown.pc();
            let not_thrown = branch.not_thrown.pc();
            for deciding in &branch.deciding {
                self.emit(deciding, thrown, EdgeKind::True, None)?;
                self.emit(deciding, not_thrown, EdgeKind::False, None)?;
            }
            self.emit(branch.before.pc(), thrown, EdgeKind::Conjunction, None)?;
            self.emit(branch.before.pc(), not_thrown, EdgeKind::Conjunction, None)?;
            if let Some(exception) = branch.thrown.exception_node() {
                self.emit(thrown, exception, EdgeKind::Implicit, None)?;
            }
            after = branch.not_thrown.clone();
        }
        Ok(after)
    }

    /// `EXP` from every distinct operand plus `IMPLICIT` from the PC
    fn expression(&mut self, operands: &[ValueId], result: ValueId, pc: &NodeRef) -> Result<()> {
        let target = self.value(result);
        for operand in self.values(operands) {
            self.emit(&operand, &target, EdgeKind::Exp, None)?;
        }
        self.emit(pc, &target, EdgeKind::Implicit, None)
    }

    fn instruction(
        &mut self,
        loc: InstructionLoc,
        instruction: &Instruction,
        ctx: &ContextRef,
    ) -> Result<()> {
        let nodes: &'a NodePassResult = self.nodes;
        let pc = ctx.pc();
        match instruction {
            Instruction::Binary {
                result,
                left,
                right,
                ..
            }
            | Instruction::Compare {
                result,
                left,
                right,
                ..
            } => self.expression(&[*left, *right], *result, pc),
            Instruction::Unary {
                result, operand, ..
            }
            | Instruction::Conversion {
                result, operand, ..
            } => self.expression(&[*operand], *result, pc),
            Instruction::ArrayLength { result, array } => {
                self.expression(&[*array], *result, pc)
            }
            Instruction::NewArray { result, size, .. } => self.expression(&[*size], *result, pc),
            Instruction::New { result, .. } | Instruction::LoadMetadata { result, .. } => {
                self.expression(&[], *result, pc)
            }
            Instruction::CheckCast {
                result, operand, ..
            } => {
                let source = self.value(*operand);
                let target = self.value(*result);
                self.emit(&source, &target, EdgeKind::Copy, None)?;
                self.emit(pc, &target, EdgeKind::Implicit, None)
            }
            Instruction::InstanceOf {
                result,
                operand,
                operand_type,
                target,
            } => {
                let hierarchy = &self.env.oracles.hierarchy;
                let related = hierarchy.is_assignable_from(target, operand_type)
                    || hierarchy.is_assignable_from(operand_type, target);
                let operands = if related { vec![*operand] } else { Vec::new() };
                self.expression(&operands, *result, pc)
            }
            Instruction::Phi { result, .. } => {
                let target = self.value(*result);
                self.emit(pc, &target, EdgeKind::Implicit, None)
            }
            Instruction::GetField {
                result, receiver, ..
            } => {
                let operands: Vec<ValueId> = receiver.iter().copied().collect();
                self.load(loc, &operands, *result, pc)
            }
            Instruction::ArrayLoad {
                result,
                array,
                index,
            } => self.load(loc, &[*array, *index], *result, pc),
            Instruction::PutField {
                receiver, value, ..
            } => {
                let address: Vec<ValueId> = receiver.iter().copied().collect();
                self.store(loc, &address, *value, pc)
            }
            Instruction::ArrayStore {
                array,
                index,
                value,
                ..
            } => self.store(loc, &[*array, *index], *value, pc),
            Instruction::Branch { .. } => {
                let Some(branch) = nodes.branches.get(&loc) else {
                    return Ok(());
                };
                for deciding in &branch.deciding {
                    self.emit(deciding, &branch.true_pc, EdgeKind::True, None)?;
                    self.emit(deciding, &branch.false_pc, EdgeKind::False, None)?;
                }
                self.emit(branch.before.pc(), &branch.true_pc, EdgeKind::Conjunction, None)?;
                self.emit(branch.before.pc(), &branch.false_pc, EdgeKind::Conjunction, None)
            }
            Instruction::Switch { .. } => {
                let Some(switch) = nodes.switches.get(&loc) else {
                    return Ok(());
                };
                for (_, case) in &switch.cases {
                    self.emit(&switch.scrutinee, case, EdgeKind::Switch, None)?;
                    self.emit(switch.before.pc(), case, EdgeKind::Conjunction, None)?;
                }
                Ok(())
            }
            Instruction::GetCaughtException { result } => {
                let target = self.value(*result);
                let caught = nodes
                    .block_context(loc.block)
                    .and_then(|c| c.exception_node().cloned());
                match caught {
                    Some(exception) => self.emit(&exception, &target, EdgeKind::Copy, None)?,
                    None => self.env.violation(
                        self.id(),
                        format!("{} reads a caught exception outside a handler", loc),
                    )?,
                }
                self.emit(pc, &target, EdgeKind::Implicit, None)
            }
            Instruction::Invoke { .. } => match nodes.calls.get(&loc) {
                Some(call) => self.call(call),
                None => Ok(()),
            },
            // Control flow and exceptions are carried by contexts
            Instruction::Goto { .. }
            | Instruction::Return { .. }
            | Instruction::Throw { .. }
            | Instruction::MonitorEnter { .. }
            | Instruction::MonitorExit { .. } => Ok(()),
        }
    }

    fn load(
        &mut self,
        loc: InstructionLoc,
        address: &[ValueId],
        result: ValueId,
        pc: &NodeRef,
    ) -> Result<()> {
        let nodes: &'a NodePassResult = self.nodes;
        let target = self.value(result);
        if let Some(access) = nodes.heap_accesses.get(&loc) {
            for location in &access.locations {
                self.emit(location, &target, EdgeKind::Exp, None)?;
            }
        }
        self.expression(address, result, pc)
    }

    fn store(
        &mut self,
        loc: InstructionLoc,
        address: &[ValueId],
        value: ValueId,
        pc: &NodeRef,
    ) -> Result<()> {
        let nodes: &'a NodePassResult = self.nodes;
        let Some(access) = nodes.heap_accesses.get(&loc) else {
            return Ok(());
        };
        let Some(store) = &access.store else {
            return self.env.violation(self.id(), format!("heap write at {} has no store node", loc));
        };
        let stored = self.value(value);
        self.emit(&stored, store, EdgeKind::Copy, None)?;
        for operand in self.values(address) {
            self.emit(&operand, store, EdgeKind::Exp, None)?;
        }
        self.emit(pc, store, EdgeKind::Implicit, None)?;
        for location in &access.locations {
            self.emit(store, location, EdgeKind::Copy, None)?;
        }
        Ok(())
    }

    fn call(&mut self, call: &CallRecord) -> Result<()> {
        let caller = self.id();
        let entry = CallSiteLabel::entry(caller, call.site);
        let exit = CallSiteLabel::exit(caller, call.site);
        let pc = call.after_receiver_check.pc();
        let store = self.env.store;

        for (_, assignment, actual) in &call.formal_assignments {
            self.emit(actual, assignment, EdgeKind::Exp, None)?;
        }

        for callee in &call.callees {
            let callee_entry = callee.summary.entry.pc();
            self.emit(pc, callee_entry, EdgeKind::Merge, Some(&entry))?;
            store.record_merge(callee_entry, std::slice::from_ref(pc));
            for (i, assignment, _) in &call.formal_assignments {
                if let Some(formal) = callee.summary.formal(*i) {
                    self.emit(assignment, formal, EdgeKind::Merge, Some(&entry))?;
                    store.record_merge(formal, std::slice::from_ref(assignment));
                }
            }
        }

        if let (Some(callee_pc), Some(join)) = (&call.callee_normal_pc, &call.normal_join) {
            self.emit(callee_pc, join, EdgeKind::Conjunction, Some(&exit))?;
            self.emit(pc, join, EdgeKind::Conjunction, None)?;
            if let Some(result) = &call.result {
                if let Some(returned) = &call.callee_return {
                    self.emit(returned, result, EdgeKind::Copy, Some(&exit))?;
                }
                self.emit(join, result, EdgeKind::Implicit, None)?;
            }
        }

        if let (Some(callee_pc), Some(join)) = (&call.callee_exceptional_pc, &call.exceptional_join)
        {
            self.emit(callee_pc, join, EdgeKind::Conjunction, Some(&exit))?;
            self.emit(pc, join, EdgeKind::Conjunction, None)?;
            if let Some(merged) = &call.callee_exception {
                let thrown = unique_nodes(
                    call.callees
                        .iter()
                        .filter(|c| c.may_throw)
                        .filter_map(|c| c.summary.exception_node().cloned()),
                );
                for exception in &thrown {
                    self.emit(exception, merged, EdgeKind::Copy, Some(&exit))?;
                }
            }
        }
        Ok(())
    }

    /// Wire exit predecessors into the summary, then flush merge provenance
    fn post(&mut self) -> Result<()> {
        let nodes: &'a NodePassResult = self.nodes;
        let cfg = self.cfg;
        let summary = &nodes.summary;
        let exit = cfg.exit();

        let mut normal: Vec<&ContextRef> = Vec::new();
        let mut exceptional: Vec<&ContextRef> = Vec::new();
        for &(from, kind) in cfg.predecessors(exit) {
            let Some(ctx) = nodes.edge_outputs.get(&FlowEdge {
                from,
                to: exit,
                kind,
            }) else {
                continue;
            };
            match kind {
                FlowEdgeKind::Normal => normal.push(ctx),
                FlowEdgeKind::Exceptional => exceptional.push(ctx),
            }
        }

        self.merge_into(summary.normal_exit.pc(), normal.iter().map(|c| c.pc().clone()))?;
        if let Some(ret) = summary.return_node() {
            self.merge_into(ret, normal.iter().filter_map(|c| c.return_node().cloned()))?;
        }
        self.merge_into(
            summary.exceptional_exit.pc(),
            exceptional.iter().map(|c| c.pc().clone()),
        )?;
        if let Some(exception) = summary.exception_node() {
            self.merge_into(
                exception,
                exceptional.iter().filter_map(|c| c.exception_node().cloned()),
            )?;
        }

        for merge in &nodes.merges {
            for contributor in &merge.contributors {
                self.emit(contributor, &merge.target, EdgeKind::Merge, merge.label.as_ref())?;
            }
            self.env.store.record_merge(&merge.target, &merge.contributors);
        }
        Ok(())
    }

    fn merge_into(
        &mut self,
        target: &NodeRef,
        contributors: impl IntoIterator<Item = NodeRef>,
    ) -> Result<()> {
        let contributors = unique_nodes(contributors);
        if contributors.is_empty() {
            return Ok(());
        }
        for contributor in &contributors {
            self.emit(contributor, target, EdgeKind::Merge, None)?;
        }
        self.env.store.record_merge(target, &contributors);
        Ok(())
    }
}
