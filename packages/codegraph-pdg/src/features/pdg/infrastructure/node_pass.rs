//! Node Pass
//!
//! Forward dataflow over one procedure's CFG. For every program point it
//! decides which control node (PC) holds, plus the exception value on
//! exceptional edges and the return value on the normal edge into the exit.
//! Merge nodes are created at confluences; a confluence block that is
//! control-equivalent with a dominating block reuses that block's PC
//! instead (post-dominance restoration).
//!
//! Implicit exceptions are a sequential chain of boolean branches: each
//! possible exception splits the current context into a "thrown" context
//! (exception object + true PC) and a "not thrown" context (false PC) that
//! feeds the next check.
//!
//! The pass only creates nodes. Its results are frozen into a
//! [`NodePassResult`] for the edge pass.

use super::env::{unique_nodes, value_node, value_nodes, PassEnv};
use super::snapshot::{
    BranchRecord, CallRecord, CalleeLink, ExceptionBranch, FlowEdge, HeapAccess, MergeRecord,
    NodePassResult, SwitchRecord,
};
use crate::errors::{CodegraphError, Result};
use crate::features::flow_graph::{ControlFlowGraph, FlowEdgeKind};
use crate::features::pdg::domain::{
    CallSiteLabel, CallSitePart, Context, ContextKey, ContextRef, NodeId, NodeKey, NodeKind,
    NodeRef, ProcedureSummary,
};
use crate::features::points_to::AbstractLocation;
use crate::shared::models::{
    BlockId, CallSiteId, FieldRef, ImplicitException, Instruction, InstructionLoc,
    PossibleException, Procedure,
    ProcedureId, TypeName, ValueId,
};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Where a merge happens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum MergeSite {
    Block(BlockId),
    /// Several exceptions leaving one block along one exceptional edge
    Edge(BlockId, BlockId),
}

impl MergeSite {
    fn key(self) -> NodeKey {
        match self {
            MergeSite::Block(b) => NodeKey::Block(b),
            MergeSite::Edge(from, to) => NodeKey::FlowEdge { from, to },
        }
    }
}

#[derive(Debug, Clone)]
struct Confluence {
    context: ContextRef,
    merges: Vec<MergeRecord>,
    restored_from: Option<BlockId>,
}

#[derive(Debug, Clone)]
enum RaisedBy {
    Implicit(TypeName),
    Thrown(TypeName),
    Callee,
}

/// An exceptional context produced inside a block
#[derive(Debug, Clone)]
struct Raised {
    by: RaisedBy,
    context: ContextRef,
}

/// Result of one instruction's transfer function
enum Flow {
    /// Continue with the next instruction or the block's normal successors
    Next(ContextRef),
    /// Per-successor contexts (branches, switches, return)
    Targets(Vec<(BlockId, ContextRef)>),
    /// No normal successor
    Halt,
}

pub struct NodePass<'a> {
    env: PassEnv<'a>,
    procedure: &'a Arc<Procedure>,
    cfg: &'a ControlFlowGraph,
    summary: Arc<ProcedureSummary>,

    block_inputs: FxHashMap<BlockId, ContextRef>,
    /// Context in force at each block's terminator, after every check and
    /// call that precedes it
    terminal_contexts: FxHashMap<BlockId, ContextRef>,
    instruction_inputs: FxHashMap<InstructionLoc, ContextRef>,
    edge_outputs: FxHashMap<FlowEdge, ContextRef>,
    exception_branches: FxHashMap<InstructionLoc, Vec<ExceptionBranch>>,
    branches: FxHashMap<InstructionLoc, BranchRecord>,
    switches: FxHashMap<InstructionLoc, SwitchRecord>,
    heap_accesses: FxHashMap<InstructionLoc, HeapAccess>,
    calls: FxHashMap<InstructionLoc, CallRecord>,
    merges: FxHashMap<NodeId, MergeRecord>,
    confluences: FxHashMap<(MergeSite, Vec<ContextKey>), Confluence>,
    plain: FxHashMap<ContextKey, ContextRef>,
    restorations: FxHashMap<BlockId, BlockId>,
    skipped_call_sites: BTreeSet<CallSiteId>,
}

impl<'a> NodePass<'a> {
    pub fn new(env: PassEnv<'a>, procedure: &'a Arc<Procedure>) -> Result<Self> {
        let cfg = procedure.body.as_ref().ok_or_else(|| {
            CodegraphError::invalid_cfg(procedure.id(), "procedure has no body to analyze")
        })?;
        let summary = env.summaries.get_or_create(&procedure.signature, env.store);
        Ok(Self {
            env,
            procedure,
            cfg,
            summary,
            block_inputs: FxHashMap::default(),
            terminal_contexts: FxHashMap::default(),
            instruction_inputs: FxHashMap::default(),
            edge_outputs: FxHashMap::default(),
            exception_branches: FxHashMap::default(),
            branches: FxHashMap::default(),
            switches: FxHashMap::default(),
            heap_accesses: FxHashMap::default(),
            calls: FxHashMap::default(),
            merges: FxHashMap::default(),
            confluences: FxHashMap::default(),
            plain: FxHashMap::default(),
            restorations: FxHashMap::default(),
            skipped_call_sites: BTreeSet::new(),
        })
    }

    fn id(&self) -> &'a ProcedureId {
        let procedure: &'a Arc<Procedure> = self.procedure;
        procedure.id()
    }

    /// Iterate to a fixpoint, then freeze the results
    pub fn run(mut self) -> Result<NodePassResult> {
        let cfg = self.cfg;
        let rpo = cfg.reverse_postorder();
        let position: FxHashMap<BlockId, usize> =
            rpo.iter().enumerate().map(|(i, b)| (*b, i)).collect();
        let mut worklist: BTreeSet<usize> = BTreeSet::new();
        if let Some(&entry) = position.get(&cfg.entry()) {
            worklist.insert(entry);
        }

        let limit = self.env.config.max_fixpoint_iterations;
        let mut iterations = 0;
        while let Some(pos) = worklist.pop_first() {
            iterations += 1;
            if iterations > limit {
                return Err(CodegraphError::FixpointLimit {
                    procedure: self.id().to_string(),
                    iterations: limit,
                });
            }

            let block = rpo[pos];
            if block == cfg.exit() {
                continue;
            }
            let input = if block == cfg.entry() {
                self.summary.entry.clone()
            } else {
                match self.confluence(block)? {
                    Some(input) => input,
                    None => continue,
                }
            };
            self.block_inputs.insert(block, input.clone());

            let outputs = self.transfer_block(block, input)?;
            for &(to, kind) in cfg.successors(block) {
                let edge = FlowEdge {
                    from: block,
                    to,
                    kind,
                };
                let new = outputs.get(&edge);
                let changed = match (self.edge_outputs.get(&edge), new) {
                    (Some(old), Some(new)) => old.key() != new.key(),
                    (None, None) => false,
                    _ => true,
                };
                if !changed {
                    continue;
                }
                match new {
                    Some(ctx) => {
                        self.check_output(&edge, ctx)?;
                        self.edge_outputs.insert(edge, ctx.clone());
                    }
                    None => {
                        self.edge_outputs.remove(&edge);
                    }
                }
                if let Some(&p) = position.get(&to) {
                    worklist.insert(p);
                }
            }
        }

        debug!(
            procedure = %self.id(),
            iterations,
            blocks = self.block_inputs.len(),
            merges = self.merges.len(),
            restorations = self.restorations.len(),
            "node pass reached fixpoint"
        );
        Ok(self.post(iterations))
    }

    fn post(self, iterations: usize) -> NodePassResult {
        let mut merges: Vec<MergeRecord> = self.merges.into_values().collect();
        merges.sort_by_key(|m| m.target.id());
        NodePassResult {
            procedure: self.procedure.clone(),
            summary: self.summary,
            instruction_inputs: self.instruction_inputs,
            block_inputs: self.block_inputs,
            terminal_contexts: self.terminal_contexts,
            edge_outputs: self.edge_outputs,
            exception_branches: self.exception_branches,
            branches: self.branches,
            switches: self.switches,
            heap_accesses: self.heap_accesses,
            calls: self.calls,
            merges,
            restorations: self.restorations,
            skipped_call_sites: self.skipped_call_sites.into_iter().collect(),
            iterations,
        }
    }

    // ------------------------------------------------------------------
    // Confluence
    // ------------------------------------------------------------------

    fn confluence(&mut self, block: BlockId) -> Result<Option<ContextRef>> {
        let mut seen = FxHashSet::default();
        let mut inputs: Vec<ContextRef> = Vec::new();
        for &(from, kind) in self.cfg.predecessors(block) {
            if let Some(ctx) = self.edge_outputs.get(&FlowEdge { from, to: block, kind }) {
                if seen.insert(ctx.key()) {
                    inputs.push(ctx.clone());
                }
            }
        }
        match inputs.len() {
            0 => Ok(None),
            1 => Ok(inputs.pop()),
            _ => self.merge_contexts(MergeSite::Block(block), inputs).map(Some),
        }
    }

    /// Merge several distinct contexts; memoized so an unchanged input set
    /// yields the identical context object
    fn merge_contexts(&mut self, site: MergeSite, inputs: Vec<ContextRef>) -> Result<ContextRef> {
        let mut keys: Vec<ContextKey> = inputs.iter().map(|c| c.key()).collect();
        keys.sort_unstable();
        let memo = (site, keys);
        if let Some(hit) = self.confluences.get(&memo).cloned() {
            self.register(hit.merges);
            if let (MergeSite::Block(block), Some(donor)) = (site, hit.restored_from) {
                self.restorations.insert(block, donor);
            }
            return Ok(hit.context);
        }

        let id = self.id();
        let exceptional = inputs.iter().filter(|c| c.exception_node().is_some()).count();
        if exceptional != 0 && exceptional != inputs.len() {
            self.env.violation(id, format!("{:?} joins normal and exceptional flow", site))?;
        }
        if inputs.iter().any(|c| c.return_node().is_some()) {
            self.env.violation(id, format!("return value reaches confluence {:?}", site))?;
        }

        let mut records = Vec::new();
        let pcs = unique_nodes(inputs.iter().map(|c| c.pc().clone()));
        let mut restored_from = None;
        let pc = if pcs.len() == 1 {
            pcs[0].clone()
        } else if let Some((donor, pc)) = self.restoration(site) {
            restored_from = Some(donor);
            pc
        } else {
            self.merge_node(NodeKind::PcMerge, site.key(), pcs, None, &mut records)
        };

        let exceptions = unique_nodes(inputs.iter().filter_map(|c| c.exception_node().cloned()));
        let exception = match exceptions.len() {
            0 => None,
            1 => exceptions.into_iter().next(),
            _ => Some(self.merge_node(
                NodeKind::ExceptionMerge,
                site.key(),
                exceptions,
                None,
                &mut records,
            )),
        };

        let context = Arc::new(Context::new(None, exception, pc));
        trace!(procedure = %id, site = ?site, context = %context, "confluence");
        if let (MergeSite::Block(block), Some(donor)) = (site, restored_from) {
            self.restorations.insert(block, donor);
        }
        self.register(records.clone());
        self.confluences.insert(
            memo,
            Confluence {
                context: context.clone(),
                merges: records,
                restored_from,
            },
        );
        Ok(context)
    }

    /// PC at the branch point that `block` reconverges
    ///
    /// Candidates are the strict dominators whose immediate post-dominator
    /// is `block`; a candidate dominated by another candidate is dropped.
    /// Exactly one must remain and its terminator must have been reached.
    fn restoration(&self, site: MergeSite) -> Option<(BlockId, NodeRef)> {
        let MergeSite::Block(block) = site else {
            return None;
        };
        if !self.env.config.post_dominance_restoration
            || block == self.cfg.exit()
            || self.cfg.predecessors(block).len() <= 1
        {
            return None;
        }

        let dominators = self.cfg.dominators();
        let post_dominators = self.cfg.post_dominators();
        let candidates: Vec<BlockId> = dominators
            .strict_dominators(block)
            .into_iter()
            .filter(|d| post_dominators.immediate(*d) == Some(block))
            .collect();
        let outermost: Vec<BlockId> = candidates
            .iter()
            .copied()
            .filter(|d| {
                !candidates
                    .iter()
                    .any(|other| other != d && dominators.strictly_dominates(*other, *d))
            })
            .collect();
        match outermost.as_slice() {
            [donor] => self
                .terminal_contexts
                .get(donor)
                .map(|ctx| (*donor, ctx.pc().clone())),
            _ => None,
        }
    }

    /// Merge node over `contributors`; a placeholder when there are none
    fn merge_node(
        &self,
        kind: NodeKind,
        key: NodeKey,
        contributors: Vec<NodeRef>,
        label: Option<CallSiteLabel>,
        records: &mut Vec<MergeRecord>,
    ) -> NodeRef {
        let owner = Some(self.id());
        if contributors.is_empty() {
            warn!(procedure = %self.id(), key = ?key, "merge requested over no contributors; using placeholder");
            let placeholder_kind = if kind.is_pc() {
                NodeKind::PcOther
            } else {
                NodeKind::OtherExpression
            };
            return self.env.store.find_or_create(
                placeholder_kind,
                owner,
                NodeKey::Placeholder(Box::new(key)),
                &|| format!("placeholder {}", kind),
            );
        }
        let target = self.env.store.find_or_create(kind, owner, key.clone(), &|| {
            format!("{} {:?}", kind, key)
        });
        records.push(MergeRecord {
            target: target.clone(),
            contributors,
            label,
        });
        target
    }

    fn register(&mut self, records: Vec<MergeRecord>) {
        for record in records {
            self.merges.insert(record.target.id(), record);
        }
    }

    /// Context with exception and return values dropped
    fn plain(&mut self, ctx: &ContextRef) -> ContextRef {
        if ctx.is_plain() {
            return ctx.clone();
        }
        self.plain
            .entry(ctx.key())
            .or_insert_with(|| Arc::new(Context::normal(ctx.pc().clone())))
            .clone()
    }

    fn check_output(&self, edge: &FlowEdge, ctx: &Context) -> Result<()> {
        let id = self.id();
        let problem = match edge.kind {
            FlowEdgeKind::Exceptional if ctx.exception_node().is_none() => {
                Some("exceptional edge without exception value")
            }
            FlowEdgeKind::Exceptional if ctx.return_node().is_some() => {
                Some("return value on exceptional edge")
            }
            FlowEdgeKind::Normal if ctx.exception_node().is_some() => {
                Some("exception value on normal edge")
            }
            FlowEdgeKind::Normal if edge.to != self.cfg.exit() && ctx.return_node().is_some() => {
                Some("return value on edge not entering the exit")
            }
            FlowEdgeKind::Normal
                if edge.to == self.cfg.exit()
                    && ctx.return_node().is_some() != self.procedure.signature.returns_value() =>
            {
                Some("return value presence does not match the signature")
            }
            _ => None,
        };
        match problem {
            Some(problem) => self.env.violation(
                id,
                format!("{} ({} -> {})", problem, edge.from, edge.to),
            ),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Transfer
    // ------------------------------------------------------------------

    fn transfer_block(
        &mut self,
        block: BlockId,
        input: ContextRef,
    ) -> Result<FxHashMap<FlowEdge, ContextRef>> {
        let cfg = self.cfg;
        let id = self.id();
        let mut current = input;
        let mut raised: Vec<Raised> = Vec::new();
        let mut targets: Option<Vec<(BlockId, ContextRef)>> = None;
        let mut terminal: Option<ContextRef> = None;
        let mut falls_through = true;

        for (i, instruction) in cfg.block(block).instructions.iter().enumerate() {
            let loc = InstructionLoc::new(block, i);
            self.instruction_inputs.insert(loc, current.clone());
            match self.transfer(loc, instruction, &current, &mut raised)? {
                Flow::Next(next) => current = self.plain(&next),
                Flow::Targets(explicit) => {
                    terminal = match (self.branches.get(&loc), self.switches.get(&loc)) {
                        (Some(branch), _) => Some(branch.before.clone()),
                        (None, Some(switch)) => Some(switch.before.clone()),
                        (None, None) => None,
                    };
                    targets = Some(explicit);
                    falls_through = false;
                    break;
                }
                Flow::Halt => {
                    falls_through = false;
                    break;
                }
            }
        }

        if falls_through {
            terminal = Some(self.plain(&current));
        }
        match terminal {
            Some(ctx) => {
                self.terminal_contexts.insert(block, ctx);
            }
            None => {
                self.terminal_contexts.remove(&block);
            }
        }

        let env = self.env;
        let reachability = &env.oracles.reachability;
        let mut outputs = FxHashMap::default();
        let normal = |to: BlockId| FlowEdge {
            from: block,
            to,
            kind: FlowEdgeKind::Normal,
        };
        if let Some(explicit) = targets {
            for (to, ctx) in explicit {
                if !reachability.is_unreachable(block, to, id) {
                    outputs.insert(normal(to), ctx);
                }
            }
        } else if falls_through {
            let ctx = self.plain(&current);
            for to in cfg.normal_successors(block) {
                if !reachability.is_unreachable(block, to, id) {
                    outputs.insert(normal(to), ctx.clone());
                }
            }
        }

        for to in cfg.exceptional_successors(block) {
            if raised.is_empty() || reachability.is_unreachable(block, to, id) {
                continue;
            }
            let admitted = env.oracles.exceptions.exceptions(block, to, id);
            let mut seen = FxHashSet::default();
            let flowing: Vec<ContextRef> = raised
                .iter()
                .filter(|r| self.admits(&admitted, &r.by))
                .filter(|r| seen.insert(r.context.key()))
                .map(|r| r.context.clone())
                .collect();
            let ctx = match flowing.len() {
                0 => continue,
                1 => flowing[0].clone(),
                _ => self.merge_contexts(MergeSite::Edge(block, to), flowing)?,
            };
            outputs.insert(
                FlowEdge {
                    from: block,
                    to,
                    kind: FlowEdgeKind::Exceptional,
                },
                ctx,
            );
        }
        Ok(outputs)
    }

    /// Whether an exception raised one way may travel an edge admitting `admitted`
    fn admits(&self, admitted: &[TypeName], by: &RaisedBy) -> bool {
        let hierarchy = &self.env.oracles.hierarchy;
        match by {
            RaisedBy::Callee => !admitted.is_empty(),
            RaisedBy::Implicit(ty) => admitted
                .iter()
                .any(|t| t.is_throwable() || t == ty || hierarchy.is_assignable_from(t, ty)),
            RaisedBy::Thrown(ty) => admitted.iter().any(|t| {
                t.is_throwable()
                    || t == ty
                    || hierarchy.is_assignable_from(t, ty)
                    || hierarchy.is_assignable_from(ty, t)
            }),
        }
    }

    fn value(&self, value: ValueId) -> NodeRef {
        value_node(self.env.store, self.procedure, &self.summary, value)
    }

    fn transfer(
        &mut self,
        loc: InstructionLoc,
        instruction: &Instruction,
        current: &ContextRef,
        raised: &mut Vec<Raised>,
    ) -> Result<Flow> {
        for value in instruction.uses().into_iter().chain(instruction.result()) {
            self.value(value);
        }

        let previous = self.exception_branches.remove(&loc).unwrap_or_default();
        let mut chain = Vec::new();
        let mut after = current.clone();
        for check in possible_exceptions(instruction, self.env) {
            after = self.possible_exception(loc, &check, after, &previous, &mut chain, raised);
        }
        if !chain.is_empty() {
            self.exception_branches.insert(loc, chain);
        }

        let owner = Some(self.id());
        let store = self.env.store;
        match instruction {
            Instruction::Branch {
                op,
                left,
                right,
                true_target,
                false_target,
            } => {
                if true_target == false_target {
                    return Ok(Flow::Next(after));
                }
                let condition = match right {
                    Some(right) => format!("{} {} {}", left, op.symbol(), right),
                    None => format!("{} {} 0", left, op.symbol()),
                };
                let key = NodeKey::Instruction(loc);
                let true_pc =
                    store.find_or_create(NodeKind::BooleanTruePc, owner, key.clone(), &|| {
                        condition.clone()
                    });
                let false_pc = store.find_or_create(NodeKind::BooleanFalsePc, owner, key, &|| {
                    format!("!({})", condition)
                });
                let deciding = value_nodes(store, self.procedure, &self.summary, &instruction.uses());
                self.branches.insert(
                    loc,
                    BranchRecord {
                        before: after,
                        deciding,
                        true_pc: true_pc.clone(),
                        false_pc: false_pc.clone(),
                    },
                );
                Ok(Flow::Targets(vec![
                    (*true_target, Arc::new(Context::normal(true_pc))),
                    (*false_target, Arc::new(Context::normal(false_pc))),
                ]))
            }
            Instruction::Switch {
                scrutinee,
                cases,
                default,
            } => {
                let mut distinct: Vec<BlockId> = Vec::new();
                for target in cases.iter().map(|(_, t)| *t).chain(Some(*default)) {
                    if !distinct.contains(&target) {
                        distinct.push(target);
                    }
                }
                if distinct.len() == 1 {
                    return Ok(Flow::Next(after));
                }
                let case_pcs: Vec<(BlockId, NodeRef)> = distinct
                    .iter()
                    .map(|target| {
                        let pc = store.find_or_create(
                            NodeKind::PcOther,
                            owner,
                            NodeKey::SwitchCase { loc, target: *target },
                            &|| format!("switch {} -> {}", scrutinee, target),
                        );
                        (*target, pc)
                    })
                    .collect();
                let targets = case_pcs
                    .iter()
                    .map(|(target, pc)| (*target, Arc::new(Context::normal(pc.clone()))))
                    .collect();
                let scrutinee = self.value(*scrutinee);
                self.switches.insert(
                    loc,
                    SwitchRecord {
                        before: after,
                        scrutinee,
                        cases: case_pcs,
                    },
                );
                Ok(Flow::Targets(targets))
            }
            Instruction::Return { value } => {
                let returns_value = self.procedure.signature.returns_value();
                let ret = match (returns_value, value) {
                    (true, Some(v)) => Some(self.value(*v)),
                    (true, None) => {
                        self.env
                            .violation(self.id(), format!("{} returns no value", loc))?;
                        None
                    }
                    (false, _) => None,
                };
                let ctx = Context::new(ret, None, after.pc().clone());
                Ok(Flow::Targets(vec![(self.cfg.exit(), Arc::new(ctx))]))
            }
            Instruction::Throw { exception, ty } => {
                raised.push(Raised {
                    by: RaisedBy::Thrown(ty.clone()),
                    context: Arc::new(Context::exceptional(self.value(*exception), after.pc().clone())),
                });
                Ok(Flow::Halt)
            }
            Instruction::Invoke {
                result,
                declared_target,
                call_site,
                args,
                ..
            } => self.transfer_call(loc, *call_site, declared_target, args, *result, after, raised),
            Instruction::GetField {
                receiver, field, ..
            } => {
                let locations = self.field_locations(*receiver, field);
                self.heap_accesses.insert(
                    loc,
                    HeapAccess {
                        locations,
                        store: None,
                    },
                );
                Ok(Flow::Next(after))
            }
            Instruction::PutField {
                receiver, field, ..
            } => {
                let locations = self.field_locations(*receiver, field);
                let store_node = self.store_node(loc, &field.to_string());
                self.heap_accesses.insert(
                    loc,
                    HeapAccess {
                        locations,
                        store: Some(store_node),
                    },
                );
                Ok(Flow::Next(after))
            }
            Instruction::ArrayLoad { array, .. } => {
                let locations = self.array_locations(*array);
                self.heap_accesses.insert(
                    loc,
                    HeapAccess {
                        locations,
                        store: None,
                    },
                );
                Ok(Flow::Next(after))
            }
            Instruction::ArrayStore { array, .. } => {
                let locations = self.array_locations(*array);
                let store_node = self.store_node(loc, &format!("{}[]", array));
                self.heap_accesses.insert(
                    loc,
                    HeapAccess {
                        locations,
                        store: Some(store_node),
                    },
                );
                Ok(Flow::Next(after))
            }
            Instruction::Phi { result, operands } => {
                let target = self.value(*result);
                let contributors = value_nodes(store, self.procedure, &self.summary, operands);
                if contributors.is_empty() {
                    warn!(procedure = %self.id(), loc = %loc, "phi without operands");
                } else {
                    self.merges.insert(
                        target.id(),
                        MergeRecord {
                            target,
                            contributors,
                            label: None,
                        },
                    );
                }
                Ok(Flow::Next(after))
            }
            Instruction::Goto { .. }
            | Instruction::Binary { .. }
            | Instruction::Unary { .. }
            | Instruction::Compare { .. }
            | Instruction::Conversion { .. }
            | Instruction::ArrayLength { .. }
            | Instruction::CheckCast { .. }
            | Instruction::InstanceOf { .. }
            | Instruction::New { .. }
            | Instruction::NewArray { .. }
            | Instruction::MonitorEnter { .. }
            | Instruction::MonitorExit { .. }
            | Instruction::GetCaughtException { .. }
            | Instruction::LoadMetadata { .. } => Ok(Flow::Next(after)),
        }
    }

    /// One link of the implicit-exception chain
    ///
    /// Returns `before` itself when the exception is impossible here.
    fn possible_exception(
        &self,
        loc: InstructionLoc,
        check: &PossibleException,
        before: ContextRef,
        previous: &[ExceptionBranch],
        chain: &mut Vec<ExceptionBranch>,
        raised: &mut Vec<Raised>,
    ) -> ContextRef {
        let ty = check.exception.type_name();
        if !self.env.oracles.exceptions.can_throw(&ty, loc.block, self.id()) {
            return before;
        }

        let branch = match previous.iter().find(|b| b.exception == check.exception) {
            Some(old) => ExceptionBranch {
                before,
                ..old.clone()
            },
            None => {
                let store = self.env.store;
                let owner = Some(self.id());
                let key = NodeKey::ImplicitException {
                    loc,
                    exception: check.exception,
                };
                let true_pc = store.find_or_create(NodeKind::BooleanTruePc, owner, key.clone(), &|| {
                    check.reason.clone()
                });
                let false_pc = store.find_or_create(NodeKind::BooleanFalsePc, owner, key.clone(), &|| {
                    format!("!({})", check.reason)
                });
                let object = store.find_or_create(NodeKind::OtherExpression, owner, key, &|| {
                    format!("new {} @{}", check.exception, loc)
                });
                ExceptionBranch {
                    exception: check.exception,
                    reason: check.reason.clone(),
                    deciding: value_nodes(store, self.procedure, &self.summary, &check.deciding),
                    before,
                    thrown: Arc::new(Context::exceptional(object, true_pc)),
                    not_thrown: Arc::new(Context::normal(false_pc)),
                }
            }
        };
        raised.push(Raised {
            by: RaisedBy::Implicit(ty),
            context: branch.thrown.clone(),
        });
        let next = branch.not_thrown.clone();
        chain.push(branch);
        next
    }

    fn transfer_call(
        &mut self,
        loc: InstructionLoc,
        site: CallSiteId,
        declared_target: &ProcedureId,
        args: &[ValueId],
        result: Option<ValueId>,
        after: ContextRef,
        raised: &mut Vec<Raised>,
    ) -> Result<Flow> {
        let env = self.env;
        let caller = self.id();
        let owner = Some(caller);

        let mut targets = env.oracles.call_graph.possible_targets(caller, site);
        let mut seen = FxHashSet::default();
        targets.retain(|t| seen.insert(t.clone()));

        let mut callees = Vec::with_capacity(targets.len());
        for target in &targets {
            match env.program.get(target) {
                Some(callee) => callees.push(CalleeLink {
                    summary: env.summaries.get_or_create(&callee.signature, env.store),
                    returns_normally: env.oracles.exceptions.can_terminate_normally(target),
                    may_throw: env.oracles.exceptions.can_procedure_throw_any_exception(target),
                }),
                None => warn!(
                    procedure = %caller,
                    call_site = %site,
                    callee = %target,
                    "call target is not part of the program"
                ),
            }
        }

        let formal_assignments: Vec<(usize, NodeRef, NodeRef)> = args
            .iter()
            .enumerate()
            .map(|(i, arg)| {
                let assignment = env.store.find_or_create(
                    NodeKind::FormalAssignment,
                    owner,
                    NodeKey::FormalAssignment { site, index: i },
                    &|| format!("{}.arg{} := {}", site, i, arg),
                );
                (i, assignment, self.value(*arg))
            })
            .collect();
        let result_node = result.map(|r| self.value(r));

        let mut record = CallRecord {
            site,
            after_receiver_check: after.clone(),
            callees: Vec::new(),
            formal_assignments,
            result: result_node,
            normal_join: None,
            exceptional_join: None,
            callee_normal_pc: None,
            callee_exceptional_pc: None,
            callee_return: None,
            callee_exception: None,
        };

        if callees.is_empty() {
            warn!(
                procedure = %caller,
                call_site = %site,
                target = %declared_target,
                "call site has no resolvable callee; skipping"
            );
            self.skipped_call_sites.insert(site);
            self.calls.insert(loc, record);
            return Ok(Flow::Next(after));
        }

        let exit_label = CallSiteLabel::exit(caller, site);
        let part_key = |part| NodeKey::CallSite { site, part };
        let mut records = Vec::new();

        let returning: Vec<&CalleeLink> = callees.iter().filter(|c| c.returns_normally).collect();
        if !returning.is_empty() {
            let pcs = unique_nodes(returning.iter().map(|c| c.summary.normal_exit.pc().clone()));
            record.callee_normal_pc = Some(self.merge_node(
                NodeKind::PcMerge,
                part_key(CallSitePart::CalleeNormalPc),
                pcs,
                Some(exit_label.clone()),
                &mut records,
            ));
            record.normal_join = Some(env.store.find_or_create(
                NodeKind::ExitPcJoin,
                owner,
                part_key(CallSitePart::NormalExitPc),
                &|| format!("{} returned", site),
            ));
            if result.is_some() {
                let returns = unique_nodes(returning.iter().filter_map(|c| c.summary.return_node().cloned()));
                record.callee_return = Some(self.merge_node(
                    NodeKind::OtherExpression,
                    part_key(CallSitePart::CalleeReturn),
                    returns,
                    Some(exit_label.clone()),
                    &mut records,
                ));
            }
        }

        let throwing: Vec<&CalleeLink> = callees.iter().filter(|c| c.may_throw).collect();
        if !throwing.is_empty() {
            let pcs = unique_nodes(throwing.iter().map(|c| c.summary.exceptional_exit.pc().clone()));
            record.callee_exceptional_pc = Some(self.merge_node(
                NodeKind::PcMerge,
                part_key(CallSitePart::CalleeExceptionalPc),
                pcs,
                Some(exit_label),
                &mut records,
            ));
            let join = env.store.find_or_create(
                NodeKind::ExitPcJoin,
                owner,
                part_key(CallSitePart::ExceptionalExitPc),
                &|| format!("{} threw", site),
            );
            let exception = env.store.find_or_create(
                NodeKind::ExceptionMerge,
                owner,
                part_key(CallSitePart::CalleeExceptions),
                &|| format!("{} exception", site),
            );
            raised.push(Raised {
                by: RaisedBy::Callee,
                context: Arc::new(Context::exceptional(exception.clone(), join.clone())),
            });
            record.exceptional_join = Some(join);
            record.callee_exception = Some(exception);
        }

        self.register(records);
        let next = match &record.normal_join {
            Some(join) => Flow::Next(Arc::new(Context::normal(join.clone()))),
            None => Flow::Halt,
        };
        record.callees = callees;
        self.calls.insert(loc, record);
        Ok(next)
    }

    fn field_locations(&self, receiver: Option<ValueId>, field: &FieldRef) -> Vec<NodeRef> {
        let locations = self
            .env
            .oracles
            .locations
            .locations_for_field(receiver, field, self.id());
        self.location_nodes(locations, NodeKey::FieldSummary(field.clone()), || {
            format!("summary {}", field)
        })
    }

    fn array_locations(&self, array: ValueId) -> Vec<NodeRef> {
        let locations = self
            .env
            .oracles
            .locations
            .locations_for_array_contents(array, self.id());
        self.location_nodes(locations, NodeKey::ArrayContentsSummary, || {
            "summary []".to_string()
        })
    }

    /// Location nodes, falling back to a location summary so heap flow is never dropped
    fn location_nodes(
        &self,
        locations: Vec<Arc<AbstractLocation>>,
        fallback: NodeKey,
        fallback_label: impl Fn() -> String,
    ) -> Vec<NodeRef> {
        let store = self.env.store;
        if locations.is_empty() {
            return vec![store.find_or_create(NodeKind::LocationSummary, None, fallback, &fallback_label)];
        }
        unique_nodes(locations.iter().map(|location| {
            store.find_or_create(
                NodeKind::AbstractLocation,
                None,
                NodeKey::Location(location.id),
                &|| location.to_string(),
            )
        }))
    }

    fn store_node(&self, loc: InstructionLoc, target: &str) -> NodeRef {
        self.env.store.find_or_create(
            NodeKind::OtherExpression,
            Some(self.id()),
            NodeKey::Instruction(loc),
            &|| format!("store {} @{}", target, loc),
        )
    }
}

/// Implicit exceptions worth modeling, narrowed with the type hierarchy
///
/// A cast that the static operand type already satisfies cannot fail.
pub(crate) fn possible_exceptions(instruction: &Instruction, env: PassEnv<'_>) -> Vec<PossibleException> {
    let mut checks = instruction.possible_exceptions();
    if let Instruction::CheckCast {
        operand_type,
        target,
        ..
    } = instruction
    {
        if env.oracles.hierarchy.is_assignable_from(target, operand_type) {
            checks.retain(|c| c.exception != ImplicitException::ClassCast);
        }
    }
    checks
}
