//! Exception-aware control-flow graph
//!
//! Blocks carry ordered instructions; edges are either normal or
//! exceptional. Entry and exit are synthetic, empty blocks. Every
//! exceptional edge that leaves the procedure targets the exit block.

use crate::errors::{CodegraphError, Result};
use crate::features::flow_graph::infrastructure::dominators::DominatorTree;
use crate::shared::models::{BlockId, Instruction, InstructionLoc, ProcedureId};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::DfsPostOrder;

/// Kind of a control-flow edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FlowEdgeKind {
    Normal,
    Exceptional,
}

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    pub fn new(id: BlockId, instructions: Vec<Instruction>) -> Self {
        Self { id, instructions }
    }

    pub fn last(&self) -> Option<&Instruction> {
        self.instructions.last()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    blocks: Vec<BasicBlock>,
    entry: BlockId,
    exit: BlockId,
    successors: Vec<Vec<(BlockId, FlowEdgeKind)>>,
    predecessors: Vec<Vec<(BlockId, FlowEdgeKind)>>,
    dominators: DominatorTree,
    post_dominators: DominatorTree,
    reverse_postorder: Vec<BlockId>,
}

impl ControlFlowGraph {
    /// Validate the shape and compute dominator trees.
    ///
    /// `blocks[i].id` must be `BlockId(i)`. Duplicate edges are collapsed.
    pub fn new(
        procedure: &ProcedureId,
        blocks: Vec<BasicBlock>,
        entry: BlockId,
        exit: BlockId,
        edges: Vec<(BlockId, BlockId, FlowEdgeKind)>,
    ) -> Result<Self> {
        let n = blocks.len();
        let mut successors = vec![Vec::new(); n];
        let mut predecessors = vec![Vec::new(); n];
        for (from, to, kind) in edges {
            if from.index() >= n || to.index() >= n {
                return Err(CodegraphError::invalid_cfg(
                    procedure,
                    format!("edge {} -> {} leaves the graph", from, to),
                ));
            }
            if successors[from.index()].contains(&(to, kind)) {
                continue;
            }
            successors[from.index()].push((to, kind));
            predecessors[to.index()].push((from, kind));
        }

        let forward = index_graph(n, &successors, false);
        let backward = index_graph(n, &successors, true);
        let dominators = DominatorTree::compute(&forward, entry);
        let post_dominators = DominatorTree::compute(&backward, exit);

        let mut reverse_postorder = Vec::with_capacity(n);
        if entry.index() < n {
            let mut dfs = DfsPostOrder::new(&forward, NodeIndex::new(entry.index()));
            while let Some(node) = dfs.next(&forward) {
                reverse_postorder.push(BlockId(node.index() as u32));
            }
            reverse_postorder.reverse();
        }

        let cfg = Self {
            blocks,
            entry,
            exit,
            successors,
            predecessors,
            dominators,
            post_dominators,
            reverse_postorder,
        };
        cfg.validate(procedure)?;
        Ok(cfg)
    }

    /// Structural checks the passes rely on
    pub fn validate(&self, procedure: &ProcedureId) -> Result<()> {
        let bad = |message: String| Err(CodegraphError::invalid_cfg(procedure, message));
        let n = self.blocks.len();
        if self.entry.index() >= n || self.exit.index() >= n || self.entry == self.exit {
            return bad("entry and exit must be distinct blocks of the graph".into());
        }
        for (i, block) in self.blocks.iter().enumerate() {
            if block.id.index() != i {
                return bad(format!("block at position {} is labelled {}", i, block.id));
            }
        }
        if !self.blocks[self.entry.index()].is_empty() || !self.blocks[self.exit.index()].is_empty()
        {
            return bad("entry and exit blocks must be empty".into());
        }
        if !self.predecessors[self.entry.index()].is_empty() {
            return bad("entry block has predecessors".into());
        }
        if !self.successors[self.exit.index()].is_empty() {
            return bad("exit block has successors".into());
        }
        for block in &self.blocks {
            let last = block.instructions.len().saturating_sub(1);
            for (index, instruction) in block.instructions.iter().enumerate() {
                if instruction.is_terminator() && index != last {
                    return bad(format!(
                        "{} at {} transfers control but is not last in its block",
                        instruction,
                        InstructionLoc::new(block.id, index)
                    ));
                }
            }
            let normal: Vec<BlockId> = self.normal_successors(block.id).collect();
            let targets: Vec<BlockId> = match block.last() {
                Some(Instruction::Branch {
                    true_target,
                    false_target,
                    ..
                }) => vec![*true_target, *false_target],
                Some(Instruction::Switch { cases, default, .. }) => cases
                    .iter()
                    .map(|(_, target)| *target)
                    .chain(Some(*default))
                    .collect(),
                Some(Instruction::Goto { target }) => vec![*target],
                Some(Instruction::Return { .. }) => vec![self.exit],
                _ => Vec::new(),
            };
            if let Some(missing) = targets.iter().find(|t| !normal.contains(t)) {
                return bad(format!(
                    "{} jumps to {} without a normal edge",
                    block.id, missing
                ));
            }
            if matches!(block.last(), Some(Instruction::Throw { .. })) && !normal.is_empty() {
                return bad(format!("{} throws but has normal successors", block.id));
            }
        }
        Ok(())
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn exit(&self) -> BlockId {
        self.exit
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn instruction(&self, loc: InstructionLoc) -> Option<&Instruction> {
        self.blocks
            .get(loc.block.index())
            .and_then(|b| b.instructions.get(loc.index as usize))
    }

    pub fn successors(&self, id: BlockId) -> &[(BlockId, FlowEdgeKind)] {
        &self.successors[id.index()]
    }

    pub fn predecessors(&self, id: BlockId) -> &[(BlockId, FlowEdgeKind)] {
        &self.predecessors[id.index()]
    }

    pub fn normal_successors(&self, id: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.successors[id.index()]
            .iter()
            .filter(|(_, k)| *k == FlowEdgeKind::Normal)
            .map(|(b, _)| *b)
    }

    pub fn exceptional_successors(&self, id: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.successors[id.index()]
            .iter()
            .filter(|(_, k)| *k == FlowEdgeKind::Exceptional)
            .map(|(b, _)| *b)
    }

    pub fn dominators(&self) -> &DominatorTree {
        &self.dominators
    }

    pub fn post_dominators(&self) -> &DominatorTree {
        &self.post_dominators
    }

    /// Blocks reachable from the entry, in reverse postorder
    pub fn reverse_postorder(&self) -> &[BlockId] {
        &self.reverse_postorder
    }

    /// Locations of all instructions, in block then program order
    pub fn instruction_locs(&self) -> impl Iterator<Item = (InstructionLoc, &Instruction)> + '_ {
        self.blocks.iter().flat_map(|block| {
            block
                .instructions
                .iter()
                .enumerate()
                .map(move |(i, ins)| (InstructionLoc::new(block.id, i), ins))
        })
    }
}

fn index_graph(
    n: usize,
    successors: &[Vec<(BlockId, FlowEdgeKind)>],
    reversed: bool,
) -> DiGraph<(), ()> {
    let mut graph = DiGraph::with_capacity(n, n * 2);
    for _ in 0..n {
        graph.add_node(());
    }
    for (from, succs) in successors.iter().enumerate() {
        for (to, _) in succs {
            let (a, b) = if reversed {
                (to.index(), from)
            } else {
                (from, to.index())
            };
            graph.add_edge(NodeIndex::new(a), NodeIndex::new(b), ());
        }
    }
    graph
}
