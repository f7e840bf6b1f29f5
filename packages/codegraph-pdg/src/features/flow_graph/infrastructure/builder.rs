//! Fluent construction of procedures with well-formed bodies
//!
//! Normal edges implied by terminators (branch/switch/goto targets, return
//! to exit) are added automatically; fall-through and exceptional edges are
//! declared explicitly. The first body block is wired from the entry.

use crate::errors::Result;
use crate::features::flow_graph::domain::cfg::{BasicBlock, ControlFlowGraph, FlowEdgeKind};
use crate::shared::models::{
    BlockId, Constant, Instruction, Procedure, ProcedureSignature, ValueId,
};
use rustc_hash::FxHashMap;

pub struct ProcedureBuilder {
    signature: ProcedureSignature,
    params: Vec<ValueId>,
    constants: FxHashMap<ValueId, Constant>,
    blocks: Vec<Vec<Instruction>>,
    edges: Vec<(BlockId, BlockId, FlowEdgeKind)>,
    next_value: u32,
}

const ENTRY: BlockId = BlockId(0);
const EXIT: BlockId = BlockId(1);

impl ProcedureBuilder {
    /// Parameters are bound to `v0..vN` in signature order
    pub fn new(signature: ProcedureSignature) -> Self {
        let arity = signature.params.len() as u32;
        Self {
            signature,
            params: (0..arity).map(ValueId).collect(),
            constants: FxHashMap::default(),
            blocks: vec![Vec::new(), Vec::new()],
            edges: Vec::new(),
            next_value: arity,
        }
    }

    pub fn entry(&self) -> BlockId {
        ENTRY
    }

    pub fn exit(&self) -> BlockId {
        EXIT
    }

    pub fn param(&self, index: usize) -> ValueId {
        self.params[index]
    }

    pub fn fresh_value(&mut self) -> ValueId {
        let v = ValueId(self.next_value);
        self.next_value += 1;
        v
    }

    pub fn constant(&mut self, constant: Constant) -> ValueId {
        let v = self.fresh_value();
        self.constants.insert(v, constant);
        v
    }

    /// Reserve an empty block (useful for forward jumps)
    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Vec::new());
        if id.0 == 2 {
            self.edges.push((ENTRY, id, FlowEdgeKind::Normal));
        }
        id
    }

    pub fn block(&mut self, instructions: Vec<Instruction>) -> BlockId {
        let id = self.new_block();
        self.blocks[id.index()] = instructions;
        id
    }

    pub fn push(&mut self, block: BlockId, instruction: Instruction) -> &mut Self {
        self.blocks[block.index()].push(instruction);
        self
    }

    /// Fall-through edge
    pub fn edge(&mut self, from: BlockId, to: BlockId) -> &mut Self {
        self.edges.push((from, to, FlowEdgeKind::Normal));
        self
    }

    pub fn exceptional_edge(&mut self, from: BlockId, to: BlockId) -> &mut Self {
        self.edges.push((from, to, FlowEdgeKind::Exceptional));
        self
    }

    /// Exceptions escaping `from` leave the procedure
    pub fn throws_to_exit(&mut self, from: BlockId) -> &mut Self {
        self.exceptional_edge(from, EXIT)
    }

    pub fn build(self) -> Result<Procedure> {
        let mut edges = self.edges;
        for (i, instructions) in self.blocks.iter().enumerate() {
            let from = BlockId(i as u32);
            match instructions.last() {
                Some(Instruction::Branch {
                    true_target,
                    false_target,
                    ..
                }) => {
                    edges.push((from, *true_target, FlowEdgeKind::Normal));
                    edges.push((from, *false_target, FlowEdgeKind::Normal));
                }
                Some(Instruction::Switch { cases, default, .. }) => {
                    for (_, target) in cases {
                        edges.push((from, *target, FlowEdgeKind::Normal));
                    }
                    edges.push((from, *default, FlowEdgeKind::Normal));
                }
                Some(Instruction::Goto { target }) => {
                    edges.push((from, *target, FlowEdgeKind::Normal))
                }
                Some(Instruction::Return { .. }) => edges.push((from, EXIT, FlowEdgeKind::Normal)),
                _ => {}
            }
        }

        let blocks = self
            .blocks
            .into_iter()
            .enumerate()
            .map(|(i, instructions)| BasicBlock::new(BlockId(i as u32), instructions))
            .collect();
        let body = ControlFlowGraph::new(&self.signature.id, blocks, ENTRY, EXIT, edges)?;

        Ok(Procedure {
            signature: self.signature,
            params: self.params,
            constants: self.constants,
            body: Some(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{BinaryOp, PrimitiveType, ValueType};

    #[test]
    fn test_build_straight_line() {
        let sig = ProcedureSignature::new(
            "T.add(II)I",
            vec![
                ValueType::Primitive(PrimitiveType::Int),
                ValueType::Primitive(PrimitiveType::Int),
            ],
            ValueType::Primitive(PrimitiveType::Int),
        );
        let mut b = ProcedureBuilder::new(sig);
        let (x, y) = (b.param(0), b.param(1));
        let sum = b.fresh_value();
        b.block(vec![
            Instruction::Binary {
                result: sum,
                op: BinaryOp::Add,
                ty: PrimitiveType::Int,
                left: x,
                right: y,
            },
            Instruction::Return { value: Some(sum) },
        ]);
        let proc = b.build().unwrap();
        let cfg = proc.body.as_ref().unwrap();
        assert_eq!(cfg.len(), 3);
        assert_eq!(cfg.normal_successors(BlockId(0)).collect::<Vec<_>>(), vec![BlockId(2)]);
        assert_eq!(cfg.normal_successors(BlockId(2)).collect::<Vec<_>>(), vec![BlockId(1)]);
        assert_eq!(sum, ValueId(2));
    }

    #[test]
    fn test_constants_get_fresh_values() {
        let sig = ProcedureSignature::new("T.k()V", vec![], ValueType::Void);
        let mut b = ProcedureBuilder::new(sig);
        let one = b.constant(Constant::Int(1));
        let two = b.constant(Constant::Int(2));
        assert_ne!(one, two);
        b.block(vec![Instruction::Return { value: None }]);
        let proc = b.build().unwrap();
        assert_eq!(proc.constants.get(&one), Some(&Constant::Int(1)));
    }
}
