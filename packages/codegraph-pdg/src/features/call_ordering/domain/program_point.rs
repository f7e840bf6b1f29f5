//! Program points: one per instruction, one per empty block.

use crate::errors::{CodegraphError, Result};
use crate::features::flow_graph::ControlFlowGraph;
use crate::shared::models::{BlockId, CallSiteId, InstructionLoc};
use rustc_hash::FxHashMap;

/// Dense program-point index
pub type PointId = usize;

#[derive(Debug, Clone, Default)]
pub struct ProgramPointGraph {
    entry: PointId,
    successors: Vec<Vec<PointId>>,
    call_sites: FxHashMap<PointId, CallSiteId>,
}

impl ProgramPointGraph {
    /// Graph with `len` points and no edges; `entry` must be one of them
    pub fn new(len: usize, entry: PointId) -> Result<Self> {
        if entry >= len {
            return Err(CodegraphError::PointOutOfRange { point: entry, len });
        }
        Ok(Self::with_points(len, entry))
    }

    fn with_points(len: usize, entry: PointId) -> Self {
        Self {
            entry,
            successors: vec![Vec::new(); len],
            call_sites: FxHashMap::default(),
        }
    }

    pub fn add_edge(&mut self, from: PointId, to: PointId) -> Result<&mut Self> {
        self.check(from)?;
        self.check(to)?;
        self.link(from, to);
        Ok(self)
    }

    pub fn mark_call(&mut self, point: PointId, site: CallSiteId) -> Result<&mut Self> {
        self.check(point)?;
        self.call_sites.insert(point, site);
        Ok(self)
    }

    fn check(&self, point: PointId) -> Result<()> {
        if point < self.len() {
            Ok(())
        } else {
            Err(CodegraphError::PointOutOfRange {
                point,
                len: self.len(),
            })
        }
    }

    fn link(&mut self, from: PointId, to: PointId) {
        let successors = &mut self.successors[from];
        if !successors.contains(&to) {
            successors.push(to);
        }
    }

    /// Points of a CFG; normal and exceptional edges both order calls
    pub fn from_cfg(cfg: &ControlFlowGraph) -> (Self, FxHashMap<InstructionLoc, PointId>) {
        let mut first: Vec<PointId> = Vec::with_capacity(cfg.len());
        let mut last: Vec<PointId> = Vec::with_capacity(cfg.len());
        let mut locs = FxHashMap::default();
        let mut next = 0;
        for block in cfg.blocks() {
            first.push(next);
            if block.is_empty() {
                next += 1;
            } else {
                for i in 0..block.instructions.len() {
                    locs.insert(InstructionLoc::new(block.id, i), next);
                    next += 1;
                }
            }
            last.push(next - 1);
        }

        let mut graph = Self::with_points(next, first[cfg.entry().index()]);
        for block in cfg.blocks() {
            let start = first[block.id.index()];
            for (offset, instruction) in block.instructions.iter().enumerate() {
                let point = start + offset;
                if let Some(site) = instruction.call_site() {
                    graph.call_sites.insert(point, site);
                }
                if offset + 1 < block.instructions.len() {
                    graph.link(point, point + 1);
                }
            }
            for &(to, _) in cfg.successors(block.id) {
                graph.link(last[block.id.index()], first[to.index()]);
            }
        }
        (graph, locs)
    }

    pub fn entry(&self) -> PointId {
        self.entry
    }

    pub fn len(&self) -> usize {
        self.successors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.successors.is_empty()
    }

    /// Successors of `point`; empty for points outside the graph
    pub fn successors(&self, point: PointId) -> &[PointId] {
        self.successors.get(point).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn call_site(&self, point: PointId) -> Option<CallSiteId> {
        self.call_sites.get(&point).copied()
    }

    pub fn call_points(&self) -> impl Iterator<Item = (PointId, CallSiteId)> + '_ {
        self.call_sites.iter().map(|(p, s)| (*p, *s))
    }

    /// First point of a block in a graph built by [`Self::from_cfg`]
    pub fn block_start(cfg: &ControlFlowGraph, block: BlockId) -> PointId {
        cfg.blocks()[..block.index()]
            .iter()
            .map(|b| b.instructions.len().max(1))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::flow_graph::ProcedureBuilder;
    use crate::shared::models::{Instruction, InvokeKind, ProcedureSignature, ValueType};

    #[test]
    fn test_points_from_cfg() {
        let mut b = ProcedureBuilder::new(ProcedureSignature::new("T.m()V", vec![], ValueType::Void));
        b.block(vec![
            Instruction::Invoke {
                result: None,
                kind: InvokeKind::Static,
                declared_target: "T.g()V".into(),
                call_site: CallSiteId(0),
                args: vec![],
            },
            Instruction::Return { value: None },
        ]);
        let proc = b.build().unwrap();
        let cfg = proc.body.as_ref().unwrap();
        let (graph, locs) = ProgramPointGraph::from_cfg(cfg);

        // entry, exit, two instructions
        assert_eq!(graph.len(), 4);
        let call = locs[&InstructionLoc::new(BlockId(2), 0)];
        assert_eq!(graph.call_site(call), Some(CallSiteId(0)));
        assert_eq!(graph.successors(graph.entry()), &[call]);
        assert_eq!(ProgramPointGraph::block_start(cfg, BlockId(2)), call);
        assert_eq!(graph.successors(call + 1), &[ProgramPointGraph::block_start(cfg, BlockId(1))]);
    }

    #[test]
    fn test_out_of_range_points_are_rejected() {
        assert!(matches!(
            ProgramPointGraph::new(2, 2),
            Err(CodegraphError::PointOutOfRange { point: 2, len: 2 })
        ));
        assert!(ProgramPointGraph::new(0, 0).is_err());

        let mut graph = ProgramPointGraph::new(3, 0).unwrap();
        assert!(graph.add_edge(0, 3).is_err());
        assert!(graph.add_edge(5, 1).is_err());
        assert!(graph.mark_call(3, CallSiteId(0)).is_err());
        assert!(graph.successors(0).is_empty());
        assert!(graph.call_points().next().is_none());

        graph.add_edge(0, 1).unwrap().add_edge(0, 1).unwrap();
        assert_eq!(graph.successors(0), &[1]);
        assert!(graph.successors(9).is_empty());
    }
}
