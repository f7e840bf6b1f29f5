//! Slicing queries over the dependence graph
//!
//! Breadth-first traversals with an optional depth bound. Edge kinds are
//! split into control (`IMPLICIT`, `CONJUNCTION`, `TRUE`, `FALSE`,
//! `SWITCH`) and data (everything else); thin slices follow data only.
//!
//! Reference: Sridharan et al., "Thin Slicing", PLDI 2007;
//! Jackson & Rollins, "Chopping", FSE 1994

use super::graph::ProgramDependenceGraph;
use crate::features::pdg::domain::{NodeId, PdgEdge};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Backward,
    Forward,
}

impl ProgramDependenceGraph {
    /// All nodes `target` depends on, including itself
    pub fn backward_slice(&self, target: NodeId, max_depth: Option<usize>) -> FxHashSet<NodeId> {
        self.slice_filtered(target, Direction::Backward, max_depth, true, true)
    }

    /// All nodes depending on `source`, including itself
    pub fn forward_slice(&self, source: NodeId, max_depth: Option<usize>) -> FxHashSet<NodeId> {
        self.slice_filtered(source, Direction::Forward, max_depth, true, true)
    }

    /// Backward slice over data dependencies only
    pub fn thin_slice(&self, target: NodeId, max_depth: Option<usize>) -> FxHashSet<NodeId> {
        self.slice_filtered(target, Direction::Backward, max_depth, false, true)
    }

    pub fn backward_slice_filtered(
        &self,
        target: NodeId,
        max_depth: Option<usize>,
        include_control: bool,
        include_data: bool,
    ) -> FxHashSet<NodeId> {
        self.slice_filtered(target, Direction::Backward, max_depth, include_control, include_data)
    }

    pub fn forward_slice_filtered(
        &self,
        source: NodeId,
        max_depth: Option<usize>,
        include_control: bool,
        include_data: bool,
    ) -> FxHashSet<NodeId> {
        self.slice_filtered(source, Direction::Forward, max_depth, include_control, include_data)
    }

    /// Nodes on some dependence path from `source` to `target`
    ///
    /// `chop(s, t) = backward_slice(t) ∩ forward_slice(s)`
    pub fn chop(&self, source: NodeId, target: NodeId, max_depth: Option<usize>) -> FxHashSet<NodeId> {
        let backward = self.backward_slice(target, max_depth);
        let forward = self.forward_slice(source, max_depth);
        backward.intersection(&forward).copied().collect()
    }

    fn slice_filtered(
        &self,
        start: NodeId,
        direction: Direction,
        max_depth: Option<usize>,
        include_control: bool,
        include_data: bool,
    ) -> FxHashSet<NodeId> {
        let max_depth = max_depth.unwrap_or(usize::MAX);
        let mut visited = FxHashSet::default();
        let mut worklist: VecDeque<(NodeId, usize)> = VecDeque::new();

        if self.node(start).is_none() {
            return visited;
        }
        worklist.push_back((start, 0));

        while let Some((current, depth)) = worklist.pop_front() {
            if depth > max_depth || !visited.insert(current) {
                continue;
            }

            let adjacent: Vec<PdgEdge> = match direction {
                Direction::Backward => self.edges_to(current),
                Direction::Forward => self.edges_from(current),
            };
            for edge in adjacent {
                let follow = if edge.kind.is_control() {
                    include_control
                } else {
                    include_data
                };
                let next = match direction {
                    Direction::Backward => edge.source.id(),
                    Direction::Forward => edge.target.id(),
                };
                if follow && !visited.contains(&next) {
                    worklist.push_back((next, depth + 1));
                }
            }
        }

        visited
    }
}
