//! Dominator trees over block indices
//!
//! Thin wrapper around `petgraph::algo::dominators::simple_fast`
//! (Cooper, Harvey & Kennedy). Post-dominators are the dominators of the
//! reversed graph rooted at the exit block.

use crate::shared::models::BlockId;
use petgraph::algo::dominators::simple_fast;
use petgraph::graph::{DiGraph, NodeIndex};

#[derive(Debug, Clone)]
pub struct DominatorTree {
    root: BlockId,
    /// Immediate dominator per block; `None` for the root and for blocks
    /// the root does not reach
    idom: Vec<Option<BlockId>>,
}

impl DominatorTree {
    pub fn compute(graph: &DiGraph<(), ()>, root: BlockId) -> Self {
        let n = graph.node_count();
        let mut idom = vec![None; n];
        if root.index() < n {
            let doms = simple_fast(graph, NodeIndex::new(root.index()));
            for (i, slot) in idom.iter_mut().enumerate() {
                *slot = doms
                    .immediate_dominator(NodeIndex::new(i))
                    .map(|d| BlockId(d.index() as u32));
            }
        }
        Self { root, idom }
    }

    pub fn root(&self) -> BlockId {
        self.root
    }

    /// Whether `block` is reachable from the root
    pub fn contains(&self, block: BlockId) -> bool {
        block == self.root || self.idom.get(block.index()).copied().flatten().is_some()
    }

    pub fn immediate(&self, block: BlockId) -> Option<BlockId> {
        self.idom.get(block.index()).copied().flatten()
    }

    /// Reflexive dominance
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if !self.contains(b) {
            return false;
        }
        let mut current = Some(b);
        while let Some(block) = current {
            if block == a {
                return true;
            }
            current = self.immediate(block);
        }
        false
    }

    pub fn strictly_dominates(&self, a: BlockId, b: BlockId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Strict dominators of `block`, innermost first
    pub fn strict_dominators(&self, block: BlockId) -> Vec<BlockId> {
        let mut chain = Vec::new();
        let mut current = self.immediate(block);
        while let Some(d) = current {
            chain.push(d);
            current = self.immediate(d);
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(n: usize, edges: &[(usize, usize)]) -> DiGraph<(), ()> {
        let mut g = DiGraph::new();
        for _ in 0..n {
            g.add_node(());
        }
        for (a, b) in edges {
            g.add_edge(NodeIndex::new(*a), NodeIndex::new(*b), ());
        }
        g
    }

    #[test]
    fn test_chain() {
        let g = graph(3, &[(0, 1), (1, 2)]);
        let tree = DominatorTree::compute(&g, BlockId(0));
        assert_eq!(tree.immediate(BlockId(2)), Some(BlockId(1)));
        assert_eq!(tree.strict_dominators(BlockId(2)), vec![BlockId(1), BlockId(0)]);
        assert!(tree.dominates(BlockId(0), BlockId(2)));
        assert!(tree.dominates(BlockId(2), BlockId(2)));
        assert!(!tree.strictly_dominates(BlockId(2), BlockId(2)));
    }

    #[test]
    fn test_unreachable_block() {
        let g = graph(3, &[(0, 1)]);
        let tree = DominatorTree::compute(&g, BlockId(0));
        assert!(!tree.contains(BlockId(2)));
        assert!(!tree.dominates(BlockId(0), BlockId(2)));
        assert!(tree.strict_dominators(BlockId(2)).is_empty());
    }

    #[test]
    fn test_loop_header_dominates_body() {
        let g = graph(4, &[(0, 1), (1, 2), (2, 1), (1, 3)]);
        let tree = DominatorTree::compute(&g, BlockId(0));
        assert!(tree.dominates(BlockId(1), BlockId(2)));
        assert!(tree.dominates(BlockId(1), BlockId(3)));
        assert!(!tree.dominates(BlockId(2), BlockId(3)));
    }
}
