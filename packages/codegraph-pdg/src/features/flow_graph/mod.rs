//! Control-flow graphs with exceptional edges and (post-)dominator trees.
//!
//! Graph construction from bytecode belongs to the front end; this module
//! only holds the validated shape the dependence-graph passes walk.

pub mod domain;
pub mod infrastructure;

pub use domain::cfg::{BasicBlock, ControlFlowGraph, FlowEdgeKind};
pub use infrastructure::builder::ProcedureBuilder;
pub use infrastructure::dominators::DominatorTree;
