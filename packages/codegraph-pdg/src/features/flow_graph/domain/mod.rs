pub mod cfg;

pub use cfg::{BasicBlock, ControlFlowGraph, FlowEdgeKind};
