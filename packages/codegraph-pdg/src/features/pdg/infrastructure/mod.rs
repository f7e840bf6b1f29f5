//! PDG infrastructure: the concurrent store, the per-procedure passes and
//! reference oracle implementations

pub mod edge_pass;
pub mod env;
pub mod graph;
pub mod missing_code;
pub mod node_factory;
pub mod node_pass;
pub mod oracles;
pub mod slicing;
pub mod snapshot;
pub mod summary_registry;

pub use edge_pass::EdgePass;
pub use env::PassEnv;
pub use graph::{PdgStats, ProgramDependenceGraph};
pub use missing_code::analyze_missing_code;
pub use node_factory::{NodeFactory, NodeIdentity};
pub use node_pass::NodePass;
pub use oracles::{
    AllReachable, ConservativeExceptions, DeadEdges, ExceptionTable, FieldBasedLocations,
    NoLocations, NominalHierarchy, SimpleCallGraph,
};
pub use snapshot::{FlowEdge, NodePassResult};
pub use summary_registry::SummaryRegistry;
