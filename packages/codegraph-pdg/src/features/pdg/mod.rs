//! Program Dependence Graph
//!
//! Hexagonal layout:
//! - domain: nodes, contexts, edges, procedure summaries
//! - ports: oracle traits and the injectable graph store
//! - infrastructure: node/edge passes, concurrent store, reference oracles
//! - application: the interprocedural driver

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use application::{DriverReport, InterproceduralDriver};
pub use domain::{
    CallBoundary, CallSiteLabel, Context, ContextRef, EdgeKind, NodeId, NodeKey, NodeKind,
    NodeRef, PdgEdge, PdgNode, ProcedureSummary,
};
pub use infrastructure::{PdgStats, ProgramDependenceGraph, SummaryRegistry};
pub use ports::{
    AnalysisOracles, CallGraphProvider, ExceptionOracle, GraphStore, LocationOracle,
    ReachabilityOracle, TypeHierarchy,
};
