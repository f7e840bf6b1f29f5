//! PDG domain models: nodes, contexts, edges and procedure summaries

pub mod context;
pub mod edge;
pub mod node;
pub mod summary;

pub use context::{Context, ContextKey, ContextRef};
pub use edge::{CallBoundary, CallSiteLabel, EdgeKey, EdgeKind, PdgEdge};
pub use node::{CallSitePart, NodeId, NodeKey, NodeKind, NodeRef, PdgNode, SummaryPart};
pub use summary::ProcedureSummary;
