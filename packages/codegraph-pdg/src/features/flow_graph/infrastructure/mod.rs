//! Flow Graph infrastructure

pub mod builder;
pub mod dominators;

pub use builder::ProcedureBuilder;
pub use dominators::DominatorTree;
