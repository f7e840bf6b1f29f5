//! Call-site ordering
//!
//! For each call site of a procedure, the call sites that may execute after
//! it on some path to the exit.

pub mod domain;
pub mod infrastructure;

pub use domain::{PointId, ProgramPointGraph};
pub use infrastructure::CallSiteOrdering;
