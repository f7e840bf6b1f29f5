//! Feature modules
//!
//! Each feature is split into domain/ (models), ports/ (traits),
//! application/ (orchestration) and infrastructure/ (implementations),
//! keeping only the layers it needs.

pub mod flow_graph;

// Heap abstraction consumed through the location oracle
pub mod points_to;

pub mod pdg;

// Auxiliary per-procedure analysis over program points
pub mod call_ordering;
