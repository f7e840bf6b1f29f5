//! Program-point graph

pub mod program_point;

pub use program_point::{PointId, ProgramPointGraph};
