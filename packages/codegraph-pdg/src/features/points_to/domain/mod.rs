//! Heap abstraction shared with the dependence graph

pub mod abstract_location;

pub use abstract_location::{AbstractLocation, LocationFactory, LocationId, LocationKind};
