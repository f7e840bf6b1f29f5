//! Points-to heap abstraction
//!
//! Only the location model lives here; the location sets themselves come
//! from a [`LocationOracle`](crate::features::pdg::ports::LocationOracle).

pub mod domain;

pub use domain::{AbstractLocation, LocationFactory, LocationId, LocationKind};
