//! PDG Application Layer
//!
//! Whole-program construction. Main entry point: `InterproceduralDriver::run()`

pub mod driver;

pub use driver::{DriverReport, InterproceduralDriver};
