//! Error types for codegraph-pdg
//!
//! Two tiers: `Invariant` signals an engine bug and stops the offending
//! procedure's analysis; everything else is a recoverable input problem.
//! Precision/soundness trade-offs are not errors at all, they show up as
//! distinct edge kinds in the graph.

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for codegraph-pdg operations
#[derive(Debug, Error)]
pub enum CodegraphError {
    /// Broken engine invariant (null PC, misplaced return node, empty merge, ...)
    #[error("Invariant violated in {procedure}: {message}")]
    Invariant { procedure: String, message: String },

    /// Malformed control-flow graph handed in by the front end
    #[error("Invalid CFG for {procedure}: {message}")]
    InvalidCfg { procedure: String, message: String },

    /// Procedure referenced but unknown to the program
    #[error("Unknown procedure: {0}")]
    UnknownProcedure(String),

    /// Program point outside a hand-built program-point graph
    #[error("Program point {point} out of range for a graph of {len} points")]
    PointOutOfRange { point: usize, len: usize },

    /// Per-procedure dataflow did not stabilize within the configured bound
    #[error("Fixpoint not reached for {procedure} after {iterations} block visits")]
    FixpointLimit { procedure: String, iterations: usize },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl CodegraphError {
    pub fn invariant(procedure: impl ToString, message: impl Into<String>) -> Self {
        CodegraphError::Invariant {
            procedure: procedure.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_cfg(procedure: impl ToString, message: impl Into<String>) -> Self {
        CodegraphError::InvalidCfg {
            procedure: procedure.to_string(),
            message: message.into(),
        }
    }

    /// Fatal errors indicate a bug in the engine rather than bad input
    pub fn is_fatal(&self) -> bool {
        matches!(self, CodegraphError::Invariant { .. })
    }
}

/// Result type alias for codegraph operations
pub type Result<T> = std::result::Result<T, CodegraphError>;
