/*
 * Codegraph PDG - Whole-Program Dependence Graph Engine
 *
 * Feature-First Hexagonal Architecture:
 * - shared/      : IR models (procedures, instructions, types)
 * - features/    : Vertical slices (flow_graph → points_to → pdg, call_ordering)
 * - config/      : Presets + YAML overrides
 * - errors.rs    : Error tiers (invariant vs. recoverable)
 *
 * Per procedure: Node Pass (contexts + nodes) → Edge Pass (typed edges).
 * Procedures run in rayon waves against one concurrent graph store.
 */

// Crate-level lint configuration
#![allow(clippy::too_many_arguments)] // Transfer functions thread many node handles
#![allow(clippy::type_complexity)] // Per-procedure tables keyed by tuples
#![allow(clippy::new_without_default)] // Default impl not always needed
#![allow(clippy::module_inception)] // Module naming intentional

/// Shared IR models
pub mod shared;

/// Feature modules
pub mod features;

/// Configuration system
pub mod config;

/// Error types
pub mod errors;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::{PdgConfig, Preset};
pub use errors::{CodegraphError, Result};
pub use features::call_ordering::{CallSiteOrdering, ProgramPointGraph};
pub use features::flow_graph::{ControlFlowGraph, ProcedureBuilder};
pub use features::pdg::{
    AnalysisOracles, DriverReport, EdgeKind, InterproceduralDriver, NodeKind,
    ProgramDependenceGraph,
};
pub use shared::models::{Procedure, ProcedureId, ProcedureSignature, Program};

// ═══════════════════════════════════════════════════════════════════════════
// Convenience entry point
// ═══════════════════════════════════════════════════════════════════════════

/// Build the PDG of `program` in one call
///
/// ```rust,ignore
/// let (graph, report) = codegraph_pdg::build_pdg(program, oracles, PdgConfig::default())?;
/// assert!(report.is_success());
/// ```
pub fn build_pdg(
    program: Program,
    oracles: AnalysisOracles,
    config: PdgConfig,
) -> Result<(std::sync::Arc<ProgramDependenceGraph>, DriverReport)> {
    let driver = InterproceduralDriver::new(std::sync::Arc::new(program), oracles, config);
    let report = driver.run()?;
    Ok((driver.graph().clone(), report))
}
