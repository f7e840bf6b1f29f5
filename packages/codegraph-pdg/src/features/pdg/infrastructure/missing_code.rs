//! Fallback for procedures without a body (native or external code)
//!
//! The summary is linked to itself: entry PC conjoined into both exit PCs
//! and every formal flowing into the return value. The formal edges carry
//! `MISSING` so clients can tell the guess from analyzed flow.

use super::env::PassEnv;
use crate::errors::Result;
use crate::features::pdg::domain::{EdgeKind, PdgEdge};
use crate::shared::models::ProcedureSignature;
use tracing::warn;

/// Returns the number of edges added
pub fn analyze_missing_code(env: PassEnv<'_>, signature: &ProcedureSignature) -> Result<usize> {
    let summary = env.summaries.get_or_create(signature, env.store);
    let entry = summary.entry.pc();
    let mut edges = vec![
        PdgEdge::new(entry, summary.normal_exit.pc(), EdgeKind::Conjunction),
        PdgEdge::new(entry, summary.exceptional_exit.pc(), EdgeKind::Conjunction),
    ];
    if let Some(ret) = summary.return_node() {
        edges.extend(
            summary
                .formals
                .iter()
                .flatten()
                .map(|formal| PdgEdge::new(formal, ret, EdgeKind::Missing)),
        );
    }

    warn!(
        procedure = %signature.id,
        formals = summary.formals.iter().flatten().count(),
        "no body available; linking summary with MISSING edges"
    );

    let mut added = 0;
    for edge in edges {
        let description = edge.to_string();
        if env.store.add_edge(edge) {
            added += 1;
        } else {
            env.violation(&signature.id, format!("duplicate edge {}", description))?;
        }
    }
    Ok(added)
}
