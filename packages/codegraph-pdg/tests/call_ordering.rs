//! Call-site ordering over program points derived from real CFGs

mod common;

use codegraph_pdg::shared::models::{BlockId, CallSiteId, Instruction, ValueType};
use codegraph_pdg::{CallSiteOrdering, ProcedureBuilder, ProcedureSignature, ProgramPointGraph};
use common::*;
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

fn sites(ids: &[u32]) -> BTreeSet<CallSiteId> {
    ids.iter().map(|i| CallSiteId(*i)).collect()
}

/// ```text
/// BB2: call cs0; if v0 -> BB3 else BB4
/// BB3: call cs1; goto BB5
/// BB4: call cs2; goto BB5
/// BB5: call cs3; return
/// ```
fn branching_calls() -> codegraph_pdg::Procedure {
    let mut b = ProcedureBuilder::new(ProcedureSignature::new("Seq.run(I)V", vec![int()], ValueType::Void));
    let flag = b.param(0);
    let head = b.new_block();
    let left = b.new_block();
    let right = b.new_block();
    let join = b.new_block();
    b.push(head, invoke(0, "Seq.a()V", vec![], None))
        .push(head, branch(flag, left, right))
        .push(left, invoke(1, "Seq.b()V", vec![], None))
        .push(left, Instruction::Goto { target: join })
        .push(right, invoke(2, "Seq.c()V", vec![], None))
        .push(right, Instruction::Goto { target: join })
        .push(join, invoke(3, "Seq.d()V", vec![], None))
        .push(join, Instruction::Return { value: None });
    b.build().expect("branching calls")
}

#[test]
fn test_calls_after_follow_control_flow() {
    let procedure = branching_calls();
    let cfg = procedure.body.as_ref().expect("body");
    let (points, _) = ProgramPointGraph::from_cfg(cfg);
    let ordering = CallSiteOrdering::compute(&points);

    assert_eq!(ordering.calls_after(CallSiteId(0)), Some(&sites(&[1, 2, 3])));
    assert_eq!(ordering.calls_after(CallSiteId(1)), Some(&sites(&[3])));
    assert_eq!(ordering.calls_after(CallSiteId(2)), Some(&sites(&[3])));
    assert_eq!(ordering.calls_after(CallSiteId(3)), Some(&sites(&[])));
    assert!(!ordering.may_follow(CallSiteId(1), CallSiteId(2)));
}

#[test]
fn test_calls_before_block_entry() {
    let procedure = branching_calls();
    let cfg = procedure.body.as_ref().expect("body");
    let (points, _) = ProgramPointGraph::from_cfg(cfg);
    let ordering = CallSiteOrdering::compute(&points);

    let join = ProgramPointGraph::block_start(cfg, BlockId(5));
    assert_eq!(ordering.calls_before(join), Some(&sites(&[0, 1, 2])));
    let exit = ProgramPointGraph::block_start(cfg, cfg.exit());
    assert_eq!(ordering.calls_before(exit), Some(&sites(&[0, 1, 2, 3])));
}

#[test]
fn test_exceptional_edges_order_calls() {
    let mut b = ProcedureBuilder::new(ProcedureSignature::new("Seq.guarded()V", vec![], ValueType::Void));
    let body = b.block(vec![
        invoke(0, "Seq.risky()V", vec![], None),
        Instruction::Return { value: None },
    ]);
    let handler = b.block(vec![
        invoke(1, "Seq.recover()V", vec![], None),
        Instruction::Return { value: None },
    ]);
    b.exceptional_edge(body, handler);
    let procedure = b.build().expect("guarded");

    let (points, _) = ProgramPointGraph::from_cfg(procedure.body.as_ref().expect("body"));
    let ordering = CallSiteOrdering::compute(&points);
    assert!(ordering.may_follow(CallSiteId(0), CallSiteId(1)));
    assert!(!ordering.may_follow(CallSiteId(1), CallSiteId(0)));
}
