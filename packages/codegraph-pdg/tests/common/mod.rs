//! Shared fixtures for the integration tests
//!
//! Procedures are built with [`ProcedureBuilder`]; blocks are created in
//! order, so the first body block is always `BB2` (entry is `BB0`, exit `BB1`).

#![allow(dead_code)]

use codegraph_pdg::features::pdg::infrastructure::{
    ExceptionTable, NodePass, NodePassResult, PassEnv, SimpleCallGraph, SummaryRegistry,
};
use codegraph_pdg::shared::models::{
    BinaryOp, BlockId, CallSiteId, CompareOp, Instruction, InvokeKind, PrimitiveType, ProcedureId,
    ValueId, ValueType,
};
use codegraph_pdg::{
    AnalysisOracles, DriverReport, InterproceduralDriver, NodeKind, PdgConfig, Procedure,
    ProcedureBuilder, ProcedureSignature, Program, ProgramDependenceGraph,
};
use std::sync::Arc;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn int() -> ValueType {
    ValueType::Primitive(PrimitiveType::Int)
}

pub fn object(name: &str) -> ValueType {
    ValueType::reference(name)
}

/// Sequential, strict: invariant violations fail the test
pub fn strict_config() -> PdgConfig {
    PdgConfig::default()
        .parallel(false)
        .strict_invariants(true)
}

/// Oracles with a given call graph and exception facts; everything else conservative
pub fn oracles(call_graph: SimpleCallGraph, exceptions: ExceptionTable) -> AnalysisOracles {
    AnalysisOracles::conservative(Arc::new(call_graph)).with_exceptions(Arc::new(exceptions))
}

pub struct Analysis {
    pub graph: Arc<ProgramDependenceGraph>,
    pub summaries: Arc<SummaryRegistry>,
    pub report: DriverReport,
}

pub fn analyze(program: Program, oracles: AnalysisOracles, config: PdgConfig) -> Analysis {
    init_tracing();
    let driver = InterproceduralDriver::new(Arc::new(program), oracles, config);
    let report = driver.run().expect("driver run");
    Analysis {
        graph: driver.graph().clone(),
        summaries: driver.summaries().clone(),
        report,
    }
}

/// Run only the node pass of `procedure` against a fresh store
pub fn node_pass(
    procedure: Procedure,
    oracles: &AnalysisOracles,
    config: &PdgConfig,
) -> (ProgramDependenceGraph, NodePassResult) {
    let id = procedure.id().clone();
    let mut program = Program::new();
    program.add(procedure);
    node_pass_in(&program, &id, oracles, config)
}

/// Node pass of one procedure of `program`, so its callees resolve
pub fn node_pass_in(
    program: &Program,
    id: &ProcedureId,
    oracles: &AnalysisOracles,
    config: &PdgConfig,
) -> (ProgramDependenceGraph, NodePassResult) {
    init_tracing();
    let graph = ProgramDependenceGraph::new();
    let summaries = SummaryRegistry::new(config.primitive_formals);
    let procedure = program.get(id).expect("procedure in program");
    let env = PassEnv {
        store: &graph,
        summaries: &summaries,
        program,
        oracles,
        config,
    };
    let result = NodePass::new(env, procedure)
        .and_then(|pass| pass.run())
        .expect("node pass");
    (graph, result)
}

pub fn node_count(graph: &ProgramDependenceGraph, kind: NodeKind) -> usize {
    graph.nodes_of_kind(kind).len()
}

pub fn invoke(site: u32, target: &str, args: Vec<ValueId>, result: Option<ValueId>) -> Instruction {
    Instruction::Invoke {
        result,
        kind: InvokeKind::Static,
        declared_target: target.into(),
        call_site: CallSiteId(site),
        args,
    }
}

pub fn branch(left: ValueId, true_target: BlockId, false_target: BlockId) -> Instruction {
    Instruction::Branch {
        op: CompareOp::Eq,
        left,
        right: None,
        true_target,
        false_target,
    }
}

/// `int add(int a, int b) { return a + b; }`
pub fn add_procedure() -> Procedure {
    let mut b = ProcedureBuilder::new(ProcedureSignature::new("Calc.add(II)I", vec![int(), int()], int()));
    let (x, y) = (b.param(0), b.param(1));
    let sum = b.fresh_value();
    b.block(vec![
        Instruction::Binary {
            result: sum,
            op: BinaryOp::Add,
            ty: PrimitiveType::Int,
            left: x,
            right: y,
        },
        Instruction::Return { value: Some(sum) },
    ]);
    b.build().expect("add")
}

/// Diamond: `BB2` branches to `BB3`/`BB4`, both jump to the join `BB5`
pub fn diamond_procedure(name: &str) -> Procedure {
    let mut b = ProcedureBuilder::new(ProcedureSignature::new(name, vec![int()], ValueType::Void));
    let flag = b.param(0);
    let head = b.new_block();
    let left = b.new_block();
    let right = b.new_block();
    let join = b.new_block();
    b.push(head, branch(flag, left, right))
        .push(left, Instruction::Goto { target: join })
        .push(right, Instruction::Goto { target: join })
        .push(join, Instruction::Return { value: None });
    b.build().expect("diamond")
}

/// Early exit: the join `BB5` of `BB3` and `BB4` is bypassed through `BB6`
///
/// ```text
/// BB2: if v0 -> BB3 else BB4
/// BB3: if v1 -> BB5 else BB6
/// BB4: goto BB5
/// BB5: return
/// BB6: return
/// ```
pub fn early_exit_procedure(name: &str) -> Procedure {
    let mut b = ProcedureBuilder::new(ProcedureSignature::new(name, vec![int(), int()], ValueType::Void));
    let (first, second) = (b.param(0), b.param(1));
    let head = b.new_block();
    let inner = b.new_block();
    let other = b.new_block();
    let join = b.new_block();
    let bypass = b.new_block();
    b.push(head, branch(first, inner, other))
        .push(inner, branch(second, join, bypass))
        .push(other, Instruction::Goto { target: join })
        .push(join, Instruction::Return { value: None })
        .push(bypass, Instruction::Return { value: None });
    b.build().expect("early exit")
}

/// Void procedure with an empty body that only returns
pub fn leaf_procedure(name: &str) -> Procedure {
    let mut b = ProcedureBuilder::new(ProcedureSignature::new(name, vec![], ValueType::Void));
    b.block(vec![Instruction::Return { value: None }]);
    b.build().expect("leaf")
}

/// Procedure id from its signature string
pub fn procedure_id(name: &str) -> ProcedureId {
    ProcedureId::new(name)
}
