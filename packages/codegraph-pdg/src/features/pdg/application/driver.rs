//! Interprocedural Driver
//!
//! Queue-driven scheduler over procedures. Work proceeds in waves: every
//! procedure of a wave runs node pass then edge pass (in parallel on the
//! rayon pool when enabled), and the callees they discover form the next
//! wave. Each procedure is queued at most once; recursion and cycles are
//! handled by the shared summary registry, so a caller never waits for a
//! callee.

use crate::config::PdgConfig;
use crate::errors::{CodegraphError, Result};
use crate::features::pdg::infrastructure::{
    analyze_missing_code, EdgePass, NodePass, PassEnv, ProgramDependenceGraph, SummaryRegistry,
};
use crate::features::pdg::ports::AnalysisOracles;
use crate::shared::models::{CallSiteId, ProcedureId, Program};
use dashmap::DashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg(feature = "parallel")]
type WorkerPool = rayon::ThreadPool;

/// Stand-in when the crate is built without the `parallel` feature
#[cfg(not(feature = "parallel"))]
#[derive(Debug)]
struct WorkerPool;

/// What happened to every scheduled procedure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverReport {
    pub analyzed: Vec<ProcedureId>,
    /// Procedures without a body, linked with `MISSING` edges
    pub missing: Vec<ProcedureId>,
    pub failed: Vec<(ProcedureId, String)>,
    /// Call sites with no resolvable callee
    pub skipped_call_sites: Vec<(ProcedureId, CallSiteId)>,
    pub waves: usize,
}

impl DriverReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn scheduled(&self) -> usize {
        self.analyzed.len() + self.missing.len() + self.failed.len()
    }

    fn sort(&mut self) {
        self.analyzed.sort();
        self.missing.sort();
        self.failed.sort();
        self.skipped_call_sites.sort();
    }
}

enum Outcome {
    Analyzed {
        callees: Vec<ProcedureId>,
        skipped: Vec<CallSiteId>,
    },
    Missing,
    Failed(CodegraphError),
}

pub struct InterproceduralDriver {
    program: Arc<Program>,
    oracles: AnalysisOracles,
    config: PdgConfig,
    graph: Arc<ProgramDependenceGraph>,
    summaries: Arc<SummaryRegistry>,
}

impl InterproceduralDriver {
    pub fn new(program: Arc<Program>, oracles: AnalysisOracles, config: PdgConfig) -> Self {
        let summaries = Arc::new(SummaryRegistry::new(config.primitive_formals));
        Self {
            program,
            oracles,
            config,
            graph: Arc::new(ProgramDependenceGraph::new()),
            summaries,
        }
    }

    /// Build into an existing graph (e.g. to accumulate several programs)
    pub fn with_graph(mut self, graph: Arc<ProgramDependenceGraph>) -> Self {
        self.graph = graph;
        self
    }

    pub fn graph(&self) -> &Arc<ProgramDependenceGraph> {
        &self.graph
    }

    pub fn summaries(&self) -> &Arc<SummaryRegistry> {
        &self.summaries
    }

    pub fn config(&self) -> &PdgConfig {
        &self.config
    }

    fn env(&self) -> PassEnv<'_> {
        PassEnv {
            store: self.graph.as_ref(),
            summaries: self.summaries.as_ref(),
            program: self.program.as_ref(),
            oracles: &self.oracles,
            config: &self.config,
        }
    }

    /// Analyze everything reachable from the entry points (every procedure
    /// when the program declares none)
    pub fn run(&self) -> Result<DriverReport> {
        self.config.validate()?;
        let start = Instant::now();

        let queued: DashSet<ProcedureId> = DashSet::new();
        let seeds: Vec<ProcedureId> = if self.program.entry_points().is_empty() {
            let mut all: Vec<ProcedureId> =
                self.program.procedures().map(|p| p.id().clone()).collect();
            all.sort();
            all
        } else {
            self.program.entry_points().to_vec()
        };

        let mut report = DriverReport::default();
        let mut wave: Vec<ProcedureId> = Vec::new();
        for id in seeds {
            if self.program.get(&id).is_none() {
                let err = CodegraphError::UnknownProcedure(id.to_string());
                warn!(procedure = %id, "{}", err);
                report.failed.push((id, err.to_string()));
            } else if queued.insert(id.clone()) {
                wave.push(id);
            }
        }

        let pool = self.worker_pool();
        let limit = self.config.max_procedures;
        let mut scheduled = 0usize;
        while !wave.is_empty() {
            if limit > 0 {
                let room = limit.saturating_sub(scheduled);
                if room == 0 {
                    warn!(
                        pending = wave.len(),
                        max_procedures = limit,
                        "procedure budget exhausted; remaining procedures not analyzed"
                    );
                    break;
                }
                wave.truncate(room);
            }
            scheduled += wave.len();
            report.waves += 1;
            debug!(wave = report.waves, procedures = wave.len(), "analyzing wave");

            let outcomes = self.run_wave(&wave, &queued, pool.as_ref());
            let mut next = Vec::new();
            for (id, outcome) in outcomes {
                match outcome {
                    Outcome::Analyzed { callees, skipped } => {
                        next.extend(callees);
                        report
                            .skipped_call_sites
                            .extend(skipped.into_iter().map(|site| (id.clone(), site)));
                        report.analyzed.push(id);
                    }
                    Outcome::Missing => report.missing.push(id),
                    Outcome::Failed(err) => {
                        error!(procedure = %id, fatal = err.is_fatal(), "analysis failed: {}", err);
                        report.failed.push((id, err.to_string()));
                    }
                }
            }
            next.sort();
            wave = next;
        }

        report.sort();
        let stats = self.graph.stats();
        info!(
            analyzed = report.analyzed.len(),
            missing = report.missing.len(),
            failed = report.failed.len(),
            skipped_call_sites = report.skipped_call_sites.len(),
            nodes = stats.node_count,
            edges = stats.edge_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "PDG construction finished"
        );
        Ok(report)
    }

    /// Pool shared by every wave of a run; `None` analyzes sequentially
    #[cfg(feature = "parallel")]
    fn worker_pool(&self) -> Option<WorkerPool> {
        if !self.config.parallel {
            return None;
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.effective_threads())
            .build()
        {
            Ok(pool) => Some(pool),
            Err(err) => {
                warn!("rayon pool unavailable, analyzing sequentially: {}", err);
                None
            }
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn worker_pool(&self) -> Option<WorkerPool> {
        None
    }

    /// Analyze one wave; callees not yet queued are claimed and returned
    fn run_wave(
        &self,
        wave: &[ProcedureId],
        queued: &DashSet<ProcedureId>,
        pool: Option<&WorkerPool>,
    ) -> Vec<(ProcedureId, Outcome)> {
        let analyze = |id: &ProcedureId| {
            let mut outcome = self.analyze(id);
            if let Outcome::Analyzed { callees, .. } = &mut outcome {
                callees.retain(|callee| queued.insert(callee.clone()));
            }
            (id.clone(), outcome)
        };

        #[cfg(feature = "parallel")]
        if let Some(pool) = pool.filter(|_| wave.len() > 1) {
            return pool.install(|| wave.par_iter().map(&analyze).collect());
        }
        #[cfg(not(feature = "parallel"))]
        let _ = pool;

        wave.iter().map(&analyze).collect()
    }

    /// Node pass then edge pass for one procedure, or the missing-code fallback
    fn analyze(&self, id: &ProcedureId) -> Outcome {
        let Some(procedure) = self.program.get(id) else {
            return Outcome::Failed(CodegraphError::UnknownProcedure(id.to_string()));
        };
        let env = self.env();
        if !procedure.has_body() {
            return match analyze_missing_code(env, &procedure.signature) {
                Ok(_) => Outcome::Missing,
                Err(err) => Outcome::Failed(err),
            };
        }

        debug!(procedure = %id, "analyzing procedure");
        let run = || -> Result<(Vec<ProcedureId>, Vec<CallSiteId>)> {
            let nodes = NodePass::new(env, procedure)?.run()?;
            let edges = EdgePass::new(env, &nodes)?.run()?;
            let mut callees: Vec<ProcedureId> = nodes
                .calls
                .values()
                .flat_map(|call| call.callees.iter().map(|c| c.summary.procedure.clone()))
                .collect();
            callees.sort();
            callees.dedup();
            debug!(
                procedure = %id,
                iterations = nodes.iterations,
                edges,
                callees = callees.len(),
                "procedure analyzed"
            );
            Ok((callees, nodes.skipped_call_sites.clone()))
        };
        match run() {
            Ok((callees, skipped)) => Outcome::Analyzed { callees, skipped },
            Err(err) => Outcome::Failed(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::flow_graph::ProcedureBuilder;
    use crate::features::pdg::infrastructure::SimpleCallGraph;
    use crate::shared::models::{Instruction, InvokeKind, Procedure, ProcedureSignature, ValueType};

    fn void_sig(name: &str) -> ProcedureSignature {
        ProcedureSignature::new(name, vec![], ValueType::Void)
    }

    fn caller_of(name: &str, callee: &str) -> Procedure {
        let mut b = ProcedureBuilder::new(void_sig(name));
        b.block(vec![
            Instruction::Invoke {
                result: None,
                kind: InvokeKind::Static,
                declared_target: callee.into(),
                call_site: CallSiteId(0),
                args: vec![],
            },
            Instruction::Return { value: None },
        ]);
        b.build().unwrap()
    }

    fn driver(program: Program, config: PdgConfig) -> InterproceduralDriver {
        let cg = SimpleCallGraph::from_declared_targets(&program);
        InterproceduralDriver::new(
            Arc::new(program),
            AnalysisOracles::conservative(Arc::new(cg)),
            config,
        )
    }

    #[test]
    fn test_callees_form_later_waves() {
        let mut program = Program::new();
        program.add(caller_of("A.main()V", "A.f()V"));
        program.add(Procedure::without_body(void_sig("A.f()V")));
        program.add_entry_point("A.main()V");

        let report = driver(program, PdgConfig::default().parallel(false)).run().unwrap();
        assert_eq!(report.analyzed, vec![ProcedureId::new("A.main()V")]);
        assert_eq!(report.missing, vec![ProcedureId::new("A.f()V")]);
        assert_eq!(report.waves, 2);
        assert!(report.is_success());
    }

    #[test]
    fn test_pool_is_built_only_when_parallel() {
        let sequential = driver(Program::new(), PdgConfig::default().parallel(false));
        assert!(sequential.worker_pool().is_none());

        #[cfg(feature = "parallel")]
        {
            let parallel = driver(Program::new(), PdgConfig::default().parallel(true).worker_threads(2));
            let pool = parallel.worker_pool().expect("pool");
            assert_eq!(pool.current_num_threads(), 2);
        }
    }

    #[test]
    fn test_parallel_run_spans_several_waves() {
        let mut program = Program::new();
        program.add(caller_of("A.main()V", "A.f()V"));
        program.add(caller_of("B.main()V", "B.f()V"));
        program.add(caller_of("A.f()V", "A.g()V"));
        program.add(caller_of("B.f()V", "B.g()V"));
        program.add(Procedure::without_body(void_sig("A.g()V")));
        program.add(Procedure::without_body(void_sig("B.g()V")));
        program.add_entry_point("A.main()V");
        program.add_entry_point("B.main()V");

        let config = PdgConfig::default().parallel(true).worker_threads(2);
        let report = driver(program, config).run().unwrap();
        assert_eq!(report.waves, 3);
        assert_eq!(report.analyzed.len(), 4);
        assert_eq!(report.missing.len(), 2);
        assert!(report.is_success());
    }

    #[test]
    fn test_unknown_entry_point_is_reported() {
        let mut program = Program::new();
        program.add_entry_point("Nope.x()V");
        let report = driver(program, PdgConfig::default()).run().unwrap();
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].1.contains("Nope.x()V"));
    }

    #[test]
    fn test_procedure_budget() {
        let mut program = Program::new();
        program.add(caller_of("A.main()V", "A.f()V"));
        program.add(Procedure::without_body(void_sig("A.f()V")));
        program.add_entry_point("A.main()V");

        let report = driver(program, PdgConfig::default().max_procedures(1))
            .run()
            .unwrap();
        assert_eq!(report.scheduled(), 1);
        assert!(report.missing.is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let program = Program::new();
        let err = driver(program, PdgConfig::default().max_fixpoint_iterations(0))
            .run()
            .unwrap_err();
        assert!(matches!(err, CodegraphError::Config(_)));
    }

    #[test]
    fn test_no_entry_points_analyzes_everything() {
        let mut program = Program::new();
        program.add(Procedure::without_body(void_sig("B.g()V")));
        program.add(Procedure::without_body(void_sig("A.f()V")));
        let report = driver(program, PdgConfig::default()).run().unwrap();
        assert_eq!(
            report.missing,
            vec![ProcedureId::new("A.f()V"), ProcedureId::new("B.g()V")]
        );
    }
}
