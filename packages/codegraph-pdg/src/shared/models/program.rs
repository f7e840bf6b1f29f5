//! Procedures and whole programs as handed over by the front end.

use super::ids::{ProcedureId, ValueId};
use super::instruction::Constant;
use super::types::ValueType;
use crate::features::flow_graph::ControlFlowGraph;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Externally visible shape of a procedure.
///
/// For instance procedures `params[0]` is the receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureSignature {
    pub id: ProcedureId,
    pub params: Vec<ValueType>,
    pub return_type: ValueType,
    pub is_static: bool,
}

impl ProcedureSignature {
    pub fn new(id: impl Into<ProcedureId>, params: Vec<ValueType>, return_type: ValueType) -> Self {
        Self {
            id: id.into(),
            params,
            return_type,
            is_static: true,
        }
    }

    pub fn instance(mut self) -> Self {
        self.is_static = false;
        self
    }

    pub fn returns_value(&self) -> bool {
        !self.return_type.is_void()
    }
}

#[derive(Debug, Clone)]
pub struct Procedure {
    pub signature: ProcedureSignature,
    /// SSA values bound to the parameters, parallel to `signature.params`
    pub params: Vec<ValueId>,
    pub constants: FxHashMap<ValueId, Constant>,
    /// `None` for native/external procedures
    pub body: Option<ControlFlowGraph>,
}

impl Procedure {
    pub fn without_body(signature: ProcedureSignature) -> Self {
        let params = (0..signature.params.len() as u32).map(ValueId).collect();
        Self {
            signature,
            params,
            constants: FxHashMap::default(),
            body: None,
        }
    }

    pub fn id(&self) -> &ProcedureId {
        &self.signature.id
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Parameter position of an SSA value, if it is a parameter
    pub fn param_index(&self, value: ValueId) -> Option<usize> {
        self.params.iter().position(|p| *p == value)
    }
}

/// Every procedure the analysis may reach plus the roots to start from
#[derive(Debug, Clone, Default)]
pub struct Program {
    procedures: FxHashMap<ProcedureId, Arc<Procedure>>,
    entry_points: Vec<ProcedureId>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, procedure: Procedure) -> &mut Self {
        self.procedures
            .insert(procedure.id().clone(), Arc::new(procedure));
        self
    }

    pub fn add_entry_point(&mut self, id: impl Into<ProcedureId>) -> &mut Self {
        self.entry_points.push(id.into());
        self
    }

    pub fn get(&self, id: &ProcedureId) -> Option<&Arc<Procedure>> {
        self.procedures.get(id)
    }

    pub fn entry_points(&self) -> &[ProcedureId] {
        &self.entry_points
    }

    pub fn procedures(&self) -> impl Iterator<Item = &Arc<Procedure>> {
        self.procedures.values()
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }
}
