//! Dependence-graph nodes
//!
//! A node's identity is `(kind, owner, key)`. The node factory hands out one
//! shared [`PdgNode`] per identity, so comparing node ids is the same as
//! comparing identities.

use crate::features::points_to::domain::abstract_location::LocationId;
use crate::shared::models::{
    BlockId, CallSiteId, FieldRef, ImplicitException, InstructionLoc, ProcedureId, ValueId,
};
use std::fmt;
use std::sync::Arc;

/// Dense node id issued at first creation
pub type NodeId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    LocalValue,
    BaseValue,
    AbstractLocation,
    PcMerge,
    ExceptionMerge,
    BooleanTruePc,
    BooleanFalsePc,
    FormalAssignment,
    ExitPcJoin,
    LocationSummary,
    OtherExpression,
    /// Summary entry/exit PCs and switch-case PCs
    PcOther,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::LocalValue => "LOCAL",
            NodeKind::BaseValue => "BASE_VALUE",
            NodeKind::AbstractLocation => "ABSTRACT_LOCATION",
            NodeKind::PcMerge => "PC_MERGE",
            NodeKind::ExceptionMerge => "EXCEPTION_MERGE",
            NodeKind::BooleanTruePc => "BOOLEAN_TRUE_PC",
            NodeKind::BooleanFalsePc => "BOOLEAN_FALSE_PC",
            NodeKind::FormalAssignment => "FORMAL_ASSIGNMENT",
            NodeKind::ExitPcJoin => "EXIT_PC_JOIN",
            NodeKind::LocationSummary => "LOCATION_SUMMARY",
            NodeKind::OtherExpression => "OTHER_EXPRESSION",
            NodeKind::PcOther => "PC_OTHER",
        }
    }

    /// Nodes that stand for a control state rather than a value
    pub fn is_pc(&self) -> bool {
        matches!(
            self,
            NodeKind::PcMerge
                | NodeKind::BooleanTruePc
                | NodeKind::BooleanFalsePc
                | NodeKind::ExitPcJoin
                | NodeKind::PcOther
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call-site nodes created by the node pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CallSitePart {
    NormalExitPc,
    ExceptionalExitPc,
    CalleeNormalPc,
    CalleeExceptionalPc,
    CalleeReturn,
    CalleeExceptions,
}

/// Fixed boundary nodes of a procedure summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SummaryPart {
    EntryPc,
    NormalExitPc,
    ReturnValue,
    ExceptionalExitPc,
    Exception,
    Formal(usize),
}

/// Disambiguation key, unique within `(kind, owner)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Value(ValueId),
    Instruction(InstructionLoc),
    ImplicitException {
        loc: InstructionLoc,
        exception: ImplicitException,
    },
    SwitchCase {
        loc: InstructionLoc,
        target: BlockId,
    },
    Block(BlockId),
    FlowEdge {
        from: BlockId,
        to: BlockId,
    },
    CallSite {
        site: CallSiteId,
        part: CallSitePart,
    },
    FormalAssignment {
        site: CallSiteId,
        index: usize,
    },
    Summary(SummaryPart),
    Location(LocationId),
    FieldSummary(FieldRef),
    ArrayContentsSummary,
    /// Stand-in for a merge requested over nothing
    Placeholder(Box<NodeKey>),
}

#[derive(Debug)]
pub struct PdgNode {
    id: NodeId,
    kind: NodeKind,
    owner: Option<ProcedureId>,
    key: NodeKey,
    label: String,
}

pub type NodeRef = Arc<PdgNode>;

impl PdgNode {
    pub(crate) fn new(
        id: NodeId,
        kind: NodeKind,
        owner: Option<ProcedureId>,
        key: NodeKey,
        label: String,
    ) -> Self {
        Self {
            id,
            kind,
            owner,
            key,
            label,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// `None` for heap locations shared by every procedure
    pub fn owner(&self) -> Option<&ProcedureId> {
        self.owner.as_ref()
    }

    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl PartialEq for PdgNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PdgNode {}

impl std::hash::Hash for PdgNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for PdgNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Some(owner) => write!(f, "[{}] {} @{}", self.kind, self.label, owner),
            None => write!(f, "[{}] {}", self.kind, self.label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pc_kinds() {
        assert!(NodeKind::PcMerge.is_pc());
        assert!(NodeKind::ExitPcJoin.is_pc());
        assert!(!NodeKind::ExceptionMerge.is_pc());
        assert!(!NodeKind::LocalValue.is_pc());
    }

    #[test]
    fn test_equality_is_by_id() {
        let a = PdgNode::new(7, NodeKind::LocalValue, None, NodeKey::Value(ValueId(1)), "v1".into());
        let b = PdgNode::new(7, NodeKind::LocalValue, None, NodeKey::Value(ValueId(1)), "other".into());
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "[LOCAL] v1");
    }
}
