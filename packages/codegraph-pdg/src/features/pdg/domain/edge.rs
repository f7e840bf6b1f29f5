//! Typed dependency edges

use super::node::{NodeId, NodeRef};
use crate::shared::models::{CallSiteId, ProcedureId};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeKind {
    /// Expression / data use
    Exp,
    /// Value aliasing
    Copy,
    /// Control point → value whose existence depends on it
    Implicit,
    /// Confluence of several sources into one node
    Merge,
    /// Both control predicates must hold
    Conjunction,
    True,
    False,
    Switch,
    /// Unsound stand-in for unavailable code
    Missing,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 9] = [
        EdgeKind::Exp,
        EdgeKind::Copy,
        EdgeKind::Implicit,
        EdgeKind::Merge,
        EdgeKind::Conjunction,
        EdgeKind::True,
        EdgeKind::False,
        EdgeKind::Switch,
        EdgeKind::Missing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Exp => "EXP",
            EdgeKind::Copy => "COPY",
            EdgeKind::Implicit => "IMPLICIT",
            EdgeKind::Merge => "MERGE",
            EdgeKind::Conjunction => "CONJUNCTION",
            EdgeKind::True => "TRUE",
            EdgeKind::False => "FALSE",
            EdgeKind::Switch => "SWITCH",
            EdgeKind::Missing => "MISSING",
        }
    }

    /// Control dependence as opposed to data dependence (used by slicing)
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            EdgeKind::Implicit
                | EdgeKind::Conjunction
                | EdgeKind::True
                | EdgeKind::False
                | EdgeKind::Switch
        )
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CallBoundary {
    Entry,
    Exit,
}

/// Which call an edge into or out of a shared summary node belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallSiteLabel {
    pub caller: ProcedureId,
    pub call_site: CallSiteId,
    pub boundary: CallBoundary,
}

impl CallSiteLabel {
    pub fn entry(caller: &ProcedureId, call_site: CallSiteId) -> Self {
        Self {
            caller: caller.clone(),
            call_site,
            boundary: CallBoundary::Entry,
        }
    }

    pub fn exit(caller: &ProcedureId, call_site: CallSiteId) -> Self {
        Self {
            caller: caller.clone(),
            call_site,
            boundary: CallBoundary::Exit,
        }
    }
}

impl fmt::Display for CallSiteLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.boundary {
            CallBoundary::Entry => "entry",
            CallBoundary::Exit => "exit",
        };
        write!(f, "{}:{}:{}", self.caller, self.call_site, side)
    }
}

#[derive(Debug, Clone)]
pub struct PdgEdge {
    pub source: NodeRef,
    pub target: NodeRef,
    pub kind: EdgeKind,
    pub label: Option<CallSiteLabel>,
}

/// Set identity of an edge
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeKey {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
    pub label: Option<CallSiteLabel>,
}

impl PdgEdge {
    pub fn new(source: &NodeRef, target: &NodeRef, kind: EdgeKind) -> Self {
        Self {
            source: source.clone(),
            target: target.clone(),
            kind,
            label: None,
        }
    }

    pub fn labelled(mut self, label: CallSiteLabel) -> Self {
        self.label = Some(label);
        self
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            source: self.source.id(),
            target: self.target.id(),
            kind: self.kind,
            label: self.label.clone(),
        }
    }
}

impl fmt::Display for PdgEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -{}-> {}", self.source.label(), self.kind, self.target.label())?;
        if let Some(label) = &self.label {
            write!(f, " ({})", label)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_kinds() {
        let control: Vec<_> = EdgeKind::ALL.iter().filter(|k| k.is_control()).collect();
        assert_eq!(control.len(), 5);
        assert!(!EdgeKind::Merge.is_control());
        assert!(!EdgeKind::Missing.is_control());
    }

    #[test]
    fn test_label_display() {
        let label = CallSiteLabel::exit(&ProcedureId::new("A.f()V"), CallSiteId(3));
        assert_eq!(label.to_string(), "A.f()V:cs3:exit");
    }
}
