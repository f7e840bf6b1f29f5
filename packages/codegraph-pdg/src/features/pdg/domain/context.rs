//! Dataflow facts of the node pass
//!
//! A [`Context`] is the control state flowing into a program point: the PC
//! node plus, on the edges that need them, the exception value (exceptional
//! edges) or the return value (normal edge into the exit of a non-void
//! procedure). The PC is never absent; the type makes that impossible.

use super::node::{NodeId, NodeRef};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Context {
    return_node: Option<NodeRef>,
    exception_node: Option<NodeRef>,
    pc: NodeRef,
}

/// Contexts are shared; identity of the `Arc` matters to the edge pass
pub type ContextRef = Arc<Context>;

/// Structural identity of a context (node ids only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextKey {
    pub return_node: Option<NodeId>,
    pub exception_node: Option<NodeId>,
    pub pc: NodeId,
}

impl Context {
    pub fn new(return_node: Option<NodeRef>, exception_node: Option<NodeRef>, pc: NodeRef) -> Self {
        Self {
            return_node,
            exception_node,
            pc,
        }
    }

    /// Plain control state
    pub fn normal(pc: NodeRef) -> Self {
        Self::new(None, None, pc)
    }

    pub fn exceptional(exception: NodeRef, pc: NodeRef) -> Self {
        Self::new(None, Some(exception), pc)
    }

    pub fn returning(value: NodeRef, pc: NodeRef) -> Self {
        Self::new(Some(value), None, pc)
    }

    pub fn pc(&self) -> &NodeRef {
        &self.pc
    }

    pub fn return_node(&self) -> Option<&NodeRef> {
        self.return_node.as_ref()
    }

    pub fn exception_node(&self) -> Option<&NodeRef> {
        self.exception_node.as_ref()
    }

    pub fn is_plain(&self) -> bool {
        self.return_node.is_none() && self.exception_node.is_none()
    }

    pub fn key(&self) -> ContextKey {
        ContextKey {
            return_node: self.return_node.as_ref().map(|n| n.id()),
            exception_node: self.exception_node.as_ref().map(|n| n.id()),
            pc: self.pc.id(),
        }
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Context {}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<pc={}", self.pc.label())?;
        if let Some(ret) = &self.return_node {
            write!(f, ", ret={}", ret.label())?;
        }
        if let Some(exc) = &self.exception_node {
            write!(f, ", exc={}", exc.label())?;
        }
        f.write_str(">")
    }
}
