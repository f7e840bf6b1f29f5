//! Identifier types shared by the IR and the dependence graph.
//!
//! Procedure and type names are interned as `Arc<str>` so that they can be
//! cloned into node keys, summaries and call-site labels without allocating.

use std::fmt;
use std::sync::Arc;

/// Fully qualified procedure name (e.g. `"com.acme.Util.add(II)I"`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcedureId(Arc<str>);

impl ProcedureId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcedureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProcedureId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ProcedureId {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Basic block index inside one control-flow graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BB{}", self.0)
    }
}

/// SSA value number, unique within a procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Call-site number, unique within the calling procedure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallSiteId(pub u32);

impl fmt::Display for CallSiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cs{}", self.0)
    }
}

/// Position of an instruction: block plus index within the block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstructionLoc {
    pub block: BlockId,
    pub index: u32,
}

impl InstructionLoc {
    pub fn new(block: BlockId, index: usize) -> Self {
        Self {
            block,
            index: index as u32,
        }
    }
}

impl fmt::Display for InstructionLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.block, self.index)
    }
}
