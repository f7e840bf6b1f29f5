//! IR models consumed by the analysis (procedures, instructions, types)

pub mod ids;
pub mod instruction;
pub mod program;
pub mod types;

pub use ids::{BlockId, CallSiteId, InstructionLoc, ProcedureId, ValueId};
pub use instruction::{
    BinaryOp, CompareOp, Constant, FieldRef, Instruction, InvokeKind, PossibleException, UnaryOp,
};
pub use program::{Procedure, ProcedureSignature, Program};
pub use types::{ImplicitException, PrimitiveType, TypeName, ValueType, OBJECT, THROWABLE};
