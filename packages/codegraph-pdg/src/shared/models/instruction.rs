//! Instruction taxonomy consumed by the dependence-graph passes.
//!
//! The set of instruction kinds is closed: every pass matches on
//! [`Instruction`] exhaustively, so adding a kind is a compile error until
//! each pass handles it.

use super::ids::{BlockId, CallSiteId, ProcedureId, ValueId};
use super::types::{ImplicitException, PrimitiveType, TypeName, ValueType};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Class(TypeName),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Null => f.write_str("null"),
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::Int(i) => write!(f, "{}", i),
            Constant::Float(x) => write!(f, "{}", x),
            Constant::Str(s) => write!(f, "{:?}", s),
            Constant::Class(t) => write!(f, "{}.class", t),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Ushr,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Ushr => ">>>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    Static,
    Special,
    Virtual,
    Interface,
}

impl InvokeKind {
    pub fn has_receiver(self) -> bool {
        !matches!(self, InvokeKind::Static)
    }
}

/// Field reference: declaring class plus field name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub declaring_class: TypeName,
    pub name: Arc<str>,
}

impl FieldRef {
    pub fn new(declaring_class: &str, name: &str) -> Self {
        Self {
            declaring_class: TypeName::new(declaring_class),
            name: Arc::from(name),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_class, self.name)
    }
}

/// An implicit exception an instruction may raise, with the operands that
/// decide whether it is raised
#[derive(Debug, Clone, PartialEq)]
pub struct PossibleException {
    pub exception: ImplicitException,
    pub deciding: Vec<ValueId>,
    pub reason: String,
}

impl PossibleException {
    fn new(exception: ImplicitException, deciding: Vec<ValueId>, reason: String) -> Self {
        Self {
            exception,
            deciding,
            reason,
        }
    }

    fn null_check(value: ValueId) -> Self {
        Self::new(
            ImplicitException::NullPointer,
            vec![value],
            format!("{} == null", value),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Binary {
        result: ValueId,
        op: BinaryOp,
        ty: PrimitiveType,
        left: ValueId,
        right: ValueId,
    },
    Unary {
        result: ValueId,
        op: UnaryOp,
        operand: ValueId,
    },
    Compare {
        result: ValueId,
        op: CompareOp,
        left: ValueId,
        right: ValueId,
    },
    Conversion {
        result: ValueId,
        operand: ValueId,
        from: PrimitiveType,
        to: PrimitiveType,
    },
    ArrayLoad {
        result: ValueId,
        array: ValueId,
        index: ValueId,
    },
    ArrayStore {
        array: ValueId,
        index: ValueId,
        value: ValueId,
        /// Stores into reference arrays are checked against the runtime element type
        reference_elements: bool,
    },
    ArrayLength {
        result: ValueId,
        array: ValueId,
    },
    /// Static when `receiver` is `None`
    GetField {
        result: ValueId,
        receiver: Option<ValueId>,
        field: FieldRef,
    },
    /// Static when `receiver` is `None`
    PutField {
        receiver: Option<ValueId>,
        field: FieldRef,
        value: ValueId,
    },
    CheckCast {
        result: ValueId,
        operand: ValueId,
        operand_type: TypeName,
        target: TypeName,
    },
    InstanceOf {
        result: ValueId,
        operand: ValueId,
        operand_type: TypeName,
        target: TypeName,
    },
    /// `args[0]` is the receiver for every kind except `Static`
    Invoke {
        result: Option<ValueId>,
        kind: InvokeKind,
        declared_target: ProcedureId,
        call_site: CallSiteId,
        args: Vec<ValueId>,
    },
    New {
        result: ValueId,
        class: TypeName,
    },
    NewArray {
        result: ValueId,
        element: ValueType,
        size: ValueId,
    },
    Phi {
        result: ValueId,
        operands: Vec<ValueId>,
    },
    Branch {
        op: CompareOp,
        left: ValueId,
        right: Option<ValueId>,
        true_target: BlockId,
        false_target: BlockId,
    },
    Switch {
        scrutinee: ValueId,
        cases: Vec<(i64, BlockId)>,
        default: BlockId,
    },
    Goto {
        target: BlockId,
    },
    MonitorEnter {
        object: ValueId,
    },
    MonitorExit {
        object: ValueId,
    },
    Throw {
        exception: ValueId,
        ty: TypeName,
    },
    Return {
        value: Option<ValueId>,
    },
    GetCaughtException {
        result: ValueId,
    },
    LoadMetadata {
        result: ValueId,
        class: TypeName,
    },
}

impl Instruction {
    /// SSA value defined by this instruction
    pub fn result(&self) -> Option<ValueId> {
        match self {
            Instruction::Binary { result, .. }
            | Instruction::Unary { result, .. }
            | Instruction::Compare { result, .. }
            | Instruction::Conversion { result, .. }
            | Instruction::ArrayLoad { result, .. }
            | Instruction::ArrayLength { result, .. }
            | Instruction::GetField { result, .. }
            | Instruction::CheckCast { result, .. }
            | Instruction::InstanceOf { result, .. }
            | Instruction::New { result, .. }
            | Instruction::NewArray { result, .. }
            | Instruction::Phi { result, .. }
            | Instruction::GetCaughtException { result }
            | Instruction::LoadMetadata { result, .. } => Some(*result),
            Instruction::Invoke { result, .. } => *result,
            Instruction::ArrayStore { .. }
            | Instruction::PutField { .. }
            | Instruction::Branch { .. }
            | Instruction::Switch { .. }
            | Instruction::Goto { .. }
            | Instruction::MonitorEnter { .. }
            | Instruction::MonitorExit { .. }
            | Instruction::Throw { .. }
            | Instruction::Return { .. } => None,
        }
    }

    /// Values read by this instruction, in operand order
    pub fn uses(&self) -> Vec<ValueId> {
        match self {
            Instruction::Binary { left, right, .. } | Instruction::Compare { left, right, .. } => {
                vec![*left, *right]
            }
            Instruction::Unary { operand, .. }
            | Instruction::Conversion { operand, .. }
            | Instruction::CheckCast { operand, .. }
            | Instruction::InstanceOf { operand, .. } => vec![*operand],
            Instruction::ArrayLoad { array, index, .. } => vec![*array, *index],
            Instruction::ArrayStore {
                array,
                index,
                value,
                ..
            } => vec![*array, *index, *value],
            Instruction::ArrayLength { array, .. } => vec![*array],
            Instruction::GetField { receiver, .. } => receiver.iter().copied().collect(),
            Instruction::PutField {
                receiver, value, ..
            } => receiver.iter().copied().chain(Some(*value)).collect(),
            Instruction::Invoke { args, .. } => args.clone(),
            Instruction::NewArray { size, .. } => vec![*size],
            Instruction::Phi { operands, .. } => operands.clone(),
            Instruction::Branch { left, right, .. } => {
                std::iter::once(*left).chain(right.iter().copied()).collect()
            }
            Instruction::Switch { scrutinee, .. } => vec![*scrutinee],
            Instruction::MonitorEnter { object } | Instruction::MonitorExit { object } => {
                vec![*object]
            }
            Instruction::Throw { exception, .. } => vec![*exception],
            Instruction::Return { value } => value.iter().copied().collect(),
            Instruction::New { .. }
            | Instruction::Goto { .. }
            | Instruction::GetCaughtException { .. }
            | Instruction::LoadMetadata { .. } => Vec::new(),
        }
    }

    /// Implicit exceptions in the order the platform checks them.
    ///
    /// Class-cast checks are listed unconditionally; callers narrow them with
    /// the type hierarchy.
    pub fn possible_exceptions(&self) -> Vec<PossibleException> {
        match self {
            Instruction::Binary {
                op, ty, right, ..
            } if matches!(op, BinaryOp::Div | BinaryOp::Rem) && ty.is_integral() => {
                vec![PossibleException::new(
                    ImplicitException::Arithmetic,
                    vec![*right],
                    format!("{} == 0", right),
                )]
            }
            Instruction::ArrayLoad { array, index, .. } => vec![
                PossibleException::null_check(*array),
                PossibleException::new(
                    ImplicitException::ArrayIndexOutOfBounds,
                    vec![*array, *index],
                    format!("{} out of bounds for {}", index, array),
                ),
            ],
            Instruction::ArrayStore {
                array,
                index,
                value,
                reference_elements,
            } => {
                let mut checks = vec![
                    PossibleException::null_check(*array),
                    PossibleException::new(
                        ImplicitException::ArrayIndexOutOfBounds,
                        vec![*array, *index],
                        format!("{} out of bounds for {}", index, array),
                    ),
                ];
                if *reference_elements {
                    checks.push(PossibleException::new(
                        ImplicitException::ArrayStore,
                        vec![*array, *value],
                        format!("{} not storable in {}", value, array),
                    ));
                }
                checks
            }
            Instruction::ArrayLength { array, .. } => vec![PossibleException::null_check(*array)],
            Instruction::GetField {
                receiver: Some(receiver),
                ..
            }
            | Instruction::PutField {
                receiver: Some(receiver),
                ..
            } => vec![PossibleException::null_check(*receiver)],
            Instruction::CheckCast {
                operand, target, ..
            } => vec![PossibleException::new(
                ImplicitException::ClassCast,
                vec![*operand],
                format!("!({} instanceof {})", operand, target),
            )],
            Instruction::Invoke { kind, args, .. } if kind.has_receiver() => args
                .first()
                .map(|receiver| vec![PossibleException::null_check(*receiver)])
                .unwrap_or_default(),
            Instruction::NewArray { size, .. } => vec![PossibleException::new(
                ImplicitException::NegativeArraySize,
                vec![*size],
                format!("{} < 0", size),
            )],
            Instruction::MonitorEnter { object } | Instruction::MonitorExit { object } => {
                vec![PossibleException::null_check(*object)]
            }
            Instruction::Throw { exception, .. } => {
                vec![PossibleException::null_check(*exception)]
            }
            Instruction::LoadMetadata { class, .. } => vec![PossibleException::new(
                ImplicitException::ClassNotFound,
                Vec::new(),
                format!("{} not loadable", class),
            )],
            _ => Vec::new(),
        }
    }

    /// Control-transfer instructions must end their block
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Branch { .. }
                | Instruction::Switch { .. }
                | Instruction::Goto { .. }
                | Instruction::Throw { .. }
                | Instruction::Return { .. }
        )
    }

    pub fn call_site(&self) -> Option<CallSiteId> {
        match self {
            Instruction::Invoke { call_site, .. } => Some(*call_site),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Binary {
                result,
                op,
                left,
                right,
                ..
            } => write!(f, "{} = {} {} {}", result, left, op.symbol(), right),
            Instruction::Unary {
                result,
                op,
                operand,
            } => match op {
                UnaryOp::Neg => write!(f, "{} = -{}", result, operand),
                UnaryOp::Not => write!(f, "{} = ~{}", result, operand),
            },
            Instruction::Compare {
                result,
                op,
                left,
                right,
            } => write!(f, "{} = {} {} {}", result, left, op.symbol(), right),
            Instruction::Conversion {
                result,
                operand,
                to,
                ..
            } => write!(f, "{} = ({:?}) {}", result, to, operand),
            Instruction::ArrayLoad {
                result,
                array,
                index,
            } => write!(f, "{} = {}[{}]", result, array, index),
            Instruction::ArrayStore {
                array,
                index,
                value,
                ..
            } => write!(f, "{}[{}] = {}", array, index, value),
            Instruction::ArrayLength { result, array } => {
                write!(f, "{} = {}.length", result, array)
            }
            Instruction::GetField {
                result,
                receiver,
                field,
            } => match receiver {
                Some(r) => write!(f, "{} = {}.{}", result, r, field.name),
                None => write!(f, "{} = {}", result, field),
            },
            Instruction::PutField {
                receiver,
                field,
                value,
            } => match receiver {
                Some(r) => write!(f, "{}.{} = {}", r, field.name, value),
                None => write!(f, "{} = {}", field, value),
            },
            Instruction::CheckCast {
                result,
                operand,
                target,
                ..
            } => write!(f, "{} = ({}) {}", result, target, operand),
            Instruction::InstanceOf {
                result,
                operand,
                target,
                ..
            } => write!(f, "{} = {} instanceof {}", result, operand, target),
            Instruction::Invoke {
                result,
                declared_target,
                args,
                ..
            } => {
                let args = args
                    .iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                match result {
                    Some(r) => write!(f, "{} = {}({})", r, declared_target, args),
                    None => write!(f, "{}({})", declared_target, args),
                }
            }
            Instruction::New { result, class } => write!(f, "{} = new {}", result, class),
            Instruction::NewArray { result, size, .. } => {
                write!(f, "{} = new array[{}]", result, size)
            }
            Instruction::Phi { result, operands } => {
                let ops = operands
                    .iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{} = phi({})", result, ops)
            }
            Instruction::Branch {
                op, left, right, ..
            } => match right {
                Some(r) => write!(f, "if {} {} {}", left, op.symbol(), r),
                None => write!(f, "if {} {} 0", left, op.symbol()),
            },
            Instruction::Switch { scrutinee, .. } => write!(f, "switch {}", scrutinee),
            Instruction::Goto { target } => write!(f, "goto {}", target),
            Instruction::MonitorEnter { object } => write!(f, "monitorenter {}", object),
            Instruction::MonitorExit { object } => write!(f, "monitorexit {}", object),
            Instruction::Throw { exception, .. } => write!(f, "throw {}", exception),
            Instruction::Return { value } => match value {
                Some(v) => write!(f, "return {}", v),
                None => f.write_str("return"),
            },
            Instruction::GetCaughtException { result } => write!(f, "{} = catch", result),
            Instruction::LoadMetadata { result, class } => {
                write!(f, "{} = {}.class", result, class)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_division_may_raise_arithmetic() {
        let div = Instruction::Binary {
            result: ValueId(3),
            op: BinaryOp::Div,
            ty: PrimitiveType::Int,
            left: ValueId(1),
            right: ValueId(2),
        };
        let checks = div.possible_exceptions();
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].exception, ImplicitException::Arithmetic);
        assert_eq!(checks[0].deciding, vec![ValueId(2)]);

        let fdiv = Instruction::Binary {
            result: ValueId(3),
            op: BinaryOp::Div,
            ty: PrimitiveType::Double,
            left: ValueId(1),
            right: ValueId(2),
        };
        assert!(fdiv.possible_exceptions().is_empty());
    }

    #[test]
    fn test_array_store_checks_in_program_order() {
        let store = Instruction::ArrayStore {
            array: ValueId(1),
            index: ValueId(2),
            value: ValueId(3),
            reference_elements: true,
        };
        let kinds: Vec<_> = store
            .possible_exceptions()
            .into_iter()
            .map(|p| p.exception)
            .collect();
        assert_eq!(
            kinds,
            vec![
                ImplicitException::NullPointer,
                ImplicitException::ArrayIndexOutOfBounds,
                ImplicitException::ArrayStore,
            ]
        );
    }

    #[test]
    fn test_static_invoke_has_no_receiver_check() {
        let call = Instruction::Invoke {
            result: None,
            kind: InvokeKind::Static,
            declared_target: ProcedureId::new("A.f()V"),
            call_site: CallSiteId(0),
            args: vec![ValueId(1)],
        };
        assert!(call.possible_exceptions().is_empty());
        assert_eq!(call.uses(), vec![ValueId(1)]);
    }

    #[test]
    fn test_terminators() {
        assert!(Instruction::Return { value: None }.is_terminator());
        assert!(!Instruction::New {
            result: ValueId(0),
            class: TypeName::new("A")
        }
        .is_terminator());
    }
}
