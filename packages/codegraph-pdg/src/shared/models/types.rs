//! Type names and the implicit (platform-raised) exception taxonomy.

use std::fmt;
use std::sync::Arc;

/// Name of a class or interface type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName(Arc<str>);

impl TypeName {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Root of the exception hierarchy
    pub fn throwable() -> Self {
        Self::new(THROWABLE)
    }

    pub fn is_throwable(&self) -> bool {
        &*self.0 == THROWABLE
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

pub const THROWABLE: &str = "java.lang.Throwable";
pub const OBJECT: &str = "java.lang.Object";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl PrimitiveType {
    /// Integral types raise on division by zero, floating types do not
    pub fn is_integral(self) -> bool {
        !matches!(self, PrimitiveType::Float | PrimitiveType::Double)
    }
}

/// Static type of a parameter, return value or operand
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Void,
    Primitive(PrimitiveType),
    Reference(TypeName),
}

impl ValueType {
    pub fn reference(name: &str) -> Self {
        ValueType::Reference(TypeName::new(name))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, ValueType::Void)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, ValueType::Primitive(_))
    }
}

/// Exceptions the execution platform raises without an explicit `throw`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImplicitException {
    NullPointer,
    ArrayIndexOutOfBounds,
    ClassCast,
    Arithmetic,
    NegativeArraySize,
    ArrayStore,
    ClassNotFound,
}

impl ImplicitException {
    pub const ALL: [ImplicitException; 7] = [
        ImplicitException::NullPointer,
        ImplicitException::ArrayIndexOutOfBounds,
        ImplicitException::ClassCast,
        ImplicitException::Arithmetic,
        ImplicitException::NegativeArraySize,
        ImplicitException::ArrayStore,
        ImplicitException::ClassNotFound,
    ];

    pub fn class_name(self) -> &'static str {
        match self {
            ImplicitException::NullPointer => "java.lang.NullPointerException",
            ImplicitException::ArrayIndexOutOfBounds => {
                "java.lang.ArrayIndexOutOfBoundsException"
            }
            ImplicitException::ClassCast => "java.lang.ClassCastException",
            ImplicitException::Arithmetic => "java.lang.ArithmeticException",
            ImplicitException::NegativeArraySize => "java.lang.NegativeArraySizeException",
            ImplicitException::ArrayStore => "java.lang.ArrayStoreException",
            ImplicitException::ClassNotFound => "java.lang.NoClassDefFoundError",
        }
    }

    pub fn type_name(self) -> TypeName {
        TypeName::new(self.class_name())
    }
}

impl fmt::Display for ImplicitException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}
