use std::fmt;
use std::sync::Arc;

/// The primitive kinds a sequence element can have.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Prim {
    Int,
    Bool,
    Byte,
}

/// A best-effort type. Nothing is ever rejected on the basis of a `Type`; it
/// only tags sequence literals and carries a function's declared return type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Prim(Prim),
    Seq(Arc<Type>),
    /// A named type whose structure we don't model, e.g. a record type.
    Abstract(Arc<str>),
}

impl Type {
    pub fn int() -> Self {
        Type::Prim(Prim::Int)
    }

    pub fn bool() -> Self {
        Type::Prim(Prim::Bool)
    }

    pub fn byte() -> Self {
        Type::Prim(Prim::Byte)
    }

    pub fn seq_of(elem: Type) -> Self {
        Type::Seq(Arc::new(elem))
    }

    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Type::Abstract(name.into())
    }

    /// The element type, if this is a sequence type.
    pub fn elem(&self) -> Option<&Type> {
        match self {
            Type::Seq(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_abstract(&self) -> bool {
        matches!(self, Type::Abstract(_))
    }
}

impl fmt::Display for Prim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prim::Int => write!(f, "int"),
            Prim::Bool => write!(f, "bool"),
            Prim::Byte => write!(f, "byte"),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Prim(p) => write!(f, "{}", p),
            Type::Seq(t) => write!(f, "seq[{}]", t),
            Type::Abstract(name) => write!(f, "{}", name),
        }
    }
}
