use crate::{Expr, Type};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A fully reduced runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Bool(bool),
    /// `ty` is the type of the whole sequence (`seq[T]`), when known.
    Seq {
        ty: Option<Type>,
        elems: Vec<Value>,
    },
    Struct {
        name: Arc<str>,
        fields: BTreeMap<Arc<str>, Value>,
    },
    /// An expression we couldn't reduce any further, usually because it
    /// mentions a free variable.
    Symbolic(Expr),
}

impl Value {
    pub fn seq(ty: Option<Type>, elems: Vec<Value>) -> Self {
        Value::Seq { ty, elems }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<(&Option<Type>, &[Value])> {
        match self {
            Value::Seq { ty, elems } => Some((ty, elems)),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        match self {
            Value::Struct { fields, .. } => fields.get(field),
            _ => None,
        }
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, Value::Symbolic(_))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Value::Seq { elems, .. } => elems.is_empty(),
            Value::Struct { fields, .. } => fields.is_empty(),
            _ => false,
        }
    }

    /// A short name for the kind of value, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::Seq { .. } => "seq",
            Value::Struct { .. } => "struct",
            Value::Symbolic(_) => "symbolic",
        }
    }

    /// The literal expression for this value. `to_expr().to_value()` gives
    /// back an equal value.
    pub fn to_expr(&self) -> Expr {
        match self {
            Value::Int(i) => Expr::int(*i),
            Value::Bool(b) => Expr::bool(*b),
            Value::Seq { ty, elems } => {
                Expr::seq_lit(ty.clone(), elems.iter().map(Value::to_expr).collect())
            }
            Value::Struct { name, fields } => Expr::structure(
                name.clone(),
                fields.iter().map(|(k, v)| (k.clone(), v.to_expr())),
            ),
            Value::Symbolic(e) => Expr::symbolic(e.clone()),
        }
    }
}

// Sequence types are only annotations, so two sequences with the same
// elements are equal regardless of their tags.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Seq { elems: a, .. }, Value::Seq { elems: b, .. }) => a == b,
            (
                Value::Struct { name: n, fields: a },
                Value::Struct {
                    name: m,
                    fields: b,
                },
            ) => n == m && a == b,
            (Value::Symbolic(a), Value::Symbolic(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_expr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(s: &str) -> Value {
        Value::seq(
            Some(Type::seq_of(Type::byte())),
            s.bytes().map(|b| Value::Int(b as i64)).collect(),
        )
    }

    #[test]
    fn sequence_equality_ignores_tags() {
        let untagged = Value::seq(None, vec![Value::Int(97), Value::Int(98)]);
        assert_eq!(bytes("ab"), untagged);
        assert_ne!(bytes("ab"), bytes("ba"));
        assert_ne!(bytes("ab"), bytes("abc"));
    }

    #[test]
    fn struct_equality_is_structural() {
        let mk = |name: &str, rooted: bool| Value::Struct {
            name: name.into(),
            fields: [("rooted".into(), Value::Bool(rooted))].into_iter().collect(),
        };
        assert_eq!(mk("Path", true), mk("Path", true));
        assert_ne!(mk("Path", true), mk("Path", false));
        assert_ne!(mk("Path", true), mk("Other", true));
        assert_eq!(mk("Path", true).get("rooted"), Some(&Value::Bool(true)));
        assert_eq!(mk("Path", true).get("parts"), None);
    }

    #[test]
    fn symbolic_only_equals_same_expression() {
        let x = Value::Symbolic(Expr::var("x"));
        assert_eq!(x, Value::Symbolic(Expr::var("x")));
        assert_ne!(x, Value::Symbolic(Expr::var("y")));
        assert_ne!(x, Value::Int(0));
    }

    #[test]
    fn renders_through_literal_form() {
        assert_eq!(bytes("a,b").to_string(), "seq[byte]{'a', ',', 'b'}");
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::Bool(false).to_string(), "false");
    }
}
