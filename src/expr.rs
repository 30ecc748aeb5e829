use crate::{Registry, Type, Value};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Call arguments. Most calls have only a few.
pub type Args = SmallVec<[Expr; 4]>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Concat,
    Eq,
    Gt,
    Lt,
    And,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Concat => "++",
            BinOp::Eq => "==",
            BinOp::Gt => ">",
            BinOp::Lt => "<",
            BinOp::And => "&&",
        }
    }
}

/// The node kinds of an `Expr`.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Binop(BinOp, Expr, Expr),
    Ternop {
        cond: Expr,
        yes: Expr,
        no: Expr,
    },
    Call {
        name: Arc<str>,
        args: Args,
    },
    /// `ty` is the type of the whole sequence and may be filled in lazily.
    SeqLit {
        ty: Option<Type>,
        elems: Vec<Expr>,
    },
    StructLit {
        name: Arc<str>,
        fields: BTreeMap<Arc<str>, Expr>,
    },
    /// Half-open slice; a missing bound means start or end of the sequence.
    SeqSlice {
        seq: Expr,
        low: Option<Expr>,
        high: Option<Expr>,
    },
    SeqIndex {
        seq: Expr,
        index: Expr,
    },
    Field {
        base: Expr,
        field: Arc<str>,
    },
    Int(i64),
    Bool(bool),
    Var(Arc<str>),
    /// Literal form of `Value::Symbolic`. Only produced by reduction.
    Symbolic(Expr),
}

/// An immutable, structurally shared expression tree. Cloning is cheap and
/// every rewrite builds a new tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr(Arc<ExprKind>);

impl From<ExprKind> for Expr {
    fn from(kind: ExprKind) -> Self {
        Expr(Arc::new(kind))
    }
}

// Constructors. Names follow the surface syntax they stand for.
impl Expr {
    pub fn int(i: i64) -> Self {
        ExprKind::Int(i).into()
    }

    pub fn chr(c: u8) -> Self {
        Expr::int(c as i64)
    }

    pub fn bool(b: bool) -> Self {
        ExprKind::Bool(b).into()
    }

    pub fn var(name: impl Into<Arc<str>>) -> Self {
        ExprKind::Var(name.into()).into()
    }

    pub fn symbolic(e: Expr) -> Self {
        ExprKind::Symbolic(e).into()
    }

    pub fn binop(op: BinOp, l: Expr, r: Expr) -> Self {
        ExprKind::Binop(op, l, r).into()
    }

    pub fn add(l: Expr, r: Expr) -> Self {
        Expr::binop(BinOp::Add, l, r)
    }

    pub fn sub(l: Expr, r: Expr) -> Self {
        Expr::binop(BinOp::Sub, l, r)
    }

    pub fn mul(l: Expr, r: Expr) -> Self {
        Expr::binop(BinOp::Mul, l, r)
    }

    pub fn div(l: Expr, r: Expr) -> Self {
        Expr::binop(BinOp::Div, l, r)
    }

    pub fn concat(l: Expr, r: Expr) -> Self {
        Expr::binop(BinOp::Concat, l, r)
    }

    pub fn equals(l: Expr, r: Expr) -> Self {
        Expr::binop(BinOp::Eq, l, r)
    }

    pub fn gt(l: Expr, r: Expr) -> Self {
        Expr::binop(BinOp::Gt, l, r)
    }

    pub fn lt(l: Expr, r: Expr) -> Self {
        Expr::binop(BinOp::Lt, l, r)
    }

    pub fn and(l: Expr, r: Expr) -> Self {
        Expr::binop(BinOp::And, l, r)
    }

    pub fn ternop(cond: Expr, yes: Expr, no: Expr) -> Self {
        ExprKind::Ternop { cond, yes, no }.into()
    }

    pub fn call(name: impl Into<Arc<str>>, args: impl IntoIterator<Item = Expr>) -> Self {
        ExprKind::Call {
            name: name.into(),
            args: args.into_iter().collect(),
        }
        .into()
    }

    /// The builtin `len(e)`.
    pub fn len(e: Expr) -> Self {
        Expr::call("len", [e])
    }

    pub fn seq_lit(ty: Option<Type>, elems: Vec<Expr>) -> Self {
        ExprKind::SeqLit { ty, elems }.into()
    }

    /// A sequence literal whose type is inferred from its elements.
    pub fn seq(elems: impl IntoIterator<Item = Expr>) -> Self {
        let elems: Vec<Expr> = elems.into_iter().collect();
        let ty = infer_seq(&elems, None);
        Expr::seq_lit(ty, elems)
    }

    /// A sequence literal with elements of type `elem`.
    pub fn typed_seq(elem: Type, elems: impl IntoIterator<Item = Expr>) -> Self {
        Expr::seq_lit(Some(Type::seq_of(elem)), elems.into_iter().collect())
    }

    pub fn structure<K: Into<Arc<str>>>(
        name: impl Into<Arc<str>>,
        fields: impl IntoIterator<Item = (K, Expr)>,
    ) -> Self {
        ExprKind::StructLit {
            name: name.into(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
        .into()
    }

    pub fn slice(seq: Expr, low: Option<Expr>, high: Option<Expr>) -> Self {
        ExprKind::SeqSlice { seq, low, high }.into()
    }

    pub fn index(seq: Expr, index: Expr) -> Self {
        ExprKind::SeqIndex { seq, index }.into()
    }

    pub fn field(base: Expr, field: impl Into<Arc<str>>) -> Self {
        ExprKind::Field {
            base,
            field: field.into(),
        }
        .into()
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0
    }
}

impl Expr {
    /// Converts a fully reduced expression into a value. A bare variable
    /// stands for itself as a symbolic value.
    pub fn to_value(&self) -> Option<Value> {
        match self.kind() {
            ExprKind::Int(i) => Some(Value::Int(*i)),
            ExprKind::Bool(b) => Some(Value::Bool(*b)),
            ExprKind::Var(_) => Some(Value::Symbolic(self.clone())),
            ExprKind::Symbolic(e) => Some(Value::Symbolic(e.clone())),
            ExprKind::SeqLit { ty, elems } => {
                let elems = elems.iter().map(Expr::to_value).collect::<Option<Vec<_>>>()?;
                Some(Value::seq(ty.clone(), elems))
            }
            ExprKind::StructLit { name, fields } => {
                let fields = fields
                    .iter()
                    .map(|(k, v)| v.to_value().map(|v| (k.clone(), v)))
                    .collect::<Option<BTreeMap<_, _>>>()?;
                Some(Value::Struct {
                    name: name.clone(),
                    fields,
                })
            }
            ExprKind::Binop(..)
            | ExprKind::Ternop { .. }
            | ExprKind::Call { .. }
            | ExprKind::SeqSlice { .. }
            | ExprKind::SeqIndex { .. }
            | ExprKind::Field { .. } => None,
        }
    }

    pub fn is_value(&self) -> bool {
        self.to_value().is_some()
    }

    /// Replaces every occurrence of `Var(name)` with `to`.
    pub fn subst(&self, name: &str, to: &Expr) -> Expr {
        self.subst_all(&[(Arc::from(name), to.clone())])
    }

    /// Replaces every bound variable in one pass. A replacement is never
    /// itself rewritten, so a replacement mentioning another bound name is
    /// left alone.
    pub fn subst_all(&self, bindings: &[(Arc<str>, Expr)]) -> Expr {
        if bindings.is_empty() {
            return self.clone();
        }
        let s = |e: &Expr| e.subst_all(bindings);
        match self.kind() {
            ExprKind::Var(v) => bindings
                .iter()
                .find(|(name, _)| name == v)
                .map(|(_, to)| to.clone())
                .unwrap_or_else(|| self.clone()),
            ExprKind::Int(_) | ExprKind::Bool(_) | ExprKind::Symbolic(_) => self.clone(),
            ExprKind::Binop(op, l, r) => Expr::binop(*op, s(l), s(r)),
            ExprKind::Ternop { cond, yes, no } => Expr::ternop(s(cond), s(yes), s(no)),
            ExprKind::Call { name, args } => ExprKind::Call {
                name: name.clone(),
                args: args.iter().map(s).collect(),
            }
            .into(),
            ExprKind::SeqLit { ty, elems } => Expr::seq_lit(ty.clone(), elems.iter().map(s).collect()),
            ExprKind::StructLit { name, fields } => ExprKind::StructLit {
                name: name.clone(),
                fields: fields.iter().map(|(k, v)| (k.clone(), s(v))).collect(),
            }
            .into(),
            ExprKind::SeqSlice { seq, low, high } => {
                Expr::slice(s(seq), low.as_ref().map(s), high.as_ref().map(s))
            }
            ExprKind::SeqIndex { seq, index } => Expr::index(s(seq), s(index)),
            ExprKind::Field { base, field } => Expr::field(s(base), field.clone()),
        }
    }

    /// Best-effort type inference. `None` means unknown; this never fails.
    /// Call return types come from `fns` when given.
    pub fn ty(&self, fns: Option<&Registry>) -> Option<Type> {
        match self.kind() {
            ExprKind::Int(_) => Some(Type::int()),
            ExprKind::Bool(_) => Some(Type::bool()),
            ExprKind::Var(_) | ExprKind::Field { .. } => None,
            ExprKind::Symbolic(e) => e.ty(fns),
            ExprKind::Binop(op, l, r) => match op {
                BinOp::Concat => l.ty(fns).or_else(|| r.ty(fns)),
                BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => Some(Type::int()),
                BinOp::Eq | BinOp::Gt | BinOp::Lt | BinOp::And => Some(Type::bool()),
            },
            ExprKind::Ternop { yes, no, .. } => yes.ty(fns).or_else(|| no.ty(fns)),
            ExprKind::Call { name, .. } => fns?.get(name)?.ret.clone(),
            ExprKind::SeqLit { ty, elems } => ty.clone().or_else(|| infer_seq(elems, fns)),
            ExprKind::StructLit { name, .. } => Some(Type::Abstract(name.clone())),
            ExprKind::SeqSlice { seq, .. } => seq.ty(fns),
            ExprKind::SeqIndex { seq, .. } => seq.ty(fns)?.elem().cloned(),
        }
    }

    /// Visits `self` and then every sub-expression, pre-order.
    pub fn walk<'e>(&'e self, f: &mut impl FnMut(&'e Expr)) {
        f(self);
        match self.kind() {
            ExprKind::Int(_) | ExprKind::Bool(_) | ExprKind::Var(_) | ExprKind::Symbolic(_) => {}
            ExprKind::Binop(_, l, r) => {
                l.walk(f);
                r.walk(f);
            }
            ExprKind::Ternop { cond, yes, no } => {
                cond.walk(f);
                yes.walk(f);
                no.walk(f);
            }
            ExprKind::Call { args, .. } => {
                for a in args {
                    a.walk(f);
                }
            }
            ExprKind::SeqLit { elems, .. } => {
                for e in elems {
                    e.walk(f);
                }
            }
            ExprKind::StructLit { fields, .. } => {
                for e in fields.values() {
                    e.walk(f);
                }
            }
            ExprKind::SeqSlice { seq, low, high } => {
                seq.walk(f);
                if let Some(low) = low {
                    low.walk(f);
                }
                if let Some(high) = high {
                    high.walk(f);
                }
            }
            ExprKind::SeqIndex { seq, index } => {
                seq.walk(f);
                index.walk(f);
            }
            ExprKind::Field { base, .. } => base.walk(f),
        }
    }

    /// Every call argument anywhere in `self` that isn't a value yet.
    pub fn unresolved_call_args(&self) -> Vec<Expr> {
        let mut res = Vec::new();
        self.walk(&mut |e| {
            if let ExprKind::Call { args, .. } = e.kind() {
                res.extend(args.iter().filter(|a| !a.is_value()).cloned());
            }
        });
        res
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        match self.kind() {
            ExprKind::Int(i) => render_int(f, *i),
            ExprKind::Bool(b) => write!(f, "{}", b),
            ExprKind::Var(v) => write!(f, "{}", v),
            ExprKind::Symbolic(e) => e.render(f, depth),
            ExprKind::Binop(op, l, r) => {
                write!(f, "(")?;
                l.render(f, depth)?;
                write!(f, " {} ", op.symbol())?;
                r.render(f, depth)?;
                write!(f, ")")
            }
            ExprKind::Ternop { cond, yes, no } => {
                let indent = "\t".repeat(depth + 1);
                write!(f, "(")?;
                cond.render(f, depth + 1)?;
                write!(f, "?\n{}", indent)?;
                yes.render(f, depth + 1)?;
                write!(f, ":\n{}", indent)?;
                no.render(f, depth + 1)?;
                write!(f, ")")
            }
            ExprKind::Call { name, args } => {
                write!(f, "{}(", name)?;
                render_list(f, args.iter(), depth)?;
                write!(f, ")")
            }
            ExprKind::SeqLit { ty, elems } => {
                if let Some(ty) = ty {
                    write!(f, "{}", ty)?;
                }
                write!(f, "{{")?;
                render_list(f, elems.iter(), depth)?;
                write!(f, "}}")
            }
            ExprKind::StructLit { name, fields } => {
                write!(f, "{}{{", name)?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}:", k)?;
                    v.render(f, depth)?;
                }
                write!(f, "}}")
            }
            ExprKind::SeqSlice { seq, low, high } => {
                seq.render(f, depth)?;
                write!(f, "[")?;
                if let Some(low) = low {
                    low.render(f, depth)?;
                }
                write!(f, ":")?;
                if let Some(high) = high {
                    high.render(f, depth)?;
                }
                write!(f, "]")
            }
            ExprKind::SeqIndex { seq, index } => {
                seq.render(f, depth)?;
                write!(f, "[")?;
                index.render(f, depth)?;
                write!(f, "]")
            }
            ExprKind::Field { base, field } => {
                base.render(f, depth)?;
                write!(f, ".{}", field)
            }
        }
    }
}

/// The sequence type implied by the first element with a known type.
pub(crate) fn infer_seq(elems: &[Expr], fns: Option<&Registry>) -> Option<Type> {
    elems.iter().find_map(|e| e.ty(fns)).map(Type::seq_of)
}

fn render_list<'e>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = &'e Expr>,
    depth: usize,
) -> fmt::Result {
    for (i, e) in items.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        e.render(f, depth)?;
    }
    Ok(())
}

// Printable ASCII reads better as a character: most sequences we print are
// byte strings.
fn render_int(f: &mut fmt::Formatter<'_>, i: i64) -> fmt::Result {
    match i {
        0x27 => write!(f, "'\\''"),
        0x5c => write!(f, "'\\\\'"),
        0x20..=0x7e => write!(f, "'{}'", i as u8 as char),
        _ => write!(f, "{}", i),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0)
    }
}
