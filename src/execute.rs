use crate::expr::infer_seq;
use crate::{Args, BinOp, EvalError, EvalResult, Expr, ExprKind, Registry, Type, Value};
use std::sync::Arc;

/// The outcome of one call to `ExecEnv::step`: the rewritten expression and
/// whether anything actually changed.
pub type Stepped = (Expr, bool);

/// The result of reducing an expression all the way to a value.
#[derive(Debug, Clone)]
pub struct Reduction {
    pub value: Value,
    /// Critical expressions in the order they were crossed.
    pub trace: Vec<Expr>,
    pub steps: usize,
}

/// An `ExecEnv` is the state of one evaluation run: the shared, read-only
/// function registry, plus the logs this run appends to.
pub struct ExecEnv<'a> {
    // invocation params
    registry: &'a Registry,

    // mutating state
    calls: Vec<Expr>,
    critical_log: Vec<Expr>,
    critical: Option<Expr>,
}

impl<'a> ExecEnv<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            calls: Vec::new(),
            critical_log: Vec::new(),
            critical: None,
        }
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Every registry call resolved so far, with its reduced arguments.
    pub fn calls(&self) -> &[Expr] {
        &self.calls
    }

    /// Resolved calls, plus every call argument that was stepped before it
    /// was a value.
    pub fn critical_log(&self) -> &[Expr] {
        &self.critical_log
    }

    /// Takes the critical expression flagged by the last step, if any.
    pub fn take_critical(&mut self) -> Option<Expr> {
        self.critical.take()
    }

    /// Steps `e` until it is a value. Fails if a step makes no progress on
    /// something that still isn't a value.
    pub fn reduce(&mut self, e: &Expr) -> EvalResult<Reduction> {
        let mut e = e.clone();
        let mut trace = Vec::new();
        let mut steps = 0;

        loop {
            if let Some(value) = e.to_value() {
                tracing::debug!(steps, critical = trace.len(), "reduced to {}", value);
                return Ok(Reduction {
                    value,
                    trace,
                    steps,
                });
            }

            let (next, progress) = self.step(&e)?;
            if let Some(c) = self.take_critical() {
                trace.push(c);
            }
            if !progress && !next.is_value() {
                return Err(EvalError::Stuck(next.to_string()));
            }

            e = next;
            steps += 1;
            tracing::trace!(step = steps, "{}", e);
        }
    }

    /// Performs one small step on `e`. Children are reduced leftmost first;
    /// a node does its own computation only once all its children are values.
    pub fn step(&mut self, e: &Expr) -> EvalResult<Stepped> {
        match e.kind() {
            ExprKind::Int(_) | ExprKind::Bool(_) | ExprKind::Var(_) | ExprKind::Symbolic(_) => {
                Ok((e.clone(), false))
            }
            ExprKind::Binop(op, l, r) => self.step_binop(*op, l, r),
            ExprKind::Ternop { cond, yes, no } => {
                let (cond, progress) = self.step(cond)?;
                let val = match cond.to_value() {
                    Some(val) if !progress => val,
                    _ => return Ok((Expr::ternop(cond, yes.clone(), no.clone()), progress)),
                };
                match val {
                    Value::Bool(true) => Ok((yes.clone(), true)),
                    Value::Bool(false) => Ok((no.clone(), true)),
                    v => Err(EvalError::NonBooleanCondition(v.to_string())),
                }
            }
            ExprKind::Call { name, args } => self.step_call(e, name, args),
            ExprKind::SeqLit { ty, elems } => {
                let ty = ty.clone().or_else(|| e.ty(Some(self.registry)));
                let mut elems = elems.clone();
                for i in 0..elems.len() {
                    let (el, progress) = self.step(&elems[i])?;
                    elems[i] = el;
                    if progress || !elems[i].is_value() {
                        return Ok((Expr::seq_lit(ty, elems), progress));
                    }
                }
                Ok((Expr::seq_lit(ty, elems), false))
            }
            ExprKind::StructLit { name, fields } => {
                let mut fields = fields.clone();
                let keys: Vec<Arc<str>> = fields.keys().cloned().collect();
                for k in keys {
                    let (v, progress) = self.step(&fields[&k])?;
                    let done = !progress && v.is_value();
                    fields.insert(k, v);
                    if !done {
                        let e = ExprKind::StructLit {
                            name: name.clone(),
                            fields,
                        };
                        return Ok((e.into(), progress));
                    }
                }
                Ok((Expr::structure(name.clone(), fields), false))
            }
            ExprKind::SeqSlice { seq, low, high } => self.step_slice(seq, low, high),
            ExprKind::SeqIndex { seq, index } => {
                let (seq, progress) = self.step(seq)?;
                let s = match seq.to_value() {
                    Some(s) if !progress => s,
                    _ => return Ok((Expr::index(seq, index.clone()), progress)),
                };
                let (index, progress) = self.step(index)?;
                let i = match index.to_value() {
                    Some(i) if !progress => i,
                    _ => return Ok((Expr::index(seq, index), progress)),
                };

                let (_, elems) = expect_seq(&s, "index")?;
                let i = expect_int(&i, "index")?;
                let elem = usize::try_from(i)
                    .ok()
                    .and_then(|ix| elems.get(ix))
                    .ok_or(EvalError::IndexOutOfRange {
                        index: i,
                        len: elems.len(),
                    })?;
                Ok((elem.to_expr(), true))
            }
            ExprKind::Field { base, field } => {
                let (base, progress) = self.step(base)?;
                let lhs = match base.to_value() {
                    Some(lhs) if !progress => lhs,
                    _ => return Ok((Expr::field(base, field.clone()), progress)),
                };
                match &lhs {
                    Value::Struct { name, fields } => match fields.get(field) {
                        Some(v) => Ok((v.to_expr(), true)),
                        None => Err(EvalError::MissingField {
                            name: name.to_string(),
                            field: field.to_string(),
                        }),
                    },
                    _ => Err(EvalError::NotAStruct(
                        Expr::field(base, field.clone()).to_string(),
                    )),
                }
            }
        }
    }

    fn step_binop(&mut self, op: BinOp, l: &Expr, r: &Expr) -> EvalResult<Stepped> {
        let (l, progress) = self.step(l)?;
        let vl = match l.to_value() {
            Some(vl) if !progress => vl,
            _ => return Ok((Expr::binop(op, l, r.clone()), progress)),
        };

        // Short-circuit: the right side is never looked at.
        if op == BinOp::And && vl == Value::Bool(false) {
            return Ok((Expr::bool(false), true));
        }

        let (r, progress) = self.step(r)?;
        let vr = match r.to_value() {
            Some(vr) if !progress => vr,
            _ => return Ok((Expr::binop(op, l, r), progress)),
        };

        Ok((eval_binop(op, vl, vr)?.to_expr(), true))
    }

    fn step_call(&mut self, e: &Expr, name: &Arc<str>, args: &Args) -> EvalResult<Stepped> {
        let mut args = args.clone();

        for i in 0..args.len() {
            if !args[i].is_value() {
                self.critical_log.push(args[i].clone());
            }
            let (arg, progress) = self.step(&args[i])?;
            args[i] = arg;
            if progress || !args[i].is_value() {
                let e = ExprKind::Call {
                    name: name.clone(),
                    args,
                };
                return Ok((e.into(), progress));
            }
        }

        if &**name == "len" {
            return self.builtin_len(e, &args);
        }

        let call: Expr = ExprKind::Call {
            name: name.clone(),
            args: args.clone(),
        }
        .into();
        self.calls.push(call.clone());
        self.critical_log.push(call.clone());

        let registry = self.registry;
        let fun = registry.lookup(name)?;
        if fun.arity() != args.len() {
            return Err(EvalError::ArityMismatch {
                name: name.to_string(),
                expected: fun.arity(),
                got: args.len(),
            });
        }

        tracing::trace!(function = %name, "unfolding {}", call);
        let bindings: Vec<(Arc<str>, Expr)> =
            fun.params.iter().cloned().zip(args.into_iter()).collect();
        let body = fun.body.subst_all(&bindings);
        self.critical = Some(call);

        Ok((body, true))
    }

    fn builtin_len(&mut self, e: &Expr, args: &[Expr]) -> EvalResult<Stepped> {
        if args.len() != 1 {
            return Err(EvalError::ArityMismatch {
                name: "len".to_string(),
                expected: 1,
                got: args.len(),
            });
        }
        match args[0].to_value() {
            Some(Value::Symbolic(_)) => {
                Ok((Expr::symbolic(Expr::call("len", args.iter().cloned())), true))
            }
            Some(v) => {
                let (_, elems) = expect_seq(&v, "len")?;
                Ok((Expr::int(elems.len() as i64), true))
            }
            None => Err(EvalError::Stuck(e.to_string())),
        }
    }

    fn step_slice(
        &mut self,
        seq: &Expr,
        low: &Option<Expr>,
        high: &Option<Expr>,
    ) -> EvalResult<Stepped> {
        let (seq, progress) = self.step(seq)?;
        let s = match seq.to_value() {
            Some(s) if !progress => s,
            _ => return Ok((Expr::slice(seq, low.clone(), high.clone()), progress)),
        };
        let (ty, elems) = expect_seq(&s, "slice")?;

        let mut lo = 0;
        let mut hi = elems.len() as i64;

        let low = match low {
            Some(low) => {
                let (low, progress) = self.step(low)?;
                match low.to_value() {
                    Some(v) if !progress => lo = expect_int(&v, "slice")?,
                    _ => return Ok((Expr::slice(seq, Some(low), high.clone()), progress)),
                }
                Some(low)
            }
            None => None,
        };

        let high = match high {
            Some(high) => {
                let (high, progress) = self.step(high)?;
                match high.to_value() {
                    Some(v) if !progress => hi = expect_int(&v, "slice")?,
                    _ => return Ok((Expr::slice(seq, low, Some(high)), progress)),
                }
                Some(high)
            }
            None => None,
        };

        if lo < 0 || lo > hi || hi > elems.len() as i64 {
            return Err(EvalError::SliceOutOfRange {
                low: lo,
                high: hi,
                len: elems.len(),
            });
        }

        let picked = elems[lo as usize..hi as usize]
            .iter()
            .map(Value::to_expr)
            .collect::<Vec<_>>();
        let ty = ty.clone().or_else(|| infer_seq(&picked, Some(self.registry)));
        let res = Expr::seq_lit(ty, picked);

        // Slices from the start aren't interesting; anything else is a real
        // decomposition of the sequence.
        if lo != 0 {
            self.critical = Some(Expr::slice(seq, low, high));
        }

        Ok((res, true))
    }
}

/// Applies `op` to two values. If either side is symbolic, so is the result.
pub fn eval_binop(op: BinOp, l: Value, r: Value) -> EvalResult<Value> {
    if l.is_symbolic() || r.is_symbolic() {
        return Ok(Value::Symbolic(Expr::binop(op, operand(l), operand(r))));
    }

    let ctx = op.symbol();
    let arith = |f: fn(i64, i64) -> Option<i64>| -> EvalResult<Value> {
        let (a, b) = (expect_int(&l, ctx)?, expect_int(&r, ctx)?);
        f(a, b).map(Value::Int).ok_or_else(|| {
            EvalError::Arithmetic(Expr::binop(op, l.to_expr(), r.to_expr()).to_string())
        })
    };

    match op {
        BinOp::Add => arith(i64::checked_add),
        BinOp::Sub => arith(i64::checked_sub),
        BinOp::Mul => arith(i64::checked_mul),
        BinOp::Div => arith(i64::checked_div),
        BinOp::Gt => Ok(Value::Bool(expect_int(&l, ctx)? > expect_int(&r, ctx)?)),
        BinOp::Lt => Ok(Value::Bool(expect_int(&l, ctx)? < expect_int(&r, ctx)?)),
        BinOp::And => Ok(Value::Bool(expect_bool(&l, ctx)? && expect_bool(&r, ctx)?)),
        BinOp::Eq => Ok(Value::Bool(l == r)),
        BinOp::Concat => {
            let (lt, ls) = expect_seq(&l, ctx)?;
            let (rt, rs) = expect_seq(&r, ctx)?;
            let ty = lt.clone().or_else(|| rt.clone());
            Ok(Value::seq(ty, ls.iter().chain(rs).cloned().collect()))
        }
    }
}

fn operand(v: Value) -> Expr {
    match v {
        Value::Symbolic(e) => e,
        v => v.to_expr(),
    }
}

fn mismatch(context: &'static str, expected: &'static str, got: &Value) -> EvalError {
    EvalError::TypeMismatch {
        context,
        expected,
        got: format!("{} {}", got.kind(), got),
    }
}

fn expect_int(v: &Value, context: &'static str) -> EvalResult<i64> {
    v.as_int().ok_or_else(|| mismatch(context, "int", v))
}

fn expect_bool(v: &Value, context: &'static str) -> EvalResult<bool> {
    v.as_bool().ok_or_else(|| mismatch(context, "bool", v))
}

fn expect_seq<'v>(
    v: &'v Value,
    context: &'static str,
) -> EvalResult<(&'v Option<Type>, &'v [Value])> {
    v.as_seq().ok_or_else(|| mismatch(context, "seq", v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Function;

    fn ints(xs: &[i64]) -> Expr {
        Expr::seq(xs.iter().map(|x| Expr::int(*x)))
    }

    fn eval(reg: &Registry, e: &Expr) -> EvalResult<Value> {
        ExecEnv::new(reg).reduce(e).map(|r| r.value)
    }

    fn double() -> Function {
        Function::new("double", ["n"], Expr::mul(Expr::var("n"), Expr::int(2)))
    }

    #[test]
    fn arithmetic_and_comparisons() {
        let reg = Registry::default();
        let e = Expr::sub(Expr::add(Expr::int(2), Expr::int(3)), Expr::div(Expr::int(9), Expr::int(3)));
        assert_eq!(eval(&reg, &e), Ok(Value::Int(2)));
        assert_eq!(eval(&reg, &Expr::gt(Expr::int(2), Expr::int(1))), Ok(Value::Bool(true)));
        assert_eq!(eval(&reg, &Expr::lt(Expr::int(2), Expr::int(1))), Ok(Value::Bool(false)));
        assert_eq!(
            eval(&reg, &Expr::equals(ints(&[1, 2]), ints(&[1, 2]))),
            Ok(Value::Bool(true))
        );
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let reg = Registry::default();
        let err = eval(&reg, &Expr::div(Expr::int(1), Expr::int(0))).unwrap_err();
        assert!(matches!(err, EvalError::Arithmetic(_)));
    }

    #[test]
    fn and_short_circuits_before_the_right_side() {
        let reg = Registry::default();
        // the right side would fail: `missing` isn't registered
        let e = Expr::and(Expr::bool(false), Expr::call("missing", []));
        assert_eq!(eval(&reg, &e), Ok(Value::Bool(false)));

        let e = Expr::and(Expr::bool(true), Expr::call("missing", []));
        assert_eq!(eval(&reg, &e), Err(EvalError::UnknownFunction("missing".into())));
    }

    #[test]
    fn operators_reject_wrong_operands() {
        let reg = Registry::default();
        let err = eval(&reg, &Expr::add(Expr::bool(true), Expr::int(1))).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { expected: "int", .. }));
        let err = eval(&reg, &Expr::concat(ints(&[1]), Expr::int(1))).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { expected: "seq", .. }));
    }

    #[test]
    fn free_variables_evaluate_symbolically() {
        let reg = Registry::default();
        let e = Expr::add(Expr::var("x"), Expr::add(Expr::int(1), Expr::int(2)));
        let v = eval(&reg, &e).unwrap();
        assert_eq!(v, Value::Symbolic(Expr::add(Expr::var("x"), Expr::int(3))));
        assert_eq!(v.to_string(), "(x + 3)");

        let e = Expr::len(Expr::var("s"));
        assert_eq!(eval(&reg, &e).unwrap().to_string(), "len(s)");
    }

    #[test]
    fn ternary_only_reduces_the_chosen_branch() {
        let reg = Registry::default();
        let e = Expr::ternop(
            Expr::gt(Expr::int(2), Expr::int(1)),
            Expr::int(10),
            Expr::call("missing", []),
        );
        assert_eq!(eval(&reg, &e), Ok(Value::Int(10)));

        let e = Expr::ternop(Expr::int(1), Expr::int(2), Expr::int(3));
        assert!(matches!(eval(&reg, &e), Err(EvalError::NonBooleanCondition(_))));
    }

    #[test]
    fn calls_are_unfolded_and_logged() {
        let reg = Registry::from_functions([double()]).unwrap();
        let e = Expr::call("double", [Expr::call("double", [Expr::int(3)])]);
        let mut env = ExecEnv::new(&reg);
        let res = env.reduce(&e).unwrap();
        assert_eq!(res.value, Value::Int(12));

        let calls: Vec<String> = env.calls().iter().map(|c| c.to_string()).collect();
        assert_eq!(calls, ["double(3)", "double(6)"]);
        let trace: Vec<String> = res.trace.iter().map(|c| c.to_string()).collect();
        assert_eq!(trace, ["double(3)", "double(6)"]);
        // the unresolved inner call was logged before it was stepped
        assert_eq!(env.critical_log()[0].to_string(), "double(3)");
        assert!(env.critical_log().len() > trace.len());
    }

    #[test]
    fn call_errors() {
        let reg = Registry::from_functions([double()]).unwrap();
        assert_eq!(
            eval(&reg, &Expr::call("triple", [Expr::int(1)])),
            Err(EvalError::UnknownFunction("triple".into()))
        );
        assert_eq!(
            eval(&reg, &Expr::call("double", [Expr::int(1), Expr::int(2)])),
            Err(EvalError::ArityMismatch {
                name: "double".into(),
                expected: 1,
                got: 2
            })
        );
        assert!(matches!(
            eval(&reg, &Expr::len(Expr::int(1))),
            Err(EvalError::TypeMismatch { context: "len", .. })
        ));
    }

    #[test]
    fn len_is_builtin() {
        let reg = Registry::default();
        let e = Expr::len(ints(&[4, 5, 6]));
        let mut env = ExecEnv::new(&reg);
        assert_eq!(env.reduce(&e).unwrap().value, Value::Int(3));
        assert!(env.calls().is_empty());
    }

    #[test]
    fn indexing() {
        let reg = Registry::default();
        let s = ints(&[10, 20, 30]);
        assert_eq!(eval(&reg, &Expr::index(s.clone(), Expr::int(1))), Ok(Value::Int(20)));
        assert_eq!(
            eval(&reg, &Expr::index(s.clone(), Expr::int(3))),
            Err(EvalError::IndexOutOfRange { index: 3, len: 3 })
        );
        assert_eq!(
            eval(&reg, &Expr::index(s, Expr::int(-1))),
            Err(EvalError::IndexOutOfRange { index: -1, len: 3 })
        );
    }

    #[test]
    fn slices_with_a_nonzero_low_bound_are_critical() {
        let reg = Registry::default();
        let s = ints(&[1, 2, 3, 4]);

        let e = Expr::slice(s.clone(), Some(Expr::int(1)), Some(Expr::int(3)));
        let res = ExecEnv::new(&reg).reduce(&e).unwrap();
        assert_eq!(res.value, Value::seq(None, vec![Value::Int(2), Value::Int(3)]));
        assert_eq!(res.trace, [e]);

        let e = Expr::slice(s.clone(), Some(Expr::int(0)), Some(Expr::int(2)));
        let res = ExecEnv::new(&reg).reduce(&e).unwrap();
        assert_eq!(res.value, Value::seq(None, vec![Value::Int(1), Value::Int(2)]));
        assert!(res.trace.is_empty());

        let e = Expr::slice(s.clone(), Some(Expr::int(2)), None);
        assert_eq!(
            eval(&reg, &e),
            Ok(Value::seq(None, vec![Value::Int(3), Value::Int(4)]))
        );

        let e = Expr::slice(s, Some(Expr::int(3)), Some(Expr::int(1)));
        assert_eq!(
            eval(&reg, &e),
            Err(EvalError::SliceOutOfRange { low: 3, high: 1, len: 4 })
        );
    }

    #[test]
    fn slices_keep_the_sequence_type() {
        let reg = Registry::default();
        let s = Expr::typed_seq(Type::byte(), [Expr::chr(b'a'), Expr::chr(b'b')]);
        let e = Expr::slice(s, Some(Expr::int(1)), None);
        assert_eq!(eval(&reg, &e).unwrap().to_string(), "seq[byte]{'b'}");
    }

    #[test]
    fn field_access() {
        let reg = Registry::default();
        let p = Expr::structure("Path", [("rooted", Expr::gt(Expr::int(1), Expr::int(0)))]);
        assert_eq!(eval(&reg, &Expr::field(p.clone(), "rooted")), Ok(Value::Bool(true)));
        assert_eq!(
            eval(&reg, &Expr::field(p, "parts")),
            Err(EvalError::MissingField {
                name: "Path".into(),
                field: "parts".into()
            })
        );
        assert!(matches!(
            eval(&reg, &Expr::field(Expr::int(1), "parts")),
            Err(EvalError::NotAStruct(_))
        ));
    }

    #[test]
    fn steps_make_progress_until_a_value() {
        let reg = Registry::from_functions([double()]).unwrap();
        let mut env = ExecEnv::new(&reg);
        let mut e = Expr::add(Expr::call("double", [Expr::int(1)]), Expr::len(ints(&[1, 2])));
        while !e.is_value() {
            let (next, progress) = env.step(&e).unwrap();
            assert!(progress || next != e);
            e = next;
        }
        assert_eq!(e.to_value(), Some(Value::Int(4)));
    }

    #[test]
    fn atoms_do_not_step() {
        let reg = Registry::default();
        let mut env = ExecEnv::new(&reg);
        for e in [Expr::int(1), Expr::bool(true), Expr::var("x")] {
            assert_eq!(env.step(&e).unwrap(), (e.clone(), false));
        }
    }
}
