//! Small-step evaluation of specification functions, with critical-expression
//! traces.
//!
//! Expressions are reduced one step at a time against a registry of named
//! functions. Along the way we record the steps worth asserting on their own
//! (every function call and every slice that doesn't start at zero), then
//! evaluate each of those independently so they can be emitted as
//! `assert expr == value` oracles.

mod error;
mod execute;
mod expr;
pub mod library;
mod registry;
mod trace;
mod types;
mod value;

pub use error::{EvalError, EvalResult};
pub use execute::{eval_binop, ExecEnv, Reduction, Stepped};
pub use expr::{Args, BinOp, Expr, ExprKind};
pub use registry::{Function, Registry, RegistryBuilder};
pub use trace::{Assertion, Extraction, Runner, TraceOrder, TraceSource};
pub use types::{Prim, Type};
pub use value::Value;
