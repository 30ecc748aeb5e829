use crate::{EvalResult, ExecEnv, Expr, Registry, Value};
use rayon::prelude::*;
use serde_json::json;
use std::fmt;

/// Order in which extracted assertions are emitted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum TraceOrder {
    /// The order critical expressions were crossed; outer calls come first.
    #[default]
    OutermostFirst,
    /// Reverse order, so an assertion only depends on ones checked before it.
    InnermostFirst,
}

/// Which recorded expressions become assertions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum TraceSource {
    /// Function calls and nonzero-low slices, as flagged step by step.
    #[default]
    Steps,
    /// The full critical log, which also holds every call argument that had
    /// to be reduced.
    Log,
}

/// "`expr` reduces to `value`", checkable on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct Assertion {
    pub expr: Expr,
    pub value: Value,
}

impl Assertion {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "expr": self.expr.to_string(),
            "value": self.value.to_string(),
        })
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "assert {} == {}", self.expr, self.value)
    }
}

/// The final value of a traced evaluation and the assertions gathered on
/// the way.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub value: Value,
    pub steps: usize,
    pub assertions: Vec<Assertion>,
}

impl Extraction {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "value": self.value.to_string(),
            "steps": self.steps,
            "assertions": self.assertions.iter().map(Assertion::to_json).collect::<Vec<_>>(),
        })
    }
}

/// A `Runner` coordinates trace extraction: one traced reduction of the
/// top-level expression, then an independent reduction of every critical
/// expression it recorded.
#[derive(Debug, Clone, Copy)]
pub struct Runner<'r> {
    registry: &'r Registry,
    order: TraceOrder,
    source: TraceSource,
}

impl<'r> Runner<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            order: TraceOrder::default(),
            source: TraceSource::default(),
        }
    }

    pub fn order(mut self, order: TraceOrder) -> Self {
        self.order = order;
        self
    }

    pub fn source(mut self, source: TraceSource) -> Self {
        self.source = source;
        self
    }

    /// Reduces `expr` without keeping any assertions.
    pub fn evaluate(&self, expr: &Expr) -> EvalResult<Value> {
        ExecEnv::new(self.registry).reduce(expr).map(|r| r.value)
    }

    pub fn extract(&self, expr: &Expr) -> EvalResult<Extraction> {
        let mut env = ExecEnv::new(self.registry);
        let reduction = env.reduce(expr)?;

        let mut critical = match self.source {
            TraceSource::Steps => reduction.trace,
            TraceSource::Log => env.critical_log().to_vec(),
        };
        if self.order == TraceOrder::InnermostFirst {
            critical.reverse();
        }
        tracing::debug!(
            source = ?self.source,
            critical = critical.len(),
            "re-evaluating critical expressions for {}",
            expr
        );

        // Each of these is a fresh run with its own context; only the
        // registry is shared.
        let registry = self.registry;
        let assertions = critical
            .into_par_iter()
            .map(|e| -> EvalResult<Assertion> {
                let value = ExecEnv::new(registry).reduce(&e)?.value;
                Ok(Assertion { expr: e, value })
            })
            .collect::<EvalResult<Vec<_>>>()?;

        Ok(Extraction {
            value: reduction.value,
            steps: reduction.steps,
            assertions,
        })
    }
}
