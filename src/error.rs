use thiserror::Error;

/// Everything that can abort a reduction run. None of these are recoverable:
/// they point at either malformed input or a broken function body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("function {0} not found")]
    UnknownFunction(String),

    #[error("wrong number of arguments for {name}: expected {expected}, got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("non-boolean condition: {0}")]
    NonBooleanCondition(String),

    #[error("type mismatch in {context}: expected {expected}, got {got}")]
    TypeMismatch {
        context: &'static str,
        expected: &'static str,
        got: String,
    },

    #[error("index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("slice [{low}:{high}] out of range for sequence of length {len}")]
    SliceOutOfRange { low: i64, high: i64, len: usize },

    #[error("field access {0} requires lhs to be a struct")]
    NotAStruct(String),

    #[error("struct {name} does not have field {field}")]
    MissingField { name: String, field: String },

    #[error("arithmetic error evaluating {0}")]
    Arithmetic(String),

    #[error("no progress reducing {0}")]
    Stuck(String),

    #[error("function {0} defined more than once")]
    DuplicateFunction(String),
}

pub type EvalResult<T> = Result<T, EvalError>;
