// Crate-level error taxonomy
//
// Every layer keeps its own error enum; this one composes them for the
// public query API.

use thiserror::Error;

use crate::compiler::CompileError;
use crate::evaluator::EvaluatorError;
use crate::functions::FunctionError;
use crate::signature::SignatureError;
use crate::value::ValueError;

/// Errors raised while building or executing a query
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Source query is missing")]
    MissingSource,

    #[error("{operator}: expression for '{argument}' is missing")]
    MissingExpression {
        operator: &'static str,
        argument: &'static str,
    },

    #[error("{operator}: argument '{argument}' is missing")]
    MissingArgument {
        operator: &'static str,
        argument: &'static str,
    },

    #[error("'{operator}' is not a {expected} operator")]
    ExecutionMode {
        operator: &'static str,
        expected: &'static str,
    },

    #[error("Unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Sequence contains no elements")]
    SequenceEmpty,

    #[error("Sequence contains more than one element")]
    SequenceAmbiguous,

    #[error("Index {index} is out of range")]
    IndexOutOfRange { index: i64 },

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Evaluation(EvaluatorError),

    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Result alias for the query API
pub type Result<T> = std::result::Result<T, QueryError>;

impl From<FunctionError> for QueryError {
    fn from(err: FunctionError) -> Self {
        match err {
            FunctionError::SequenceEmpty => QueryError::SequenceEmpty,
            FunctionError::SequenceAmbiguous => QueryError::SequenceAmbiguous,
            FunctionError::IndexOutOfRange { index } => QueryError::IndexOutOfRange { index },
            other => QueryError::Evaluation(EvaluatorError::Function(other)),
        }
    }
}

// Operator failures inside an expression surface the same way as failures
// of the top-level operator.
impl From<EvaluatorError> for QueryError {
    fn from(err: EvaluatorError) -> Self {
        match err {
            EvaluatorError::Function(inner) => QueryError::from(inner),
            other => QueryError::Evaluation(other),
        }
    }
}
