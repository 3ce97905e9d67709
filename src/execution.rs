// Execution strategy
//
// Lazy operators wrap the built call as a new query source; eager operators
// run it through the source's provider. A blank expression on a
// fallback-eligible operator selects its zero-argument form.

use std::sync::Arc;

use tracing::instrument;

use crate::bindings::Bindings;
use crate::builder::build;
use crate::coercion;
use crate::error::{QueryError, Result};
use crate::query::{CallExpression, QueryExpr, QuerySource};
use crate::registry::{ArgumentShape, ConstantKind, Operator, OperatorSpec};
use crate::resolve::{is_blank, params, resolve};
use crate::value::Value;

/// Result of applying an operator by name
#[derive(Debug, Clone)]
pub enum Outcome {
    Query(QuerySource),
    Value(Value),
}

impl Outcome {
    pub fn into_query(self) -> Option<QuerySource> {
        match self {
            Outcome::Query(source) => Some(source),
            Outcome::Value(_) => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Outcome::Value(value) => Some(value),
            Outcome::Query(_) => None,
        }
    }
}

/// Apply a lazy single-expression operator.
#[instrument(level = "trace", skip_all, fields(operator = operator.name()))]
pub fn handle(
    source: &QuerySource,
    operator: Operator,
    expression: Option<&str>,
    bindings: &Bindings,
) -> Result<QuerySource> {
    let spec = expect_mode(operator, true)?;
    let call = expression_call(source, spec, expression, bindings)?;
    handle_call(source, call)
}

/// Apply an eager single-expression operator.
#[instrument(level = "trace", skip_all, fields(operator = operator.name()))]
pub fn execute(
    source: &QuerySource,
    operator: Operator,
    expression: Option<&str>,
    bindings: &Bindings,
) -> Result<Value> {
    let spec = expect_mode(operator, false)?;
    let call = expression_call(source, spec, expression, bindings)?;
    execute_call(source, call)
}

/// Apply a lazy operator taking a constant (count, element or sequence).
pub fn handle_constant(source: &QuerySource, operator: Operator, value: Value) -> Result<QuerySource> {
    let spec = expect_mode(operator, true)?;
    let call = constant_call(source, spec, value)?;
    handle_call(source, call)
}

/// Apply an eager operator taking a constant.
pub fn execute_constant(source: &QuerySource, operator: Operator, value: Value) -> Result<Value> {
    let spec = expect_mode(operator, false)?;
    let call = constant_call(source, spec, value)?;
    execute_call(source, call)
}

/// Wrap a built call as a new query source.
pub fn handle_call(source: &QuerySource, call: CallExpression) -> Result<QuerySource> {
    if !call.operator.spec().is_lazy() {
        return Err(QueryError::ExecutionMode {
            operator: call.operator.name(),
            expected: "lazy",
        });
    }
    source.provider().create_query(Arc::new(QueryExpr::Call(call)))
}

/// Run a built call through the source's provider.
pub fn execute_call(source: &QuerySource, call: CallExpression) -> Result<Value> {
    if call.operator.spec().is_lazy() {
        return Err(QueryError::ExecutionMode {
            operator: call.operator.name(),
            expected: "eager",
        });
    }
    source.provider().execute(&QueryExpr::Call(call))
}

/// Apply any single-expression operator by name.
pub fn invoke(
    source: &QuerySource,
    name: &str,
    expression: Option<&str>,
    bindings: &Bindings,
) -> Result<Outcome> {
    let spec = crate::registry::lookup(name)?;
    if spec.is_lazy() {
        handle(source, spec.operator, expression, bindings).map(Outcome::Query)
    } else {
        execute(source, spec.operator, expression, bindings).map(Outcome::Value)
    }
}

fn expect_mode(operator: Operator, lazy: bool) -> Result<&'static OperatorSpec> {
    let spec = operator.spec();
    if spec.is_lazy() == lazy {
        Ok(spec)
    } else {
        Err(QueryError::ExecutionMode {
            operator: operator.name(),
            expected: if lazy { "lazy" } else { "eager" },
        })
    }
}

fn expression_call(
    source: &QuerySource,
    spec: &OperatorSpec,
    expression: Option<&str>,
    bindings: &Bindings,
) -> Result<CallExpression> {
    let zero_argument = spec.fallback || spec.expression_shape().is_none();
    if zero_argument && spec.accepts(ArgumentShape::None) && is_blank(expression) {
        return build(source, spec, ArgumentShape::None, Vec::new(), Vec::new(), None);
    }

    let shape = spec.expression_shape().ok_or_else(|| {
        QueryError::TypeMismatch(format!("{} does not take an expression", spec.name()))
    })?;
    let argument = match (spec.operator, shape) {
        (_, ArgumentShape::Predicate) => "predicate",
        (Operator::GroupBy | Operator::OrderBy | Operator::OrderByDescending, _)
        | (Operator::ThenBy | Operator::ThenByDescending, _) => "keySelector",
        _ => "selector",
    };

    let lambda = resolve(
        Some(source),
        &params::element(source.element_type()),
        expression,
        bindings,
        spec.operator,
        argument,
    )?;
    let lambda = coercion::coerce(spec.operator, lambda)?;
    build(source, spec, shape, vec![lambda], Vec::new(), None)
}

fn constant_call(source: &QuerySource, spec: &OperatorSpec, value: Value) -> Result<CallExpression> {
    let shape = spec
        .shapes
        .iter()
        .copied()
        .find(|s| matches!(s, ArgumentShape::Constant(_)))
        .ok_or_else(|| QueryError::TypeMismatch(format!("{} does not take a constant", spec.name())))?;
    if shape == ArgumentShape::Constant(ConstantKind::Sequence) && value.is_null() {
        return Err(QueryError::MissingSource);
    }
    build(source, spec, shape, Vec::new(), vec![value], None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    fn numbers() -> QuerySource {
        QuerySource::from_values(Type::Int, (1..=5).map(Value::Int).collect()).unwrap()
    }

    #[test]
    fn test_fallback_to_zero_argument_form() {
        let source = numbers();
        let blank = execute(&source, Operator::Count, Some("  "), &Bindings::new()).unwrap();
        let absent = execute(&source, Operator::Count, None, &Bindings::new()).unwrap();
        assert_eq!(blank, Value::Int(5));
        assert_eq!(absent, Value::Int(5));
        assert_eq!(
            execute(&source, Operator::Max, Some(""), &Bindings::new()).unwrap(),
            Value::Int(5)
        );
    }

    #[test]
    fn test_no_fallback_for_all() {
        let err = execute(&numbers(), Operator::All, Some(""), &Bindings::new()).unwrap_err();
        assert!(matches!(err, QueryError::MissingExpression { operator: "All", .. }));
    }

    #[test]
    fn test_lazy_needs_expression() {
        let err = handle(&numbers(), Operator::Where, None, &Bindings::new()).unwrap_err();
        assert!(matches!(err, QueryError::MissingExpression { operator: "Where", .. }));
    }

    #[test]
    fn test_mode_is_checked() {
        assert!(matches!(
            handle(&numbers(), Operator::Count, Some("it > 1"), &Bindings::new()),
            Err(QueryError::ExecutionMode { expected: "lazy", .. })
        ));
        assert!(matches!(
            execute(&numbers(), Operator::Where, Some("it > 1"), &Bindings::new()),
            Err(QueryError::ExecutionMode { expected: "eager", .. })
        ));
    }

    #[test]
    fn test_lazy_operator_does_not_execute() {
        // Division by zero only fails once the query runs
        let source = numbers();
        let query = handle(&source, Operator::Select, Some("it / 0"), &Bindings::new()).unwrap();
        assert!(query.to_vec().is_err());
    }

    #[test]
    fn test_constants() {
        let source = numbers();
        let taken = handle_constant(&source, Operator::Take, Value::Int(2)).unwrap();
        assert_eq!(taken.to_vec().unwrap(), vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(
            execute_constant(&source, Operator::Contains, Value::Int(3)).unwrap(),
            Value::Bool(true)
        );
        assert!(matches!(
            handle_constant(&source, Operator::Except, Value::Null),
            Err(QueryError::MissingSource)
        ));
    }

    #[test]
    fn test_invoke_by_name() {
        let source = numbers();
        match invoke(&source, "Where", Some("it > 3"), &Bindings::new()).unwrap() {
            Outcome::Query(q) => assert_eq!(q.to_vec().unwrap().len(), 2),
            other => panic!("Expected a query, got {:?}", other),
        }
        let value = invoke(&source, "Sum", None, &Bindings::new())
            .unwrap()
            .into_value()
            .unwrap();
        assert_eq!(value, Value::Int(15));
        assert!(matches!(
            invoke(&source, "Nope", None, &Bindings::new()),
            Err(QueryError::UnknownOperator(_))
        ));
    }
}
