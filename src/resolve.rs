// Lambda resolution
//
// Shapes the parameter tuple an operator argument is compiled against and
// hands the text to the expression compiler.

use tracing::{debug, instrument};

use crate::bindings::Bindings;
use crate::compiler::compile_lambda;
use crate::error::{QueryError, Result};
use crate::expr::Lambda;
use crate::query::QuerySource;
use crate::registry::Operator;
use crate::types::Type;

/// Compile `expression` as argument `argument` of `operator` over
/// `parameter_types`.
///
/// Fails with `MissingSource` when there is no source and with
/// `MissingExpression` when the text is absent or blank.
#[instrument(level = "trace", skip_all, fields(operator = operator.name(), argument = argument))]
pub fn resolve(
    source: Option<&QuerySource>,
    parameter_types: &[Type],
    expression: Option<&str>,
    bindings: &Bindings,
    operator: Operator,
    argument: &'static str,
) -> Result<Lambda> {
    if source.is_none() {
        return Err(QueryError::MissingSource);
    }
    let text = expression
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .ok_or(QueryError::MissingExpression {
            operator: operator.name(),
            argument,
        })?;

    let lambda = compile_lambda(text, parameter_types, bindings)?;
    debug!(
        operator = operator.name(),
        argument,
        lambda = %lambda.function_type(),
        "resolved lambda"
    );
    Ok(lambda)
}

/// Whether an expression argument counts as absent
pub fn is_blank(expression: Option<&str>) -> bool {
    expression.map_or(true, |text| text.trim().is_empty())
}

/// Parameter tuples per operator argument
pub mod params {
    use crate::types::Type;

    /// Predicates, selectors and key or element selectors: `(T)`
    pub fn element(t: &Type) -> Vec<Type> {
        vec![t.clone()]
    }

    /// Aggregate accumulator: `(A, T)`
    pub fn accumulator(accumulate: &Type, t: &Type) -> Vec<Type> {
        vec![accumulate.clone(), t.clone()]
    }

    /// GroupBy result selector: `(K, Sequence<E>)`
    pub fn group_result(key: &Type, element: &Type) -> Vec<Type> {
        vec![key.clone(), Type::sequence(element.clone())]
    }

    /// Join and Zip result selectors: `(T, U)`
    pub fn pair(outer: &Type, inner: &Type) -> Vec<Type> {
        vec![outer.clone(), inner.clone()]
    }

    /// GroupJoin result selector: `(T, Sequence<U>)`
    pub fn group_join_result(outer: &Type, inner: &Type) -> Vec<Type> {
        vec![outer.clone(), Type::sequence(inner.clone())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn source() -> QuerySource {
        QuerySource::from_values(Type::Int, vec![Value::Int(1)]).unwrap()
    }

    #[test]
    fn test_missing_source() {
        let err = resolve(None, &[Type::Int], Some("it > 1"), &Bindings::new(), Operator::Where, "predicate")
            .unwrap_err();
        assert!(matches!(err, QueryError::MissingSource));
    }

    #[test]
    fn test_blank_expression() {
        for text in [None, Some(""), Some("   ")] {
            let err = resolve(
                Some(&source()),
                &[Type::Int],
                text,
                &Bindings::new(),
                Operator::Where,
                "predicate",
            )
            .unwrap_err();
            assert!(matches!(
                err,
                QueryError::MissingExpression {
                    operator: "Where",
                    argument: "predicate"
                }
            ));
        }
        assert!(is_blank(Some(" \t")));
        assert!(!is_blank(Some("x")));
    }

    #[test]
    fn test_compile_errors_pass_through() {
        let err = resolve(
            Some(&source()),
            &[Type::Int],
            Some("Nope > 1"),
            &Bindings::new(),
            Operator::Where,
            "predicate",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            QueryError::Compile(crate::compiler::CompileError::UnresolvedMember { .. })
        ));
    }

    #[test]
    fn test_parameter_tuples() {
        assert_eq!(
            params::group_result(&Type::Int, &Type::String),
            vec![Type::Int, Type::sequence(Type::String)]
        );
        assert_eq!(
            params::group_join_result(&Type::Int, &Type::String),
            vec![Type::Int, Type::sequence(Type::String)]
        );
        assert_eq!(params::accumulator(&Type::Long, &Type::Int), vec![Type::Long, Type::Int]);
    }
}
