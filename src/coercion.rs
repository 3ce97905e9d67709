// Operator-specific adjustments of resolved lambdas
//
// Quoted function types are matched exactly, so a literal whose body type is
// merely assignable to the parameter's declared return type has to be
// re-declared before the call type-checks.

use crate::error::{QueryError, Result};
use crate::expr::Lambda;
use crate::registry::Operator;
use crate::types::Type;

/// Apply the coercion rule of `operator` to its selector.
pub fn coerce(operator: Operator, lambda: Lambda) -> Result<Lambda> {
    match operator {
        Operator::SelectMany => flatten_selector(lambda),
        _ => Ok(lambda),
    }
}

/// Re-declare a flattening selector as returning `Sequence<T>`, `T` being
/// the element type of its body.
pub fn flatten_selector(lambda: Lambda) -> Result<Lambda> {
    let body = lambda.body().ty().clone();
    let element = body.element_type().cloned().ok_or_else(|| {
        QueryError::TypeMismatch(format!(
            "SelectMany selector must produce a sequence, not {}",
            body
        ))
    })?;
    lambda.with_return_type(Type::sequence(element)).ok_or_else(|| {
        QueryError::TypeMismatch(format!(
            "{} cannot be flattened as a sequence of its elements",
            body
        ))
    })
}

/// Re-declare an accumulator as returning the accumulator type when its body
/// is assignable to it. Otherwise the literal is left for the signature
/// check to reject.
pub fn accumulator(lambda: Lambda, accumulate: &Type) -> Lambda {
    if lambda.return_type() == accumulate {
        return lambda;
    }
    match lambda.clone().with_return_type(accumulate.clone()) {
        Some(redeclared) => redeclared,
        None => lambda,
    }
}
