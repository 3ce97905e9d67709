// Generic call builder
//
// Works out the concrete type arguments of an operator call from the source
// element type and the resolved lambdas, assembles the argument list and
// type-checks the result against the library signature.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::{QueryError, Result};
use crate::expr::Lambda;
use crate::query::{Argument, CallExpression, QuerySource};
use crate::registry::{Accumulator, ArgumentShape, ConstantKind, DualSelector, Operator, OperatorSpec};
use crate::signature::{self, SignatureError};
use crate::types::Type;
use crate::value::Value;

/// Build a call of `spec` with argument shape `shape` over `source`.
///
/// `lambdas` are in signature order (key before element before result),
/// `constants` hold the count, element, sequence or seed argument and
/// `inner` is the second source of a two-source call.
#[instrument(level = "trace", skip_all, fields(operator = spec.name(), shape = %shape))]
pub fn build(
    source: &QuerySource,
    spec: &OperatorSpec,
    shape: ArgumentShape,
    lambdas: Vec<Lambda>,
    constants: Vec<Value>,
    inner: Option<&QuerySource>,
) -> Result<CallExpression> {
    let operator = spec.operator;
    if !spec.accepts(shape) {
        return Err(SignatureError::NoOverload {
            operator: operator.name(),
            shape,
        }
        .into());
    }

    let t = source.element_type();
    let type_args = type_arguments(spec, shape, t, &lambdas, &constants, inner)?;

    let mut args = Vec::with_capacity(2 + constants.len() + lambdas.len());
    args.push(Argument::Query(Arc::clone(source.expression())));
    if let ArgumentShape::Binary { .. } = shape {
        let inner = inner.ok_or(QueryError::MissingSource)?;
        args.push(Argument::Query(Arc::clone(inner.expression())));
    }
    for value in constants {
        let ty = constant_type(operator, shape, t, &value)?;
        args.push(Argument::Constant { value, ty });
    }
    args.extend(lambdas.into_iter().map(|l| Argument::Quote(Arc::new(l))));

    let arg_types: Vec<Type> = args.iter().map(Argument::ty).collect();
    let (signature, ty) = signature::bind(operator, shape, &type_args, &arg_types)?;

    let call = CallExpression {
        operator,
        shape,
        signature,
        type_args,
        args,
        ty,
    };
    debug!(call = %call, "built call");
    Ok(call)
}

fn type_arguments(
    spec: &OperatorSpec,
    shape: ArgumentShape,
    t: &Type,
    lambdas: &[Lambda],
    constants: &[Value],
    inner: Option<&QuerySource>,
) -> Result<Vec<Type>> {
    let operator = spec.operator;
    let returns = |index: usize| -> Result<Type> {
        lambdas
            .get(index)
            .map(|l| l.return_type().clone())
            .ok_or(QueryError::MissingExpression {
                operator: operator.name(),
                argument: "selector",
            })
    };

    let t = t.clone();
    Ok(match shape {
        ArgumentShape::None if spec.numeric => Vec::new(),
        ArgumentShape::Selector if spec.numeric => vec![t],
        ArgumentShape::None | ArgumentShape::Predicate | ArgumentShape::Constant(_) => vec![t],
        ArgumentShape::Selector if !spec.generic_result => vec![t],
        // The flattening coercion has declared the selector as Sequence<R>;
        // anything else is left for the signature check to reject.
        ArgumentShape::Selector if operator == Operator::SelectMany => {
            let produced = returns(0)?;
            match produced.element_type() {
                Some(element) => vec![t, element.clone()],
                None => vec![t, produced],
            }
        }
        ArgumentShape::Selector => vec![t, returns(0)?],
        ArgumentShape::Dual(DualSelector::KeyElement | DualSelector::KeyResult) => {
            vec![t, returns(0)?, returns(1)?]
        }
        ArgumentShape::Dual(DualSelector::KeyElementResult) => {
            vec![t, returns(0)?, returns(1)?, returns(2)?]
        }
        ArgumentShape::Binary { keyed } => {
            let u = inner
                .ok_or(QueryError::MissingSource)?
                .element_type()
                .clone();
            if keyed {
                vec![t, u, returns(0)?, returns(2)?]
            } else {
                vec![t, u, returns(0)?]
            }
        }
        ArgumentShape::Accumulator(Accumulator::Unseeded) => vec![t],
        ArgumentShape::Accumulator(form) => {
            let seed = constants.first().ok_or(QueryError::MissingArgument {
                operator: operator.name(),
                argument: "seed",
            })?;
            let accumulate = seed_type(operator, seed)?;
            match form {
                Accumulator::SeededWithResult => vec![t, accumulate, returns(1)?],
                _ => vec![t, accumulate],
            }
        }
    })
}

fn seed_type(operator: Operator, seed: &Value) -> Result<Type> {
    if seed.is_null() {
        return Err(QueryError::MissingArgument {
            operator: operator.name(),
            argument: "seed",
        });
    }
    Ok(seed.type_of())
}

// Static type of an embedded constant, checked against the element type.
fn constant_type(operator: Operator, shape: ArgumentShape, t: &Type, value: &Value) -> Result<Type> {
    match shape {
        ArgumentShape::Constant(ConstantKind::Count) => match value {
            Value::Int(_) => Ok(Type::Int),
            other => Err(QueryError::TypeMismatch(format!(
                "{} expects an int, got {}",
                operator, other
            ))),
        },
        ArgumentShape::Constant(ConstantKind::Element) => {
            if value.conforms_to(t) {
                Ok(t.clone())
            } else {
                Err(QueryError::TypeMismatch(format!(
                    "{} expects a value of type {}, got {}",
                    operator, t, value
                )))
            }
        }
        ArgumentShape::Constant(ConstantKind::Sequence) => match value {
            Value::Null => Err(QueryError::MissingSource),
            Value::Sequence(items) => match items.iter().find(|v| !v.conforms_to(t)) {
                None => Ok(Type::sequence(t.clone())),
                Some(bad) => Err(QueryError::TypeMismatch(format!(
                    "{} expects a sequence of {}, found element {}",
                    operator, t, bad
                ))),
            },
            other => Err(QueryError::TypeMismatch(format!(
                "{} expects a sequence, got {}",
                operator, other
            ))),
        },
        ArgumentShape::Accumulator(_) => seed_type(operator, value),
        _ => Err(SignatureError::ArgumentCountMismatch {
            expected: 0,
            actual: 1,
        }
        .into()),
    }
}
