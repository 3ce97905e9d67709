// In-memory query provider
//
// Executes call expression trees over materialised values, one operator at
// a time, in the order the tree describes. No rewriting, no optimisation.

use std::slice;
use std::sync::Arc;

use tracing::{instrument, trace};

use crate::error::{QueryError, Result};
use crate::evaluator::{count_as_i32, Evaluator, EvaluatorError};
use crate::expr::Lambda;
use crate::functions::{aggregate, element, grouping, ordering, set};
use crate::query::{CallExpression, QueryExpr, QueryProvider, QuerySource};
use crate::registry::{Accumulator, ArgumentShape, DualSelector, Operator};
use crate::value::Value;

/// Provider over in-memory collections
#[derive(Debug, Default, Clone, Copy)]
pub struct EnumerableProvider;

impl QueryProvider for EnumerableProvider {
    #[instrument(level = "trace", skip_all)]
    fn create_query(&self, expression: Arc<QueryExpr>) -> Result<QuerySource> {
        let ty = expression.ty();
        let element = ty
            .element_type()
            .cloned()
            .ok_or_else(|| QueryError::TypeMismatch(format!("{} is not a query", ty)))?;
        QuerySource::new(element, expression, Arc::new(*self))
    }

    #[instrument(level = "trace", skip_all)]
    fn execute(&self, expression: &QueryExpr) -> Result<Value> {
        Interpreter::default().run(expression)
    }
}

#[derive(Default)]
struct Interpreter {
    evaluator: Evaluator,
}

impl Interpreter {
    fn run(&mut self, expression: &QueryExpr) -> Result<Value> {
        match expression {
            QueryExpr::Root { values, .. } => Ok(Value::Sequence(Arc::clone(values))),
            QueryExpr::Call(call) => self.call(call),
        }
    }

    fn items(&mut self, expression: &QueryExpr) -> Result<Vec<Value>> {
        match self.run(expression)? {
            Value::Sequence(items) => Ok(Arc::try_unwrap(items).unwrap_or_else(|shared| (*shared).clone())),
            other => Err(QueryError::TypeMismatch(format!(
                "{} is not a sequence",
                other
            ))),
        }
    }

    fn invoke(&mut self, lambda: &Lambda, args: &[Value]) -> Result<Value> {
        Ok(self.evaluator.invoke(lambda, args)?)
    }

    fn map(&mut self, items: &[Value], selector: &Lambda) -> Result<Vec<Value>> {
        let mut projected = Vec::with_capacity(items.len());
        for item in items {
            projected.push(self.invoke(selector, slice::from_ref(item))?);
        }
        Ok(projected)
    }

    fn filter(&mut self, items: Vec<Value>, predicate: &Lambda) -> Result<Vec<Value>> {
        let mut kept = Vec::new();
        for item in items {
            if self.evaluator.test(predicate, &item)? {
                kept.push(item);
            }
        }
        Ok(kept)
    }

    fn call(&mut self, call: &CallExpression) -> Result<Value> {
        use Operator::*;

        let value = match call.operator {
            OrderBy | OrderByDescending | ThenBy | ThenByDescending => {
                Value::sequence(self.order(call)?)
            }
            Join | GroupJoin => Value::sequence(self.join(call)?),
            Zip => {
                let outer = self.items(call.source()?)?;
                let inner = self.items(call.query(1)?)?;
                let result = call.quote(2)?;
                let mut zipped = Vec::with_capacity(outer.len().min(inner.len()));
                for (t, u) in outer.into_iter().zip(inner) {
                    zipped.push(self.invoke(result, &[t, u])?);
                }
                Value::sequence(zipped)
            }
            GroupBy => Value::sequence(self.group(call)?),
            _ => {
                let items = self.items(call.source()?)?;
                self.apply(call, items)?
            }
        };

        trace!(operator = call.operator.name(), result = %call.ty, "executed operator");
        Ok(value)
    }

    // Single-source operators
    fn apply(&mut self, call: &CallExpression, items: Vec<Value>) -> Result<Value> {
        use Operator::*;

        Ok(match call.operator {
            Where => Value::sequence(self.filter(items, call.quote(1)?)?),
            Select => Value::sequence(self.map(&items, call.quote(1)?)?),
            SelectMany => {
                let selector = call.quote(1)?;
                let mut flattened = Vec::new();
                for item in &items {
                    match self.invoke(selector, slice::from_ref(item))? {
                        Value::Sequence(inner) => flattened.extend(inner.iter().cloned()),
                        Value::Grouping(g) => flattened.extend(g.elements().iter().cloned()),
                        Value::Null => {
                            return Err(EvaluatorError::NullReference("SelectMany".to_string()).into())
                        }
                        other => {
                            return Err(QueryError::TypeMismatch(format!(
                                "{} is not a sequence",
                                other
                            )))
                        }
                    }
                }
                Value::sequence(flattened)
            }
            Take => {
                let n = count(call)?;
                Value::sequence(items.into_iter().take(n).collect())
            }
            Skip => {
                let n = count(call)?;
                Value::sequence(items.into_iter().skip(n).collect())
            }
            TakeWhile => {
                let predicate = call.quote(1)?;
                let mut taken = Vec::new();
                for item in items {
                    if !self.evaluator.test(predicate, &item)? {
                        break;
                    }
                    taken.push(item);
                }
                Value::sequence(taken)
            }
            SkipWhile => {
                let predicate = call.quote(1)?;
                let mut rest = items.into_iter();
                let mut kept = Vec::new();
                for item in rest.by_ref() {
                    if !self.evaluator.test(predicate, &item)? {
                        kept.push(item);
                        break;
                    }
                }
                kept.extend(rest);
                Value::sequence(kept)
            }
            Distinct => Value::sequence(set::distinct(&items)),
            Reverse => Value::sequence(items.into_iter().rev().collect()),
            DefaultIfEmpty => {
                if items.is_empty() {
                    let fill = match call.shape {
                        ArgumentShape::None => call.type_arg(0)?.default_value(),
                        _ => call.constant(1)?.clone(),
                    };
                    Value::sequence(vec![fill])
                } else {
                    Value::sequence(items)
                }
            }
            Concat => Value::sequence(set::concat(&items, second(call)?)),
            Union => Value::sequence(set::union(&items, second(call)?)),
            Intersect => Value::sequence(set::intersect(&items, second(call)?)),
            Except => Value::sequence(set::except(&items, second(call)?)),
            Contains => Value::Bool(set::contains(&items, call.constant(1)?)),
            SequenceEqual => Value::Bool(set::sequence_equal(&items, second(call)?)),
            ElementAt => element::element_at(&items, index(call)?)?,
            ElementAtOrDefault => {
                element::element_at_or_default(&items, index(call)?, call.type_arg(0)?)
            }
            Count | LongCount | Any | All | First | FirstOrDefault | Single | SingleOrDefault
            | Last | LastOrDefault => {
                let matching = match call.shape {
                    ArgumentShape::Predicate if call.operator == All => {
                        let predicate = call.quote(1)?;
                        let mut all = true;
                        for item in &items {
                            if !self.evaluator.test(predicate, item)? {
                                all = false;
                                break;
                            }
                        }
                        return Ok(Value::Bool(all));
                    }
                    ArgumentShape::Predicate => self.filter(items, call.quote(1)?)?,
                    _ => items,
                };
                self.element(call, &matching)?
            }
            Sum | Average | Min | Max => {
                let values = match call.shape {
                    ArgumentShape::Selector => self.map(&items, call.quote(1)?)?,
                    _ => items,
                };
                match call.operator {
                    Sum => aggregate::sum(&values, &call.ty)?,
                    Average => aggregate::average(&values, &call.ty)?,
                    Min => aggregate::min(&values, &call.ty)?,
                    _ => aggregate::max(&values, &call.ty)?,
                }
            }
            Aggregate => self.aggregate(call, items)?,
            other => {
                return Err(QueryError::TypeMismatch(format!(
                    "{} is not a single-source operator",
                    other
                )))
            }
        })
    }

    fn element(&mut self, call: &CallExpression, items: &[Value]) -> Result<Value> {
        let ty = call.type_arg(0)?;
        Ok(match call.operator {
            Operator::Count => Value::Int(count_as_i32(items.len())?),
            Operator::LongCount => Value::Long(items.len() as i64),
            Operator::Any => Value::Bool(!items.is_empty()),
            Operator::First => element::first(items)?,
            Operator::FirstOrDefault => element::first_or_default(items, ty),
            Operator::Single => element::single(items)?,
            Operator::SingleOrDefault => element::single_or_default(items, ty)?,
            Operator::Last => element::last(items)?,
            _ => element::last_or_default(items, ty),
        })
    }

    fn aggregate(&mut self, call: &CallExpression, items: Vec<Value>) -> Result<Value> {
        let (mut acc, func, rest) = match call.shape {
            ArgumentShape::Accumulator(Accumulator::Unseeded) => {
                let mut iter = items.into_iter();
                let first = iter.next().ok_or(QueryError::SequenceEmpty)?;
                (first, call.quote(1)?, iter.collect::<Vec<_>>())
            }
            _ => (call.constant(1)?.clone(), call.quote(2)?, items),
        };
        for item in rest {
            acc = self.invoke(func, &[acc, item])?;
        }
        match call.shape {
            ArgumentShape::Accumulator(Accumulator::SeededWithResult) => {
                self.invoke(call.quote(3)?, &[acc])
            }
            _ => Ok(acc),
        }
    }

    // OrderBy starts a chain, each ThenBy adds a subordinate key. The whole
    // chain is sorted once over the OrderBy source.
    fn order(&mut self, call: &CallExpression) -> Result<Vec<Value>> {
        let mut chain = vec![call];
        let mut current = call;
        while matches!(current.operator, Operator::ThenBy | Operator::ThenByDescending) {
            current = match current.source()? {
                QueryExpr::Call(inner) if inner.operator.is_ordering() => inner,
                _ => {
                    return Err(QueryError::TypeMismatch(format!(
                        "{} requires an ordered source",
                        current.operator
                    )))
                }
            };
            chain.push(current);
        }
        chain.reverse();

        let items = self.items(current.source()?)?;
        let mut keys = Vec::with_capacity(items.len());
        for item in &items {
            let mut row = Vec::with_capacity(chain.len());
            for link in &chain {
                row.push(self.invoke(link.quote(1)?, slice::from_ref(item))?);
            }
            keys.push(row);
        }
        let descending: Vec<bool> = chain.iter().map(|c| c.operator.is_descending()).collect();
        Ok(ordering::sort_by_keys(items, keys, &descending))
    }

    fn group(&mut self, call: &CallExpression) -> Result<Vec<Value>> {
        let items = self.items(call.source()?)?;
        let key_selector = call.quote(1)?;
        let (element_selector, result_selector) = match call.shape {
            ArgumentShape::Dual(DualSelector::KeyElement) => (Some(call.quote(2)?), None),
            ArgumentShape::Dual(DualSelector::KeyResult) => (None, Some(call.quote(2)?)),
            ArgumentShape::Dual(DualSelector::KeyElementResult) => {
                (Some(call.quote(2)?), Some(call.quote(3)?))
            }
            _ => (None, None),
        };

        let mut pairs = Vec::with_capacity(items.len());
        for item in items {
            let key = self.invoke(key_selector, slice::from_ref(&item))?;
            let element = match element_selector {
                Some(selector) => self.invoke(selector, slice::from_ref(&item))?,
                None => item,
            };
            pairs.push((key, element));
        }

        let groups = grouping::group_pairs(pairs);
        match result_selector {
            Some(selector) => {
                let mut results = Vec::with_capacity(groups.len());
                for (key, elements) in groups {
                    results.push(self.invoke(selector, &[key, Value::sequence(elements)])?);
                }
                Ok(results)
            }
            None => Ok(groups
                .into_iter()
                .map(|(key, elements)| Value::grouping(key, elements))
                .collect()),
        }
    }

    // Inner elements are indexed by key; null keys never match.
    fn join(&mut self, call: &CallExpression) -> Result<Vec<Value>> {
        let outer = self.items(call.source()?)?;
        let inner = self.items(call.query(1)?)?;
        let (outer_key, inner_key, result) = (call.quote(2)?, call.quote(3)?, call.quote(4)?);

        let mut keyed = Vec::with_capacity(inner.len());
        for u in inner {
            keyed.push((self.invoke(inner_key, slice::from_ref(&u))?, u));
        }
        let lookup = grouping::lookup(keyed);

        let mut joined = Vec::new();
        for t in outer {
            let key = self.invoke(outer_key, slice::from_ref(&t))?;
            let matches = if key.is_null() {
                None
            } else {
                lookup.get(&key)
            };
            if call.operator == Operator::GroupJoin {
                let group = matches.cloned().unwrap_or_default();
                joined.push(self.invoke(result, &[t, Value::sequence(group)])?);
            } else {
                for u in matches.into_iter().flatten() {
                    joined.push(self.invoke(result, &[t.clone(), u.clone()])?);
                }
            }
        }
        Ok(joined)
    }
}

// Take/Skip count. A negative count means zero: take nothing, skip nothing.
fn count(call: &CallExpression) -> Result<usize> {
    Ok(usize::try_from(index(call)?).unwrap_or(0))
}

fn index(call: &CallExpression) -> Result<i32> {
    call.constant(1)?
        .as_i32()
        .ok_or_else(|| QueryError::TypeMismatch(format!("{} expects an int", call.operator)))
}

fn second(call: &CallExpression) -> Result<&[Value]> {
    call.constant(1)?
        .as_slice()
        .ok_or_else(|| QueryError::TypeMismatch(format!("{} expects a sequence", call.operator)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::Bindings;
    use crate::compiler::compile_lambda;
    use crate::query::Argument;
    use crate::registry::ConstantKind;
    use crate::signature;
    use crate::types::Type;

    fn root(values: Vec<i32>) -> Arc<QueryExpr> {
        Arc::new(QueryExpr::Root {
            element_type: Type::Int,
            values: Arc::new(values.into_iter().map(Value::Int).collect()),
        })
    }

    fn quote(text: &str, params: &[Type]) -> Argument {
        Argument::Quote(Arc::new(compile_lambda(text, params, &Bindings::new()).unwrap()))
    }

    fn call(operator: Operator, shape: ArgumentShape, type_args: Vec<Type>, args: Vec<Argument>) -> QueryExpr {
        let arg_types: Vec<Type> = args.iter().map(Argument::ty).collect();
        let (signature, ty) = signature::bind(operator, shape, &type_args, &arg_types).unwrap();
        QueryExpr::Call(CallExpression {
            operator,
            shape,
            signature,
            type_args,
            args,
            ty,
        })
    }

    fn run(expr: &QueryExpr) -> Result<Value> {
        EnumerableProvider.execute(expr)
    }

    #[test]
    fn test_where_then_count() {
        let filtered = call(
            Operator::Where,
            ArgumentShape::Predicate,
            vec![Type::Int],
            vec![Argument::Query(root(vec![1, 2, 3, 4])), quote("it % 2 == 0", &[Type::Int])],
        );
        let counted = call(
            Operator::Count,
            ArgumentShape::None,
            vec![Type::Int],
            vec![Argument::Query(Arc::new(filtered))],
        );
        assert_eq!(run(&counted).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_order_by_then_by() {
        let ordered = call(
            Operator::OrderBy,
            ArgumentShape::Selector,
            vec![Type::Int, Type::Int],
            vec![Argument::Query(root(vec![13, 21, 11, 22])), quote("it % 10", &[Type::Int])],
        );
        let then = call(
            Operator::ThenByDescending,
            ArgumentShape::Selector,
            vec![Type::Int, Type::Int],
            vec![Argument::Query(Arc::new(ordered)), quote("it", &[Type::Int])],
        );
        assert_eq!(
            run(&then).unwrap(),
            Value::sequence(vec![Value::Int(21), Value::Int(11), Value::Int(22), Value::Int(13)])
        );
    }

    #[test]
    fn test_take_negative_count_is_empty() {
        let taken = call(
            Operator::Take,
            ArgumentShape::Constant(ConstantKind::Count),
            vec![Type::Int],
            vec![
                Argument::Query(root(vec![1, 2])),
                Argument::Constant {
                    value: Value::Int(-1),
                    ty: Type::Int,
                },
            ],
        );
        assert_eq!(run(&taken).unwrap(), Value::sequence(vec![]));
    }

    #[test]
    fn test_aggregate_unseeded_on_empty() {
        let folded = call(
            Operator::Aggregate,
            ArgumentShape::Accumulator(Accumulator::Unseeded),
            vec![Type::Int],
            vec![Argument::Query(root(vec![])), quote("(a, b) => a + b", &[Type::Int, Type::Int])],
        );
        assert!(matches!(run(&folded), Err(QueryError::SequenceEmpty)));
    }

    #[test]
    fn test_skip_while() {
        let skipped = call(
            Operator::SkipWhile,
            ArgumentShape::Predicate,
            vec![Type::Int],
            vec![Argument::Query(root(vec![1, 2, 5, 1])), quote("it < 3", &[Type::Int])],
        );
        assert_eq!(
            run(&skipped).unwrap(),
            Value::sequence(vec![Value::Int(5), Value::Int(1)])
        );
    }
}
