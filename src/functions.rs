// Sequence operator implementations over in-memory values
//
// Shared by the provider (top-level operators) and the evaluator (collection
// methods inside an expression). Lambda application happens in the callers;
// these functions see already-projected values.

use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

use crate::types::Type;
use crate::value::Value;

/// Function errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunctionError {
    #[error("Sequence contains no elements")]
    SequenceEmpty,

    #[error("Sequence contains more than one element")]
    SequenceAmbiguous,

    #[error("Index {index} is out of range")]
    IndexOutOfRange { index: i64 },

    #[error("Arithmetic operation resulted in an overflow")]
    Overflow,

    #[error("Type error: {0}")]
    TypeError(String),
}

/// Sum, average, min, max
pub mod aggregate {
    use super::*;
    use std::cmp::Ordering;

    /// Sum of the non-null values, as `result` (int, long or double, possibly
    /// nullable). An empty sum is zero.
    pub fn sum(values: &[Value], result: &Type) -> Result<Value, FunctionError> {
        let present = values.iter().filter(|v| !v.is_null());
        match result.underlying() {
            Type::Int => present
                .map(|v| v.as_i32().ok_or_else(|| not_numeric(v)))
                .try_fold(0i32, |acc, n| acc.checked_add(n?).ok_or(FunctionError::Overflow))
                .map(Value::Int),
            Type::Long => present
                .map(|v| v.as_i64().ok_or_else(|| not_numeric(v)))
                .try_fold(0i64, |acc, n| acc.checked_add(n?).ok_or(FunctionError::Overflow))
                .map(Value::Long),
            Type::Float => present
                .map(|v| v.as_f64().ok_or_else(|| not_numeric(v)))
                .sum::<Result<f64, _>>()
                .map(Value::Float),
            other => Err(FunctionError::TypeError(format!("cannot sum values of type {}", other))),
        }
    }

    /// Average of the non-null values. With no values the result is null
    /// when `result` is nullable and an error otherwise.
    pub fn average(values: &[Value], result: &Type) -> Result<Value, FunctionError> {
        let mut total = 0.0f64;
        let mut count = 0usize;
        for v in values.iter().filter(|v| !v.is_null()) {
            total += v.as_f64().ok_or_else(|| not_numeric(v))?;
            count += 1;
        }
        if count == 0 {
            return if result.accepts_null() {
                Ok(Value::Null)
            } else {
                Err(FunctionError::SequenceEmpty)
            };
        }
        Ok(Value::Float(total / count as f64))
    }

    pub fn min(values: &[Value], element: &Type) -> Result<Value, FunctionError> {
        extreme(values, element, Ordering::Less)
    }

    pub fn max(values: &[Value], element: &Type) -> Result<Value, FunctionError> {
        extreme(values, element, Ordering::Greater)
    }

    // For element types that accept null, nulls are ignored and an empty
    // input yields null; for value types an empty input is an error.
    fn extreme(values: &[Value], element: &Type, wanted: Ordering) -> Result<Value, FunctionError> {
        let mut best: Option<&Value> = None;
        for v in values {
            if v.is_null() && element.accepts_null() {
                continue;
            }
            best = match best {
                Some(current) if v.compare(current) != wanted => Some(current),
                _ => Some(v),
            };
        }
        match best {
            Some(v) => Ok(v.clone()),
            None if element.accepts_null() => Ok(Value::Null),
            None => Err(FunctionError::SequenceEmpty),
        }
    }

    fn not_numeric(v: &Value) -> FunctionError {
        FunctionError::TypeError(format!("{} is not a number", v))
    }
}

/// First, last, single, element-at
pub mod element {
    use super::*;

    pub fn first(items: &[Value]) -> Result<Value, FunctionError> {
        items.first().cloned().ok_or(FunctionError::SequenceEmpty)
    }

    pub fn first_or_default(items: &[Value], element: &Type) -> Value {
        items.first().cloned().unwrap_or_else(|| element.default_value())
    }

    pub fn last(items: &[Value]) -> Result<Value, FunctionError> {
        items.last().cloned().ok_or(FunctionError::SequenceEmpty)
    }

    pub fn last_or_default(items: &[Value], element: &Type) -> Value {
        items.last().cloned().unwrap_or_else(|| element.default_value())
    }

    pub fn single(items: &[Value]) -> Result<Value, FunctionError> {
        match items {
            [] => Err(FunctionError::SequenceEmpty),
            [only] => Ok(only.clone()),
            _ => Err(FunctionError::SequenceAmbiguous),
        }
    }

    pub fn single_or_default(items: &[Value], element: &Type) -> Result<Value, FunctionError> {
        match items {
            [] => Ok(element.default_value()),
            [only] => Ok(only.clone()),
            _ => Err(FunctionError::SequenceAmbiguous),
        }
    }

    pub fn element_at(items: &[Value], index: i32) -> Result<Value, FunctionError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .ok_or(FunctionError::IndexOutOfRange {
                index: i64::from(index),
            })
    }

    pub fn element_at_or_default(items: &[Value], index: i32, element: &Type) -> Value {
        element_at(items, index).unwrap_or_else(|_| element.default_value())
    }
}

/// Set operators; all keep first-occurrence order
pub mod set {
    use super::*;

    pub fn distinct(items: &[Value]) -> Vec<Value> {
        items
            .iter()
            .cloned()
            .collect::<IndexSet<Value>>()
            .into_iter()
            .collect()
    }

    pub fn concat(first: &[Value], second: &[Value]) -> Vec<Value> {
        first.iter().chain(second.iter()).cloned().collect()
    }

    pub fn union(first: &[Value], second: &[Value]) -> Vec<Value> {
        first
            .iter()
            .chain(second.iter())
            .cloned()
            .collect::<IndexSet<Value>>()
            .into_iter()
            .collect()
    }

    pub fn intersect(first: &[Value], second: &[Value]) -> Vec<Value> {
        let keep: IndexSet<&Value> = second.iter().collect();
        first
            .iter()
            .filter(|v| keep.contains(v))
            .cloned()
            .collect::<IndexSet<Value>>()
            .into_iter()
            .collect()
    }

    pub fn except(first: &[Value], second: &[Value]) -> Vec<Value> {
        let drop: IndexSet<&Value> = second.iter().collect();
        first
            .iter()
            .filter(|v| !drop.contains(v))
            .cloned()
            .collect::<IndexSet<Value>>()
            .into_iter()
            .collect()
    }

    pub fn contains(items: &[Value], item: &Value) -> bool {
        items.contains(item)
    }

    pub fn sequence_equal(first: &[Value], second: &[Value]) -> bool {
        first == second
    }
}

/// Stable multi-key sorting
pub mod ordering {
    use super::*;
    use std::cmp::Ordering;

    /// Sort `items` by per-item key tuples. `descending[i]` applies to key
    /// position `i`. Ties keep source order.
    pub fn sort_by_keys(items: Vec<Value>, keys: Vec<Vec<Value>>, descending: &[bool]) -> Vec<Value> {
        let mut indexed: Vec<(Vec<Value>, Value)> = keys.into_iter().zip(items).collect();
        indexed.sort_by(|(a, _), (b, _)| {
            for (position, (x, y)) in a.iter().zip(b.iter()).enumerate() {
                let ord = x.compare(y);
                let ord = if descending.get(position).copied().unwrap_or(false) {
                    ord.reverse()
                } else {
                    ord
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        indexed.into_iter().map(|(_, item)| item).collect()
    }
}

/// Grouping and joining
pub mod grouping {
    use super::*;

    /// Group `(key, element)` pairs by key, keeping first-seen key order.
    pub fn group_pairs(pairs: impl IntoIterator<Item = (Value, Value)>) -> Vec<(Value, Vec<Value>)> {
        let mut groups: IndexMap<Value, Vec<Value>> = IndexMap::new();
        for (key, element) in pairs {
            groups.entry(key).or_default().push(element);
        }
        groups.into_iter().collect()
    }

    /// Index inner elements by key for joins. Null keys never match.
    pub fn lookup(pairs: impl IntoIterator<Item = (Value, Value)>) -> IndexMap<Value, Vec<Value>> {
        let mut index: IndexMap<Value, Vec<Value>> = IndexMap::new();
        for (key, element) in pairs {
            if !key.is_null() {
                index.entry(key).or_default().push(element);
            }
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(ns: &[i32]) -> Vec<Value> {
        ns.iter().map(|n| Value::Int(*n)).collect()
    }

    #[test]
    fn test_sum() {
        assert_eq!(aggregate::sum(&ints(&[1, 2, 3]), &Type::Int), Ok(Value::Int(6)));
        assert_eq!(aggregate::sum(&[], &Type::Int), Ok(Value::Int(0)));
        assert_eq!(
            aggregate::sum(
                &[Value::Float(1.5), Value::Null],
                &Type::nullable(Type::Float)
            ),
            Ok(Value::Float(1.5))
        );
        assert_eq!(
            aggregate::sum(&ints(&[i32::MAX, 1]), &Type::Int),
            Err(FunctionError::Overflow)
        );
    }

    #[test]
    fn test_average() {
        assert_eq!(
            aggregate::average(&ints(&[1, 2]), &Type::Float),
            Ok(Value::Float(1.5))
        );
        assert_eq!(
            aggregate::average(&[], &Type::Float),
            Err(FunctionError::SequenceEmpty)
        );
        assert_eq!(
            aggregate::average(&[Value::Null], &Type::nullable(Type::Float)),
            Ok(Value::Null)
        );
    }

    #[test]
    fn test_min_max() {
        assert_eq!(aggregate::min(&ints(&[3, 1, 2]), &Type::Int), Ok(Value::Int(1)));
        assert_eq!(aggregate::max(&ints(&[3, 1, 2]), &Type::Int), Ok(Value::Int(3)));
        assert_eq!(
            aggregate::min(&[], &Type::Int),
            Err(FunctionError::SequenceEmpty)
        );
        assert_eq!(
            aggregate::min(&[Value::Null, Value::Int(4)], &Type::nullable(Type::Int)),
            Ok(Value::Int(4))
        );
        assert_eq!(aggregate::max(&[], &Type::String), Ok(Value::Null));
    }

    #[test]
    fn test_elements() {
        let items = ints(&[5, 6]);
        assert_eq!(element::first(&items), Ok(Value::Int(5)));
        assert_eq!(element::last(&items), Ok(Value::Int(6)));
        assert_eq!(element::first(&[]), Err(FunctionError::SequenceEmpty));
        assert_eq!(element::first_or_default(&[], &Type::Int), Value::Int(0));
        assert_eq!(element::single(&items), Err(FunctionError::SequenceAmbiguous));
        assert_eq!(element::single_or_default(&[], &Type::String), Ok(Value::Null));
        assert_eq!(element::element_at(&items, 1), Ok(Value::Int(6)));
        assert_eq!(
            element::element_at(&items, -1),
            Err(FunctionError::IndexOutOfRange { index: -1 })
        );
        assert_eq!(element::element_at_or_default(&items, 9, &Type::Int), Value::Int(0));
    }

    #[test]
    fn test_set_operators_keep_first_occurrence_order() {
        let a = ints(&[3, 1, 3, 2]);
        let b = ints(&[2, 4, 3]);
        assert_eq!(set::distinct(&a), ints(&[3, 1, 2]));
        assert_eq!(set::union(&a, &b), ints(&[3, 1, 2, 4]));
        assert_eq!(set::intersect(&a, &b), ints(&[3, 2]));
        assert_eq!(set::except(&a, &b), ints(&[1]));
        assert_eq!(set::concat(&a, &b).len(), 7);
        assert!(set::contains(&a, &Value::Int(1)));
        assert!(!set::sequence_equal(&a, &b));
    }

    #[test]
    fn test_sort_is_stable() {
        let items = vec![
            Value::string("b1"),
            Value::string("a"),
            Value::string("b2"),
        ];
        let keys = vec![
            vec![Value::Int(2)],
            vec![Value::Int(1)],
            vec![Value::Int(2)],
        ];
        let sorted = ordering::sort_by_keys(items.clone(), keys.clone(), &[false]);
        assert_eq!(sorted, vec![items[1].clone(), items[0].clone(), items[2].clone()]);

        let sorted = ordering::sort_by_keys(items.clone(), keys, &[true]);
        assert_eq!(sorted, vec![items[0].clone(), items[2].clone(), items[1].clone()]);
    }

    #[test]
    fn test_group_pairs_keeps_key_order() {
        let groups = grouping::group_pairs(vec![
            (Value::Int(2), Value::string("x")),
            (Value::Int(1), Value::string("y")),
            (Value::Int(2), Value::string("z")),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, Value::Int(2));
        assert_eq!(groups[0].1.len(), 2);
    }

    #[test]
    fn test_lookup_skips_null_keys() {
        let index = grouping::lookup(vec![
            (Value::Null, Value::Int(1)),
            (Value::Int(7), Value::Int(2)),
        ]);
        assert_eq!(index.len(), 1);
    }
}
