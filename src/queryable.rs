// Operator methods on QuerySource
//
// Every method takes its expression arguments as strings plus the bindings
// they may refer to (`()`, a positional array, a variable map, settings or a
// full `Bindings`).

use crate::bindings::Bindings;
use crate::builder::build;
use crate::coercion;
use crate::error::{QueryError, Result};
use crate::execution::{
    self, execute, execute_call, execute_constant, handle, handle_call, handle_constant, Outcome,
};
use crate::expr::Lambda;
use crate::query::QuerySource;
use crate::registry::{Accumulator, ArgumentShape, DualSelector, Operator};
use crate::resolve::{is_blank, params, resolve};
use crate::types::Type;
use crate::value::Value;

impl QuerySource {
    // ── Lazy operators ───────────────────────────────────────────────────────

    /// `Where`: keep the elements the predicate holds for.
    pub fn filter(&self, predicate: &str, bindings: impl Into<Bindings>) -> Result<QuerySource> {
        handle(self, Operator::Where, Some(predicate), &bindings.into())
    }

    pub fn select(&self, selector: &str, bindings: impl Into<Bindings>) -> Result<QuerySource> {
        handle(self, Operator::Select, Some(selector), &bindings.into())
    }

    /// Project each element to a sequence and flatten.
    pub fn select_many(&self, selector: &str, bindings: impl Into<Bindings>) -> Result<QuerySource> {
        handle(self, Operator::SelectMany, Some(selector), &bindings.into())
    }

    pub fn order_by(&self, key: &str, bindings: impl Into<Bindings>) -> Result<QuerySource> {
        handle(self, Operator::OrderBy, Some(key), &bindings.into())
    }

    pub fn order_by_descending(&self, key: &str, bindings: impl Into<Bindings>) -> Result<QuerySource> {
        handle(self, Operator::OrderByDescending, Some(key), &bindings.into())
    }

    /// Subordinate ordering; the source must come from an ordering operator.
    pub fn then_by(&self, key: &str, bindings: impl Into<Bindings>) -> Result<QuerySource> {
        handle(self, Operator::ThenBy, Some(key), &bindings.into())
    }

    pub fn then_by_descending(&self, key: &str, bindings: impl Into<Bindings>) -> Result<QuerySource> {
        handle(self, Operator::ThenByDescending, Some(key), &bindings.into())
    }

    pub fn take(&self, count: i32) -> Result<QuerySource> {
        handle_constant(self, Operator::Take, Value::Int(count))
    }

    pub fn skip(&self, count: i32) -> Result<QuerySource> {
        handle_constant(self, Operator::Skip, Value::Int(count))
    }

    pub fn take_while(&self, predicate: &str, bindings: impl Into<Bindings>) -> Result<QuerySource> {
        handle(self, Operator::TakeWhile, Some(predicate), &bindings.into())
    }

    pub fn skip_while(&self, predicate: &str, bindings: impl Into<Bindings>) -> Result<QuerySource> {
        handle(self, Operator::SkipWhile, Some(predicate), &bindings.into())
    }

    pub fn distinct(&self) -> Result<QuerySource> {
        handle(self, Operator::Distinct, None, &Bindings::new())
    }

    pub fn reverse(&self) -> Result<QuerySource> {
        handle(self, Operator::Reverse, None, &Bindings::new())
    }

    /// A single `default(T)` element when the source is empty.
    pub fn default_if_empty(&self) -> Result<QuerySource> {
        handle(self, Operator::DefaultIfEmpty, None, &Bindings::new())
    }

    pub fn default_if_empty_with(&self, value: impl Into<Value>) -> Result<QuerySource> {
        handle_constant(self, Operator::DefaultIfEmpty, value.into())
    }

    pub fn concat(&self, other: impl Into<Value>) -> Result<QuerySource> {
        handle_constant(self, Operator::Concat, other.into())
    }

    pub fn union(&self, other: impl Into<Value>) -> Result<QuerySource> {
        handle_constant(self, Operator::Union, other.into())
    }

    pub fn intersect(&self, other: impl Into<Value>) -> Result<QuerySource> {
        handle_constant(self, Operator::Intersect, other.into())
    }

    pub fn except(&self, other: impl Into<Value>) -> Result<QuerySource> {
        handle_constant(self, Operator::Except, other.into())
    }

    /// Group into `Grouping<K, T>` by key, in first-seen key order.
    pub fn group_by(&self, key: &str, bindings: impl Into<Bindings>) -> Result<QuerySource> {
        handle(self, Operator::GroupBy, Some(key), &bindings.into())
    }

    pub fn group_by_element(
        &self,
        key: &str,
        element: &str,
        bindings: impl Into<Bindings>,
    ) -> Result<QuerySource> {
        let bindings = bindings.into();
        let key = self.key_selector(key, &bindings)?;
        let element = self.element_selector(element, &bindings)?;
        let call = build(
            self,
            Operator::GroupBy.spec(),
            ArgumentShape::Dual(DualSelector::KeyElement),
            vec![key, element],
            Vec::new(),
            None,
        )?;
        handle_call(self, call)
    }

    /// Group by key and project each `(key, elements)` pair.
    pub fn group_by_result(
        &self,
        key: &str,
        result: &str,
        bindings: impl Into<Bindings>,
    ) -> Result<QuerySource> {
        let bindings = bindings.into();
        let key = self.key_selector(key, &bindings)?;
        let result = self.group_result_selector(result, key.return_type(), self.element_type(), &bindings)?;
        let call = build(
            self,
            Operator::GroupBy.spec(),
            ArgumentShape::Dual(DualSelector::KeyResult),
            vec![key, result],
            Vec::new(),
            None,
        )?;
        handle_call(self, call)
    }

    pub fn group_by_element_result(
        &self,
        key: &str,
        element: &str,
        result: &str,
        bindings: impl Into<Bindings>,
    ) -> Result<QuerySource> {
        let bindings = bindings.into();
        let key = self.key_selector(key, &bindings)?;
        let element = self.element_selector(element, &bindings)?;
        let result =
            self.group_result_selector(result, key.return_type(), element.return_type(), &bindings)?;
        let call = build(
            self,
            Operator::GroupBy.spec(),
            ArgumentShape::Dual(DualSelector::KeyElementResult),
            vec![key, element, result],
            Vec::new(),
            None,
        )?;
        handle_call(self, call)
    }

    /// Inner equi-join, preserving outer order.
    pub fn join(
        &self,
        inner: &QuerySource,
        outer_key: &str,
        inner_key: &str,
        result: &str,
        bindings: impl Into<Bindings>,
    ) -> Result<QuerySource> {
        self.keyed_join(Operator::Join, inner, outer_key, inner_key, result, &bindings.into())
    }

    /// Join each outer element with the sequence of its matches.
    pub fn group_join(
        &self,
        inner: &QuerySource,
        outer_key: &str,
        inner_key: &str,
        result: &str,
        bindings: impl Into<Bindings>,
    ) -> Result<QuerySource> {
        self.keyed_join(Operator::GroupJoin, inner, outer_key, inner_key, result, &bindings.into())
    }

    pub fn zip(&self, inner: &QuerySource, result: &str, bindings: impl Into<Bindings>) -> Result<QuerySource> {
        let bindings = bindings.into();
        let result = resolve(
            Some(self),
            &params::pair(self.element_type(), inner.element_type()),
            Some(result),
            &bindings,
            Operator::Zip,
            "resultSelector",
        )?;
        let call = build(
            self,
            Operator::Zip.spec(),
            ArgumentShape::Binary { keyed: false },
            vec![result],
            Vec::new(),
            Some(inner),
        )?;
        handle_call(self, call)
    }

    // ── Eager operators ──────────────────────────────────────────────────────

    /// Number of elements satisfying `predicate`; a blank predicate counts
    /// every element.
    pub fn count(&self, predicate: &str, bindings: impl Into<Bindings>) -> Result<i32> {
        let value = execute(self, Operator::Count, Some(predicate), &bindings.into())?;
        value.as_i32().ok_or_else(|| unexpected("Count", &value))
    }

    pub fn long_count(&self, predicate: &str, bindings: impl Into<Bindings>) -> Result<i64> {
        let value = execute(self, Operator::LongCount, Some(predicate), &bindings.into())?;
        value.as_i64().ok_or_else(|| unexpected("LongCount", &value))
    }

    pub fn any(&self, predicate: &str, bindings: impl Into<Bindings>) -> Result<bool> {
        let value = execute(self, Operator::Any, Some(predicate), &bindings.into())?;
        value.as_bool().ok_or_else(|| unexpected("Any", &value))
    }

    pub fn all(&self, predicate: &str, bindings: impl Into<Bindings>) -> Result<bool> {
        let value = execute(self, Operator::All, Some(predicate), &bindings.into())?;
        value.as_bool().ok_or_else(|| unexpected("All", &value))
    }

    pub fn contains(&self, item: impl Into<Value>) -> Result<bool> {
        let value = execute_constant(self, Operator::Contains, item.into())?;
        value.as_bool().ok_or_else(|| unexpected("Contains", &value))
    }

    pub fn sequence_equal(&self, other: impl Into<Value>) -> Result<bool> {
        let value = execute_constant(self, Operator::SequenceEqual, other.into())?;
        value.as_bool().ok_or_else(|| unexpected("SequenceEqual", &value))
    }

    pub fn first(&self, predicate: &str, bindings: impl Into<Bindings>) -> Result<Value> {
        execute(self, Operator::First, Some(predicate), &bindings.into())
    }

    pub fn first_or_default(&self, predicate: &str, bindings: impl Into<Bindings>) -> Result<Value> {
        execute(self, Operator::FirstOrDefault, Some(predicate), &bindings.into())
    }

    pub fn single(&self, predicate: &str, bindings: impl Into<Bindings>) -> Result<Value> {
        execute(self, Operator::Single, Some(predicate), &bindings.into())
    }

    pub fn single_or_default(&self, predicate: &str, bindings: impl Into<Bindings>) -> Result<Value> {
        execute(self, Operator::SingleOrDefault, Some(predicate), &bindings.into())
    }

    pub fn last(&self, predicate: &str, bindings: impl Into<Bindings>) -> Result<Value> {
        execute(self, Operator::Last, Some(predicate), &bindings.into())
    }

    pub fn last_or_default(&self, predicate: &str, bindings: impl Into<Bindings>) -> Result<Value> {
        execute(self, Operator::LastOrDefault, Some(predicate), &bindings.into())
    }

    pub fn element_at(&self, index: i32) -> Result<Value> {
        execute_constant(self, Operator::ElementAt, Value::Int(index))
    }

    pub fn element_at_or_default(&self, index: i32) -> Result<Value> {
        execute_constant(self, Operator::ElementAtOrDefault, Value::Int(index))
    }

    /// Sum of the selected values; a blank selector sums the elements.
    pub fn sum(&self, selector: &str, bindings: impl Into<Bindings>) -> Result<Value> {
        execute(self, Operator::Sum, Some(selector), &bindings.into())
    }

    pub fn average(&self, selector: &str, bindings: impl Into<Bindings>) -> Result<Value> {
        execute(self, Operator::Average, Some(selector), &bindings.into())
    }

    pub fn min(&self, selector: &str, bindings: impl Into<Bindings>) -> Result<Value> {
        execute(self, Operator::Min, Some(selector), &bindings.into())
    }

    pub fn max(&self, selector: &str, bindings: impl Into<Bindings>) -> Result<Value> {
        execute(self, Operator::Max, Some(selector), &bindings.into())
    }

    /// Fold the elements with `func: (T, T) => T`, starting from the first.
    pub fn aggregate(&self, func: &str, bindings: impl Into<Bindings>) -> Result<Value> {
        let bindings = bindings.into();
        let t = self.element_type();
        let func = self.accumulator(func, t, &bindings)?;
        let call = build(
            self,
            Operator::Aggregate.spec(),
            ArgumentShape::Accumulator(Accumulator::Unseeded),
            vec![func],
            Vec::new(),
            None,
        )?;
        execute_call(self, call)
    }

    /// Fold the elements with `func: (A, T) => A`, starting from `seed`.
    pub fn aggregate_seed(
        &self,
        seed: impl Into<Value>,
        func: &str,
        bindings: impl Into<Bindings>,
    ) -> Result<Value> {
        let seed = seed_value(seed.into())?;
        let bindings = bindings.into();
        let accumulate = seed.type_of();
        let func = self.accumulator(func, &accumulate, &bindings)?;
        let call = build(
            self,
            Operator::Aggregate.spec(),
            ArgumentShape::Accumulator(Accumulator::Seeded),
            vec![func],
            vec![seed],
            None,
        )?;
        execute_call(self, call)
    }

    /// Seeded fold followed by `result: (A) => R` over the final value.
    pub fn aggregate_seed_result(
        &self,
        seed: impl Into<Value>,
        func: &str,
        result: &str,
        bindings: impl Into<Bindings>,
    ) -> Result<Value> {
        let seed = seed_value(seed.into())?;
        let bindings = bindings.into();
        let accumulate = seed.type_of();
        let func = self.accumulator(func, &accumulate, &bindings)?;
        required(result, "resultSelector")?;
        let result = resolve(
            Some(self),
            &params::element(&accumulate),
            Some(result),
            &bindings,
            Operator::Aggregate,
            "resultSelector",
        )?;
        let call = build(
            self,
            Operator::Aggregate.spec(),
            ArgumentShape::Accumulator(Accumulator::SeededWithResult),
            vec![func, result],
            vec![seed],
            None,
        )?;
        execute_call(self, call)
    }

    /// Apply any single-expression operator by name. Lazy operators yield
    /// a new query, eager ones a value.
    pub fn invoke(
        &self,
        operator: &str,
        expression: &str,
        bindings: impl Into<Bindings>,
    ) -> Result<Outcome> {
        execution::invoke(self, operator, Some(expression), &bindings.into())
    }

    // ── Argument resolution ─────────────────────────────────────────────────

    fn key_selector(&self, text: &str, bindings: &Bindings) -> Result<Lambda> {
        resolve(
            Some(self),
            &params::element(self.element_type()),
            Some(text),
            bindings,
            Operator::GroupBy,
            "keySelector",
        )
    }

    fn element_selector(&self, text: &str, bindings: &Bindings) -> Result<Lambda> {
        resolve(
            Some(self),
            &params::element(self.element_type()),
            Some(text),
            bindings,
            Operator::GroupBy,
            "elementSelector",
        )
    }

    fn group_result_selector(
        &self,
        text: &str,
        key: &Type,
        element: &Type,
        bindings: &Bindings,
    ) -> Result<Lambda> {
        resolve(
            Some(self),
            &params::group_result(key, element),
            Some(text),
            bindings,
            Operator::GroupBy,
            "resultSelector",
        )
    }

    fn accumulator(&self, text: &str, accumulate: &Type, bindings: &Bindings) -> Result<Lambda> {
        required(text, "func")?;
        let func = resolve(
            Some(self),
            &params::accumulator(accumulate, self.element_type()),
            Some(text),
            bindings,
            Operator::Aggregate,
            "func",
        )?;
        Ok(coercion::accumulator(func, accumulate))
    }

    // Both key selectors are resolved before the result selector.
    fn keyed_join(
        &self,
        operator: Operator,
        inner: &QuerySource,
        outer_key: &str,
        inner_key: &str,
        result: &str,
        bindings: &Bindings,
    ) -> Result<QuerySource> {
        let (t, u) = (self.element_type(), inner.element_type());
        let outer_key = resolve(
            Some(self),
            &params::element(t),
            Some(outer_key),
            bindings,
            operator,
            "outerKeySelector",
        )?;
        let inner_key = resolve(
            Some(inner),
            &params::element(u),
            Some(inner_key),
            bindings,
            operator,
            "innerKeySelector",
        )?;
        let result_params = if operator == Operator::GroupJoin {
            params::group_join_result(t, u)
        } else {
            params::pair(t, u)
        };
        let result = resolve(
            Some(self),
            &result_params,
            Some(result),
            bindings,
            operator,
            "resultSelector",
        )?;
        let call = build(
            self,
            operator.spec(),
            ArgumentShape::Binary { keyed: true },
            vec![outer_key, inner_key, result],
            Vec::new(),
            Some(inner),
        )?;
        handle_call(self, call)
    }
}

fn seed_value(seed: Value) -> Result<Value> {
    if seed.is_null() {
        Err(QueryError::MissingArgument {
            operator: "Aggregate",
            argument: "seed",
        })
    } else {
        Ok(seed)
    }
}

// Aggregate treats a blank func or result selector like a null seed.
fn required(text: &str, argument: &'static str) -> Result<()> {
    if is_blank(Some(text)) {
        Err(QueryError::MissingArgument {
            operator: "Aggregate",
            argument,
        })
    } else {
        Ok(())
    }
}

fn unexpected(operator: &str, value: &Value) -> QueryError {
    QueryError::TypeMismatch(format!("{} produced {}", operator, value))
}
