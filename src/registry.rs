// Operator registry
//
// Static description of every supported operator: which argument shapes it
// accepts, whether it runs lazily or eagerly and how its generic result is
// formed.

use std::fmt;

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::error::{QueryError, Result};

/// Supported sequence operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Where,
    Select,
    SelectMany,
    OrderBy,
    OrderByDescending,
    ThenBy,
    ThenByDescending,
    GroupBy,
    Join,
    GroupJoin,
    Zip,
    Take,
    Skip,
    TakeWhile,
    SkipWhile,
    Distinct,
    Reverse,
    DefaultIfEmpty,
    Concat,
    Union,
    Intersect,
    Except,
    Count,
    LongCount,
    Any,
    All,
    First,
    FirstOrDefault,
    Single,
    SingleOrDefault,
    Last,
    LastOrDefault,
    ElementAt,
    ElementAtOrDefault,
    Contains,
    SequenceEqual,
    Sum,
    Average,
    Min,
    Max,
    Aggregate,
}

/// Kind of embedded constant argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstantKind {
    /// An `int` count or index
    Count,
    /// A value of the element type
    Element,
    /// A second sequence of the element type
    Sequence,
}

/// GroupBy selector combinations beyond the key selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DualSelector {
    KeyElement,
    KeyResult,
    KeyElementResult,
}

/// Aggregate forms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accumulator {
    Unseeded,
    Seeded,
    SeededWithResult,
}

/// What an operator call carries besides its source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgumentShape {
    None,
    Predicate,
    Selector,
    Dual(DualSelector),
    Constant(ConstantKind),
    /// Two-source call; keyed for Join/GroupJoin, unkeyed for Zip
    Binary { keyed: bool },
    Accumulator(Accumulator),
}

impl fmt::Display for ArgumentShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentShape::None => write!(f, "zero-argument"),
            ArgumentShape::Predicate => write!(f, "predicate"),
            ArgumentShape::Selector => write!(f, "selector"),
            ArgumentShape::Dual(DualSelector::KeyElement) => write!(f, "key and element selector"),
            ArgumentShape::Dual(DualSelector::KeyResult) => write!(f, "key and result selector"),
            ArgumentShape::Dual(DualSelector::KeyElementResult) => {
                write!(f, "key, element and result selector")
            }
            ArgumentShape::Constant(ConstantKind::Count) => write!(f, "count"),
            ArgumentShape::Constant(ConstantKind::Element) => write!(f, "element"),
            ArgumentShape::Constant(ConstantKind::Sequence) => write!(f, "sequence"),
            ArgumentShape::Binary { keyed: true } => write!(f, "keyed inner sequence"),
            ArgumentShape::Binary { keyed: false } => write!(f, "inner sequence"),
            ArgumentShape::Accumulator(Accumulator::Unseeded) => write!(f, "accumulator"),
            ArgumentShape::Accumulator(Accumulator::Seeded) => write!(f, "seeded accumulator"),
            ArgumentShape::Accumulator(Accumulator::SeededWithResult) => {
                write!(f, "seeded accumulator with result selector")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// Produces a new query source; nothing runs
    Lazy,
    /// Runs through the provider and returns a value
    Eager,
}

/// Static description of one operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorSpec {
    pub operator: Operator,
    pub shapes: &'static [ArgumentShape],
    pub execution: Execution,
    /// A blank expression falls back to the zero-argument form
    pub fallback: bool,
    /// The selector's return type becomes a generic type argument
    pub generic_result: bool,
    /// Overloads exist per numeric type instead of per element type
    pub numeric: bool,
}

impl OperatorSpec {
    pub fn name(&self) -> &'static str {
        self.operator.name()
    }

    pub fn accepts(&self, shape: ArgumentShape) -> bool {
        self.shapes.contains(&shape)
    }

    pub fn is_lazy(&self) -> bool {
        self.execution == Execution::Lazy
    }

    /// Shape used when a single expression string is supplied
    pub fn expression_shape(&self) -> Option<ArgumentShape> {
        self.shapes
            .iter()
            .copied()
            .find(|s| matches!(s, ArgumentShape::Predicate | ArgumentShape::Selector))
    }
}

use ArgumentShape as S;

const NONE: &[ArgumentShape] = &[S::None];
const PREDICATE: &[ArgumentShape] = &[S::Predicate];
const SELECTOR: &[ArgumentShape] = &[S::Selector];
const OPTIONAL_PREDICATE: &[ArgumentShape] = &[S::None, S::Predicate];
const OPTIONAL_SELECTOR: &[ArgumentShape] = &[S::None, S::Selector];
const COUNT: &[ArgumentShape] = &[S::Constant(ConstantKind::Count)];
const ELEMENT: &[ArgumentShape] = &[S::Constant(ConstantKind::Element)];
const SEQUENCE: &[ArgumentShape] = &[S::Constant(ConstantKind::Sequence)];
const GROUP_BY: &[ArgumentShape] = &[
    S::Selector,
    S::Dual(DualSelector::KeyElement),
    S::Dual(DualSelector::KeyResult),
    S::Dual(DualSelector::KeyElementResult),
];
const KEYED: &[ArgumentShape] = &[S::Binary { keyed: true }];
const ZIP: &[ArgumentShape] = &[S::Binary { keyed: false }];
const DEFAULT_IF_EMPTY: &[ArgumentShape] = &[S::None, S::Constant(ConstantKind::Element)];
const AGGREGATE: &[ArgumentShape] = &[
    S::Accumulator(Accumulator::Unseeded),
    S::Accumulator(Accumulator::Seeded),
    S::Accumulator(Accumulator::SeededWithResult),
];

const fn lazy(operator: Operator, shapes: &'static [ArgumentShape], generic_result: bool) -> OperatorSpec {
    OperatorSpec {
        operator,
        shapes,
        execution: Execution::Lazy,
        fallback: false,
        generic_result,
        numeric: false,
    }
}

const fn eager(operator: Operator, shapes: &'static [ArgumentShape], fallback: bool) -> OperatorSpec {
    OperatorSpec {
        operator,
        shapes,
        execution: Execution::Eager,
        fallback,
        generic_result: false,
        numeric: false,
    }
}

// Indexed by `Operator as usize`.
static OPERATORS: [OperatorSpec; 41] = [
    lazy(Operator::Where, PREDICATE, false),
    lazy(Operator::Select, SELECTOR, true),
    lazy(Operator::SelectMany, SELECTOR, true),
    lazy(Operator::OrderBy, SELECTOR, true),
    lazy(Operator::OrderByDescending, SELECTOR, true),
    lazy(Operator::ThenBy, SELECTOR, true),
    lazy(Operator::ThenByDescending, SELECTOR, true),
    lazy(Operator::GroupBy, GROUP_BY, true),
    lazy(Operator::Join, KEYED, true),
    lazy(Operator::GroupJoin, KEYED, true),
    lazy(Operator::Zip, ZIP, true),
    lazy(Operator::Take, COUNT, false),
    lazy(Operator::Skip, COUNT, false),
    lazy(Operator::TakeWhile, PREDICATE, false),
    lazy(Operator::SkipWhile, PREDICATE, false),
    lazy(Operator::Distinct, NONE, false),
    lazy(Operator::Reverse, NONE, false),
    lazy(Operator::DefaultIfEmpty, DEFAULT_IF_EMPTY, false),
    lazy(Operator::Concat, SEQUENCE, false),
    lazy(Operator::Union, SEQUENCE, false),
    lazy(Operator::Intersect, SEQUENCE, false),
    lazy(Operator::Except, SEQUENCE, false),
    eager(Operator::Count, OPTIONAL_PREDICATE, true),
    eager(Operator::LongCount, OPTIONAL_PREDICATE, true),
    eager(Operator::Any, OPTIONAL_PREDICATE, true),
    eager(Operator::All, PREDICATE, false),
    eager(Operator::First, OPTIONAL_PREDICATE, true),
    eager(Operator::FirstOrDefault, OPTIONAL_PREDICATE, true),
    eager(Operator::Single, OPTIONAL_PREDICATE, true),
    eager(Operator::SingleOrDefault, OPTIONAL_PREDICATE, true),
    eager(Operator::Last, OPTIONAL_PREDICATE, true),
    eager(Operator::LastOrDefault, OPTIONAL_PREDICATE, true),
    eager(Operator::ElementAt, COUNT, false),
    eager(Operator::ElementAtOrDefault, COUNT, false),
    eager(Operator::Contains, ELEMENT, false),
    eager(Operator::SequenceEqual, SEQUENCE, false),
    OperatorSpec {
        numeric: true,
        ..eager(Operator::Sum, OPTIONAL_SELECTOR, true)
    },
    OperatorSpec {
        numeric: true,
        ..eager(Operator::Average, OPTIONAL_SELECTOR, true)
    },
    OperatorSpec {
        generic_result: true,
        ..eager(Operator::Min, OPTIONAL_SELECTOR, true)
    },
    OperatorSpec {
        generic_result: true,
        ..eager(Operator::Max, OPTIONAL_SELECTOR, true)
    },
    OperatorSpec {
        generic_result: true,
        ..eager(Operator::Aggregate, AGGREGATE, false)
    },
];

static BY_NAME: Lazy<IndexMap<&'static str, &'static OperatorSpec>> =
    Lazy::new(|| OPERATORS.iter().map(|spec| (spec.name(), spec)).collect());

impl Operator {
    pub const ALL: [Operator; 41] = [
        Operator::Where,
        Operator::Select,
        Operator::SelectMany,
        Operator::OrderBy,
        Operator::OrderByDescending,
        Operator::ThenBy,
        Operator::ThenByDescending,
        Operator::GroupBy,
        Operator::Join,
        Operator::GroupJoin,
        Operator::Zip,
        Operator::Take,
        Operator::Skip,
        Operator::TakeWhile,
        Operator::SkipWhile,
        Operator::Distinct,
        Operator::Reverse,
        Operator::DefaultIfEmpty,
        Operator::Concat,
        Operator::Union,
        Operator::Intersect,
        Operator::Except,
        Operator::Count,
        Operator::LongCount,
        Operator::Any,
        Operator::All,
        Operator::First,
        Operator::FirstOrDefault,
        Operator::Single,
        Operator::SingleOrDefault,
        Operator::Last,
        Operator::LastOrDefault,
        Operator::ElementAt,
        Operator::ElementAtOrDefault,
        Operator::Contains,
        Operator::SequenceEqual,
        Operator::Sum,
        Operator::Average,
        Operator::Min,
        Operator::Max,
        Operator::Aggregate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operator::Where => "Where",
            Operator::Select => "Select",
            Operator::SelectMany => "SelectMany",
            Operator::OrderBy => "OrderBy",
            Operator::OrderByDescending => "OrderByDescending",
            Operator::ThenBy => "ThenBy",
            Operator::ThenByDescending => "ThenByDescending",
            Operator::GroupBy => "GroupBy",
            Operator::Join => "Join",
            Operator::GroupJoin => "GroupJoin",
            Operator::Zip => "Zip",
            Operator::Take => "Take",
            Operator::Skip => "Skip",
            Operator::TakeWhile => "TakeWhile",
            Operator::SkipWhile => "SkipWhile",
            Operator::Distinct => "Distinct",
            Operator::Reverse => "Reverse",
            Operator::DefaultIfEmpty => "DefaultIfEmpty",
            Operator::Concat => "Concat",
            Operator::Union => "Union",
            Operator::Intersect => "Intersect",
            Operator::Except => "Except",
            Operator::Count => "Count",
            Operator::LongCount => "LongCount",
            Operator::Any => "Any",
            Operator::All => "All",
            Operator::First => "First",
            Operator::FirstOrDefault => "FirstOrDefault",
            Operator::Single => "Single",
            Operator::SingleOrDefault => "SingleOrDefault",
            Operator::Last => "Last",
            Operator::LastOrDefault => "LastOrDefault",
            Operator::ElementAt => "ElementAt",
            Operator::ElementAtOrDefault => "ElementAtOrDefault",
            Operator::Contains => "Contains",
            Operator::SequenceEqual => "SequenceEqual",
            Operator::Sum => "Sum",
            Operator::Average => "Average",
            Operator::Min => "Min",
            Operator::Max => "Max",
            Operator::Aggregate => "Aggregate",
        }
    }

    /// Registry entry for this operator
    pub fn spec(self) -> &'static OperatorSpec {
        &OPERATORS[self as usize]
    }

    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            Operator::OrderBy
                | Operator::OrderByDescending
                | Operator::ThenBy
                | Operator::ThenByDescending
        )
    }

    pub fn is_descending(self) -> bool {
        matches!(self, Operator::OrderByDescending | Operator::ThenByDescending)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Look up an operator by name.
pub fn lookup(name: &str) -> Result<&'static OperatorSpec> {
    BY_NAME
        .get(name)
        .copied()
        .ok_or_else(|| QueryError::UnknownOperator(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_indexed_by_operator() {
        for op in Operator::ALL {
            assert_eq!(op.spec().operator, op);
        }
        assert_eq!(BY_NAME.len(), Operator::ALL.len());
    }

    #[test]
    fn test_lookup() {
        let spec = lookup("SelectMany").unwrap();
        assert_eq!(spec.operator, Operator::SelectMany);
        assert!(spec.is_lazy());
        assert!(spec.generic_result);

        assert!(matches!(
            lookup("Frobnicate"),
            Err(QueryError::UnknownOperator(name)) if name == "Frobnicate"
        ));
    }

    #[test]
    fn test_fallback_eligibility() {
        let eligible: Vec<_> = Operator::ALL
            .into_iter()
            .filter(|op| op.spec().fallback)
            .map(Operator::name)
            .collect();
        assert_eq!(
            eligible,
            [
                "Count",
                "LongCount",
                "Any",
                "First",
                "FirstOrDefault",
                "Single",
                "SingleOrDefault",
                "Last",
                "LastOrDefault",
                "Sum",
                "Average",
                "Min",
                "Max"
            ]
        );
        assert!(!Operator::All.spec().fallback);
        assert!(Operator::Sum.spec().numeric);
    }

    #[test]
    fn test_expression_shape() {
        assert_eq!(Operator::Count.spec().expression_shape(), Some(ArgumentShape::Predicate));
        assert_eq!(Operator::Max.spec().expression_shape(), Some(ArgumentShape::Selector));
        assert_eq!(Operator::GroupBy.spec().expression_shape(), Some(ArgumentShape::Selector));
        assert_eq!(Operator::Take.spec().expression_shape(), None);
        assert!(Operator::DefaultIfEmpty
            .spec()
            .accepts(ArgumentShape::Constant(ConstantKind::Element)));
    }
}
