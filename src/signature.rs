// Standard sequence operator library
//
// Generic signatures of every operator overload the call builder may target.
// A call type-checks when every argument type is assignable to the parameter
// type obtained by substituting the call's type arguments.

use std::fmt;

use once_cell::sync::Lazy;
use thiserror::Error;

use crate::registry::{Accumulator, ArgumentShape, ConstantKind, DualSelector, Operator};
use crate::types::Type;

/// Signature validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignatureError {
    #[error("No overload of '{operator}' has a {shape} form")]
    NoOverload {
        operator: &'static str,
        shape: ArgumentShape,
    },

    #[error("Argument count mismatch: expected {expected}, got {actual}")]
    ArgumentCountMismatch { expected: usize, actual: usize },

    #[error("'{operator}' expects {expected} type arguments, got {actual}")]
    TypeArgumentCount {
        operator: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Argument {position} of '{operator}': type '{found}' is not assignable to '{expected}'")]
    ArgumentMismatch {
        operator: &'static str,
        position: usize,
        expected: String,
        found: String,
    },
}

/// Parameter or result type with generic placeholders
#[derive(Debug, Clone, PartialEq)]
pub enum TypePattern {
    /// Generic type parameter by position
    Param(usize),
    Concrete(Type),
    Sequence(Box<TypePattern>),
    Query(Box<TypePattern>),
    OrderedQuery(Box<TypePattern>),
    Grouping(Box<TypePattern>, Box<TypePattern>),
    Function(Vec<TypePattern>, Box<TypePattern>),
}

impl TypePattern {
    /// Substitute type arguments for the generic parameters.
    pub fn instantiate(&self, type_args: &[Type]) -> Option<Type> {
        Some(match self {
            TypePattern::Param(i) => type_args.get(*i)?.clone(),
            TypePattern::Concrete(ty) => ty.clone(),
            TypePattern::Sequence(p) => Type::sequence(p.instantiate(type_args)?),
            TypePattern::Query(p) => Type::query(p.instantiate(type_args)?),
            TypePattern::OrderedQuery(p) => Type::ordered_query(p.instantiate(type_args)?),
            TypePattern::Grouping(k, e) => {
                Type::grouping(k.instantiate(type_args)?, e.instantiate(type_args)?)
            }
            TypePattern::Function(params, ret) => Type::function(
                params
                    .iter()
                    .map(|p| p.instantiate(type_args))
                    .collect::<Option<Vec<_>>>()?,
                ret.instantiate(type_args)?,
            ),
        })
    }
}

const PARAM_NAMES: [&str; 4] = ["T", "U", "V", "W"];

impl fmt::Display for TypePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypePattern::Param(i) => write!(f, "{}", PARAM_NAMES.get(*i).copied().unwrap_or("?")),
            TypePattern::Concrete(ty) => write!(f, "{}", ty),
            TypePattern::Sequence(p) => write!(f, "Sequence<{}>", p),
            TypePattern::Query(p) => write!(f, "Query<{}>", p),
            TypePattern::OrderedQuery(p) => write!(f, "OrderedQuery<{}>", p),
            TypePattern::Grouping(k, e) => write!(f, "Grouping<{}, {}>", k, e),
            TypePattern::Function(params, ret) => {
                write!(f, "Fn(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") -> {}", ret)
            }
        }
    }
}

/// One generic overload of a library operator
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub operator: Operator,
    pub shape: ArgumentShape,
    /// Number of generic type parameters
    pub arity: usize,
    /// Parameter types, source first
    pub params: Vec<TypePattern>,
    pub result: TypePattern,
}

impl Signature {
    fn new(
        operator: Operator,
        shape: ArgumentShape,
        arity: usize,
        params: Vec<TypePattern>,
        result: TypePattern,
    ) -> Self {
        Signature {
            operator,
            shape,
            arity,
            params,
            result,
        }
    }

    /// Validate argument count
    pub fn validate_arg_count(&self, actual: usize) -> Result<(), SignatureError> {
        if actual != self.params.len() {
            return Err(SignatureError::ArgumentCountMismatch {
                expected: self.params.len(),
                actual,
            });
        }
        Ok(())
    }

    /// Instantiate with `type_args` and check every argument against its
    /// parameter. Returns the instantiated result type.
    pub fn check(&self, type_args: &[Type], arg_types: &[Type]) -> Result<Type, SignatureError> {
        let operator = self.operator.name();
        if type_args.len() != self.arity {
            return Err(SignatureError::TypeArgumentCount {
                operator,
                expected: self.arity,
                actual: type_args.len(),
            });
        }
        self.validate_arg_count(arg_types.len())?;

        let arity_error = || SignatureError::TypeArgumentCount {
            operator,
            expected: self.arity,
            actual: type_args.len(),
        };

        for (position, (pattern, found)) in self.params.iter().zip(arg_types).enumerate() {
            let expected = pattern.instantiate(type_args).ok_or_else(arity_error)?;
            if !found.is_assignable_to(&expected) {
                return Err(SignatureError::ArgumentMismatch {
                    operator,
                    position,
                    expected: expected.to_string(),
                    found: found.to_string(),
                });
            }
        }
        self.result.instantiate(type_args).ok_or_else(arity_error)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operator)?;
        if self.arity > 0 {
            let names = PARAM_NAMES.iter().take(self.arity).copied().collect::<Vec<_>>();
            write!(f, "<{}>", names.join(", "))?;
        }
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ") -> {}", self.result)
    }
}

/// Resolve the overload of `operator` taking `shape` that accepts the
/// argument types, returning it with the instantiated result type.
pub fn bind(
    operator: Operator,
    shape: ArgumentShape,
    type_args: &[Type],
    arg_types: &[Type],
) -> Result<(&'static Signature, Type), SignatureError> {
    let mut last_error = None;
    for signature in library()
        .iter()
        .filter(|s| s.operator == operator && s.shape == shape)
    {
        match signature.check(type_args, arg_types) {
            Ok(result) => return Ok((signature, result)),
            Err(err) => last_error = Some(err),
        }
    }
    Err(last_error.unwrap_or(SignatureError::NoOverload {
        operator: operator.name(),
        shape,
    }))
}

/// Every overload of the library
pub fn library() -> &'static [Signature] {
    &LIBRARY
}

static LIBRARY: Lazy<Vec<Signature>> = Lazy::new(build_library);

// Pattern shorthands
const T: TypePattern = TypePattern::Param(0);
const U: TypePattern = TypePattern::Param(1);
const V: TypePattern = TypePattern::Param(2);
const W: TypePattern = TypePattern::Param(3);

fn concrete(ty: Type) -> TypePattern {
    TypePattern::Concrete(ty)
}

fn seq(p: TypePattern) -> TypePattern {
    TypePattern::Sequence(Box::new(p))
}

fn query(p: TypePattern) -> TypePattern {
    TypePattern::Query(Box::new(p))
}

fn ordered(p: TypePattern) -> TypePattern {
    TypePattern::OrderedQuery(Box::new(p))
}

fn grouping(k: TypePattern, e: TypePattern) -> TypePattern {
    TypePattern::Grouping(Box::new(k), Box::new(e))
}

fn func(params: Vec<TypePattern>, ret: TypePattern) -> TypePattern {
    TypePattern::Function(params, Box::new(ret))
}

fn predicate() -> TypePattern {
    func(vec![T], concrete(Type::Bool))
}

fn build_library() -> Vec<Signature> {
    use ArgumentShape as S;
    use Operator as Op;

    let mut lib = Vec::new();
    let mut add = |op, shape, arity, params, result| lib.push(Signature::new(op, shape, arity, params, result));

    // Filtering and partitioning
    for op in [Op::Where, Op::TakeWhile, Op::SkipWhile] {
        add(op, S::Predicate, 1, vec![query(T), predicate()], query(T));
    }
    for op in [Op::Take, Op::Skip] {
        add(
            op,
            S::Constant(ConstantKind::Count),
            1,
            vec![query(T), concrete(Type::Int)],
            query(T),
        );
    }
    for op in [Op::Distinct, Op::Reverse, Op::DefaultIfEmpty] {
        add(op, S::None, 1, vec![query(T)], query(T));
    }
    add(
        Op::DefaultIfEmpty,
        S::Constant(ConstantKind::Element),
        1,
        vec![query(T), T],
        query(T),
    );
    for op in [Op::Concat, Op::Union, Op::Intersect, Op::Except] {
        add(
            op,
            S::Constant(ConstantKind::Sequence),
            1,
            vec![query(T), seq(T)],
            query(T),
        );
    }

    // Projection
    add(Op::Select, S::Selector, 2, vec![query(T), func(vec![T], U)], query(U));
    add(
        Op::SelectMany,
        S::Selector,
        2,
        vec![query(T), func(vec![T], seq(U))],
        query(U),
    );

    // Ordering
    for op in [Op::OrderBy, Op::OrderByDescending] {
        add(op, S::Selector, 2, vec![query(T), func(vec![T], U)], ordered(T));
    }
    for op in [Op::ThenBy, Op::ThenByDescending] {
        add(op, S::Selector, 2, vec![ordered(T), func(vec![T], U)], ordered(T));
    }

    // Grouping: T source, U key, V element or result, W result
    add(
        Op::GroupBy,
        S::Selector,
        2,
        vec![query(T), func(vec![T], U)],
        query(grouping(U, T)),
    );
    add(
        Op::GroupBy,
        S::Dual(DualSelector::KeyElement),
        3,
        vec![query(T), func(vec![T], U), func(vec![T], V)],
        query(grouping(U, V)),
    );
    add(
        Op::GroupBy,
        S::Dual(DualSelector::KeyResult),
        3,
        vec![query(T), func(vec![T], U), func(vec![U, seq(T)], V)],
        query(V),
    );
    add(
        Op::GroupBy,
        S::Dual(DualSelector::KeyElementResult),
        4,
        vec![
            query(T),
            func(vec![T], U),
            func(vec![T], V),
            func(vec![U, seq(V)], W),
        ],
        query(W),
    );

    // Two-source operators: T outer, U inner, V key, W result
    add(
        Op::Join,
        S::Binary { keyed: true },
        4,
        vec![
            query(T),
            seq(U),
            func(vec![T], V),
            func(vec![U], V),
            func(vec![T, U], W),
        ],
        query(W),
    );
    add(
        Op::GroupJoin,
        S::Binary { keyed: true },
        4,
        vec![
            query(T),
            seq(U),
            func(vec![T], V),
            func(vec![U], V),
            func(vec![T, seq(U)], W),
        ],
        query(W),
    );
    add(
        Op::Zip,
        S::Binary { keyed: false },
        3,
        vec![query(T), seq(U), func(vec![T, U], V)],
        query(V),
    );

    // Element operators
    for op in [
        Op::First,
        Op::FirstOrDefault,
        Op::Single,
        Op::SingleOrDefault,
        Op::Last,
        Op::LastOrDefault,
    ] {
        add(op, S::None, 1, vec![query(T)], T);
        add(op, S::Predicate, 1, vec![query(T), predicate()], T);
    }
    for op in [Op::ElementAt, Op::ElementAtOrDefault] {
        add(
            op,
            S::Constant(ConstantKind::Count),
            1,
            vec![query(T), concrete(Type::Int)],
            T,
        );
    }

    // Quantifiers and counting
    for (op, result) in [
        (Op::Count, Type::Int),
        (Op::LongCount, Type::Long),
        (Op::Any, Type::Bool),
    ] {
        add(op, S::None, 1, vec![query(T)], concrete(result.clone()));
        add(op, S::Predicate, 1, vec![query(T), predicate()], concrete(result));
    }
    add(Op::All, S::Predicate, 1, vec![query(T), predicate()], concrete(Type::Bool));
    add(
        Op::Contains,
        S::Constant(ConstantKind::Element),
        1,
        vec![query(T), T],
        concrete(Type::Bool),
    );
    add(
        Op::SequenceEqual,
        S::Constant(ConstantKind::Sequence),
        1,
        vec![query(T), seq(T)],
        concrete(Type::Bool),
    );

    // Numeric aggregates, one overload per numeric type
    let numeric = [Type::Int, Type::Long, Type::Float];
    for n in numeric
        .iter()
        .cloned()
        .chain(numeric.iter().cloned().map(Type::nullable))
    {
        let average = if n.is_nullable_value() {
            Type::nullable(Type::Float)
        } else {
            Type::Float
        };
        for (op, result) in [(Op::Sum, n.clone()), (Op::Average, average)] {
            add(op, S::None, 0, vec![query(concrete(n.clone()))], concrete(result.clone()));
            add(
                op,
                S::Selector,
                1,
                vec![query(T), func(vec![T], concrete(n.clone()))],
                concrete(result),
            );
        }
    }
    for op in [Op::Min, Op::Max] {
        add(op, S::None, 1, vec![query(T)], T);
        add(op, S::Selector, 2, vec![query(T), func(vec![T], U)], U);
    }

    // Aggregate: T element, U accumulator, V result
    add(
        Op::Aggregate,
        S::Accumulator(Accumulator::Unseeded),
        1,
        vec![query(T), func(vec![T, T], T)],
        T,
    );
    add(
        Op::Aggregate,
        S::Accumulator(Accumulator::Seeded),
        2,
        vec![query(T), U, func(vec![U, T], U)],
        U,
    );
    add(
        Op::Aggregate,
        S::Accumulator(Accumulator::SeededWithResult),
        3,
        vec![query(T), U, func(vec![U, T], U), func(vec![U], V)],
        V,
    );

    lib
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_validation() {
        let sig = library()
            .iter()
            .find(|s| s.operator == Operator::Where)
            .unwrap();

        assert!(sig.validate_arg_count(2).is_ok());
        assert!(sig.validate_arg_count(1).is_err());
        assert!(sig.validate_arg_count(3).is_err());
        assert_eq!(sig.to_string(), "Where<T>(Query<T>, Fn(T) -> bool) -> Query<T>");
    }

    #[test]
    fn test_every_registered_shape_has_an_overload() {
        for op in Operator::ALL {
            for shape in op.spec().shapes {
                assert!(
                    library().iter().any(|s| s.operator == op && s.shape == *shape),
                    "{} has no {} overload",
                    op,
                    shape
                );
            }
        }
    }

    #[test]
    fn test_bind_select() {
        let (sig, result) = bind(
            Operator::Select,
            ArgumentShape::Selector,
            &[Type::Int, Type::String],
            &[
                Type::query(Type::Int),
                Type::function(vec![Type::Int], Type::String),
            ],
        )
        .unwrap();
        assert_eq!(sig.arity, 2);
        assert_eq!(result, Type::query(Type::String));
    }

    #[test]
    fn test_quoted_function_types_must_match_exactly() {
        // A selector declared to return List<int> does not fit Sequence<int>
        let err = bind(
            Operator::SelectMany,
            ArgumentShape::Selector,
            &[Type::Int, Type::Int],
            &[
                Type::query(Type::Int),
                Type::function(vec![Type::Int], Type::list(Type::Int)),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, SignatureError::ArgumentMismatch { position: 1, .. }));
    }

    #[test]
    fn test_then_by_requires_ordered_source() {
        let args = |source: Type| {
            vec![source, Type::function(vec![Type::Int], Type::Int)]
        };
        let type_args = [Type::Int, Type::Int];

        assert!(bind(
            Operator::ThenBy,
            ArgumentShape::Selector,
            &type_args,
            &args(Type::ordered_query(Type::Int))
        )
        .is_ok());
        assert!(matches!(
            bind(
                Operator::ThenBy,
                ArgumentShape::Selector,
                &type_args,
                &args(Type::query(Type::Int))
            ),
            Err(SignatureError::ArgumentMismatch { position: 0, .. })
        ));
    }

    #[test]
    fn test_numeric_overloads() {
        let (_, result) = bind(
            Operator::Average,
            ArgumentShape::None,
            &[],
            &[Type::query(Type::Long)],
        )
        .unwrap();
        assert_eq!(result, Type::Float);

        let (_, result) = bind(
            Operator::Sum,
            ArgumentShape::Selector,
            &[Type::String],
            &[
                Type::query(Type::String),
                Type::function(vec![Type::String], Type::nullable(Type::Int)),
            ],
        )
        .unwrap();
        assert_eq!(result, Type::nullable(Type::Int));

        assert!(bind(Operator::Sum, ArgumentShape::None, &[], &[Type::query(Type::String)]).is_err());
    }

    #[test]
    fn test_type_argument_count() {
        let err = bind(
            Operator::Where,
            ArgumentShape::Predicate,
            &[],
            &[Type::query(Type::Int), Type::function(vec![Type::Int], Type::Bool)],
        )
        .unwrap_err();
        assert!(matches!(err, SignatureError::TypeArgumentCount { expected: 1, actual: 0, .. }));
    }

    #[test]
    fn test_no_overload() {
        let err = bind(Operator::Where, ArgumentShape::None, &[Type::Int], &[Type::query(Type::Int)])
            .unwrap_err();
        assert!(matches!(err, SignatureError::NoOverload { operator: "Where", .. }));
    }
}
