// Typed expression tree
//
// Output of the compiler: every node knows its static type, member accesses
// are resolved to field positions and parameters to frame slots.

use std::sync::Arc;

use crate::ast::{BinaryOp, UnaryOp};
use crate::types::{RecordType, Type};
use crate::value::Value;

/// A declared lambda parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
}

/// A resolved, typed function literal.
///
/// Parameters occupy frame slots `base..base + params.len()`; `base` is zero
/// for a top-level literal and the number of enclosing parameters for a
/// literal nested inside another one.
#[derive(Debug, Clone, PartialEq)]
pub struct Lambda {
    base: usize,
    params: Vec<Parameter>,
    body: Expr,
    return_type: Type,
}

impl Lambda {
    pub(crate) fn new(base: usize, params: Vec<Parameter>, body: Expr) -> Self {
        let return_type = body.ty().clone();
        Lambda {
            base,
            params,
            body,
            return_type,
        }
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn parameter_types(&self) -> Vec<Type> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }

    pub fn body(&self) -> &Expr {
        &self.body
    }

    pub(crate) fn base(&self) -> usize {
        self.base
    }

    /// Declared return type; the body type unless re-declared.
    pub fn return_type(&self) -> &Type {
        &self.return_type
    }

    /// The quoted function type `Fn(params) -> return_type`.
    pub fn function_type(&self) -> Type {
        Type::function(self.parameter_types(), self.return_type.clone())
    }

    /// Re-declare the return type, keeping parameters and body.
    ///
    /// Returns `None` when the body type is not assignable to `ty`.
    pub fn with_return_type(self, ty: Type) -> Option<Lambda> {
        if self.body.ty().is_assignable_to(&ty) {
            Some(Lambda {
                return_type: ty,
                ..self
            })
        } else {
            None
        }
    }
}

/// Methods callable on collections inside an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceMethod {
    Count,
    LongCount,
    Any,
    All,
    Sum,
    Average,
    Min,
    Max,
    First,
    FirstOrDefault,
    Last,
    LastOrDefault,
    Where,
    Select,
    Contains,
    Distinct,
    ToList,
}

impl SequenceMethod {
    pub fn from_name(name: &str, ignore_case: bool) -> Option<Self> {
        use SequenceMethod::*;
        const ALL: [SequenceMethod; 17] = [
            Count, LongCount, Any, All, Sum, Average, Min, Max, First, FirstOrDefault, Last,
            LastOrDefault, Where, Select, Contains, Distinct, ToList,
        ];
        ALL.into_iter().find(|m| {
            if ignore_case {
                m.name().eq_ignore_ascii_case(name)
            } else {
                m.name() == name
            }
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            SequenceMethod::Count => "Count",
            SequenceMethod::LongCount => "LongCount",
            SequenceMethod::Any => "Any",
            SequenceMethod::All => "All",
            SequenceMethod::Sum => "Sum",
            SequenceMethod::Average => "Average",
            SequenceMethod::Min => "Min",
            SequenceMethod::Max => "Max",
            SequenceMethod::First => "First",
            SequenceMethod::FirstOrDefault => "FirstOrDefault",
            SequenceMethod::Last => "Last",
            SequenceMethod::LastOrDefault => "LastOrDefault",
            SequenceMethod::Where => "Where",
            SequenceMethod::Select => "Select",
            SequenceMethod::Contains => "Contains",
            SequenceMethod::Distinct => "Distinct",
            SequenceMethod::ToList => "ToList",
        }
    }
}

/// Methods and properties of strings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringMethod {
    Length,
    ToUpper,
    ToLower,
    Trim,
    StartsWith,
    EndsWith,
    Contains,
}

impl StringMethod {
    pub fn from_name(name: &str, ignore_case: bool) -> Option<Self> {
        use StringMethod::*;
        [ToUpper, ToLower, Trim, StartsWith, EndsWith, Contains]
            .into_iter()
            .find(|m| {
                if ignore_case {
                    m.name().eq_ignore_ascii_case(name)
                } else {
                    m.name() == name
                }
            })
    }

    pub fn name(self) -> &'static str {
        match self {
            StringMethod::Length => "Length",
            StringMethod::ToUpper => "ToUpper",
            StringMethod::ToLower => "ToLower",
            StringMethod::Trim => "Trim",
            StringMethod::StartsWith => "StartsWith",
            StringMethod::EndsWith => "EndsWith",
            StringMethod::Contains => "Contains",
        }
    }

    /// Number of arguments the method takes
    pub fn arity(self) -> usize {
        match self {
            StringMethod::StartsWith | StringMethod::EndsWith | StringMethod::Contains => 1,
            _ => 0,
        }
    }
}

/// Date components readable as properties of a `DateTime`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl DatePart {
    pub fn from_name(name: &str, ignore_case: bool) -> Option<Self> {
        use DatePart::*;
        [Year, Month, Day, Hour, Minute, Second]
            .into_iter()
            .find(|p| {
                let n = format!("{:?}", p);
                if ignore_case {
                    n.eq_ignore_ascii_case(name)
                } else {
                    n == name
                }
            })
    }
}

/// Typed expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant {
        value: Value,
        ty: Type,
    },
    /// A lambda parameter, by frame slot
    Parameter {
        slot: usize,
        ty: Type,
    },
    /// Record field by position
    Field {
        target: Box<Expr>,
        index: usize,
        name: String,
        ty: Type,
    },
    /// `Key` of a grouping
    GroupKey {
        target: Box<Expr>,
        ty: Type,
    },
    /// Numeric widening or nullable lifting; null passes through
    Convert {
        operand: Box<Expr>,
        ty: Type,
    },
    /// `.Value` of a nullable; fails on null
    Unwrap {
        operand: Box<Expr>,
        ty: Type,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        ty: Type,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        ty: Type,
    },
    Conditional {
        test: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
        ty: Type,
    },
    /// Anonymous record construction
    New {
        record: Arc<RecordType>,
        members: Vec<Expr>,
        ty: Type,
    },
    /// Collection method, with an optional function literal or value argument
    Sequence {
        method: SequenceMethod,
        source: Box<Expr>,
        lambda: Option<Box<Lambda>>,
        argument: Option<Box<Expr>>,
        ty: Type,
    },
    /// String method or property
    Text {
        method: StringMethod,
        target: Box<Expr>,
        args: Vec<Expr>,
        ty: Type,
    },
    DatePart {
        part: DatePart,
        target: Box<Expr>,
        ty: Type,
    },
}

impl Expr {
    /// Static type of the node
    pub fn ty(&self) -> &Type {
        match self {
            Expr::Constant { ty, .. }
            | Expr::Parameter { ty, .. }
            | Expr::Field { ty, .. }
            | Expr::GroupKey { ty, .. }
            | Expr::Convert { ty, .. }
            | Expr::Unwrap { ty, .. }
            | Expr::Unary { ty, .. }
            | Expr::Binary { ty, .. }
            | Expr::Conditional { ty, .. }
            | Expr::New { ty, .. }
            | Expr::Sequence { ty, .. }
            | Expr::Text { ty, .. }
            | Expr::DatePart { ty, .. } => ty,
        }
    }

    pub(crate) fn constant(value: Value, ty: Type) -> Expr {
        Expr::Constant { value, ty }
    }

    /// Wrap in a conversion to `ty` unless already of that type.
    pub(crate) fn convert_to(self, ty: &Type) -> Expr {
        if self.ty() == ty {
            self
        } else {
            Expr::Convert {
                operand: Box::new(self),
                ty: ty.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(ty: Type) -> Lambda {
        Lambda::new(
            0,
            vec![Parameter {
                name: "x".to_string(),
                ty: ty.clone(),
            }],
            Expr::Parameter { slot: 0, ty },
        )
    }

    #[test]
    fn test_return_type_defaults_to_body_type() {
        let lambda = identity(Type::list(Type::Int));
        assert_eq!(lambda.return_type(), &Type::list(Type::Int));
        assert_eq!(
            lambda.function_type(),
            Type::function(vec![Type::list(Type::Int)], Type::list(Type::Int))
        );
    }

    #[test]
    fn test_with_return_type_requires_assignable_body() {
        let lambda = identity(Type::list(Type::Int));
        let widened = lambda.clone().with_return_type(Type::sequence(Type::Int)).unwrap();
        assert_eq!(widened.return_type(), &Type::sequence(Type::Int));
        assert_eq!(widened.body(), lambda.body());

        assert!(lambda.with_return_type(Type::String).is_none());
    }

    #[test]
    fn test_method_lookup() {
        assert_eq!(
            SequenceMethod::from_name("count", true),
            Some(SequenceMethod::Count)
        );
        assert_eq!(SequenceMethod::from_name("count", false), None);
        assert_eq!(
            StringMethod::from_name("StartsWith", false),
            Some(StringMethod::StartsWith)
        );
        assert_eq!(DatePart::from_name("year", true), Some(DatePart::Year));
    }
}
