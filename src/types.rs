// Run-time type descriptors
//
// Every value, lambda and query node carries one of these. Generic operator
// instantiation is done by passing `Type` values around as type arguments.

use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// A named, typed field of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

/// Shape of a record value.
///
/// Named record types describe caller data (`Order`, `OrderLine`). Anonymous
/// record types are produced by `new (...)` projections and compare
/// structurally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordType {
    name: Option<String>,
    fields: Vec<Field>,
}

impl RecordType {
    /// Create a named record type.
    pub fn named<N, F, I>(name: N, fields: I) -> Arc<Self>
    where
        N: Into<String>,
        F: Into<String>,
        I: IntoIterator<Item = (F, Type)>,
    {
        Arc::new(RecordType {
            name: Some(name.into()),
            fields: collect_fields(fields),
        })
    }

    /// Create an anonymous record type.
    pub fn anonymous<F, I>(fields: I) -> Arc<Self>
    where
        F: Into<String>,
        I: IntoIterator<Item = (F, Type)>,
    {
        Arc::new(RecordType {
            name: None,
            fields: collect_fields(fields),
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Find a field by name, returning its position and definition.
    ///
    /// An exact match always wins; with `ignore_case` the first field whose
    /// name matches ignoring ASCII case is returned otherwise.
    pub fn field(&self, name: &str, ignore_case: bool) -> Option<(usize, &Field)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)
            .or_else(|| {
                if ignore_case {
                    self.fields
                        .iter()
                        .enumerate()
                        .find(|(_, f)| f.name.eq_ignore_ascii_case(name))
                } else {
                    None
                }
            })
    }
}

fn collect_fields<F, I>(fields: I) -> Vec<Field>
where
    F: Into<String>,
    I: IntoIterator<Item = (F, Type)>,
{
    fields
        .into_iter()
        .map(|(name, ty)| Field {
            name: name.into(),
            ty,
        })
        .collect()
}

/// Run-time type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Top type; every type is assignable to it
    Object,
    /// Type of the `null` literal
    Null,
    Bool,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    /// 64-bit IEEE float
    Float,
    String,
    DateTime,
    /// Nullable form of a value type
    Nullable(Box<Type>),
    Record(Arc<RecordType>),
    /// A concrete, materialised collection
    List(Box<Type>),
    /// The canonical lazy sequence type
    Sequence(Box<Type>),
    /// A grouping key together with the sequence of its elements
    Grouping(Box<Type>, Box<Type>),
    /// A query source yielding the element type
    Query(Box<Type>),
    /// A query source with an established ordering
    OrderedQuery(Box<Type>),
    /// A quoted function literal: parameter types and return type
    Function(Vec<Type>, Box<Type>),
}

// ── Constructors ─────────────────────────────────────────────────────────────

impl Type {
    /// Wrap a value type as nullable. Types that already accept null are
    /// returned unchanged.
    pub fn nullable(inner: Type) -> Type {
        if inner.is_value_type() {
            Type::Nullable(Box::new(inner))
        } else {
            inner
        }
    }

    pub fn list(element: Type) -> Type {
        Type::List(Box::new(element))
    }

    pub fn sequence(element: Type) -> Type {
        Type::Sequence(Box::new(element))
    }

    pub fn grouping(key: Type, element: Type) -> Type {
        Type::Grouping(Box::new(key), Box::new(element))
    }

    pub fn query(element: Type) -> Type {
        Type::Query(Box::new(element))
    }

    pub fn ordered_query(element: Type) -> Type {
        Type::OrderedQuery(Box::new(element))
    }

    pub fn function(params: Vec<Type>, ret: Type) -> Type {
        Type::Function(params, Box::new(ret))
    }

    pub fn record(record: Arc<RecordType>) -> Type {
        Type::Record(record)
    }
}

// ── Classification ───────────────────────────────────────────────────────────

impl Type {
    /// Non-nullable value types
    #[inline]
    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            Type::Bool | Type::Int | Type::Long | Type::Float | Type::DateTime
        )
    }

    #[inline]
    pub fn is_nullable_value(&self) -> bool {
        matches!(self, Type::Nullable(_))
    }

    /// Whether `null` is a legal value of this type
    #[inline]
    pub fn accepts_null(&self) -> bool {
        !self.is_value_type()
    }

    #[inline]
    fn is_reference_type(&self) -> bool {
        !self.is_value_type() && !self.is_nullable_value()
    }

    /// Strip one level of nullability.
    #[inline]
    pub fn underlying(&self) -> &Type {
        match self {
            Type::Nullable(inner) => inner,
            other => other,
        }
    }

    #[inline]
    pub fn is_numeric(&self) -> bool {
        self.numeric_rank().is_some()
    }

    fn numeric_rank(&self) -> Option<u8> {
        match self.underlying() {
            Type::Int => Some(1),
            Type::Long => Some(2),
            Type::Float => Some(3),
            _ => None,
        }
    }

    /// Whether this type is a sequence of some kind.
    pub fn is_enumerable(&self) -> bool {
        self.element_type().is_some()
    }

    /// Element type of a sequence-like type.
    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::List(t)
            | Type::Sequence(t)
            | Type::Query(t)
            | Type::OrderedQuery(t)
            | Type::Grouping(_, t) => Some(t),
            _ => None,
        }
    }
}

// ── Assignability ────────────────────────────────────────────────────────────

impl Type {
    /// Whether a value of this type may be used where `target` is expected.
    ///
    /// Function types are invariant: a literal declared to return `List<T>`
    /// is not assignable to a parameter expecting a literal that returns
    /// `Sequence<T>`.
    pub fn is_assignable_to(&self, target: &Type) -> bool {
        if self == target {
            return true;
        }
        match (self, target) {
            (_, Type::Object) => true,
            (Type::Null, t) => t.accepts_null(),
            (source, Type::Nullable(inner)) => source == inner.as_ref(),
            (
                Type::List(a) | Type::Sequence(a) | Type::Query(a) | Type::OrderedQuery(a),
                Type::Sequence(b),
            ) => a.is_covariant_to(b),
            (Type::Grouping(_, a), Type::Sequence(b)) => a.is_covariant_to(b),
            (Type::OrderedQuery(a), Type::Query(b)) => a.is_covariant_to(b),
            _ => false,
        }
    }

    fn is_covariant_to(&self, other: &Type) -> bool {
        self == other || (self.is_reference_type() && self.is_assignable_to(other))
    }

    /// Result type of an arithmetic operation between two numeric types,
    /// widening to the larger operand and lifting to nullable if either side
    /// is nullable.
    pub fn promote(lhs: &Type, rhs: &Type) -> Option<Type> {
        let (l, r) = (lhs.numeric_rank()?, rhs.numeric_rank()?);
        let base = if l >= r {
            lhs.underlying().clone()
        } else {
            rhs.underlying().clone()
        };
        if lhs.is_nullable_value() || rhs.is_nullable_value() {
            Some(Type::nullable(base))
        } else {
            Some(base)
        }
    }

    /// Common type of two branches (ternary, coalesce, equality operands).
    pub fn unify(lhs: &Type, rhs: &Type) -> Option<Type> {
        if lhs == rhs {
            return Some(lhs.clone());
        }
        if let Some(promoted) = Type::promote(lhs, rhs) {
            return Some(promoted);
        }
        match (lhs, rhs) {
            (Type::Null, other) | (other, Type::Null) => Some(Type::nullable(other.clone())),
            _ if lhs.is_assignable_to(rhs) => Some(rhs.clone()),
            _ if rhs.is_assignable_to(lhs) => Some(lhs.clone()),
            _ => None,
        }
    }

    /// `default(T)`: zero for numbers, `false`, the epoch for dates and null
    /// for everything that accepts null.
    pub fn default_value(&self) -> Value {
        match self {
            Type::Bool => Value::Bool(false),
            Type::Int => Value::Int(0),
            Type::Long => Value::Long(0),
            Type::Float => Value::Float(0.0),
            Type::DateTime => Value::DateTime(Default::default()),
            _ => Value::Null,
        }
    }
}

// ── Display ──────────────────────────────────────────────────────────────────

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Object => write!(f, "object"),
            Type::Null => write!(f, "null"),
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Long => write!(f, "long"),
            Type::Float => write!(f, "double"),
            Type::String => write!(f, "string"),
            Type::DateTime => write!(f, "DateTime"),
            Type::Nullable(inner) => write!(f, "{}?", inner),
            Type::Record(record) => match record.name() {
                Some(name) => write!(f, "{}", name),
                None => {
                    write!(f, "{{ ")?;
                    for (i, field) in record.fields().iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}: {}", field.name, field.ty)?;
                    }
                    write!(f, " }}")
                }
            },
            Type::List(t) => write!(f, "List<{}>", t),
            Type::Sequence(t) => write!(f, "Sequence<{}>", t),
            Type::Grouping(k, e) => write!(f, "Grouping<{}, {}>", k, e),
            Type::Query(t) => write!(f, "Query<{}>", t),
            Type::OrderedQuery(t) => write!(f, "OrderedQuery<{}>", t),
            Type::Function(params, ret) => {
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

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn line_type() -> Arc<RecordType> {
        RecordType::named(
            "OrderLine",
            [("Id", Type::Int), ("Count", Type::nullable(Type::Int))],
        )
    }

    #[test]
    fn test_collections_assign_to_sequence() {
        let line = Type::record(line_type());
        assert!(Type::list(line.clone()).is_assignable_to(&Type::sequence(line.clone())));
        assert!(Type::query(line.clone()).is_assignable_to(&Type::sequence(line.clone())));
        assert!(Type::ordered_query(line.clone()).is_assignable_to(&Type::query(line.clone())));
        assert!(!Type::query(line.clone()).is_assignable_to(&Type::ordered_query(line.clone())));
        assert!(Type::grouping(Type::Int, line.clone()).is_assignable_to(&Type::sequence(line)));
    }

    #[test]
    fn test_function_types_are_invariant() {
        let list_fn = Type::function(vec![Type::Int], Type::list(Type::Int));
        let seq_fn = Type::function(vec![Type::Int], Type::sequence(Type::Int));
        assert!(!list_fn.is_assignable_to(&seq_fn));
        assert!(seq_fn.is_assignable_to(&seq_fn.clone()));
        assert!(list_fn.is_assignable_to(&Type::Object));
    }

    #[test]
    fn test_value_sequences_are_not_covariant() {
        assert!(!Type::list(Type::Int).is_assignable_to(&Type::sequence(Type::Object)));
        assert!(Type::list(Type::String).is_assignable_to(&Type::sequence(Type::Object)));
    }

    #[test]
    fn test_nullable_lifting() {
        assert!(Type::Int.is_assignable_to(&Type::nullable(Type::Int)));
        assert!(Type::Null.is_assignable_to(&Type::nullable(Type::Int)));
        assert!(!Type::Null.is_assignable_to(&Type::Int));
        assert_eq!(Type::nullable(Type::String), Type::String);
    }

    #[test]
    fn test_promote() {
        assert_eq!(Type::promote(&Type::Int, &Type::Float), Some(Type::Float));
        assert_eq!(Type::promote(&Type::Long, &Type::Int), Some(Type::Long));
        assert_eq!(
            Type::promote(&Type::nullable(Type::Int), &Type::Int),
            Some(Type::nullable(Type::Int))
        );
        assert_eq!(Type::promote(&Type::String, &Type::Int), None);
    }

    #[test]
    fn test_unify() {
        assert_eq!(
            Type::unify(&Type::Null, &Type::Int),
            Some(Type::nullable(Type::Int))
        );
        assert_eq!(Type::unify(&Type::String, &Type::Null), Some(Type::String));
        assert_eq!(Type::unify(&Type::String, &Type::Bool), None);
    }

    #[test]
    fn test_field_lookup() {
        let line = line_type();
        assert_eq!(line.field("Count", false).map(|(i, _)| i), Some(1));
        assert!(line.field("count", false).is_none());
        assert_eq!(line.field("count", true).map(|(i, _)| i), Some(1));
    }

    #[test]
    fn test_display() {
        assert_eq!(Type::nullable(Type::Float).to_string(), "double?");
        assert_eq!(
            Type::grouping(Type::Int, Type::record(line_type())).to_string(),
            "Grouping<int, OrderLine>"
        );
        assert_eq!(
            Type::function(vec![Type::Int, Type::Int], Type::Bool).to_string(),
            "Fn(int, int) -> bool"
        );
    }

    #[test]
    fn test_default_values() {
        assert_eq!(Type::Int.default_value(), Value::Int(0));
        assert_eq!(Type::nullable(Type::Int).default_value(), Value::Null);
        assert_eq!(Type::String.default_value(), Value::Null);
    }
}
