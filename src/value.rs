// Value: Arc-wrapped runtime value type
// Records, sequences and groupings share their payload, so clones are O(1)
// and values can cross threads.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use thiserror::Error;

use crate::datetime::{self, DateTimeError};
use crate::types::{RecordType, Type};

/// Errors raised while building typed values
#[derive(Error, Debug)]
pub enum ValueError {
    #[error("Expected {expected}, found {found}")]
    Mismatch { expected: String, found: String },

    #[error("Record {record} has {expected} fields, got {actual} values")]
    Arity {
        record: String,
        expected: usize,
        actual: usize,
    },

    #[error("Values of type {0} cannot be read from JSON")]
    Unsupported(String),

    #[error(transparent)]
    DateTime(#[from] DateTimeError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A runtime value.
///
/// Integers keep their width (`Int` is 32-bit, `Long` is 64-bit) so that
/// generic instantiation sees the same types the binder inferred.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f64),
    String(Arc<str>),
    DateTime(DateTime<Utc>),
    Sequence(Arc<Vec<Value>>),
    Record(Arc<Record>),
    Grouping(Arc<Grouping>),
}

/// A record value: its type plus one value per field, in field order.
#[derive(Debug)]
pub struct Record {
    ty: Arc<RecordType>,
    values: Vec<Value>,
}

impl Record {
    pub fn new(ty: Arc<RecordType>, values: Vec<Value>) -> Result<Self, ValueError> {
        if ty.len() != values.len() {
            return Err(ValueError::Arity {
                record: Type::Record(ty.clone()).to_string(),
                expected: ty.len(),
                actual: values.len(),
            });
        }
        for (field, value) in ty.fields().iter().zip(values.iter()) {
            if !value.conforms_to(&field.ty) {
                return Err(ValueError::Mismatch {
                    expected: format!("{} for field {}", field.ty, field.name),
                    found: value.type_of().to_string(),
                });
            }
        }
        Ok(Record { ty, values })
    }

    /// Build a record whose values were produced by typed expressions and
    /// therefore need no checking.
    pub(crate) fn from_parts(ty: Arc<RecordType>, values: Vec<Value>) -> Self {
        Record { ty, values }
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.ty
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.ty
            .field(name, false)
            .and_then(|(index, _)| self.values.get(index))
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }
}

/// A grouping: the key and the elements that share it, in source order.
#[derive(Debug)]
pub struct Grouping {
    key: Value,
    elements: Vec<Value>,
}

impl Grouping {
    pub fn new(key: Value, elements: Vec<Value>) -> Self {
        Grouping { key, elements }
    }

    pub fn key(&self) -> &Value {
        &self.key
    }

    pub fn elements(&self) -> &[Value] {
        &self.elements
    }
}

// ── Type checks ──────────────────────────────────────────────────────────────

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Long(_) | Value::Float(_))
    }

    #[inline]
    pub fn is_sequence(&self) -> bool {
        matches!(self, Value::Sequence(_) | Value::Grouping(_))
    }

    /// Infer the run-time type of this value.
    ///
    /// Sequences report `List<T>` with `T` taken from the first non-null
    /// element (`object` when there is none).
    pub fn type_of(&self) -> Type {
        match self {
            Value::Null => Type::Null,
            Value::Bool(_) => Type::Bool,
            Value::Int(_) => Type::Int,
            Value::Long(_) => Type::Long,
            Value::Float(_) => Type::Float,
            Value::String(_) => Type::String,
            Value::DateTime(_) => Type::DateTime,
            Value::Record(r) => Type::Record(r.ty.clone()),
            Value::Sequence(items) => Type::list(element_type_of(items)),
            Value::Grouping(g) => Type::grouping(g.key.type_of(), element_type_of(&g.elements)),
        }
    }

    /// Whether this value is a legal inhabitant of `ty`.
    pub fn conforms_to(&self, ty: &Type) -> bool {
        match (self, ty) {
            (_, Type::Object) => true,
            (Value::Null, t) => t.accepts_null(),
            (v, Type::Nullable(inner)) => v.conforms_to(inner),
            (Value::Bool(_), Type::Bool)
            | (Value::Int(_), Type::Int)
            | (Value::Long(_), Type::Long)
            | (Value::Float(_), Type::Float)
            | (Value::String(_), Type::String)
            | (Value::DateTime(_), Type::DateTime) => true,
            (Value::Record(r), Type::Record(rt)) => Arc::ptr_eq(&r.ty, rt) || *r.ty == **rt,
            (Value::Sequence(items), Type::List(t) | Type::Sequence(t)) => {
                items.iter().all(|v| v.conforms_to(t))
            }
            (Value::Grouping(g), Type::Grouping(k, e)) => {
                g.key.conforms_to(k) && g.elements.iter().all(|v| v.conforms_to(e))
            }
            (Value::Grouping(g), Type::Sequence(e)) => g.elements.iter().all(|v| v.conforms_to(e)),
            _ => false,
        }
    }
}

fn element_type_of(items: &[Value]) -> Type {
    items
        .iter()
        .find(|v| !v.is_null())
        .map(Value::type_of)
        .unwrap_or(Type::Object)
}

// ── Extraction ───────────────────────────────────────────────────────────────

impl Value {
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Integer value of an `Int` or `Long`.
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(i64::from(*n)),
            Value::Long(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric value of any numeric variant.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(f64::from(*n)),
            Value::Long(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_datetime(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    #[inline]
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    #[inline]
    pub fn as_grouping(&self) -> Option<&Grouping> {
        match self {
            Value::Grouping(g) => Some(g),
            _ => None,
        }
    }

    /// Elements of a sequence or grouping.
    #[inline]
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            Value::Grouping(g) => Some(&g.elements),
            _ => None,
        }
    }

    /// Field of a record value by exact name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.as_record().and_then(|r| r.get(field))
    }
}

// ── Constructors ─────────────────────────────────────────────────────────────

impl Value {
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::String(s.into())
    }

    pub fn sequence(items: Vec<Value>) -> Self {
        Value::Sequence(Arc::new(items))
    }

    /// Build a record value, checking arity and field types.
    pub fn record(ty: &Arc<RecordType>, values: Vec<Value>) -> Result<Self, ValueError> {
        Ok(Value::Record(Arc::new(Record::new(ty.clone(), values)?)))
    }

    pub fn grouping(key: Value, elements: Vec<Value>) -> Self {
        Value::Grouping(Arc::new(Grouping::new(key, elements)))
    }
}

// ── From impls ───────────────────────────────────────────────────────────────

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(Arc::new(items))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

// ── Equality and hashing ─────────────────────────────────────────────────────

// Equality is total so values can key groupings and set operators: NaN equals
// NaN and the numeric variants never compare equal to each other.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Sequence(a), Value::Sequence(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => {
                Arc::ptr_eq(a, b) || (a.ty == b.ty && a.values == b.values)
            }
            (Value::Grouping(a), Value::Grouping(b)) => {
                Arc::ptr_eq(a, b) || (a.key == b.key && a.elements == b.elements)
            }
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Long(n) => n.hash(state),
            Value::Float(n) => {
                // +0.0 and -0.0 are equal and must hash alike
                let bits = if *n == 0.0 {
                    0u64
                } else if n.is_nan() {
                    f64::NAN.to_bits()
                } else {
                    n.to_bits()
                };
                bits.hash(state);
            }
            Value::String(s) => s.hash(state),
            Value::DateTime(dt) => dt.hash(state),
            Value::Sequence(items) => items.hash(state),
            Value::Record(r) => r.values.hash(state),
            Value::Grouping(g) => {
                g.key.hash(state);
                g.elements.hash(state);
            }
        }
    }
}

// ── Ordering ─────────────────────────────────────────────────────────────────

impl Value {
    /// Total order used by sorting and min/max.
    ///
    /// Null sorts first. Numbers compare by value across widths. Values of
    /// unrelated kinds fall back to a fixed kind order.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(_) | Value::Long(_), Value::Int(_) | Value::Long(_)) => {
                match (self.as_i64(), other.as_i64()) {
                    (Some(a), Some(b)) => a.cmp(&b),
                    _ => Ordering::Equal,
                }
            }
            (a, b) if a.is_numeric() && b.is_numeric() => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => Ordering::Equal,
            },
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Sequence(a), Value::Sequence(b)) => compare_slices(a, b),
            (Value::Record(a), Value::Record(b)) => compare_slices(&a.values, &b.values),
            (Value::Grouping(a), Value::Grouping(b)) => a
                .key
                .compare(&b.key)
                .then_with(|| compare_slices(&a.elements, &b.elements)),
            (a, b) => a.kind_rank().cmp(&b.kind_rank()),
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Long(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::DateTime(_) => 4,
            Value::Record(_) => 5,
            Value::Sequence(_) => 6,
            Value::Grouping(_) => 7,
        }
    }
}

fn compare_slices(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.compare(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

// ── Display ──────────────────────────────────────────────────────────────────

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Long(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::DateTime(dt) => write!(f, "{}", datetime::format_iso8601(dt)),
            Value::Sequence(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Record(r) => {
                write!(f, "{{ ")?;
                for (i, (field, v)) in r.ty.fields().iter().zip(r.values.iter()).enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", field.name, v)?;
                }
                write!(f, " }}")
            }
            Value::Grouping(g) => {
                write!(f, "{} => [", g.key)?;
                for (i, v) in g.elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

// ── Serialization ────────────────────────────────────────────────────────────

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i32(*n),
            Value::Long(n) => serializer.serialize_i64(*n),
            Value::Float(n) => {
                if n.is_finite() {
                    serializer.serialize_f64(*n)
                } else {
                    serializer.serialize_none()
                }
            }
            Value::String(s) => serializer.serialize_str(s),
            Value::DateTime(dt) => serializer.serialize_str(&datetime::format_iso8601(dt)),
            Value::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for v in items.iter() {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            Value::Record(r) => {
                let mut m = serializer.serialize_map(Some(r.values.len()))?;
                for (field, v) in r.ty.fields().iter().zip(r.values.iter()) {
                    m.serialize_entry(&field.name, v)?;
                }
                m.end()
            }
            Value::Grouping(g) => {
                let mut m = serializer.serialize_map(Some(2))?;
                m.serialize_entry("key", &g.key)?;
                m.serialize_entry("elements", &g.elements)?;
                m.end()
            }
        }
    }
}

// ── JSON input ───────────────────────────────────────────────────────────────

impl Value {
    /// Serialize to a JSON string.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a JSON string as a value of the given type.
    pub fn from_json_str(s: &str, ty: &Type) -> Result<Value, ValueError> {
        let json: serde_json::Value = serde_json::from_str(s)?;
        Value::from_json(&json, ty)
    }

    /// Convert JSON into a value of the given type.
    ///
    /// Record fields missing from a JSON object are read as null. Dates are
    /// ISO 8601 strings. Under `object` the shape is inferred: integers
    /// become `Int` when they fit and `Long` otherwise, objects become
    /// anonymous records.
    pub fn from_json(json: &serde_json::Value, ty: &Type) -> Result<Value, ValueError> {
        use serde_json::Value as Json;

        let mismatch = || ValueError::Mismatch {
            expected: ty.to_string(),
            found: json.to_string(),
        };

        match (json, ty) {
            (Json::Null, t) if t.accepts_null() => Ok(Value::Null),
            (Json::Null, _) => Err(mismatch()),
            (_, Type::Nullable(inner)) => Value::from_json(json, inner),
            (_, Type::Object) => Ok(Value::from_untyped_json(json)),
            (Json::Bool(b), Type::Bool) => Ok(Value::Bool(*b)),
            (Json::Number(n), Type::Int) => n
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .map(Value::Int)
                .ok_or_else(mismatch),
            (Json::Number(n), Type::Long) => n.as_i64().map(Value::Long).ok_or_else(mismatch),
            (Json::Number(n), Type::Float) => n.as_f64().map(Value::Float).ok_or_else(mismatch),
            (Json::String(s), Type::String) => Ok(Value::from(s.as_str())),
            (Json::String(s), Type::DateTime) => Ok(Value::DateTime(datetime::parse_iso8601(s)?)),
            (Json::Array(items), Type::List(t) | Type::Sequence(t)) => items
                .iter()
                .map(|item| Value::from_json(item, t))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::sequence),
            (Json::Object(map), Type::Record(record)) => {
                let values = record
                    .fields()
                    .iter()
                    .map(|field| {
                        Value::from_json(map.get(&field.name).unwrap_or(&Json::Null), &field.ty)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Record(Arc::new(Record::from_parts(
                    record.clone(),
                    values,
                ))))
            }
            (_, Type::Grouping(..) | Type::Query(_) | Type::OrderedQuery(_) | Type::Function(..)) => {
                Err(ValueError::Unsupported(ty.to_string()))
            }
            _ => Err(mismatch()),
        }
    }

    fn from_untyped_json(json: &serde_json::Value) -> Value {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => i32::try_from(i).map_or(Value::Long(i), Value::Int),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::from(s.as_str()),
            Json::Array(items) => Value::sequence(items.iter().map(Value::from_untyped_json).collect()),
            Json::Object(map) => {
                let values: Vec<Value> = map.values().map(Value::from_untyped_json).collect();
                let record = RecordType::anonymous(
                    map.keys()
                        .zip(values.iter())
                        .map(|(k, v)| (k.clone(), Type::nullable(v.type_of()))),
                );
                Value::Record(Arc::new(Record::from_parts(record, values)))
            }
        }
    }
}

// ── value! macro ─────────────────────────────────────────────────────────────

/// Build a `Value` from a literal, similar to `serde_json::json!`.
///
///   value!(null)       → Value::Null
///   value!([1, 2, 3])  → Value::Sequence of Int
///   value!(expr)       → Value::from(expr)
#[macro_export]
macro_rules! value {
    (null) => {
        $crate::value::Value::Null
    };

    ([ $($elem:tt),* $(,)? ]) => {
        $crate::value::Value::Sequence(std::sync::Arc::new(vec![ $( $crate::value!($elem) ),* ]))
    };

    ($other:expr) => {
        $crate::value::Value::from($other)
    };
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn line_type() -> Arc<RecordType> {
        RecordType::named(
            "OrderLine",
            [
                ("Id", Type::Int),
                ("OrderId", Type::Int),
                ("UnitPrice", Type::nullable(Type::Float)),
            ],
        )
    }

    #[test]
    fn test_clone_is_cheap() {
        let seq = Value::sequence(vec![Value::Int(1), Value::Int(2)]);
        let seq2 = seq.clone();
        if let (Value::Sequence(a), Value::Sequence(b)) = (&seq, &seq2) {
            assert!(Arc::ptr_eq(a, b));
        } else {
            panic!("expected sequences");
        }
    }

    #[test]
    fn test_record_checks_arity_and_types() {
        let ty = line_type();
        assert!(Value::record(&ty, vec![Value::Int(1), Value::Int(2), Value::Null]).is_ok());
        assert!(matches!(
            Value::record(&ty, vec![Value::Int(1)]),
            Err(ValueError::Arity { expected: 3, actual: 1, .. })
        ));
        assert!(matches!(
            Value::record(&ty, vec![Value::Int(1), Value::string("x"), Value::Null]),
            Err(ValueError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_type_of_and_conformance() {
        assert_eq!(Value::Int(1).type_of(), Type::Int);
        assert_eq!(value!([1, 2]).type_of(), Type::list(Type::Int));
        assert!(Value::Null.conforms_to(&Type::nullable(Type::Int)));
        assert!(!Value::Null.conforms_to(&Type::Int));
        assert!(value!([1, 2]).conforms_to(&Type::sequence(Type::Int)));
        assert!(!value!([1, "a"]).conforms_to(&Type::sequence(Type::Int)));
    }

    #[test]
    fn test_equality_is_total() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_eq!(Value::Float(0.0), Value::Float(-0.0));
        assert_ne!(Value::Int(1), Value::Long(1));

        let mut set = HashSet::new();
        set.insert(Value::Float(0.0));
        assert!(set.contains(&Value::Float(-0.0)));
    }

    #[test]
    fn test_compare() {
        assert_eq!(Value::Null.compare(&Value::Int(0)), Ordering::Less);
        assert_eq!(Value::Int(2).compare(&Value::Long(2)), Ordering::Equal);
        assert_eq!(Value::Int(2).compare(&Value::Float(2.5)), Ordering::Less);
        assert_eq!(
            Value::string("b").compare(&Value::string("a")),
            Ordering::Greater
        );
    }

    #[test]
    fn test_from_json_typed() {
        let ty = Type::record(line_type());
        let v = Value::from_json(
            &serde_json::json!({"Id": 1, "OrderId": 7, "UnitPrice": null}),
            &ty,
        )
        .unwrap();
        assert_eq!(v.get("OrderId"), Some(&Value::Int(7)));
        assert_eq!(v.get("UnitPrice"), Some(&Value::Null));

        let missing_id = Value::from_json(&serde_json::json!({"OrderId": 7}), &ty);
        assert!(matches!(missing_id, Err(ValueError::Mismatch { .. })));
    }

    #[test]
    fn test_from_json_dates() {
        let v = Value::from_json(&serde_json::json!("2024-03-01T10:00:00Z"), &Type::DateTime)
            .unwrap();
        assert!(v.as_datetime().is_some());
    }

    #[test]
    fn test_serialize_record() {
        let ty = line_type();
        let v = Value::record(&ty, vec![Value::Int(1), Value::Int(2), Value::Float(2.5)]).unwrap();
        assert_eq!(
            v.to_json_string().unwrap(),
            r#"{"Id":1,"OrderId":2,"UnitPrice":2.5}"#
        );
    }

    #[test]
    fn test_display() {
        let ty = RecordType::anonymous([("OrderId", Type::Int), ("No", Type::String)]);
        let v = Value::record(&ty, vec![Value::Int(5), Value::string("A5")]).unwrap();
        assert_eq!(v.to_string(), "{ OrderId = 5, No = A5 }");
        assert_eq!(value!([1, null]).to_string(), "[1, null]");
    }
}
