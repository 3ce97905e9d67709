// Expression evaluator
//
// Interprets the typed expression tree produced by the compiler. The binder
// has already inserted every numeric conversion, so arithmetic only ever
// sees operands of the same width.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{Datelike, Timelike};
use thiserror::Error;

use crate::ast::{BinaryOp, UnaryOp};
use crate::expr::{DatePart, Expr, Lambda, SequenceMethod, StringMethod};
use crate::functions::{aggregate, element, set, FunctionError};
use crate::types::Type;
use crate::value::{Record, Value};

/// Evaluator errors
#[derive(Error, Debug)]
pub enum EvaluatorError {
    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Attempted to divide by zero")]
    DivideByZero,

    #[error("Nullable object must have a value")]
    NullValue,

    #[error("Null reference: cannot read {0} of null")]
    NullReference(String),

    #[error("Evaluation error: {0}")]
    EvaluationError(String),

    #[error(transparent)]
    Function(#[from] FunctionError),
}

/// Interpreter state: the parameter frame shared by a lambda and the
/// literals nested inside it.
#[derive(Debug, Default)]
pub struct Evaluator {
    frame: Vec<Value>,
}

impl Evaluator {
    pub fn new() -> Self {
        Evaluator { frame: Vec::new() }
    }

    /// Call a lambda with the given arguments.
    pub fn invoke(&mut self, lambda: &Lambda, args: &[Value]) -> Result<Value, EvaluatorError> {
        if args.len() != lambda.params().len() {
            return Err(EvaluatorError::EvaluationError(format!(
                "lambda expects {} arguments, got {}",
                lambda.params().len(),
                args.len()
            )));
        }
        self.frame.truncate(lambda.base());
        self.frame.extend_from_slice(args);
        self.evaluate(lambda.body())
    }

    /// Call a predicate lambda; null counts as false.
    pub fn test(&mut self, lambda: &Lambda, item: &Value) -> Result<bool, EvaluatorError> {
        match self.invoke(lambda, std::slice::from_ref(item))? {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(EvaluatorError::TypeError(format!(
                "predicate produced {} instead of a boolean",
                other
            ))),
        }
    }

    /// Evaluate a typed expression against the current frame.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, EvaluatorError> {
        match expr {
            Expr::Constant { value, .. } => Ok(value.clone()),
            Expr::Parameter { slot, .. } => self.frame.get(*slot).cloned().ok_or_else(|| {
                EvaluatorError::EvaluationError(format!("parameter slot {} is unbound", slot))
            }),
            Expr::Field {
                target,
                index,
                name,
                ..
            } => match self.evaluate(target)? {
                Value::Record(record) => record.get_index(*index).cloned().ok_or_else(|| {
                    EvaluatorError::TypeError(format!("record has no field {}", name))
                }),
                Value::Null => Err(EvaluatorError::NullReference(name.clone())),
                other => Err(EvaluatorError::TypeError(format!(
                    "cannot read field {} of {}",
                    name, other
                ))),
            },
            Expr::GroupKey { target, .. } => match self.evaluate(target)? {
                Value::Grouping(g) => Ok(g.key().clone()),
                Value::Null => Err(EvaluatorError::NullReference("Key".to_string())),
                other => Err(EvaluatorError::TypeError(format!("{} is not a grouping", other))),
            },
            Expr::Convert { operand, ty } => {
                let value = self.evaluate(operand)?;
                Ok(convert(value, ty))
            }
            Expr::Unwrap { operand, .. } => match self.evaluate(operand)? {
                Value::Null => Err(EvaluatorError::NullValue),
                value => Ok(value),
            },
            Expr::Unary { op, operand, .. } => {
                let value = self.evaluate(operand)?;
                unary(*op, value)
            }
            Expr::Binary { op, lhs, rhs, .. } => self.binary(*op, lhs, rhs),
            Expr::Conditional {
                test,
                if_true,
                if_false,
                ..
            } => match self.evaluate(test)? {
                Value::Bool(true) => self.evaluate(if_true),
                _ => self.evaluate(if_false),
            },
            Expr::New {
                record, members, ..
            } => {
                let values = members
                    .iter()
                    .map(|m| self.evaluate(m))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Record(Arc::new(Record::from_parts(
                    record.clone(),
                    values,
                ))))
            }
            Expr::Sequence {
                method,
                source,
                lambda,
                argument,
                ty,
            } => {
                let element_type = source.ty().element_type().cloned().unwrap_or(Type::Object);
                let items = match self.evaluate(source)? {
                    Value::Null => return Err(EvaluatorError::NullReference(method.name().to_string())),
                    value => value
                        .as_slice()
                        .map(<[Value]>::to_vec)
                        .ok_or_else(|| EvaluatorError::TypeError(format!("{} is not a sequence", value)))?,
                };
                let argument = match argument {
                    Some(arg) => Some(self.evaluate(arg)?),
                    None => None,
                };
                self.sequence_method(*method, items, lambda.as_deref(), argument, &element_type, ty)
            }
            Expr::Text {
                method,
                target,
                args,
                ..
            } => {
                let target = match self.evaluate(target)? {
                    Value::String(s) => s,
                    Value::Null => return Err(EvaluatorError::NullReference(method.name().to_string())),
                    other => return Err(EvaluatorError::TypeError(format!("{} is not a string", other))),
                };
                let args = args
                    .iter()
                    .map(|a| self.evaluate(a))
                    .collect::<Result<Vec<_>, _>>()?;
                string_method(*method, &target, &args)
            }
            Expr::DatePart { part, target, .. } => match self.evaluate(target)? {
                Value::DateTime(dt) => Ok(Value::Int(match part {
                    DatePart::Year => dt.year(),
                    DatePart::Month => dt.month() as i32,
                    DatePart::Day => dt.day() as i32,
                    DatePart::Hour => dt.hour() as i32,
                    DatePart::Minute => dt.minute() as i32,
                    DatePart::Second => dt.second() as i32,
                })),
                Value::Null => Err(EvaluatorError::NullReference(format!("{:?}", part))),
                other => Err(EvaluatorError::TypeError(format!("{} is not a date", other))),
            },
        }
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value, EvaluatorError> {
        // Short-circuit operators
        match op {
            BinaryOp::And => {
                return match self.evaluate(lhs)? {
                    Value::Bool(false) => Ok(Value::Bool(false)),
                    _ => Ok(Value::Bool(matches!(self.evaluate(rhs)?, Value::Bool(true)))),
                }
            }
            BinaryOp::Or => {
                return match self.evaluate(lhs)? {
                    Value::Bool(true) => Ok(Value::Bool(true)),
                    _ => Ok(Value::Bool(matches!(self.evaluate(rhs)?, Value::Bool(true)))),
                }
            }
            BinaryOp::Coalesce => {
                return match self.evaluate(lhs)? {
                    Value::Null => self.evaluate(rhs),
                    value => Ok(value),
                }
            }
            _ => {}
        }

        let left = self.evaluate(lhs)?;
        let right = self.evaluate(rhs)?;

        match op {
            BinaryOp::Add
            | BinaryOp::Subtract
            | BinaryOp::Multiply
            | BinaryOp::Divide
            | BinaryOp::Modulo => arithmetic(op, &left, &right),
            BinaryOp::Concatenate => Ok(Value::from(format!(
                "{}{}",
                display_or_empty(&left),
                display_or_empty(&right)
            ))),
            BinaryOp::Equal => Ok(Value::Bool(values_equal(&left, &right))),
            BinaryOp::NotEqual => Ok(Value::Bool(!values_equal(&left, &right))),
            BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual => {
                if left.is_null() || right.is_null() {
                    return Ok(Value::Bool(false));
                }
                let ord = left.compare(&right);
                Ok(Value::Bool(match op {
                    BinaryOp::LessThan => ord == Ordering::Less,
                    BinaryOp::LessThanOrEqual => ord != Ordering::Greater,
                    BinaryOp::GreaterThan => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                }))
            }
            BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce => Err(EvaluatorError::EvaluationError(
                format!("{} must short-circuit", op.symbol()),
            )),
        }
    }

    fn sequence_method(
        &mut self,
        method: SequenceMethod,
        items: Vec<Value>,
        lambda: Option<&Lambda>,
        argument: Option<Value>,
        element_type: &Type,
        result_type: &Type,
    ) -> Result<Value, EvaluatorError> {
        // Predicate-taking methods narrow the input first
        let narrowed = match (method, lambda) {
            (
                SequenceMethod::Count
                | SequenceMethod::LongCount
                | SequenceMethod::Any
                | SequenceMethod::First
                | SequenceMethod::FirstOrDefault
                | SequenceMethod::Last
                | SequenceMethod::LastOrDefault
                | SequenceMethod::Where,
                Some(predicate),
            ) => self.filter(&items, predicate)?,
            _ => items,
        };

        // Selector-taking methods project next
        let projected = match (method, lambda) {
            (
                SequenceMethod::Sum
                | SequenceMethod::Average
                | SequenceMethod::Min
                | SequenceMethod::Max
                | SequenceMethod::Select,
                Some(selector),
            ) => narrowed
                .iter()
                .map(|item| self.invoke(selector, std::slice::from_ref(item)))
                .collect::<Result<Vec<_>, _>>()?,
            _ => narrowed,
        };

        Ok(match method {
            SequenceMethod::Count => Value::Int(count_as_i32(projected.len())?),
            SequenceMethod::LongCount => Value::Long(projected.len() as i64),
            SequenceMethod::Any => Value::Bool(!projected.is_empty()),
            SequenceMethod::All => {
                let predicate = lambda.ok_or_else(|| missing_lambda(method))?;
                let mut all = true;
                for item in &projected {
                    if !self.test(predicate, item)? {
                        all = false;
                        break;
                    }
                }
                Value::Bool(all)
            }
            SequenceMethod::Sum => aggregate::sum(&projected, result_type)?,
            SequenceMethod::Average => aggregate::average(&projected, result_type)?,
            SequenceMethod::Min => aggregate::min(&projected, result_type)?,
            SequenceMethod::Max => aggregate::max(&projected, result_type)?,
            SequenceMethod::First => element::first(&projected)?,
            SequenceMethod::FirstOrDefault => element::first_or_default(&projected, element_type),
            SequenceMethod::Last => element::last(&projected)?,
            SequenceMethod::LastOrDefault => element::last_or_default(&projected, element_type),
            SequenceMethod::Where | SequenceMethod::Select | SequenceMethod::ToList => {
                Value::sequence(projected)
            }
            SequenceMethod::Distinct => Value::sequence(set::distinct(&projected)),
            SequenceMethod::Contains => {
                let item = argument.unwrap_or(Value::Null);
                Value::Bool(projected.iter().any(|v| values_equal(v, &item)))
            }
        })
    }

    fn filter(&mut self, items: &[Value], predicate: &Lambda) -> Result<Vec<Value>, EvaluatorError> {
        let mut kept = Vec::new();
        for item in items {
            if self.test(predicate, item)? {
                kept.push(item.clone());
            }
        }
        Ok(kept)
    }
}

fn missing_lambda(method: SequenceMethod) -> EvaluatorError {
    EvaluatorError::EvaluationError(format!("{} requires a function argument", method.name()))
}

pub(crate) fn count_as_i32(n: usize) -> Result<i32, FunctionError> {
    i32::try_from(n).map_err(|_| FunctionError::Overflow)
}

/// Convert a value to the given (numeric or nullable) type. Null passes
/// through; non-numeric targets are identity conversions.
fn convert(value: Value, ty: &Type) -> Value {
    match (ty.underlying(), &value) {
        (_, Value::Null) => value,
        (Type::Float, v) if v.is_numeric() => Value::Float(v.as_f64().unwrap_or(f64::NAN)),
        (Type::Long, Value::Int(n)) => Value::Long(i64::from(*n)),
        _ => value,
    }
}

fn unary(op: UnaryOp, value: Value) -> Result<Value, EvaluatorError> {
    match (op, value) {
        (_, Value::Null) => Ok(Value::Null),
        (UnaryOp::Negate, Value::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
        (UnaryOp::Negate, Value::Long(n)) => Ok(Value::Long(n.wrapping_neg())),
        (UnaryOp::Negate, Value::Float(n)) => Ok(Value::Float(-n)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (op, other) => Err(EvaluatorError::TypeError(format!(
            "cannot apply {:?} to {}",
            op, other
        ))),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvaluatorError> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::String(a), Value::String(b)) if op == BinaryOp::Add => {
            Ok(Value::from(format!("{}{}", a, b)))
        }
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            Ok(Value::Int(match op {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Subtract => a.wrapping_sub(b),
                BinaryOp::Multiply => a.wrapping_mul(b),
                BinaryOp::Divide if b == 0 => return Err(EvaluatorError::DivideByZero),
                BinaryOp::Divide => a.wrapping_div(b),
                BinaryOp::Modulo if b == 0 => return Err(EvaluatorError::DivideByZero),
                _ => a.wrapping_rem(b),
            }))
        }
        (Value::Int(_) | Value::Long(_), Value::Int(_) | Value::Long(_)) => {
            let (a, b) = match (left.as_i64(), right.as_i64()) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(EvaluatorError::TypeError("expected integers".to_string())),
            };
            Ok(Value::Long(match op {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Subtract => a.wrapping_sub(b),
                BinaryOp::Multiply => a.wrapping_mul(b),
                BinaryOp::Divide if b == 0 => return Err(EvaluatorError::DivideByZero),
                BinaryOp::Divide => a.wrapping_div(b),
                BinaryOp::Modulo if b == 0 => return Err(EvaluatorError::DivideByZero),
                _ => a.wrapping_rem(b),
            }))
        }
        (a, b) if a.is_numeric() && b.is_numeric() => {
            let (a, b) = match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(EvaluatorError::TypeError("expected numbers".to_string())),
            };
            Ok(Value::Float(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Subtract => a - b,
                BinaryOp::Multiply => a * b,
                BinaryOp::Divide => a / b,
                _ => a % b,
            }))
        }
        (a, b) => Err(EvaluatorError::TypeError(format!(
            "cannot apply {} to {} and {}",
            op.symbol(),
            a,
            b
        ))),
    }
}

/// Equality as the expression language sees it: numbers compare by value
/// across widths, null equals only null.
pub(crate) fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (a, b) if a.is_numeric() && b.is_numeric() => a.compare(b) == Ordering::Equal,
        (a, b) => a == b,
    }
}

fn display_or_empty(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn string_argument<'a>(
    method: StringMethod,
    args: &'a [Value],
    index: usize,
) -> Result<&'a str, EvaluatorError> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s),
        Some(Value::Null) => Err(EvaluatorError::NullReference(format!(
            "argument of {}",
            method.name()
        ))),
        _ => Err(EvaluatorError::TypeError(format!(
            "{} expects a string argument",
            method.name()
        ))),
    }
}

fn string_method(method: StringMethod, target: &str, args: &[Value]) -> Result<Value, EvaluatorError> {
    Ok(match method {
        StringMethod::Length => Value::Int(count_as_i32(target.chars().count())?),
        StringMethod::ToUpper => Value::from(target.to_uppercase()),
        StringMethod::ToLower => Value::from(target.to_lowercase()),
        StringMethod::Trim => Value::from(target.trim()),
        StringMethod::StartsWith => Value::Bool(target.starts_with(string_argument(method, args, 0)?)),
        StringMethod::EndsWith => Value::Bool(target.ends_with(string_argument(method, args, 0)?)),
        StringMethod::Contains => Value::Bool(target.contains(string_argument(method, args, 0)?)),
    })
}
