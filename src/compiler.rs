//! Expression compiler: binds parsed expression text against parameter types.
//!
//! Resolution order for a bare identifier is: lambda parameter, member of
//! the implicit parameter, variable. Positional placeholders (`@0`) only
//! ever read the positional values and `@name` only ever reads variables.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::ast::{AstNode, BinaryOp, MemberInit, UnaryOp};
use crate::bindings::{Bindings, Settings};
use crate::expr::{DatePart, Expr, Lambda, Parameter, SequenceMethod, StringMethod};
use crate::parser::{self, ParserError};
use crate::types::{RecordType, Type};
use crate::value::Value;

/// Compilation errors
#[derive(Error, Debug)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParserError),

    #[error("No property or field '{name}' exists in {scope}")]
    UnresolvedMember { name: String, scope: String },

    #[error("No applicable method '{name}' exists in type '{ty}'")]
    UnknownMethod { name: String, ty: String },

    #[error("Method '{name}' does not take {actual} arguments")]
    ArgumentCount { name: String, actual: usize },

    #[error("Operator '{op}' incompatible with operand types '{lhs}' and '{rhs}'")]
    IncompatibleOperands {
        op: &'static str,
        lhs: String,
        rhs: String,
    },

    #[error("Operator '{op}' incompatible with operand type '{operand}'")]
    IncompatibleOperand { op: &'static str, operand: String },

    #[error("Expression of type '{expected}' expected, found '{found}'")]
    TypeMismatch { expected: String, found: String },

    #[error("Lambda declares {actual} parameters where {expected} are expected")]
    ParameterCount { expected: usize, actual: usize },

    #[error("A bare expression takes exactly one parameter, {0} expected")]
    ImplicitParameter(usize),

    #[error("No value supplied for positional placeholder @{0}")]
    MissingPositional(usize),

    #[error("Unknown variable '@{0}'")]
    UnknownVariable(String),

    #[error("Duplicate member '{0}' in new")]
    DuplicateMember(String),

    #[error("Member {0} of new needs a name")]
    UnnamedMember(usize),

    #[error("A function literal is only allowed as a method argument")]
    UnexpectedLambda,
}

/// Compile expression text into a typed lambda over `parameter_types`.
///
/// Text is either an explicit lambda (`o => o.Id`, `(a, b) => a + b`) whose
/// parameter count must match, or a bare body over a single implicit
/// parameter whose members are in scope (`Id == 5`).
#[instrument(name = "compile_lambda", level = "trace", skip_all, fields(expression = text))]
pub fn compile_lambda(
    text: &str,
    parameter_types: &[Type],
    bindings: &Bindings,
) -> Result<Lambda, CompileError> {
    let ast = parser::parse(text)?;
    let lambda = Compiler::new(bindings).bind_lambda(&ast, parameter_types)?;
    debug!(expression = text, return_type = %lambda.return_type(), "compiled lambda");
    Ok(lambda)
}

struct Scoped {
    name: String,
    ty: Type,
}

/// Binder state for one top-level expression
pub struct Compiler<'a> {
    bindings: &'a Bindings,
    settings: Settings,
    scope: Vec<Scoped>,
    implicit: Option<usize>,
}

impl<'a> Compiler<'a> {
    pub fn new(bindings: &'a Bindings) -> Self {
        Compiler {
            bindings,
            settings: bindings.settings().cloned().unwrap_or_default(),
            scope: Vec::new(),
            implicit: None,
        }
    }

    /// Bind a function literal (explicit or bare) over the given parameter
    /// types. Nested literals see the enclosing parameters.
    pub fn bind_lambda(&mut self, ast: &AstNode, types: &[Type]) -> Result<Lambda, CompileError> {
        let base = self.scope.len();
        let saved_implicit = self.implicit;

        let (names, body) = match ast {
            AstNode::Lambda { params, body } => {
                if params.len() != types.len() {
                    return Err(CompileError::ParameterCount {
                        expected: types.len(),
                        actual: params.len(),
                    });
                }
                (params.clone(), body.as_ref())
            }
            bare => {
                if types.len() != 1 {
                    return Err(CompileError::ImplicitParameter(types.len()));
                }
                self.implicit = Some(base);
                (vec![self.settings.implicit_parameter.clone()], bare)
            }
        };

        for (name, ty) in names.iter().zip(types) {
            self.scope.push(Scoped {
                name: name.clone(),
                ty: ty.clone(),
            });
        }
        let bound = self.bind(body);
        self.scope.truncate(base);
        self.implicit = saved_implicit;

        let params = names
            .into_iter()
            .zip(types.iter().cloned())
            .map(|(name, ty)| Parameter { name, ty })
            .collect();
        Ok(Lambda::new(base, params, bound?))
    }

    fn bind(&mut self, ast: &AstNode) -> Result<Expr, CompileError> {
        match ast {
            AstNode::String(s) => Ok(Expr::constant(Value::from(s.as_str()), Type::String)),
            AstNode::Integer(n) => Ok(match i32::try_from(*n) {
                Ok(i) => Expr::constant(Value::Int(i), Type::Int),
                Err(_) => Expr::constant(Value::Long(*n), Type::Long),
            }),
            AstNode::Long(n) => Ok(Expr::constant(Value::Long(*n), Type::Long)),
            AstNode::Float(f) => Ok(Expr::constant(Value::Float(*f), Type::Float)),
            AstNode::Boolean(b) => Ok(Expr::constant(Value::Bool(*b), Type::Bool)),
            AstNode::Null => Ok(Expr::constant(Value::Null, Type::Null)),
            AstNode::Identifier(name) => self.bind_identifier(name),
            AstNode::Positional(index) => self
                .bindings
                .value(*index)
                .map(|v| Expr::constant(v.clone(), v.type_of()))
                .ok_or(CompileError::MissingPositional(*index)),
            AstNode::Variable(name) => self
                .bindings
                .variable(name, &self.settings)
                .map(|v| Expr::constant(v.clone(), v.type_of()))
                .ok_or_else(|| CompileError::UnknownVariable(name.clone())),
            AstNode::Member { target, name } => {
                let target = self.bind(target)?;
                self.member(target, name)
            }
            AstNode::Call { target, name, args } => {
                let target = match target {
                    Some(target) => self.bind(target)?,
                    None => self.implicit_parameter().ok_or_else(|| CompileError::UnknownMethod {
                        name: name.clone(),
                        ty: "the expression scope".to_string(),
                    })?,
                };
                self.call(target, name, args)
            }
            AstNode::Binary { op, lhs, rhs } => {
                let lhs = self.bind(lhs)?;
                let rhs = self.bind(rhs)?;
                binary(*op, lhs, rhs)
            }
            AstNode::Unary { op, operand } => {
                let operand = self.bind(operand)?;
                unary(*op, operand)
            }
            AstNode::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                let test = self.bind(condition)?;
                expect_bool(&test)?;
                let if_true = self.bind(then_branch)?;
                let if_false = self.bind(else_branch)?;
                let ty = Type::unify(if_true.ty(), if_false.ty()).ok_or_else(|| {
                    CompileError::IncompatibleOperands {
                        op: "?:",
                        lhs: if_true.ty().to_string(),
                        rhs: if_false.ty().to_string(),
                    }
                })?;
                Ok(Expr::Conditional {
                    test: Box::new(test),
                    if_true: Box::new(if_true.convert_to(&ty)),
                    if_false: Box::new(if_false.convert_to(&ty)),
                    ty,
                })
            }
            AstNode::Lambda { .. } => Err(CompileError::UnexpectedLambda),
            AstNode::New(members) => self.new_record(members),
        }
    }

    fn implicit_parameter(&self) -> Option<Expr> {
        self.implicit.and_then(|slot| {
            self.scope.get(slot).map(|s| Expr::Parameter {
                slot,
                ty: s.ty.clone(),
            })
        })
    }

    fn bind_identifier(&mut self, name: &str) -> Result<Expr, CompileError> {
        if let Some(slot) = self
            .scope
            .iter()
            .rposition(|s| self.settings.names_match(&s.name, name))
        {
            return Ok(Expr::Parameter {
                slot,
                ty: self.scope[slot].ty.clone(),
            });
        }

        let implicit = self.implicit_parameter();
        if let Some(it) = &implicit {
            if let Some(member) = self.try_member(it, name) {
                return Ok(member);
            }
        }

        if let Some(value) = self.bindings.variable(name, &self.settings) {
            return Ok(Expr::constant(value.clone(), value.type_of()));
        }

        Err(CompileError::UnresolvedMember {
            name: name.to_string(),
            scope: match implicit {
                Some(it) => format!("type '{}'", it.ty()),
                None => "the expression scope".to_string(),
            },
        })
    }

    fn try_member(&self, target: &Expr, name: &str) -> Option<Expr> {
        let settings = &self.settings;
        let boxed = || Box::new(target.clone());

        match target.ty() {
            Type::Record(record) => record
                .field(name, settings.case_insensitive_members)
                .map(|(index, field)| Expr::Field {
                    target: boxed(),
                    index,
                    name: field.name.clone(),
                    ty: field.ty.clone(),
                }),
            Type::Grouping(key, _) if settings.names_match("Key", name) => Some(Expr::GroupKey {
                target: boxed(),
                ty: (**key).clone(),
            }),
            t if t.is_enumerable() && settings.names_match("Count", name) => Some(Expr::Sequence {
                method: SequenceMethod::Count,
                source: boxed(),
                lambda: None,
                argument: None,
                ty: Type::Int,
            }),
            Type::String if settings.names_match("Length", name) => Some(Expr::Text {
                method: StringMethod::Length,
                target: boxed(),
                args: Vec::new(),
                ty: Type::Int,
            }),
            Type::Nullable(_) if settings.names_match("HasValue", name) => Some(Expr::Binary {
                op: BinaryOp::NotEqual,
                lhs: boxed(),
                rhs: Box::new(Expr::constant(Value::Null, target.ty().clone())),
                ty: Type::Bool,
            }),
            Type::Nullable(inner) if settings.names_match("Value", name) => Some(Expr::Unwrap {
                operand: boxed(),
                ty: (**inner).clone(),
            }),
            Type::DateTime => DatePart::from_name(name, settings.case_insensitive_members).map(
                |part| Expr::DatePart {
                    part,
                    target: boxed(),
                    ty: Type::Int,
                },
            ),
            _ => None,
        }
    }

    fn member(&self, target: Expr, name: &str) -> Result<Expr, CompileError> {
        self.try_member(&target, name)
            .ok_or_else(|| CompileError::UnresolvedMember {
                name: name.to_string(),
                scope: format!("type '{}'", target.ty()),
            })
    }

    fn call(&mut self, target: Expr, name: &str, args: &[AstNode]) -> Result<Expr, CompileError> {
        let ignore_case = self.settings.case_insensitive_members;
        let unknown = || CompileError::UnknownMethod {
            name: name.to_string(),
            ty: target.ty().to_string(),
        };

        if let Some(element) = target.ty().element_type().cloned() {
            let method = SequenceMethod::from_name(name, ignore_case).ok_or_else(unknown)?;
            return self.sequence_call(method, target, element, args);
        }

        if *target.ty() == Type::String {
            let method = StringMethod::from_name(name, ignore_case).ok_or_else(unknown)?;
            if args.len() != method.arity() {
                return Err(CompileError::ArgumentCount {
                    name: method.name().to_string(),
                    actual: args.len(),
                });
            }
            let args = args
                .iter()
                .map(|a| {
                    let arg = self.bind(a)?;
                    if arg.ty().is_assignable_to(&Type::String) {
                        Ok(arg)
                    } else {
                        Err(CompileError::TypeMismatch {
                            expected: Type::String.to_string(),
                            found: arg.ty().to_string(),
                        })
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            let ty = match method {
                StringMethod::StartsWith | StringMethod::EndsWith | StringMethod::Contains => {
                    Type::Bool
                }
                _ => Type::String,
            };
            return Ok(Expr::Text {
                method,
                target: Box::new(target),
                args,
                ty,
            });
        }

        Err(unknown())
    }

    fn sequence_call(
        &mut self,
        method: SequenceMethod,
        source: Expr,
        element: Type,
        args: &[AstNode],
    ) -> Result<Expr, CompileError> {
        use SequenceMethod::*;

        let mut lambda = None;
        let mut argument = None;

        let ty = match (method, args) {
            (Count, []) => Type::Int,
            (LongCount, []) => Type::Long,
            (Any, []) => Type::Bool,
            (First | FirstOrDefault | Last | LastOrDefault, []) => element.clone(),
            (Count | LongCount | Any | All | First | FirstOrDefault | Last | LastOrDefault | Where, [predicate]) => {
                let predicate = self.bind_lambda(predicate, std::slice::from_ref(&element))?;
                expect_bool_lambda(&predicate)?;
                lambda = Some(Box::new(predicate));
                match method {
                    Count => Type::Int,
                    LongCount => Type::Long,
                    Any | All => Type::Bool,
                    Where => Type::sequence(element.clone()),
                    _ => element.clone(),
                }
            }
            (Sum | Average, []) => numeric_result(method, &element)?,
            (Sum | Average | Min | Max | Select, [selector]) => {
                let selector = self.bind_lambda(selector, std::slice::from_ref(&element))?;
                let body = selector.return_type().clone();
                lambda = Some(Box::new(selector));
                match method {
                    Select => Type::sequence(body),
                    Min | Max => body,
                    _ => numeric_result(method, &body)?,
                }
            }
            (Min | Max, []) => element.clone(),
            (Contains, [item]) => {
                let item = self.bind(item)?;
                let ty = Type::unify(&element, item.ty()).ok_or_else(|| {
                    CompileError::IncompatibleOperands {
                        op: "Contains",
                        lhs: element.to_string(),
                        rhs: item.ty().to_string(),
                    }
                })?;
                argument = Some(Box::new(item.convert_to(&ty)));
                Type::Bool
            }
            (Distinct, []) => Type::sequence(element.clone()),
            (ToList, []) => Type::list(element.clone()),
            _ => {
                return Err(CompileError::ArgumentCount {
                    name: method.name().to_string(),
                    actual: args.len(),
                })
            }
        };

        Ok(Expr::Sequence {
            method,
            source: Box::new(source),
            lambda,
            argument,
            ty,
        })
    }

    fn new_record(&mut self, members: &[MemberInit]) -> Result<Expr, CompileError> {
        let mut fields: Vec<(String, Type)> = Vec::with_capacity(members.len());
        let mut values = Vec::with_capacity(members.len());

        for (position, member) in members.iter().enumerate() {
            let name = member
                .name
                .clone()
                .or_else(|| member.value.inferred_member_name().map(str::to_string))
                .ok_or(CompileError::UnnamedMember(position))?;
            if fields.iter().any(|(existing, _)| *existing == name) {
                return Err(CompileError::DuplicateMember(name));
            }
            let value = self.bind(&member.value)?;
            fields.push((name, value.ty().clone()));
            values.push(value);
        }

        let record = RecordType::anonymous(fields);
        Ok(Expr::New {
            ty: Type::Record(Arc::clone(&record)),
            record,
            members: values,
        })
    }
}

/// Result type of Sum / Average over values of type `ty`
fn numeric_result(method: SequenceMethod, ty: &Type) -> Result<Type, CompileError> {
    if !ty.is_numeric() {
        return Err(CompileError::IncompatibleOperand {
            op: method.name(),
            operand: ty.to_string(),
        });
    }
    Ok(match method {
        SequenceMethod::Average if ty.is_nullable_value() => Type::nullable(Type::Float),
        SequenceMethod::Average => Type::Float,
        _ => ty.clone(),
    })
}

fn expect_bool(expr: &Expr) -> Result<(), CompileError> {
    if *expr.ty() == Type::Bool {
        Ok(())
    } else {
        Err(CompileError::TypeMismatch {
            expected: Type::Bool.to_string(),
            found: expr.ty().to_string(),
        })
    }
}

fn expect_bool_lambda(lambda: &Lambda) -> Result<(), CompileError> {
    expect_bool(lambda.body())
}

fn incompatible(op: BinaryOp, lhs: &Expr, rhs: &Expr) -> CompileError {
    CompileError::IncompatibleOperands {
        op: op.symbol(),
        lhs: lhs.ty().to_string(),
        rhs: rhs.ty().to_string(),
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Result<Expr, CompileError> {
    let (ty, lhs, rhs) = match op {
        BinaryOp::And | BinaryOp::Or => {
            if *lhs.ty() != Type::Bool || *rhs.ty() != Type::Bool {
                return Err(incompatible(op, &lhs, &rhs));
            }
            (Type::Bool, lhs, rhs)
        }
        BinaryOp::Add if *lhs.ty() == Type::String || *rhs.ty() == Type::String => {
            return Ok(Expr::Binary {
                op: BinaryOp::Concatenate,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                ty: Type::String,
            });
        }
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Modulo => {
            let ty = Type::promote(lhs.ty(), rhs.ty()).ok_or_else(|| incompatible(op, &lhs, &rhs))?;
            (ty.clone(), lhs.convert_to(&ty), rhs.convert_to(&ty))
        }
        BinaryOp::Concatenate => (Type::String, lhs, rhs),
        BinaryOp::Equal | BinaryOp::NotEqual => {
            let common = Type::unify(lhs.ty(), rhs.ty()).ok_or_else(|| incompatible(op, &lhs, &rhs))?;
            if common.is_numeric() {
                (Type::Bool, lhs.convert_to(&common), rhs.convert_to(&common))
            } else {
                (Type::Bool, lhs, rhs)
            }
        }
        BinaryOp::LessThan
        | BinaryOp::LessThanOrEqual
        | BinaryOp::GreaterThan
        | BinaryOp::GreaterThanOrEqual => {
            if let Some(common) = Type::promote(lhs.ty(), rhs.ty()) {
                (Type::Bool, lhs.convert_to(&common), rhs.convert_to(&common))
            } else if lhs.ty().underlying() == rhs.ty().underlying()
                && matches!(lhs.ty().underlying(), Type::String | Type::DateTime | Type::Bool)
            {
                (Type::Bool, lhs, rhs)
            } else {
                return Err(incompatible(op, &lhs, &rhs));
            }
        }
        BinaryOp::Coalesce => {
            if !lhs.ty().accepts_null() {
                return Err(incompatible(op, &lhs, &rhs));
            }
            let target = lhs.ty().underlying().clone();
            let ty = Type::unify(&target, rhs.ty()).ok_or_else(|| incompatible(op, &lhs, &rhs))?;
            (ty.clone(), lhs.convert_to(&ty), rhs.convert_to(&ty))
        }
    };

    Ok(Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        ty,
    })
}

fn unary(op: UnaryOp, operand: Expr) -> Result<Expr, CompileError> {
    let ok = match op {
        UnaryOp::Negate => operand.ty().is_numeric(),
        UnaryOp::Not => *operand.ty().underlying() == Type::Bool,
    };
    if !ok {
        return Err(CompileError::IncompatibleOperand {
            op: match op {
                UnaryOp::Negate => "-",
                UnaryOp::Not => "!",
            },
            operand: operand.ty().to_string(),
        });
    }
    let ty = operand.ty().clone();
    Ok(Expr::Unary {
        op,
        operand: Box::new(operand),
        ty,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Evaluator;
    use crate::value::Value;

    fn line_type() -> Arc<RecordType> {
        RecordType::named(
            "OrderLine",
            [
                ("Id", Type::Int),
                ("Count", Type::nullable(Type::Int)),
                ("UnitPrice", Type::nullable(Type::Float)),
            ],
        )
    }

    fn order_type() -> Arc<RecordType> {
        RecordType::named(
            "Order",
            [
                ("Id", Type::Int),
                ("OrderNo", Type::String),
                ("Price", Type::nullable(Type::Float)),
                ("Lines", Type::list(Type::Record(line_type()))),
            ],
        )
    }

    fn order(id: i32, no: Option<&str>, price: Option<f64>, counts: &[i32]) -> Value {
        let lines = counts
            .iter()
            .enumerate()
            .map(|(i, c)| {
                Value::record(
                    &line_type(),
                    vec![Value::Int(i as i32), Value::Int(*c), Value::Float(1.5)],
                )
                .unwrap()
            })
            .collect::<Vec<_>>();
        Value::record(
            &order_type(),
            vec![
                Value::Int(id),
                Value::from(no),
                Value::from(price),
                Value::sequence(lines),
            ],
        )
        .unwrap()
    }

    fn compile(text: &str) -> Result<Lambda, CompileError> {
        compile_lambda(text, &[Type::Record(order_type())], &Bindings::new())
    }

    fn run(lambda: &Lambda, args: &[Value]) -> Value {
        Evaluator::new().invoke(lambda, args).unwrap()
    }

    #[test]
    fn test_bare_member_predicate() {
        let lambda = compile("Id == 5").unwrap();
        assert_eq!(lambda.return_type(), &Type::Bool);
        assert_eq!(lambda.params()[0].name, "it");
        assert_eq!(run(&lambda, &[order(5, None, None, &[])]), Value::Bool(true));
        assert_eq!(run(&lambda, &[order(6, None, None, &[])]), Value::Bool(false));
    }

    #[test]
    fn test_implicit_parameter_by_name() {
        let lambda = compile("it").unwrap();
        assert_eq!(lambda.return_type(), &Type::Record(order_type()));
    }

    #[test]
    fn test_explicit_lambda() {
        let lambda = compile_lambda("(a, b) => a + b", &[Type::Int, Type::Int], &Bindings::new()).unwrap();
        assert_eq!(lambda.return_type(), &Type::Int);
        assert_eq!(run(&lambda, &[Value::Int(40), Value::Int(2)]), Value::Int(42));
    }

    #[test]
    fn test_parameter_count_mismatch() {
        let err = compile_lambda("(a, b) => a", &[Type::Int], &Bindings::new()).unwrap_err();
        assert!(matches!(err, CompileError::ParameterCount { expected: 1, actual: 2 }));

        let err = compile_lambda("a + b", &[Type::Int, Type::Int], &Bindings::new()).unwrap_err();
        assert!(matches!(err, CompileError::ImplicitParameter(2)));
    }

    #[test]
    fn test_numeric_promotion() {
        let lambda = compile("Id + 10 - 50.0 > 0").unwrap();
        assert_eq!(run(&lambda, &[order(41, None, None, &[])]), Value::Bool(true));
        assert_eq!(run(&lambda, &[order(40, None, None, &[])]), Value::Bool(false));

        let lambda = compile("Price * 2").unwrap();
        assert_eq!(lambda.return_type(), &Type::nullable(Type::Float));
        assert_eq!(run(&lambda, &[order(1, None, None, &[])]), Value::Null);
    }

    #[test]
    fn test_string_concatenation() {
        let lambda = compile("\"No: \" & OrderNo").unwrap();
        assert_eq!(lambda.return_type(), &Type::String);
        assert_eq!(
            run(&lambda, &[order(1, Some("A1"), None, &[])]),
            Value::from("No: A1")
        );

        let lambda = compile("OrderNo + Id").unwrap();
        assert_eq!(
            run(&lambda, &[order(7, Some("A"), None, &[])]),
            Value::from("A7")
        );
    }

    #[test]
    fn test_unary_and_ternary() {
        let lambda = compile("!(-1 * -Id > 0)").unwrap();
        assert_eq!(run(&lambda, &[order(3, None, None, &[])]), Value::Bool(false));

        let lambda = compile("Id > 2 ? \"big\" : \"small\"").unwrap();
        assert_eq!(run(&lambda, &[order(3, None, None, &[])]), Value::from("big"));
    }

    #[test]
    fn test_coalesce_unwraps_nullable() {
        let lambda = compile("Price ?? 0").unwrap();
        assert_eq!(lambda.return_type(), &Type::Float);
        assert_eq!(run(&lambda, &[order(1, None, None, &[])]), Value::Float(0.0));
    }

    #[test]
    fn test_positional_and_variables() {
        let bindings = Bindings::from([4])
            .with_variable("limit", 10)
            .with_variable("Id", 99);
        let ty = [Type::Record(order_type())];

        let lambda = compile_lambda("Id > @0 && Id < @limit", &ty, &bindings).unwrap();
        assert_eq!(run(&lambda, &[order(5, None, None, &[])]), Value::Bool(true));

        // A member wins over a variable of the same name
        let lambda = compile_lambda("Id", &ty, &bindings).unwrap();
        assert_eq!(run(&lambda, &[order(5, None, None, &[])]), Value::Int(5));

        // Bare identifiers that are not members fall back to variables
        let lambda = compile_lambda("Id < limit", &ty, &bindings).unwrap();
        assert_eq!(run(&lambda, &[order(5, None, None, &[])]), Value::Bool(true));
    }

    #[test]
    fn test_missing_placeholders() {
        assert!(matches!(
            compile("Id == @0"),
            Err(CompileError::MissingPositional(0))
        ));
        assert!(matches!(
            compile("Id == @limit"),
            Err(CompileError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_unresolved_member() {
        let err = compile("Nope == 1").unwrap_err();
        match err {
            CompileError::UnresolvedMember { name, scope } => {
                assert_eq!(name, "Nope");
                assert_eq!(scope, "type 'Order'");
            }
            other => panic!("Expected UnresolvedMember, got {:?}", other),
        }
        assert!(matches!(
            compile("Lines.Nope"),
            Err(CompileError::UnresolvedMember { .. })
        ));
    }

    #[test]
    fn test_case_insensitive_members() {
        assert!(compile("id == 5").is_err());

        let bindings = Bindings::new().with_settings(Settings {
            case_insensitive_members: true,
            ..Settings::default()
        });
        let lambda = compile_lambda("id == 5", &[Type::Record(order_type())], &bindings).unwrap();
        assert_eq!(run(&lambda, &[order(5, None, None, &[])]), Value::Bool(true));
    }

    #[test]
    fn test_parse_errors_propagate() {
        assert!(matches!(compile("Id =="), Err(CompileError::Parse(_))));
    }

    #[test]
    fn test_incompatible_operands() {
        assert!(matches!(
            compile("OrderNo > 5"),
            Err(CompileError::IncompatibleOperands { .. })
        ));
        assert!(matches!(
            compile("Id && true"),
            Err(CompileError::IncompatibleOperands { .. })
        ));
    }

    #[test]
    fn test_nested_lambdas() {
        let lambda = compile("Lines.Sum(l => l.Count ?? 0)").unwrap();
        assert_eq!(lambda.return_type(), &Type::Int);
        assert_eq!(run(&lambda, &[order(1, None, None, &[2, 3])]), Value::Int(5));

        // Bare nested bodies bind to the element
        let lambda = compile("Lines.Any(Count > 2)").unwrap();
        assert_eq!(run(&lambda, &[order(1, None, None, &[1, 3])]), Value::Bool(true));

        // Nested explicit lambdas still see the outer implicit parameter
        let lambda = compile("Lines.Count(l => l.Count < Id)").unwrap();
        assert_eq!(run(&lambda, &[order(3, None, None, &[1, 2, 5])]), Value::Int(2));
    }

    #[test]
    fn test_collection_members() {
        let lambda = compile("Lines.Count").unwrap();
        assert_eq!(run(&lambda, &[order(1, None, None, &[1, 1])]), Value::Int(2));

        let lambda = compile("Lines.Select(l => l.Id)").unwrap();
        assert_eq!(lambda.return_type(), &Type::sequence(Type::Int));
    }

    #[test]
    fn test_new_record() {
        let lambda = compile("new (Id as OrderId, OrderNo)").unwrap();
        match lambda.return_type() {
            Type::Record(record) => {
                assert_eq!(record.name(), None);
                assert_eq!(record.fields()[0].name, "OrderId");
                assert_eq!(record.fields()[1].name, "OrderNo");
            }
            other => panic!("Expected record type, got {}", other),
        }
        let value = run(&lambda, &[order(5, Some("A5"), None, &[])]);
        assert_eq!(value.get("OrderId"), Some(&Value::Int(5)));

        assert!(matches!(
            compile("new (Id, Id)"),
            Err(CompileError::DuplicateMember(_))
        ));
    }

    #[test]
    fn test_string_methods() {
        let lambda = compile("OrderNo.StartsWith(\"A\") && OrderNo.Length == 2").unwrap();
        assert_eq!(
            run(&lambda, &[order(1, Some("A1"), None, &[])]),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_nullable_members() {
        let lambda = compile("Price.HasValue ? Price.Value : -1.0").unwrap();
        assert_eq!(lambda.return_type(), &Type::Float);
        assert_eq!(
            run(&lambda, &[order(1, None, Some(2.5), &[])]),
            Value::Float(2.5)
        );
        assert_eq!(run(&lambda, &[order(1, None, None, &[])]), Value::Float(-1.0));
    }
}
