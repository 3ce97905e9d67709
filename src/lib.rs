// dynquery - Dynamic query operator compiler
// Copyright (c) 2025 dynquery contributors
// Licensed under the MIT License

//! # dynquery
//!
//! Build and run sequence pipelines (filter, project, sort, group, join,
//! aggregate) whose predicate and selector logic arrives as strings.
//!
//! Each operator call compiles its expression text against the source's
//! element type, works out the generic type arguments a static compiler
//! would have inferred, type-checks the call against the standard operator
//! library and then either wraps it as a new lazy query source or executes
//! it and returns a [`Value`].
//!
//! ## Architecture
//!
//! - `registry` - Operator table: argument shapes, lazy/eager, fallback
//! - `resolve` - Parameter tuples per operator argument, lambda compilation
//! - `coercion` - Operator-specific re-declaration of lambda return types
//! - `builder` - Generic type arguments and call construction
//! - `signature` - Standard operator library and call type-checking
//! - `execution` - Lazy wrapping, eager execution, zero-argument fallback
//! - `parser` / `compiler` / `expr` / `evaluator` - Expression language
//! - `query` / `provider` / `functions` - Query sources and the in-memory provider
//! - `types` / `value` / `bindings` - Types, values and call bindings
//!
//! ## Example
//!
//! ```
//! use dynquery::{QuerySource, RecordType, Type, Value};
//!
//! let order = RecordType::named("Order", [("Id", Type::Int), ("OrderNo", Type::String)]);
//! let orders = (1..=10)
//!     .map(|id| Value::record(&order, vec![Value::Int(id), Value::from(format!("A{}", id))]))
//!     .collect::<Result<Vec<_>, _>>()
//!     .unwrap();
//!
//! let source = QuerySource::from_values(Type::record(order), orders).unwrap();
//! let numbers = source
//!     .filter("Id > @0", [7])
//!     .unwrap()
//!     .select("OrderNo", ())
//!     .unwrap();
//!
//! assert_eq!(
//!     numbers.to_vec().unwrap(),
//!     vec![Value::from("A8"), Value::from("A9"), Value::from("A10")]
//! );
//! assert_eq!(source.count("Id % 2 == 0", ()).unwrap(), 5);
//! ```

pub mod ast;
pub mod bindings;
pub mod builder;
pub mod coercion;
pub mod compiler;
pub mod datetime;
pub mod error;
pub mod evaluator;
pub mod execution;
pub mod expr;
pub mod functions;
pub mod parser;
pub mod provider;
pub mod query;
mod queryable;
pub mod registry;
pub mod resolve;
pub mod signature;
pub mod types;
pub mod value;

pub use bindings::{Bindings, Settings};
pub use compiler::{compile_lambda, CompileError};
pub use error::{QueryError, Result};
pub use execution::Outcome;
pub use expr::Lambda;
pub use provider::EnumerableProvider;
pub use query::{Argument, CallExpression, QueryExpr, QueryProvider, QuerySource};
pub use registry::{lookup, ArgumentShape, Operator, OperatorSpec};
pub use signature::SignatureError;
pub use types::{RecordType, Type};
pub use value::Value;
