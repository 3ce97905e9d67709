// Query sources and call expression trees
//
// A query source pairs an element type with an immutable expression node and
// the provider that knows how to run it. Operators never mutate a source;
// they wrap its node in a new call node.

use std::fmt;
use std::sync::Arc;

use crate::error::{QueryError, Result};
use crate::expr::Lambda;
use crate::provider::EnumerableProvider;
use crate::registry::{ArgumentShape, Operator};
use crate::signature::Signature;
use crate::types::Type;
use crate::value::Value;

/// Node of a query expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum QueryExpr {
    /// In-memory values of a known element type
    Root {
        element_type: Type,
        values: Arc<Vec<Value>>,
    },
    Call(CallExpression),
}

impl QueryExpr {
    /// Static type of the node: `Query<T>` for roots, the instantiated
    /// result type for calls.
    pub fn ty(&self) -> Type {
        match self {
            QueryExpr::Root { element_type, .. } => Type::query(element_type.clone()),
            QueryExpr::Call(call) => call.ty.clone(),
        }
    }

    pub fn as_call(&self) -> Option<&CallExpression> {
        match self {
            QueryExpr::Call(call) => Some(call),
            QueryExpr::Root { .. } => None,
        }
    }
}

/// Argument of a call expression
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// A nested query (the source, or the inner side of a two-source call)
    Query(Arc<QueryExpr>),
    /// A quoted function literal
    Quote(Arc<Lambda>),
    Constant { value: Value, ty: Type },
}

impl Argument {
    pub fn ty(&self) -> Type {
        match self {
            Argument::Query(expr) => expr.ty(),
            Argument::Quote(lambda) => lambda.function_type(),
            Argument::Constant { ty, .. } => ty.clone(),
        }
    }
}

/// A generically instantiated call of a library operator
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpression {
    pub operator: Operator,
    pub shape: ArgumentShape,
    pub signature: &'static Signature,
    /// Concrete generic type arguments, in signature order
    pub type_args: Vec<Type>,
    /// Source first, then literals, constants and inner queries
    pub args: Vec<Argument>,
    /// Instantiated result type
    pub ty: Type,
}

impl CallExpression {
    /// The source query node
    pub fn source(&self) -> Result<&QueryExpr> {
        self.query(0)
    }

    pub fn query(&self, index: usize) -> Result<&QueryExpr> {
        match self.args.get(index) {
            Some(Argument::Query(expr)) => Ok(expr),
            _ => Err(self.malformed(index, "query")),
        }
    }

    pub fn quote(&self, index: usize) -> Result<&Lambda> {
        match self.args.get(index) {
            Some(Argument::Quote(lambda)) => Ok(lambda),
            _ => Err(self.malformed(index, "function literal")),
        }
    }

    pub fn constant(&self, index: usize) -> Result<&Value> {
        match self.args.get(index) {
            Some(Argument::Constant { value, .. }) => Ok(value),
            _ => Err(self.malformed(index, "constant")),
        }
    }

    /// Type argument at `index`, `T` being zero
    pub fn type_arg(&self, index: usize) -> Result<&Type> {
        self.type_args.get(index).ok_or_else(|| {
            QueryError::TypeMismatch(format!(
                "{} has no type argument {}",
                self.operator, index
            ))
        })
    }

    fn malformed(&self, index: usize, expected: &str) -> QueryError {
        QueryError::TypeMismatch(format!(
            "argument {} of {} is not a {}",
            index, self.operator, expected
        ))
    }
}

impl fmt::Display for CallExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operator)?;
        if !self.type_args.is_empty() {
            write!(f, "<")?;
            for (i, t) in self.type_args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", t)?;
            }
            write!(f, ">")?;
        }
        write!(f, " -> {}", self.ty)
    }
}

/// Builds and runs query expression trees.
pub trait QueryProvider: Send + Sync + fmt::Debug {
    /// Wrap an expression whose type is a query as a new source.
    fn create_query(&self, expression: Arc<QueryExpr>) -> Result<QuerySource>;

    /// Run an expression. Query-typed expressions produce a sequence value.
    fn execute(&self, expression: &QueryExpr) -> Result<Value>;
}

/// A typed, lazily evaluated sequence
#[derive(Debug, Clone)]
pub struct QuerySource {
    element_type: Type,
    expression: Arc<QueryExpr>,
    provider: Arc<dyn QueryProvider>,
}

impl QuerySource {
    /// Create a source; `element_type` must be the element type yielded by
    /// `expression`.
    pub fn new(
        element_type: Type,
        expression: Arc<QueryExpr>,
        provider: Arc<dyn QueryProvider>,
    ) -> Result<Self> {
        let ty = expression.ty();
        match &ty {
            Type::Query(yielded) | Type::OrderedQuery(yielded) if **yielded == element_type => {
                Ok(QuerySource {
                    element_type,
                    expression,
                    provider,
                })
            }
            _ => Err(QueryError::TypeMismatch(format!(
                "expression of type {} does not yield {}",
                ty, element_type
            ))),
        }
    }

    /// In-memory source over `values`, each of which must conform to
    /// `element_type`.
    pub fn from_values(element_type: Type, values: Vec<Value>) -> Result<Self> {
        if let Some(bad) = values.iter().find(|v| !v.conforms_to(&element_type)) {
            return Err(QueryError::TypeMismatch(format!(
                "value {} is not of type {}",
                bad, element_type
            )));
        }
        let expression = Arc::new(QueryExpr::Root {
            element_type: element_type.clone(),
            values: Arc::new(values),
        });
        QuerySource::new(element_type, expression, Arc::new(EnumerableProvider))
    }

    /// Typed in-memory source from JSON; the JSON must be an array.
    pub fn from_json_str(element_type: Type, json: &str) -> Result<Self> {
        let value = Value::from_json_str(json, &Type::list(element_type.clone()))?;
        let items = value.as_slice().map(<[Value]>::to_vec).unwrap_or_default();
        QuerySource::from_values(element_type, items)
    }

    pub fn element_type(&self) -> &Type {
        &self.element_type
    }

    pub fn expression(&self) -> &Arc<QueryExpr> {
        &self.expression
    }

    pub fn provider(&self) -> &Arc<dyn QueryProvider> {
        &self.provider
    }

    /// Static type of the source expression
    pub fn ty(&self) -> Type {
        self.expression.ty()
    }

    /// Whether the source carries an established ordering
    pub fn is_ordered(&self) -> bool {
        matches!(self.ty(), Type::OrderedQuery(_))
    }

    /// Run the query and collect its elements.
    pub fn to_vec(&self) -> Result<Vec<Value>> {
        match self.provider.execute(&self.expression)? {
            Value::Sequence(items) => Ok(items.as_ref().clone()),
            Value::Null => Ok(Vec::new()),
            other => Err(QueryError::TypeMismatch(format!(
                "query produced {} instead of a sequence",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_values_checks_element_type() {
        let source = QuerySource::from_values(Type::Int, vec![Value::Int(1), Value::Int(2)]).unwrap();
        assert_eq!(source.element_type(), &Type::Int);
        assert_eq!(source.ty(), Type::query(Type::Int));
        assert!(!source.is_ordered());
        assert_eq!(source.to_vec().unwrap(), vec![Value::Int(1), Value::Int(2)]);

        let err = QuerySource::from_values(Type::Int, vec![Value::from("x")]).unwrap_err();
        assert!(matches!(err, QueryError::TypeMismatch(_)));
    }

    #[test]
    fn test_new_checks_expression_type() {
        let expression = Arc::new(QueryExpr::Root {
            element_type: Type::Int,
            values: Arc::new(Vec::new()),
        });
        assert!(QuerySource::new(Type::String, expression.clone(), Arc::new(EnumerableProvider)).is_err());
        assert!(QuerySource::new(Type::Int, expression, Arc::new(EnumerableProvider)).is_ok());
    }

    #[test]
    fn test_from_json() {
        let source = QuerySource::from_json_str(Type::nullable(Type::Int), "[1, null, 3]").unwrap();
        assert_eq!(
            source.to_vec().unwrap(),
            vec![Value::Int(1), Value::Null, Value::Int(3)]
        );
    }
}
