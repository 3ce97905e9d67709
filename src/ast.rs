// Abstract Syntax Tree for lambda expression text
//
// The parser produces these untyped nodes; the compiler binds them against
// parameter types to produce a typed `Lambda`.

use serde::{Deserialize, Serialize};

/// AST Node types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AstNode {
    /// String literal (e.g., "hello", 'world')
    String(String),

    /// Integer literal; the compiler picks `int` or `long` by magnitude
    Integer(i64),

    /// Integer literal with an explicit `L` suffix
    Long(i64),

    /// Floating point literal
    Float(f64),

    /// Boolean literal
    Boolean(bool),

    /// Null literal
    Null,

    /// Bare identifier: a parameter, a member of the implicit parameter, or a
    /// variable
    Identifier(String),

    /// Positional placeholder (e.g., @0)
    Positional(usize),

    /// Named variable placeholder (e.g., @minId)
    Variable(String),

    /// Member access (e.g., o.Id)
    Member { target: Box<AstNode>, name: String },

    /// Method call (e.g., Lines.Sum(l => l.Count)); a call without a target
    /// applies to the implicit parameter
    Call {
        target: Option<Box<AstNode>>,
        name: String,
        args: Vec<AstNode>,
    },

    /// Binary operation
    Binary {
        op: BinaryOp,
        lhs: Box<AstNode>,
        rhs: Box<AstNode>,
    },

    /// Unary operation
    Unary { op: UnaryOp, operand: Box<AstNode> },

    /// Conditional expression (condition ? then : else)
    Conditional {
        condition: Box<AstNode>,
        then_branch: Box<AstNode>,
        else_branch: Box<AstNode>,
    },

    /// Function literal (e.g., x => x.Id, (a, b) => a + b)
    Lambda { params: Vec<String>, body: Box<AstNode> },

    /// Anonymous record construction (e.g., new (Id as OrderId, OrderNo))
    New(Vec<MemberInit>),
}

/// One member of a `new (...)` initializer.
///
/// `name` is `None` when the member name is inferred from the expression
/// (`new (OrderNo)` declares a member called `OrderNo`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberInit {
    pub name: Option<String>,
    pub value: AstNode,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,

    // Logical
    And,
    Or,

    // String
    Concatenate,

    // Null coalescing
    Coalesce,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessThanOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterThanOrEqual
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Concatenate => "&",
            BinaryOp::Coalesce => "??",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
    Not,
}

impl AstNode {
    /// Name a `new (...)` member takes when none is given explicitly.
    pub fn inferred_member_name(&self) -> Option<&str> {
        match self {
            AstNode::Identifier(name) => Some(name),
            AstNode::Member { name, .. } => Some(name),
            _ => None,
        }
    }
}
