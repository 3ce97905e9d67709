// Lambda expression parser
//
// Lexer plus Pratt parser for the expression dialect accepted by the dynamic
// operators: `Id == 5`, `o => o.Price * 2`, `(k, ids) => ids.Count()`,
// `new (Id as OrderId, OrderNo)`.

use crate::ast::{AstNode, BinaryOp, MemberInit, UnaryOp};
use thiserror::Error;

/// Parser errors
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("Unexpected token: {0}")]
    UnexpectedToken(String),

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Invalid syntax: {0}")]
    InvalidSyntax(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Unclosed string literal")]
    UnclosedString,

    #[error("Invalid escape sequence: {0}")]
    InvalidEscape(String),

    #[error("Expected {expected}, found {found}")]
    Expected { expected: String, found: String },
}

/// Token types for the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    String(String),
    Integer(i64),
    Long(i64),
    Float(f64),
    True,
    False,
    Null,

    // Names
    Identifier(String),
    Positional(usize),
    Variable(String),

    // Keywords
    New,
    As,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Equal,
    Assign,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
    Not,
    Ampersand,
    Question,
    Coalesce,
    Arrow,

    // Delimiters
    Dot,
    Comma,
    Colon,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,

    Eof,
}

/// Lexer for tokenizing expression text
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if self.position < self.input.len() {
            self.position += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while self.current().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn read_string(&mut self, quote_char: char) -> Result<String, ParserError> {
        let mut result = String::new();
        self.advance(); // skip opening quote

        loop {
            match self.current() {
                None => return Err(ParserError::UnclosedString),
                Some(ch) if ch == quote_char => {
                    self.advance(); // skip closing quote
                    return Ok(result);
                }
                Some('\\') => {
                    self.advance();
                    match self.current() {
                        None => return Err(ParserError::UnclosedString),
                        Some('"') => result.push('"'),
                        Some('\'') => result.push('\''),
                        Some('\\') => result.push('\\'),
                        Some('0') => result.push('\0'),
                        Some('n') => result.push('\n'),
                        Some('r') => result.push('\r'),
                        Some('t') => result.push('\t'),
                        Some('u') => {
                            // \uXXXX
                            self.advance();
                            let mut hex = String::new();
                            for _ in 0..4 {
                                match self.current() {
                                    Some(h) if h.is_ascii_hexdigit() => {
                                        hex.push(h);
                                        self.advance();
                                    }
                                    _ => return Err(ParserError::InvalidEscape(format!("\\u{}", hex))),
                                }
                            }
                            let ch = u32::from_str_radix(&hex, 16)
                                .ok()
                                .and_then(char::from_u32)
                                .ok_or_else(|| ParserError::InvalidEscape(format!("\\u{}", hex)))?;
                            result.push(ch);
                            continue; // already past the escape
                        }
                        Some(ch) => return Err(ParserError::InvalidEscape(format!("\\{}", ch))),
                    }
                    self.advance();
                }
                Some(ch) => {
                    result.push(ch);
                    self.advance();
                }
            }
        }
    }

    fn read_number(&mut self) -> Result<Token, ParserError> {
        let start = self.position;
        let mut is_float = false;

        while self.current().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        // Fractional part; `1.Foo` is a member access, not a float
        if self.current() == Some('.') && self.peek(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while self.current().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Exponent part
        if matches!(self.current(), Some('e') | Some('E')) {
            is_float = true;
            self.advance();
            if matches!(self.current(), Some('+') | Some('-')) {
                self.advance();
            }
            if !self.current().is_some_and(|c| c.is_ascii_digit()) {
                return Err(ParserError::InvalidNumber(
                    "Expected digit in exponent".to_string(),
                ));
            }
            while self.current().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text: String = self.input[start..self.position].iter().collect();

        // Type suffixes
        match self.current() {
            Some('L') | Some('l') if !is_float => {
                self.advance();
                return text
                    .parse()
                    .map(Token::Long)
                    .map_err(|_| ParserError::InvalidNumber(text));
            }
            Some('d') | Some('D') | Some('f') | Some('F') | Some('m') | Some('M') => {
                self.advance();
                is_float = true;
            }
            _ => {}
        }

        if self.current().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            return Err(ParserError::InvalidNumber(format!(
                "{}{}",
                text,
                self.read_identifier()
            )));
        }

        if is_float {
            text.parse()
                .map(Token::Float)
                .map_err(|_| ParserError::InvalidNumber(text))
        } else {
            text.parse()
                .map(Token::Integer)
                .map_err(|_| ParserError::InvalidNumber(text))
        }
    }

    fn read_identifier(&mut self) -> String {
        let start = self.position;
        while self.current().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        self.input[start..self.position].iter().collect()
    }

    fn two_char(&mut self, token: Token) -> Result<Token, ParserError> {
        self.advance();
        self.advance();
        Ok(token)
    }

    fn one_char(&mut self, token: Token) -> Result<Token, ParserError> {
        self.advance();
        Ok(token)
    }

    pub fn next_token(&mut self) -> Result<Token, ParserError> {
        self.skip_whitespace();

        match self.current() {
            None => Ok(Token::Eof),

            // String literals
            Some('"') => Ok(Token::String(self.read_string('"')?)),
            Some('\'') => Ok(Token::String(self.read_string('\'')?)),

            // Numbers
            Some(ch) if ch.is_ascii_digit() => self.read_number(),

            // Placeholders: @0 is positional, @name is a variable
            Some('@') => {
                self.advance();
                match self.current() {
                    Some(ch) if ch.is_ascii_digit() => {
                        let start = self.position;
                        while self.current().is_some_and(|c| c.is_ascii_digit()) {
                            self.advance();
                        }
                        let digits: String = self.input[start..self.position].iter().collect();
                        digits
                            .parse()
                            .map(Token::Positional)
                            .map_err(|_| ParserError::InvalidNumber(digits))
                    }
                    Some(ch) if ch.is_alphabetic() || ch == '_' => {
                        Ok(Token::Variable(self.read_identifier()))
                    }
                    Some(ch) => Err(ParserError::UnexpectedToken(format!("@{}", ch))),
                    None => Err(ParserError::UnexpectedEnd),
                }
            }

            // Two-character operators
            Some('=') if self.peek(1) == Some('=') => self.two_char(Token::Equal),
            Some('=') if self.peek(1) == Some('>') => self.two_char(Token::Arrow),
            Some('!') if self.peek(1) == Some('=') => self.two_char(Token::NotEqual),
            Some('<') if self.peek(1) == Some('>') => self.two_char(Token::NotEqual),
            Some('<') if self.peek(1) == Some('=') => self.two_char(Token::LessThanOrEqual),
            Some('>') if self.peek(1) == Some('=') => self.two_char(Token::GreaterThanOrEqual),
            Some('&') if self.peek(1) == Some('&') => self.two_char(Token::And),
            Some('|') if self.peek(1) == Some('|') => self.two_char(Token::Or),
            Some('?') if self.peek(1) == Some('?') => self.two_char(Token::Coalesce),

            // Single-character operators and delimiters
            Some('(') => self.one_char(Token::LeftParen),
            Some(')') => self.one_char(Token::RightParen),
            Some('{') => self.one_char(Token::LeftBrace),
            Some('}') => self.one_char(Token::RightBrace),
            Some(',') => self.one_char(Token::Comma),
            Some(':') => self.one_char(Token::Colon),
            Some('?') => self.one_char(Token::Question),
            Some('.') => self.one_char(Token::Dot),
            Some('+') => self.one_char(Token::Plus),
            Some('-') => self.one_char(Token::Minus),
            Some('*') => self.one_char(Token::Star),
            Some('/') => self.one_char(Token::Slash),
            Some('%') => self.one_char(Token::Percent),
            Some('=') => self.one_char(Token::Assign),
            Some('<') => self.one_char(Token::LessThan),
            Some('>') => self.one_char(Token::GreaterThan),
            Some('!') => self.one_char(Token::Not),
            Some('&') => self.one_char(Token::Ampersand),

            // Identifiers and keywords
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();
                Ok(match ident.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "new" => Token::New,
                    "as" => Token::As,
                    _ => Token::Identifier(ident),
                })
            }

            Some(ch) => Err(ParserError::UnexpectedToken(ch.to_string())),
        }
    }
}

/// Binding power of prefix operators
const PREFIX_BP: u8 = 60;

/// Parser for expression text using Pratt parsing
pub struct Parser {
    lexer: Lexer,
    current_token: Token,
}

impl Parser {
    pub fn new(input: &str) -> Result<Self, ParserError> {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token()?;
        Ok(Parser {
            lexer,
            current_token,
        })
    }

    fn advance(&mut self) -> Result<(), ParserError> {
        self.current_token = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParserError> {
        if std::mem::discriminant(&self.current_token) == std::mem::discriminant(&expected) {
            self.advance()
        } else if self.current_token == Token::Eof {
            Err(ParserError::UnexpectedEnd)
        } else {
            Err(ParserError::Expected {
                expected: format!("{:?}", expected),
                found: format!("{:?}", self.current_token),
            })
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParserError> {
        match &self.current_token {
            Token::Identifier(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(name)
            }
            Token::Eof => Err(ParserError::UnexpectedEnd),
            other => Err(ParserError::Expected {
                expected: "identifier".to_string(),
                found: format!("{:?}", other),
            }),
        }
    }

    /// Get the binding power (precedence) for an infix token
    fn binding_power(&self, token: &Token) -> Option<(u8, u8)> {
        // (left_bp, right_bp); higher binds tighter, right_bp < left_bp is right associative
        match token {
            Token::Question => Some((4, 3)),
            Token::Coalesce => Some((6, 5)),
            Token::Or => Some((10, 11)),
            Token::And => Some((20, 21)),
            Token::Equal | Token::Assign | Token::NotEqual => Some((30, 31)),
            Token::LessThan
            | Token::LessThanOrEqual
            | Token::GreaterThan
            | Token::GreaterThanOrEqual => Some((35, 36)),
            Token::Plus | Token::Minus | Token::Ampersand => Some((40, 41)),
            Token::Star | Token::Slash | Token::Percent => Some((50, 51)),
            Token::Dot => Some((70, 71)),
            _ => None,
        }
    }

    /// Parse a primary expression (literals, names, grouping, prefix operators)
    fn parse_primary(&mut self) -> Result<AstNode, ParserError> {
        match &self.current_token {
            Token::String(s) => {
                let value = s.clone();
                self.advance()?;
                Ok(AstNode::String(value))
            }
            Token::Integer(n) => {
                let value = *n;
                self.advance()?;
                Ok(AstNode::Integer(value))
            }
            Token::Long(n) => {
                let value = *n;
                self.advance()?;
                Ok(AstNode::Long(value))
            }
            Token::Float(n) => {
                let value = *n;
                self.advance()?;
                Ok(AstNode::Float(value))
            }
            Token::True => {
                self.advance()?;
                Ok(AstNode::Boolean(true))
            }
            Token::False => {
                self.advance()?;
                Ok(AstNode::Boolean(false))
            }
            Token::Null => {
                self.advance()?;
                Ok(AstNode::Null)
            }
            Token::Positional(index) => {
                let index = *index;
                self.advance()?;
                Ok(AstNode::Positional(index))
            }
            Token::Variable(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(AstNode::Variable(name))
            }
            Token::Identifier(name) => {
                let name = name.clone();
                self.advance()?;
                match self.current_token {
                    // x => body
                    Token::Arrow => {
                        self.advance()?;
                        let body = self.parse_expression(0)?;
                        Ok(AstNode::Lambda {
                            params: vec![name],
                            body: Box::new(body),
                        })
                    }
                    // Count() on the implicit parameter
                    Token::LeftParen => {
                        let args = self.parse_arguments()?;
                        Ok(AstNode::Call {
                            target: None,
                            name,
                            args,
                        })
                    }
                    _ => Ok(AstNode::Identifier(name)),
                }
            }
            Token::LeftParen => {
                if let Some(params) = self.try_parse_lambda_params()? {
                    let body = self.parse_expression(0)?;
                    return Ok(AstNode::Lambda {
                        params,
                        body: Box::new(body),
                    });
                }
                self.advance()?; // skip '('
                let inner = self.parse_expression(0)?;
                self.expect(Token::RightParen)?;
                Ok(inner)
            }
            Token::New => {
                self.advance()?;
                self.parse_new()
            }
            Token::Minus => {
                self.advance()?;
                let operand = self.parse_expression(PREFIX_BP)?;
                Ok(AstNode::Unary {
                    op: UnaryOp::Negate,
                    operand: Box::new(operand),
                })
            }
            Token::Not => {
                self.advance()?;
                let operand = self.parse_expression(PREFIX_BP)?;
                Ok(AstNode::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                })
            }
            Token::Plus => {
                self.advance()?;
                self.parse_expression(PREFIX_BP)
            }
            Token::Eof => Err(ParserError::UnexpectedEnd),
            _ => Err(ParserError::UnexpectedToken(format!(
                "{:?}",
                self.current_token
            ))),
        }
    }

    /// At `(`: if what follows is `(a, b) =>`, consume it and return the
    /// parameter names. Otherwise rewind and return `None`.
    fn try_parse_lambda_params(&mut self) -> Result<Option<Vec<String>>, ParserError> {
        let saved_position = self.lexer.position;
        let saved_token = self.current_token.clone();

        let mut params = Vec::new();
        let mut matched = false;

        self.advance()?; // skip '('
        loop {
            match &self.current_token {
                Token::Identifier(name) => {
                    params.push(name.clone());
                    self.advance()?;
                    match self.current_token {
                        Token::Comma => self.advance()?,
                        Token::RightParen => {
                            self.advance()?;
                            matched = self.current_token == Token::Arrow;
                            break;
                        }
                        _ => break,
                    }
                }
                Token::RightParen if params.is_empty() => {
                    self.advance()?;
                    matched = self.current_token == Token::Arrow;
                    break;
                }
                _ => break,
            }
        }

        if matched {
            self.advance()?; // skip '=>'
            Ok(Some(params))
        } else {
            self.lexer.position = saved_position;
            self.current_token = saved_token;
            Ok(None)
        }
    }

    /// Parse `(arg, ...)` after a method name
    fn parse_arguments(&mut self) -> Result<Vec<AstNode>, ParserError> {
        self.expect(Token::LeftParen)?;

        let mut args = Vec::new();
        if self.current_token != Token::RightParen {
            loop {
                args.push(self.parse_expression(0)?);
                if self.current_token != Token::Comma {
                    break;
                }
                self.advance()?;
            }
        }

        self.expect(Token::RightParen)?;
        Ok(args)
    }

    /// Parse the member list of `new (...)` or `new { ... }`
    fn parse_new(&mut self) -> Result<AstNode, ParserError> {
        let close = match self.current_token {
            Token::LeftParen => Token::RightParen,
            Token::LeftBrace => Token::RightBrace,
            _ => {
                return Err(ParserError::Expected {
                    expected: "'(' or '{' after new".to_string(),
                    found: format!("{:?}", self.current_token),
                })
            }
        };
        self.advance()?;

        let mut members = Vec::new();
        if self.current_token != close {
            loop {
                members.push(self.parse_member_init()?);
                if self.current_token != Token::Comma {
                    break;
                }
                self.advance()?;
            }
        }
        self.expect(close)?;

        if members.is_empty() {
            return Err(ParserError::InvalidSyntax(
                "new requires at least one member".to_string(),
            ));
        }
        Ok(AstNode::New(members))
    }

    fn parse_member_init(&mut self) -> Result<MemberInit, ParserError> {
        // Name = expr
        if let Token::Identifier(name) = &self.current_token {
            let name = name.clone();
            let saved_position = self.lexer.position;
            let saved_token = self.current_token.clone();
            self.advance()?;
            if self.current_token == Token::Assign {
                self.advance()?;
                let value = self.parse_expression(0)?;
                return Ok(MemberInit {
                    name: Some(name),
                    value,
                });
            }
            self.lexer.position = saved_position;
            self.current_token = saved_token;
        }

        // expr [as Name]
        let value = self.parse_expression(0)?;
        let name = if self.current_token == Token::As {
            self.advance()?;
            Some(self.expect_identifier()?)
        } else {
            None
        };

        if name.is_none() && value.inferred_member_name().is_none() {
            return Err(ParserError::InvalidSyntax(
                "computed members of new need a name (expr as Name)".to_string(),
            ));
        }
        Ok(MemberInit { name, value })
    }

    /// Parse an expression with Pratt parsing
    fn parse_expression(&mut self, min_bp: u8) -> Result<AstNode, ParserError> {
        let mut lhs = self.parse_primary()?;

        loop {
            let (left_bp, right_bp) = match self.binding_power(&self.current_token) {
                Some(bp) => bp,
                None => break,
            };

            if left_bp < min_bp {
                break;
            }

            match &self.current_token {
                Token::Dot => {
                    self.advance()?;
                    let name = self.expect_identifier()?;
                    lhs = if self.current_token == Token::LeftParen {
                        let args = self.parse_arguments()?;
                        AstNode::Call {
                            target: Some(Box::new(lhs)),
                            name,
                            args,
                        }
                    } else {
                        AstNode::Member {
                            target: Box::new(lhs),
                            name,
                        }
                    };
                }
                Token::Question => {
                    self.advance()?;
                    let then_branch = self.parse_expression(0)?;
                    self.expect(Token::Colon)?;
                    let else_branch = self.parse_expression(right_bp)?;

                    lhs = AstNode::Conditional {
                        condition: Box::new(lhs),
                        then_branch: Box::new(then_branch),
                        else_branch: Box::new(else_branch),
                    };
                }
                _ => {
                    // Binary operators
                    let op = match &self.current_token {
                        Token::Plus => BinaryOp::Add,
                        Token::Minus => BinaryOp::Subtract,
                        Token::Star => BinaryOp::Multiply,
                        Token::Slash => BinaryOp::Divide,
                        Token::Percent => BinaryOp::Modulo,
                        Token::Equal | Token::Assign => BinaryOp::Equal,
                        Token::NotEqual => BinaryOp::NotEqual,
                        Token::LessThan => BinaryOp::LessThan,
                        Token::LessThanOrEqual => BinaryOp::LessThanOrEqual,
                        Token::GreaterThan => BinaryOp::GreaterThan,
                        Token::GreaterThanOrEqual => BinaryOp::GreaterThanOrEqual,
                        Token::And => BinaryOp::And,
                        Token::Or => BinaryOp::Or,
                        Token::Ampersand => BinaryOp::Concatenate,
                        Token::Coalesce => BinaryOp::Coalesce,
                        _ => {
                            return Err(ParserError::UnexpectedToken(format!(
                                "{:?}",
                                self.current_token
                            )))
                        }
                    };

                    self.advance()?;
                    let rhs = self.parse_expression(right_bp)?;

                    lhs = AstNode::Binary {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    };
                }
            }
        }

        Ok(lhs)
    }

    pub fn parse(&mut self) -> Result<AstNode, ParserError> {
        let ast = self.parse_expression(0)?;

        if self.current_token != Token::Eof {
            return Err(ParserError::Expected {
                expected: "end of expression".to_string(),
                found: format!("{:?}", self.current_token),
            });
        }

        Ok(ast)
    }
}

/// Parse expression text into an AST
pub fn parse(expression: &str) -> Result<AstNode, ParserError> {
    let mut parser = Parser::new(expression)?;
    parser.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Box<AstNode> {
        Box::new(AstNode::Identifier(name.to_string()))
    }

    // Lexer tests
    #[test]
    fn test_lexer_numbers() {
        let mut lexer = Lexer::new("42 3.25 2.5e10 7L 50.0d 9999999999");

        assert_eq!(lexer.next_token().unwrap(), Token::Integer(42));
        assert_eq!(lexer.next_token().unwrap(), Token::Float(3.25));
        assert_eq!(lexer.next_token().unwrap(), Token::Float(2.5e10));
        assert_eq!(lexer.next_token().unwrap(), Token::Long(7));
        assert_eq!(lexer.next_token().unwrap(), Token::Float(50.0));
        assert_eq!(lexer.next_token().unwrap(), Token::Integer(9_999_999_999));
        assert_eq!(lexer.next_token().unwrap(), Token::Eof);
    }

    #[test]
    fn test_lexer_operators() {
        let mut lexer = Lexer::new("== = <> != && || ?? => & !");
        let expected = [
            Token::Equal,
            Token::Assign,
            Token::NotEqual,
            Token::NotEqual,
            Token::And,
            Token::Or,
            Token::Coalesce,
            Token::Arrow,
            Token::Ampersand,
            Token::Not,
            Token::Eof,
        ];
        for token in expected {
            assert_eq!(lexer.next_token().unwrap(), token);
        }
    }

    #[test]
    fn test_lexer_placeholders() {
        let mut lexer = Lexer::new("@0 @12 @minId");
        assert_eq!(lexer.next_token().unwrap(), Token::Positional(0));
        assert_eq!(lexer.next_token().unwrap(), Token::Positional(12));
        assert_eq!(
            lexer.next_token().unwrap(),
            Token::Variable("minId".to_string())
        );
    }

    #[test]
    fn test_lexer_strings() {
        let mut lexer = Lexer::new(r#""No: " 'it\'s' "A""#);
        assert_eq!(lexer.next_token().unwrap(), Token::String("No: ".to_string()));
        assert_eq!(lexer.next_token().unwrap(), Token::String("it's".to_string()));
        assert_eq!(lexer.next_token().unwrap(), Token::String("A".to_string()));
    }

    #[test]
    fn test_lexer_errors() {
        assert!(matches!(
            Lexer::new("\"abc").next_token(),
            Err(ParserError::UnclosedString)
        ));
        assert!(matches!(
            Lexer::new("12abc").next_token(),
            Err(ParserError::InvalidNumber(_))
        ));
        assert!(matches!(
            Lexer::new("#").next_token(),
            Err(ParserError::UnexpectedToken(_))
        ));
    }

    // Parser tests
    #[test]
    fn test_parse_comparison() {
        let ast = parse("Id == 5").unwrap();
        assert_eq!(
            ast,
            AstNode::Binary {
                op: BinaryOp::Equal,
                lhs: ident("Id"),
                rhs: Box::new(AstNode::Integer(5)),
            }
        );
    }

    #[test]
    fn test_parse_precedence() {
        // Id + 10 - 50.0 > 0 parses as ((Id + 10) - 50.0) > 0
        let ast = parse("Id + 10 - 50.0 > 0").unwrap();
        match ast {
            AstNode::Binary {
                op: BinaryOp::GreaterThan,
                lhs,
                ..
            } => match *lhs {
                AstNode::Binary {
                    op: BinaryOp::Subtract,
                    lhs,
                    rhs,
                } => {
                    assert!(matches!(*lhs, AstNode::Binary { op: BinaryOp::Add, .. }));
                    assert_eq!(*rhs, AstNode::Float(50.0));
                }
                other => panic!("Expected subtraction, got {:?}", other),
            },
            other => panic!("Expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_logical_precedence() {
        // a || b && c parses as a || (b && c)
        let ast = parse("Id == 1 || Id > 2 && Id < 9").unwrap();
        match ast {
            AstNode::Binary {
                op: BinaryOp::Or,
                rhs,
                ..
            } => assert!(matches!(*rhs, AstNode::Binary { op: BinaryOp::And, .. })),
            other => panic!("Expected Or node, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_unary() {
        let ast = parse("!(-1 * -Id > 0)").unwrap();
        match ast {
            AstNode::Unary {
                op: UnaryOp::Not,
                operand,
            } => assert!(matches!(
                *operand,
                AstNode::Binary {
                    op: BinaryOp::GreaterThan,
                    ..
                }
            )),
            other => panic!("Expected Not node, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_ternary_and_coalesce() {
        let ast = parse("(Price ?? 0) > 10 ? \"big\" : \"small\"").unwrap();
        match ast {
            AstNode::Conditional { condition, .. } => match *condition {
                AstNode::Binary {
                    op: BinaryOp::GreaterThan,
                    lhs,
                    ..
                } => assert!(matches!(
                    *lhs,
                    AstNode::Binary {
                        op: BinaryOp::Coalesce,
                        ..
                    }
                )),
                other => panic!("Expected comparison, got {:?}", other),
            },
            other => panic!("Expected Conditional node, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_single_param_lambda() {
        let ast = parse("l => l.OrderId").unwrap();
        assert_eq!(
            ast,
            AstNode::Lambda {
                params: vec!["l".to_string()],
                body: Box::new(AstNode::Member {
                    target: ident("l"),
                    name: "OrderId".to_string(),
                }),
            }
        );
    }

    #[test]
    fn test_parse_multi_param_lambda() {
        let ast = parse("(k, ids) => ids.Count()").unwrap();
        assert_eq!(
            ast,
            AstNode::Lambda {
                params: vec!["k".to_string(), "ids".to_string()],
                body: Box::new(AstNode::Call {
                    target: Some(ident("ids")),
                    name: "Count".to_string(),
                    args: vec![],
                }),
            }
        );
    }

    #[test]
    fn test_parenthesized_expression_is_not_lambda() {
        let ast = parse("(a) + 1").unwrap();
        assert!(matches!(ast, AstNode::Binary { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn test_parse_nested_lambda_argument() {
        let ast = parse("Lines.Sum(l => l.Count ?? 0)").unwrap();
        match ast {
            AstNode::Call { name, args, .. } => {
                assert_eq!(name, "Sum");
                assert!(matches!(args[0], AstNode::Lambda { .. }));
            }
            other => panic!("Expected Call node, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_new() {
        let ast = parse("new (Id as OrderId, OrderNo)").unwrap();
        match ast {
            AstNode::New(members) => {
                assert_eq!(members.len(), 2);
                assert_eq!(members[0].name.as_deref(), Some("OrderId"));
                assert_eq!(members[1].name, None);
                assert_eq!(members[1].value.inferred_member_name(), Some("OrderNo"));
            }
            other => panic!("Expected New node, got {:?}", other),
        }

        let ast = parse("new { Total = Price * 2, Id }").unwrap();
        match ast {
            AstNode::New(members) => {
                assert_eq!(members[0].name.as_deref(), Some("Total"));
                assert!(matches!(members[0].value, AstNode::Binary { .. }));
            }
            other => panic!("Expected New node, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse("Id =="), Err(ParserError::UnexpectedEnd)));
        assert!(matches!(parse("(Id"), Err(ParserError::UnexpectedEnd)));
        assert!(matches!(parse("Id Id"), Err(ParserError::Expected { .. })));
        assert!(matches!(parse("new (Id + 1)"), Err(ParserError::InvalidSyntax(_))));
        assert!(parse("").is_err());
    }
}
