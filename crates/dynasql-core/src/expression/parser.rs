//! Lexer and recursive-descent parser for condition and projection expressions.
//!
//! Keywords and function names are matched case-insensitively.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use super::ast::{AttributePath, CompareOp, Expr, FunctionName, LogicalOp, Operand};

/// Errors produced while parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    #[error("Unexpected token: expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("Unresolved expression attribute name: {name}")]
    UnresolvedName { name: String },

    #[error("Unresolved expression attribute value: {name}")]
    UnresolvedValue { name: String },

    #[error("Value provided in ExpressionAttribute{kind} unused in expressions: {name}")]
    Unused { kind: &'static str, name: String },

    #[error("Invalid operand for {operation}: {message}")]
    InvalidOperand { operation: String, message: String },

    #[error("Type mismatch: {message}")]
    TypeMismatch { message: String },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    /// `#name`, stored without the `#`.
    Name(String),
    /// `:value`, stored without the `:`.
    Value(String),
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Dot,
    Comma,
    LParen,
    RParen,
    And,
    Or,
    Not,
    Between,
    In,
    Function(FunctionName),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(s) => write!(f, "identifier '{s}'"),
            Self::Name(s) => write!(f, "#{s}"),
            Self::Value(s) => write!(f, ":{s}"),
            Self::Eq => f.write_str("'='"),
            Self::Ne => f.write_str("'<>'"),
            Self::Lt => f.write_str("'<'"),
            Self::Le => f.write_str("'<='"),
            Self::Gt => f.write_str("'>'"),
            Self::Ge => f.write_str("'>='"),
            Self::Dot => f.write_str("'.'"),
            Self::Comma => f.write_str("','"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::And => f.write_str("AND"),
            Self::Or => f.write_str("OR"),
            Self::Not => f.write_str("NOT"),
            Self::Between => f.write_str("BETWEEN"),
            Self::In => f.write_str("IN"),
            Self::Function(name) => write!(f, "{name}"),
            Self::Eof => f.write_str("EOF"),
        }
    }
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, ExpressionError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok == Token::Eof;
            tokens.push(tok);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn bump_if(&mut self, c: char) -> bool {
        self.chars.next_if_eq(&c).is_some()
    }

    fn next_token(&mut self) -> Result<Token, ExpressionError> {
        while self.chars.next_if(char::is_ascii_whitespace).is_some() {}

        let Some(ch) = self.chars.next() else {
            return Ok(Token::Eof);
        };

        let tok = match ch {
            '#' => Token::Name(self.placeholder('#')?),
            ':' => Token::Value(self.placeholder(':')?),
            '=' => Token::Eq,
            '<' if self.bump_if('=') => Token::Le,
            '<' if self.bump_if('>') => Token::Ne,
            '<' => Token::Lt,
            '>' if self.bump_if('=') => Token::Ge,
            '>' => Token::Gt,
            '.' => Token::Dot,
            ',' => Token::Comma,
            '(' => Token::LParen,
            ')' => Token::RParen,
            c if is_ident_start(c) => {
                let mut ident = String::from(c);
                ident.push_str(&self.ident_chars());
                keyword(ident)
            }
            other => {
                return Err(ExpressionError::UnexpectedToken {
                    expected: "valid token".to_owned(),
                    found: format!("'{other}'"),
                });
            }
        };
        Ok(tok)
    }

    fn placeholder(&mut self, sigil: char) -> Result<String, ExpressionError> {
        let name = self.ident_chars();
        if name.is_empty() {
            return Err(ExpressionError::UnexpectedToken {
                expected: format!("name after '{sigil}'"),
                found: "empty".to_owned(),
            });
        }
        Ok(name)
    }

    fn ident_chars(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.chars.next_if(|c| is_ident_continue(*c)) {
            s.push(c);
        }
        s
    }
}

fn keyword(ident: String) -> Token {
    match ident.to_ascii_lowercase().as_str() {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "between" => Token::Between,
        "in" => Token::In,
        "attribute_exists" => Token::Function(FunctionName::AttributeExists),
        "attribute_not_exists" => Token::Function(FunctionName::AttributeNotExists),
        "begins_with" => Token::Function(FunctionName::BeginsWith),
        "contains" => Token::Function(FunctionName::Contains),
        _ => Token::Identifier(ident),
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Result<Self, ExpressionError> {
        Ok(Self {
            tokens: Lexer::new(input).tokenize()?,
            pos: 0,
        })
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ExpressionError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.unexpected(&expected.to_string()))
        }
    }

    fn unexpected(&self, expected: &str) -> ExpressionError {
        ExpressionError::UnexpectedToken {
            expected: expected.to_owned(),
            found: self.peek().to_string(),
        }
    }

    fn finish<T>(&self, value: T) -> Result<T, ExpressionError> {
        if matches!(self.peek(), Token::Eof) {
            Ok(value)
        } else {
            Err(self.unexpected("end of expression"))
        }
    }

    // OR binds loosest, then AND, then NOT.
    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_not()?;
        while self.eat(&Token::And) {
            let right = self.parse_not()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&Token::LParen) {
            let expr = self.parse_or()?;
            self.expect(&Token::RParen)?;
            return Ok(expr);
        }
        if let Token::Function(name) = *self.peek() {
            self.pos += 1;
            return self.parse_function(name);
        }
        let left = self.parse_operand()?;
        self.parse_postfix(left)
    }

    fn parse_function(&mut self, name: FunctionName) -> Result<Expr, ExpressionError> {
        self.expect(&Token::LParen)?;
        let args = self.parse_operand_list()?;
        self.expect(&Token::RParen)?;
        if args.len() != name.arity() {
            return Err(ExpressionError::InvalidOperand {
                operation: name.to_string(),
                message: format!("expected {} argument(s), found {}", name.arity(), args.len()),
            });
        }
        if !matches!(args.first(), Some(Operand::Path(_))) {
            return Err(ExpressionError::InvalidOperand {
                operation: name.to_string(),
                message: "first argument must be an attribute path".to_owned(),
            });
        }
        Ok(Expr::Function { name, args })
    }

    fn parse_postfix(&mut self, left: Operand) -> Result<Expr, ExpressionError> {
        let op = match self.peek() {
            Token::Eq => CompareOp::Eq,
            Token::Ne => CompareOp::Ne,
            Token::Lt => CompareOp::Lt,
            Token::Le => CompareOp::Le,
            Token::Gt => CompareOp::Gt,
            Token::Ge => CompareOp::Ge,
            Token::Between => {
                self.pos += 1;
                let low = self.parse_operand()?;
                self.expect(&Token::And)?;
                let high = self.parse_operand()?;
                return Ok(Expr::Between {
                    value: left,
                    low,
                    high,
                });
            }
            Token::In => {
                self.pos += 1;
                self.expect(&Token::LParen)?;
                let list = self.parse_operand_list()?;
                self.expect(&Token::RParen)?;
                return Ok(Expr::In { value: left, list });
            }
            _ => return Err(self.unexpected("comparison operator, BETWEEN, or IN")),
        };
        self.pos += 1;
        let right = self.parse_operand()?;
        Ok(Expr::Compare { left, op, right })
    }

    fn parse_operand_list(&mut self) -> Result<Vec<Operand>, ExpressionError> {
        let mut list = vec![self.parse_operand()?];
        while self.eat(&Token::Comma) {
            list.push(self.parse_operand()?);
        }
        Ok(list)
    }

    fn parse_operand(&mut self) -> Result<Operand, ExpressionError> {
        if let Token::Value(name) = self.peek() {
            let name = name.clone();
            self.pos += 1;
            return Ok(Operand::Value(name));
        }
        self.parse_path().map(Operand::Path)
    }

    fn parse_path(&mut self) -> Result<AttributePath, ExpressionError> {
        let mut segments = vec![self.parse_segment()?];
        while self.eat(&Token::Dot) {
            segments.push(self.parse_segment()?);
        }
        Ok(AttributePath { segments })
    }

    fn parse_segment(&mut self) -> Result<String, ExpressionError> {
        match self.advance() {
            Token::Identifier(name) => Ok(name),
            Token::Name(name) => Ok(format!("#{name}")),
            tok => Err(ExpressionError::UnexpectedToken {
                expected: "attribute name or #name".to_owned(),
                found: tok.to_string(),
            }),
        }
    }
}

/// Parse a key-condition or filter expression.
///
/// # Errors
///
/// Returns `ExpressionError` if the expression is syntactically invalid.
pub fn parse_condition(input: &str) -> Result<Expr, ExpressionError> {
    let mut parser = Parser::new(input)?;
    let expr = parser.parse_or()?;
    parser.finish(expr)
}

/// Parse a projection expression (comma-separated attribute paths).
///
/// # Errors
///
/// Returns `ExpressionError` if the expression is syntactically invalid.
pub fn parse_projection(input: &str) -> Result<Vec<AttributePath>, ExpressionError> {
    let mut parser = Parser::new(input)?;
    let mut paths = vec![parser.parse_path()?];
    while parser.eat(&Token::Comma) {
        paths.push(parser.parse_path()?);
    }
    parser.finish(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> Operand {
        Operand::Path(AttributePath {
            segments: vec![s.to_owned()],
        })
    }

    #[test]
    fn test_should_parse_key_condition_with_begins_with() {
        let expr = parse_condition("#n0 = :v0 AND begins_with(#n1, :v1)").unwrap();
        let parts = expr.conjuncts();
        assert_eq!(parts.len(), 2);
        assert_eq!(
            parts[0],
            &Expr::Compare {
                left: path("#n0"),
                op: CompareOp::Eq,
                right: Operand::Value("v0".to_owned()),
            }
        );
        assert!(matches!(
            parts[1],
            Expr::Function {
                name: FunctionName::BeginsWith,
                ..
            }
        ));
    }

    #[test]
    fn test_should_bind_and_tighter_than_or() {
        let expr = parse_condition("a = :a OR b = :b AND c = :c").unwrap();
        let Expr::Logical { op, right, .. } = &expr else {
            panic!("expected logical, got {expr:?}");
        };
        assert_eq!(*op, LogicalOp::Or);
        assert!(matches!(**right, Expr::Logical { op: LogicalOp::And, .. }));
        assert_eq!(expr.conjuncts().len(), 1);
    }

    #[test]
    fn test_should_parse_between_in_and_not() {
        let expr =
            parse_condition("#a BETWEEN :lo AND :hi AND #b IN (:x, :y) AND NOT contains(#c, :z)")
                .unwrap();
        let parts = expr.conjuncts();
        assert!(matches!(parts[0], Expr::Between { .. }));
        assert!(matches!(parts[1], Expr::In { list, .. } if list.len() == 2));
        assert!(matches!(parts[2], Expr::Not(_)));
    }

    #[test]
    fn test_should_match_keywords_case_insensitively() {
        assert!(parse_condition("ATTRIBUTE_EXISTS(#a) and #b <> :b").is_ok());
    }

    #[test]
    fn test_should_parse_projection_paths() {
        let paths = parse_projection("#n0, Wins, info.rating").unwrap();
        assert_eq!(paths.len(), 3);
        assert_eq!(paths[2].to_string(), "info.rating");
    }

    #[test]
    fn test_should_reject_malformed_expressions() {
        assert!(parse_condition("#a =").is_err());
        assert!(parse_condition("#a = :a extra").is_err());
        assert!(parse_condition("begins_with(:v, #a)").is_err());
        assert!(parse_condition("attribute_exists(#a, #b)").is_err());
        assert!(parse_condition("#a ! :b").is_err());
        assert!(parse_projection("#a,").is_err());
    }
}
