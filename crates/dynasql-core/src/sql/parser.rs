//! Recursive-descent parser for the SELECT dialect.

use crate::error::SyntaxError;

use super::ast::{
    IndexSelection, Literal, Operator, Predicate, Projection, SortOrder, Statement,
    StatementOptions,
};
use super::lexer::{Lexer, Spanned, Token};

pub(crate) struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

// ---------------------------------------------------------------------------
// Token cursor
// ---------------------------------------------------------------------------

impl Parser {
    pub(crate) fn new(input: &str) -> Result<Self, SyntaxError> {
        Ok(Self {
            tokens: Lexer::new(input).tokenize()?,
            pos: 0,
        })
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).map_or(&Token::Eof, |s| &s.token)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(0, |s| s.position)
    }

    fn advance(&mut self) -> Token {
        let tok = self
            .tokens
            .get(self.pos)
            .map_or(Token::Eof, |s| s.token.clone());
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

    fn expect(&mut self, expected: &Token) -> Result<(), SyntaxError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.unexpected(&expected.to_string()))
        }
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        SyntaxError::new(
            format!("expected {expected}, found {}", self.peek()),
            self.position(),
        )
    }

    fn identifier(&mut self, what: &str) -> Result<String, SyntaxError> {
        if let Token::Identifier(name) = self.peek() {
            let name = name.clone();
            self.pos += 1;
            Ok(name)
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unsigned(&mut self, what: &str) -> Result<u32, SyntaxError> {
        let position = self.position();
        match self.peek() {
            Token::Number(n) => {
                let value = n.parse::<u32>().map_err(|_| {
                    SyntaxError::new(
                        format!("{what} must be a non-negative integer, found {n}"),
                        position,
                    )
                })?;
                self.pos += 1;
                Ok(value)
            }
            _ => Err(self.unexpected(what)),
        }
    }
}

// ---------------------------------------------------------------------------
// Statement
// ---------------------------------------------------------------------------

impl Parser {
    pub(crate) fn parse_statement(&mut self) -> Result<Statement, SyntaxError> {
        self.expect(&Token::Select)?;
        let projection = self.parse_projection()?;
        self.expect(&Token::From)?;
        let table = self.identifier("table name")?;

        let mut predicates = Vec::new();
        if self.eat(&Token::Where) {
            predicates.push(self.parse_predicate()?);
            while self.eat(&Token::And) {
                predicates.push(self.parse_predicate()?);
            }
        }

        let order = if self.eat(&Token::Order) {
            match self.advance() {
                Token::Asc => Some(SortOrder::Asc),
                Token::Desc => Some(SortOrder::Desc),
                _ => {
                    self.pos -= 1;
                    return Err(self.unexpected("ASC or DESC"));
                }
            }
        } else {
            None
        };

        let limit = if self.eat(&Token::Limit) {
            Some(self.unsigned("LIMIT")?)
        } else {
            None
        };

        let options = if self.eat(&Token::With) {
            self.parse_options()?
        } else {
            StatementOptions::default()
        };

        self.eat(&Token::Semicolon);
        if *self.peek() != Token::Eof {
            return Err(self.unexpected("end of statement"));
        }

        Ok(Statement {
            table,
            projection,
            predicates,
            order,
            limit,
            options,
        })
    }

    fn parse_projection(&mut self) -> Result<Projection, SyntaxError> {
        if self.eat(&Token::Star) {
            return Ok(Projection::All);
        }
        if self.eat(&Token::Count) {
            self.expect(&Token::LParen)?;
            self.expect(&Token::Star)?;
            self.expect(&Token::RParen)?;
            return Ok(Projection::Count);
        }

        let mut attributes = vec![self.identifier("'*', COUNT(*) or attribute name")?];
        while self.eat(&Token::Comma) {
            let position = self.position();
            let name = self.identifier("attribute name")?;
            if attributes.contains(&name) {
                return Err(SyntaxError::new(
                    format!("attribute '{name}' is selected twice"),
                    position,
                ));
            }
            attributes.push(name);
        }
        Ok(Projection::Attributes(attributes))
    }
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

impl Parser {
    fn parse_predicate(&mut self) -> Result<Predicate, SyntaxError> {
        let position = self.position();
        let attribute = self.identifier("attribute name")?;

        let (operator, operands) = match self.advance() {
            Token::Eq => (Operator::Eq, vec![self.parse_literal()?]),
            Token::Ne => (Operator::Ne, vec![self.parse_literal()?]),
            Token::Lt => (Operator::Lt, vec![self.parse_literal()?]),
            Token::Le => (Operator::Le, vec![self.parse_literal()?]),
            Token::Gt => (Operator::Gt, vec![self.parse_literal()?]),
            Token::Ge => (Operator::Ge, vec![self.parse_literal()?]),
            Token::Begins => {
                self.expect(&Token::With)?;
                let prefix_position = self.position();
                let prefix = self.parse_literal()?;
                if !matches!(prefix, Literal::String(_)) {
                    return Err(SyntaxError::new(
                        "BEGINS WITH takes a string literal",
                        prefix_position,
                    ));
                }
                (Operator::BeginsWith, vec![prefix])
            }
            Token::Between => {
                let low = self.parse_literal()?;
                self.expect(&Token::And)?;
                let high = self.parse_literal()?;
                (Operator::Between, vec![low, high])
            }
            Token::Contains => (Operator::Contains, vec![self.parse_literal()?]),
            Token::Not => {
                self.expect(&Token::Contains)?;
                (Operator::NotContains, vec![self.parse_literal()?])
            }
            Token::In => {
                self.expect(&Token::LParen)?;
                let mut list = vec![self.parse_literal()?];
                while self.eat(&Token::Comma) {
                    list.push(self.parse_literal()?);
                }
                self.expect(&Token::RParen)?;
                (Operator::In, list)
            }
            Token::Is => {
                let operator = if self.eat(&Token::Not) {
                    Operator::IsNotNull
                } else {
                    Operator::IsNull
                };
                self.expect(&Token::Null)?;
                (operator, Vec::new())
            }
            _ => {
                self.pos -= 1;
                return Err(self.unexpected("comparison operator"));
            }
        };

        Ok(Predicate {
            attribute,
            operator,
            operands,
            position,
        })
    }

    fn parse_literal(&mut self) -> Result<Literal, SyntaxError> {
        let literal = match self.peek() {
            Token::String(s) => Literal::String(s.clone()),
            Token::Number(n) => Literal::Number(n.clone()),
            Token::True => Literal::Bool(true),
            Token::False => Literal::Bool(false),
            Token::Date => {
                self.pos += 1;
                return match self.peek() {
                    Token::String(s) => {
                        let literal = Literal::Date(s.clone());
                        self.pos += 1;
                        Ok(literal)
                    }
                    _ => Err(self.unexpected("date string after DATE")),
                };
            }
            _ => return Err(self.unexpected("literal")),
        };
        self.pos += 1;
        Ok(literal)
    }
}

// ---------------------------------------------------------------------------
// WITH options
// ---------------------------------------------------------------------------

impl Parser {
    fn parse_options(&mut self) -> Result<StatementOptions, SyntaxError> {
        let mut options = StatementOptions::default();
        let mut seen: Vec<String> = Vec::new();

        self.expect(&Token::LParen)?;
        loop {
            let position = self.position();
            let name = self.identifier("option name")?;
            let key = name.to_ascii_lowercase();
            if seen.contains(&key) {
                return Err(SyntaxError::new(
                    format!("option {name} given more than once"),
                    position,
                ));
            }

            match key.as_str() {
                "noconsistentread" => options.consistent_read = false,
                "noreturnedcapacity" => options.return_consumed_capacity = false,
                "pagesize" => options.page_size = Some(self.parenthesized_unsigned("PageSize")?),
                "segments" => options.segments = Some(self.parenthesized_unsigned("Segments")?),
                "index" => options.index = Some(self.parse_index_option()?),
                _ => {
                    return Err(SyntaxError::new(
                        format!("unknown option '{name}'"),
                        position,
                    ));
                }
            }
            seen.push(key);

            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Ok(options)
    }

    fn parenthesized_unsigned(&mut self, what: &str) -> Result<u32, SyntaxError> {
        self.expect(&Token::LParen)?;
        let value = self.unsigned(what)?;
        self.expect(&Token::RParen)?;
        Ok(value)
    }

    fn parse_index_option(&mut self) -> Result<IndexSelection, SyntaxError> {
        self.expect(&Token::LParen)?;
        let name = self.identifier("index name")?;
        self.expect(&Token::Comma)?;
        let all_attributes = match self.advance() {
            Token::True => true,
            Token::False => false,
            _ => {
                self.pos -= 1;
                return Err(self.unexpected("true or false"));
            }
        };
        self.expect(&Token::RParen)?;
        Ok(IndexSelection {
            name,
            all_attributes,
        })
    }
}
