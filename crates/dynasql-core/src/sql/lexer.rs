//! Tokenizer for the SELECT dialect.
//!
//! Keywords are matched case-insensitively. Option names such as `PageSize`
//! are left as identifiers and recognised by the parser, so they stay usable
//! as attribute names.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use crate::error::SyntaxError;

/// Lexer token.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    // Keywords
    Select,
    From,
    Where,
    And,
    Order,
    Asc,
    Desc,
    Limit,
    With,
    Begins,
    Between,
    Contains,
    Not,
    In,
    Is,
    Null,
    Count,
    Date,
    True,
    False,
    // Values
    Identifier(String),
    String(String),
    /// Decimal text as written.
    Number(String),
    // Punctuation and operators
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Star,
    Comma,
    LParen,
    RParen,
    Semicolon,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => f.write_str("SELECT"),
            Self::From => f.write_str("FROM"),
            Self::Where => f.write_str("WHERE"),
            Self::And => f.write_str("AND"),
            Self::Order => f.write_str("ORDER"),
            Self::Asc => f.write_str("ASC"),
            Self::Desc => f.write_str("DESC"),
            Self::Limit => f.write_str("LIMIT"),
            Self::With => f.write_str("WITH"),
            Self::Begins => f.write_str("BEGINS"),
            Self::Between => f.write_str("BETWEEN"),
            Self::Contains => f.write_str("CONTAINS"),
            Self::Not => f.write_str("NOT"),
            Self::In => f.write_str("IN"),
            Self::Is => f.write_str("IS"),
            Self::Null => f.write_str("NULL"),
            Self::Count => f.write_str("COUNT"),
            Self::Date => f.write_str("DATE"),
            Self::True => f.write_str("TRUE"),
            Self::False => f.write_str("FALSE"),
            Self::Identifier(s) => write!(f, "identifier '{s}'"),
            Self::String(s) => write!(f, "string {s:?}"),
            Self::Number(n) => write!(f, "number {n}"),
            Self::Eq => f.write_str("'='"),
            Self::Ne => f.write_str("'!='"),
            Self::Lt => f.write_str("'<'"),
            Self::Le => f.write_str("'<='"),
            Self::Gt => f.write_str("'>'"),
            Self::Ge => f.write_str("'>='"),
            Self::Star => f.write_str("'*'"),
            Self::Comma => f.write_str("','"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::Semicolon => f.write_str("';'"),
            Self::Eof => f.write_str("end of input"),
        }
    }
}

/// A token and the character offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub position: usize,
}

pub(crate) struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            pos: 0,
        }
    }

    /// Tokenize the whole input; the last token is always `Eof`.
    pub(crate) fn tokenize(mut self) -> Result<Vec<Spanned>, SyntaxError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let position = self.pos;
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(Spanned { token, position });
            if done {
                return Ok(tokens);
            }
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += 1;
        Some(c)
    }

    fn bump_if(&mut self, expected: char) -> bool {
        if self.chars.peek() == Some(&expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.bump();
        }
    }

    fn next_token(&mut self) -> Result<Token, SyntaxError> {
        let start = self.pos;
        let Some(c) = self.bump() else {
            return Ok(Token::Eof);
        };

        let token = match c {
            '*' => Token::Star,
            ',' => Token::Comma,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ';' => Token::Semicolon,
            '=' => Token::Eq,
            '!' if self.bump_if('=') => Token::Ne,
            '<' if self.bump_if('=') => Token::Le,
            '<' if self.bump_if('>') => Token::Ne,
            '<' => Token::Lt,
            '>' if self.bump_if('=') => Token::Ge,
            '>' => Token::Gt,
            '"' | '\'' => Token::String(self.read_string(c, start)?),
            '`' => Token::Identifier(self.read_quoted_identifier(start)?),
            '-' if self.chars.peek().is_some_and(char::is_ascii_digit) => {
                Token::Number(self.read_number('-', start)?)
            }
            c if c.is_ascii_digit() => Token::Number(self.read_number(c, start)?),
            c if is_ident_start(c) => self.read_identifier_or_keyword(c),
            other => {
                return Err(SyntaxError::new(
                    format!("unexpected character '{other}'"),
                    start,
                ));
            }
        };
        Ok(token)
    }

    fn read_string(&mut self, quote: char, start: usize) -> Result<String, SyntaxError> {
        let mut s = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(escaped) => s.push(escaped),
                    None => break,
                },
                Some(c) if c == quote => return Ok(s),
                Some(c) => s.push(c),
                None => break,
            }
        }
        Err(SyntaxError::new("unterminated string literal", start))
    }

    fn read_quoted_identifier(&mut self, start: usize) -> Result<String, SyntaxError> {
        let mut s = String::new();
        while let Some(c) = self.bump() {
            if c == '`' {
                if s.is_empty() {
                    break;
                }
                return Ok(s);
            }
            s.push(c);
        }
        Err(SyntaxError::new("unterminated or empty quoted identifier", start))
    }

    fn read_digits(&mut self, s: &mut String) {
        while let Some(&c) = self.chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            s.push(c);
            self.bump();
        }
    }

    /// Reads the rest of a numeric literal. A decimal point or exponent marker
    /// must be followed by at least one digit.
    fn read_number(&mut self, first: char, start: usize) -> Result<String, SyntaxError> {
        let mut s = String::from(first);
        self.read_digits(&mut s);
        if self.bump_if('.') {
            s.push('.');
            self.require_digits(&mut s, "expected digits after decimal point", start)?;
        }
        if let Some(&e) = self.chars.peek() {
            if e == 'e' || e == 'E' {
                s.push(e);
                self.bump();
                if let Some(&sign) = self.chars.peek() {
                    if sign == '+' || sign == '-' {
                        s.push(sign);
                        self.bump();
                    }
                }
                self.require_digits(&mut s, "expected digits in exponent", start)?;
            }
        }
        Ok(s)
    }

    fn require_digits(
        &mut self,
        s: &mut String,
        message: &str,
        start: usize,
    ) -> Result<(), SyntaxError> {
        let before = s.len();
        self.read_digits(s);
        if s.len() == before {
            return Err(SyntaxError::new(format!("{message} in '{s}'"), start));
        }
        Ok(())
    }

    fn read_identifier_or_keyword(&mut self, first: char) -> Token {
        let mut ident = String::from(first);
        while let Some(&c) = self.chars.peek() {
            if !is_ident_continue(c) {
                break;
            }
            ident.push(c);
            self.bump();
        }

        match ident.to_ascii_uppercase().as_str() {
            "SELECT" => Token::Select,
            "FROM" => Token::From,
            "WHERE" => Token::Where,
            "AND" => Token::And,
            "ORDER" => Token::Order,
            "ASC" => Token::Asc,
            "DESC" => Token::Desc,
            "LIMIT" => Token::Limit,
            "WITH" => Token::With,
            "BEGINS" => Token::Begins,
            "BETWEEN" => Token::Between,
            "CONTAINS" => Token::Contains,
            "NOT" => Token::Not,
            "IN" => Token::In,
            "IS" => Token::Is,
            "NULL" => Token::Null,
            "COUNT" => Token::Count,
            "DATE" => Token::Date,
            "TRUE" => Token::True,
            "FALSE" => Token::False,
            _ => Token::Identifier(ident),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_should_tokenize_keywords_case_insensitively() {
        assert_eq!(
            tokens("select * From t"),
            vec![
                Token::Select,
                Token::Star,
                Token::From,
                Token::Identifier("t".to_owned()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_should_tokenize_comparison_operators() {
        assert_eq!(
            tokens("= != <> < <= > >="),
            vec![
                Token::Eq,
                Token::Ne,
                Token::Ne,
                Token::Lt,
                Token::Le,
                Token::Gt,
                Token::Ge,
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_should_tokenize_both_quote_styles_with_escapes() {
        assert_eq!(
            tokens(r#""a \"b\"" 'it\'s'"#),
            vec![
                Token::String("a \"b\"".to_owned()),
                Token::String("it's".to_owned()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_should_tokenize_signed_and_exponent_numbers() {
        assert_eq!(
            tokens("-12.5 3e10 7"),
            vec![
                Token::Number("-12.5".to_owned()),
                Token::Number("3e10".to_owned()),
                Token::Number("7".to_owned()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_should_keep_dotted_and_quoted_identifiers() {
        assert_eq!(
            tokens("info.rating `Count`"),
            vec![
                Token::Identifier("info.rating".to_owned()),
                Token::Identifier("Count".to_owned()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_should_record_token_positions() {
        let spans = Lexer::new("SELECT  *").tokenize().unwrap();
        assert_eq!(spans[0].position, 0);
        assert_eq!(spans[1].position, 8);
        assert_eq!(spans[2].position, 9);
    }

    #[test]
    fn test_should_reject_unterminated_string() {
        let err = Lexer::new(r#"SELECT * FROM t WHERE a = "oops"#)
            .tokenize()
            .unwrap_err();
        assert_eq!(err.position, 26);
    }

    #[test]
    fn test_should_reject_unknown_character() {
        let err = Lexer::new("SELECT ?").tokenize().unwrap_err();
        assert_eq!(err.position, 7);
        assert!(err.message.contains('?'));
    }

    #[test]
    fn test_should_reject_numbers_missing_digits() {
        for (input, position) in [("a = 1e", 4), ("a = 3.", 4), ("a = 1e+", 4), ("-2.e5", 0)] {
            let err = Lexer::new(input).tokenize().unwrap_err();
            assert_eq!(err.position, position, "{input}");
            assert!(err.message.contains("expected digits"), "{input}: {}", err.message);
        }
    }

    #[test]
    fn test_should_accept_numbers_with_complete_parts() {
        assert_eq!(
            tokens("3.0 1e-2 2E+7"),
            vec![
                Token::Number("3.0".to_owned()),
                Token::Number("1e-2".to_owned()),
                Token::Number("2E+7".to_owned()),
                Token::Eof
            ]
        );
    }
}
