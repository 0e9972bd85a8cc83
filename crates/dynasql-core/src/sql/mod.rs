//! The SELECT dialect: lexer, AST and parser.
//!
//! ```text
//! SELECT * | COUNT(*) | a, b FROM table
//!   [WHERE pred [AND pred]*] [ORDER ASC|DESC] [LIMIT n]
//!   [WITH (NoConsistentRead, NoReturnedCapacity, PageSize(n), Segments(n), Index(name, bool))]
//! ```

pub mod ast;
mod lexer;
mod parser;

pub use ast::{
    IndexSelection, Literal, Operator, Predicate, Projection, SortOrder, Statement,
    StatementOptions,
};

use crate::error::SyntaxError;

/// Parse one statement.
///
/// Pure: the same input always yields the same `Statement` or the same error.
///
/// # Errors
///
/// Returns `SyntaxError` with the character offset of the offending token.
pub fn parse(input: &str) -> Result<Statement, SyntaxError> {
    parser::Parser::new(input)?.parse_statement()
}
