//! Error types for every stage of the pipeline.
//!
//! Parse and validation failures are caller bugs and are never retried.
//! Backend failures arrive as [`DynamoDBError`] and are wrapped with the
//! operation that produced them.

use dynasql_model::types::ScalarAttributeType;
use dynasql_model::{DynamoDBError, DynamoDBErrorCode, DynamoDBOperation};

use crate::expression::ExpressionError;
use crate::sql::ast::Operator;

/// Malformed statement text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("syntax error at position {position}: {message}")]
pub struct SyntaxError {
    pub message: String,
    /// Character offset of the offending token.
    pub position: usize,
}

impl SyntaxError {
    pub(crate) fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

/// A well-formed statement that is not legal against the table's schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("statement reads table '{found}' but the schema describes '{expected}'")]
    TableMismatch { expected: String, found: String },

    #[error("table '{table}' has no index named '{index}'")]
    UnknownIndex { table: String, index: String },

    #[error("a Query requires an equality condition on hash key '{key}'")]
    MissingHashKeyCondition { key: String },

    #[error("key attribute '{attribute}' has more than one condition")]
    DuplicateKeyCondition { attribute: String },

    #[error("operator {operator} is not allowed on key attribute '{attribute}' in a Query")]
    UnsupportedKeyOperator {
        attribute: String,
        operator: Operator,
    },

    #[error(
        "index '{index}' cannot serve this statement: \
         its hash key '{hash_key}' has no equality condition"
    )]
    IndexKeyMismatch { index: String, hash_key: String },

    #[error("key attribute '{attribute}' has type {expected} but was compared with a {found}")]
    KeyTypeMismatch {
        attribute: String,
        expected: ScalarAttributeType,
        found: &'static str,
    },

    #[error("{operator} on '{attribute}' takes {expected}")]
    InvalidOperand {
        attribute: String,
        operator: Operator,
        expected: &'static str,
    },

    #[error("invalid date literal '{value}'")]
    InvalidDate { value: String },

    #[error("ORDER is only supported for a Query")]
    OrderRequiresQuery,

    #[error("Index({index}, true) fetches table attributes and is only supported for a Query")]
    IndexAllAttributesRequiresQuery { index: String },

    #[error("Segments is only supported for a Scan")]
    SegmentsRequireScan,

    #[error(
        "global secondary index '{index}' does not support consistent reads; add NoConsistentRead"
    )]
    ConsistentReadOnGlobalIndex { index: String },

    #[error(
        "global secondary index '{index}' does not project every attribute; \
         use Index({index}, false)"
    )]
    GlobalIndexProjection { index: String },

    #[error("invalid {option}: {message}")]
    InvalidOption {
        option: &'static str,
        message: String,
    },
}

/// A backend call failed.
#[derive(Debug, thiserror::Error)]
#[error("{operation} on '{table}' failed: {source}")]
pub struct ExecutionError {
    pub operation: DynamoDBOperation,
    pub table: String,
    #[source]
    pub source: DynamoDBError,
}

/// An item could not be decoded into, or encoded from, a typed record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("attribute '{attribute}' is missing")]
    Missing { attribute: String },

    #[error("attribute '{attribute}' should be {expected} but is {found}")]
    TypeMismatch {
        attribute: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("attribute '{attribute}' is invalid: {message}")]
    Invalid { attribute: String, message: String },
}

/// Top-level error returned by the [`DynamoSql`](crate::context::DynamoSql) façade.
#[derive(Debug, thiserror::Error)]
pub enum DynaSqlError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("no schema registered for table '{0}'")]
    UnknownTable(String),
}

impl DynaSqlError {
    /// Returns `true` for errors caused by the statement itself.
    #[must_use]
    pub fn is_statement_error(&self) -> bool {
        matches!(self, Self::Syntax(_) | Self::Validation(_) | Self::UnknownTable(_))
    }
}

/// Convert an expression error raised by the in-memory backend into the
/// `ValidationException` DynamoDB would return.
///
/// Takes `e` by value because this is used as a closure argument to `.map_err()`.
#[must_use]
#[allow(clippy::needless_pass_by_value)]
pub fn expression_error_to_dynamodb(e: ExpressionError) -> DynamoDBError {
    DynamoDBError::with_message(DynamoDBErrorCode::ValidationException, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_report_syntax_position() {
        let err = SyntaxError::new("expected FROM, found WHERE", 9);
        assert_eq!(
            err.to_string(),
            "syntax error at position 9: expected FROM, found WHERE"
        );
    }

    #[test]
    fn test_should_classify_statement_errors() {
        let err: DynaSqlError = ValidationError::OrderRequiresQuery.into();
        assert!(err.is_statement_error());

        let err: DynaSqlError = ExecutionError {
            operation: DynamoDBOperation::Query,
            table: "GameScores".to_owned(),
            source: DynamoDBError::internal_error("boom"),
        }
        .into();
        assert!(!err.is_statement_error());
        assert_eq!(
            err.to_string(),
            "Query on 'GameScores' failed: InternalServerError: boom"
        );
    }
}
