//! DynamoDB operations a compiled statement may issue.

use std::fmt;

/// Operation names, used to label requests in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamoDBOperation {
    /// Key-condition read against a table or index.
    Query,
    /// Full read of a table or index, optionally one segment of it.
    Scan,
    /// Chunked put/delete.
    BatchWriteItem,
}

impl DynamoDBOperation {
    /// Returns the AWS operation name string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "Query",
            Self::Scan => "Scan",
            Self::BatchWriteItem => "BatchWriteItem",
        }
    }

    /// Returns `true` for operations that only read.
    #[must_use]
    pub fn is_read(&self) -> bool {
        matches!(self, Self::Query | Self::Scan)
    }
}

impl fmt::Display for DynamoDBOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
