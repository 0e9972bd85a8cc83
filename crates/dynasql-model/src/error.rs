//! Errors reported by a DynamoDB backend.
//!
//! Both the in-memory backend and the AWS SDK backend normalise their
//! failures into [`DynamoDBError`] so the executor sees one error shape.

use std::fmt;

/// DynamoDB error codes a `Query`, `Scan` or `BatchWriteItem` can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum DynamoDBErrorCode {
    /// Table or index not found.
    ResourceNotFoundException,
    /// Provisioned throughput exceeded.
    ProvisionedThroughputExceededException,
    /// Account-level request limit exceeded.
    RequestLimitExceeded,
    /// Request throttled.
    ThrottlingException,
    /// Request rejected by the service's parameter validation.
    #[default]
    ValidationException,
    /// Item collection size limit exceeded.
    ItemCollectionSizeLimitExceededException,
    /// Caller lacks permission.
    AccessDeniedException,
    /// Credentials were not recognised.
    UnrecognizedClientException,
    /// Internal server error.
    InternalServerError,
    /// Transport, timeout or response decoding failure outside the service.
    TransportError,
}

impl DynamoDBErrorCode {
    /// Returns the short error code string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceNotFoundException => "ResourceNotFoundException",
            Self::ProvisionedThroughputExceededException => {
                "ProvisionedThroughputExceededException"
            }
            Self::RequestLimitExceeded => "RequestLimitExceeded",
            Self::ThrottlingException => "ThrottlingException",
            Self::ValidationException => "ValidationException",
            Self::ItemCollectionSizeLimitExceededException => {
                "ItemCollectionSizeLimitExceededException"
            }
            Self::AccessDeniedException => "AccessDeniedException",
            Self::UnrecognizedClientException => "UnrecognizedClientException",
            Self::InternalServerError => "InternalServerError",
            Self::TransportError => "TransportError",
        }
    }

    /// Parse a service error code, as carried in an SDK error's metadata.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        let code = match code {
            "ResourceNotFoundException" => Self::ResourceNotFoundException,
            "ProvisionedThroughputExceededException" => {
                Self::ProvisionedThroughputExceededException
            }
            "RequestLimitExceeded" => Self::RequestLimitExceeded,
            "ThrottlingException" => Self::ThrottlingException,
            "ValidationException" => Self::ValidationException,
            "ItemCollectionSizeLimitExceededException" => {
                Self::ItemCollectionSizeLimitExceededException
            }
            "AccessDeniedException" => Self::AccessDeniedException,
            "UnrecognizedClientException" => Self::UnrecognizedClientException,
            "InternalServerError" => Self::InternalServerError,
            _ => return None,
        };
        Some(code)
    }

    /// Returns `true` if a caller may reasonably retry the request later.
    ///
    /// The executor never retries; this is exposed for callers layering a
    /// retry policy on top.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProvisionedThroughputExceededException
                | Self::RequestLimitExceeded
                | Self::ThrottlingException
                | Self::InternalServerError
                | Self::TransportError
        )
    }
}

impl fmt::Display for DynamoDBErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error returned by a DynamoDB backend.
#[derive(Debug)]
pub struct DynamoDBError {
    /// The error code.
    pub code: DynamoDBErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// The underlying source error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for DynamoDBError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for DynamoDBError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl DynamoDBError {
    /// Create an error carrying only its code as message.
    #[must_use]
    pub fn new(code: DynamoDBErrorCode) -> Self {
        Self {
            message: code.as_str().to_owned(),
            code,
            source: None,
        }
    }

    /// Create an error with a custom message.
    #[must_use]
    pub fn with_message(code: DynamoDBErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Attach the underlying error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // -- Convenience constructors --

    #[must_use]
    pub fn resource_not_found(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::ResourceNotFoundException, message)
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::ValidationException, message)
    }

    #[must_use]
    pub fn throughput_exceeded(message: impl Into<String>) -> Self {
        Self::with_message(
            DynamoDBErrorCode::ProvisionedThroughputExceededException,
            message,
        )
    }

    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::InternalServerError, message)
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::TransportError, message)
    }
}

/// Create a `DynamoDBError` from an error code.
///
/// # Examples
///
/// ```
/// use dynasql_model::dynamodb_error;
/// use dynasql_model::error::DynamoDBErrorCode;
///
/// let err = dynamodb_error!(ValidationException);
/// assert_eq!(err.code, DynamoDBErrorCode::ValidationException);
///
/// let err = dynamodb_error!(ResourceNotFoundException, "Table not found");
/// assert_eq!(err.message, "Table not found");
/// ```
#[macro_export]
macro_rules! dynamodb_error {
    ($code:ident) => {
        $crate::error::DynamoDBError::new($crate::error::DynamoDBErrorCode::$code)
    };
    ($code:ident, $msg:expr) => {
        $crate::error::DynamoDBError::with_message($crate::error::DynamoDBErrorCode::$code, $msg)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_known_service_codes() {
        assert_eq!(
            DynamoDBErrorCode::from_code("ThrottlingException"),
            Some(DynamoDBErrorCode::ThrottlingException)
        );
        assert_eq!(DynamoDBErrorCode::from_code("SomethingElse"), None);
    }

    #[test]
    fn test_should_classify_throttling_as_retryable() {
        assert!(DynamoDBErrorCode::ProvisionedThroughputExceededException.is_retryable());
        assert!(!DynamoDBErrorCode::ValidationException.is_retryable());
        assert!(!DynamoDBErrorCode::ResourceNotFoundException.is_retryable());
    }

    #[test]
    fn test_should_display_code_and_message() {
        let err = DynamoDBError::resource_not_found("Requested resource not found: Table: T");
        assert_eq!(
            err.to_string(),
            "ResourceNotFoundException: Requested resource not found: Table: T"
        );
    }
}
