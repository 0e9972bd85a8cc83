//! SDK error mapping.
//!
//! Service errors keep their DynamoDB error code; everything the SDK raises
//! before or after talking to the service (construction, dispatch, timeout,
//! response decoding) becomes `TransportError`.

use std::fmt::Debug;

use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::scan::ScanError;
use dynasql_model::{DynamoDBError, DynamoDBErrorCode};

/// Map a Query SDK error to DynamoDBError.
pub fn map_query_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<QueryError, R>,
) -> DynamoDBError {
    if !matches!(err, SdkError::ServiceError(_)) {
        return transport_error(&err);
    }
    match err.into_service_error() {
        QueryError::ResourceNotFoundException(e) => {
            DynamoDBError::resource_not_found(e.message().unwrap_or("Table not found"))
                .with_source(e)
        }
        QueryError::ProvisionedThroughputExceededException(e) => {
            let message = e.message().unwrap_or("Throughput exceeded, please retry");
            DynamoDBError::throughput_exceeded(message).with_source(e)
        }
        err => from_metadata(err),
    }
}

/// Map a Scan SDK error to DynamoDBError.
pub fn map_scan_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<ScanError, R>,
) -> DynamoDBError {
    if !matches!(err, SdkError::ServiceError(_)) {
        return transport_error(&err);
    }
    match err.into_service_error() {
        ScanError::ResourceNotFoundException(e) => {
            DynamoDBError::resource_not_found(e.message().unwrap_or("Table not found"))
                .with_source(e)
        }
        ScanError::ProvisionedThroughputExceededException(e) => {
            let message = e.message().unwrap_or("Throughput exceeded, please retry");
            DynamoDBError::throughput_exceeded(message).with_source(e)
        }
        err => from_metadata(err),
    }
}

/// Map a BatchWriteItem SDK error to DynamoDBError.
pub fn map_batch_write_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<BatchWriteItemError, R>,
) -> DynamoDBError {
    if !matches!(err, SdkError::ServiceError(_)) {
        return transport_error(&err);
    }
    match err.into_service_error() {
        BatchWriteItemError::ResourceNotFoundException(e) => {
            DynamoDBError::resource_not_found(e.message().unwrap_or("Table not found"))
                .with_source(e)
        }
        BatchWriteItemError::ProvisionedThroughputExceededException(e) => {
            let message = e.message().unwrap_or("Throughput exceeded, please retry");
            DynamoDBError::throughput_exceeded(message).with_source(e)
        }
        BatchWriteItemError::ItemCollectionSizeLimitExceededException(e) => {
            DynamoDBError::with_message(
                DynamoDBErrorCode::ItemCollectionSizeLimitExceededException,
                e.message().unwrap_or("Item collection size limit exceeded"),
            )
            .with_source(e)
        }
        err => from_metadata(err),
    }
}

/// Use the error code carried in the response metadata.
fn from_metadata<E>(err: E) -> DynamoDBError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let code = err
        .code()
        .and_then(DynamoDBErrorCode::from_code)
        .unwrap_or(DynamoDBErrorCode::InternalServerError);
    let message = err
        .message()
        .map_or_else(|| DisplayErrorContext(&err).to_string(), str::to_owned);
    DynamoDBError::with_message(code, message).with_source(err)
}

fn transport_error<E, R>(err: &SdkError<E, R>) -> DynamoDBError
where
    E: std::error::Error + 'static,
    R: Debug,
{
    DynamoDBError::transport(DisplayErrorContext(err).to_string())
}
