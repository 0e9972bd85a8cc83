//! The seam between the compiler and a DynamoDB implementation.
//!
//! The trait uses `#[async_trait]` so it stays object-safe; callers may hold a
//! `Arc<dyn DynamoDbApi>` as well as a concrete client.

use std::sync::Arc;

use dynasql_model::DynamoDBError;
use dynasql_model::input::{BatchWriteItemInput, QueryInput, ScanInput};
use dynasql_model::output::{BatchWriteItemOutput, QueryOutput, ScanOutput};

/// The three DynamoDB operations a compiled statement or batch write issues.
#[async_trait::async_trait]
pub trait DynamoDbApi: Send + Sync {
    async fn query(&self, input: QueryInput) -> Result<QueryOutput, DynamoDBError>;

    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, DynamoDBError>;

    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, DynamoDBError>;
}

#[async_trait::async_trait]
impl<T: DynamoDbApi + ?Sized> DynamoDbApi for Arc<T> {
    async fn query(&self, input: QueryInput) -> Result<QueryOutput, DynamoDBError> {
        (**self).query(input).await
    }

    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, DynamoDBError> {
        (**self).scan(input).await
    }

    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, DynamoDBError> {
        (**self).batch_write_item(input).await
    }
}
