//! Batch-write chunking.
//!
//! Items are split into `BatchWriteItem` calls of at most
//! [`DynaSqlConfig::batch_write_size`] puts (never more than
//! [`MAX_BATCH_WRITE`]) and sent with bounded concurrency. Items the service
//! hands back as unprocessed, and chunks whose call failed, are reported,
//! not retried.

use std::collections::HashMap;

use dynasql_model::DynamoDBOperation;
use dynasql_model::input::BatchWriteItemInput;
use dynasql_model::types::{ConsumedCapacity, Item, ReturnConsumedCapacity, WriteRequest};
use futures::{StreamExt, stream};
use tracing::{debug, warn};

use crate::client::DynamoDbApi;
use crate::config::DynaSqlConfig;
use crate::error::ExecutionError;

/// Most write requests one `BatchWriteItem` call may carry.
pub const MAX_BATCH_WRITE: usize = 25;

/// A chunk whose `BatchWriteItem` call failed; none of its items were written.
#[derive(Debug)]
pub struct FailedChunk {
    pub items: Vec<Item>,
    pub error: ExecutionError,
}

/// Outcome of a chunked batch write.
#[derive(Debug, Default)]
pub struct BatchWriteReport {
    /// Items the service accepted.
    pub written: usize,
    /// `BatchWriteItem` calls made, failed ones included.
    pub requests: usize,
    /// Items returned as unprocessed, in no particular order.
    pub unprocessed: Vec<Item>,
    /// Chunks whose call failed outright.
    pub failed: Vec<FailedChunk>,
    pub consumed_capacity: Option<ConsumedCapacity>,
}

impl BatchWriteReport {
    /// Returns `true` if every item was written.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unprocessed.is_empty() && self.failed.is_empty()
    }

    /// Items that were not written, unprocessed and failed together.
    #[must_use]
    pub fn not_written(&self) -> usize {
        self.unprocessed.len() + self.failed.iter().map(|f| f.items.len()).sum::<usize>()
    }
}

/// Put `items` into `table` in chunks.
///
/// Every chunk is attempted. A failing call does not abort the others: its
/// items and error land in [`BatchWriteReport::failed`], and chunks already
/// acknowledged stay written.
pub async fn batch_put<C: DynamoDbApi + ?Sized>(
    client: &C,
    table: &str,
    items: Vec<Item>,
    config: &DynaSqlConfig,
) -> BatchWriteReport {
    if items.is_empty() {
        return BatchWriteReport::default();
    }

    let chunk_size = config.batch_write_size.clamp(1, MAX_BATCH_WRITE);
    let mut chunks: Vec<Vec<Item>> = Vec::with_capacity(items.len().div_ceil(chunk_size));
    let mut items = items.into_iter().peekable();
    while items.peek().is_some() {
        chunks.push(items.by_ref().take(chunk_size).collect());
    }
    let concurrency = chunks.len().min(config.batch_concurrency).max(1);
    debug!(table, chunks = chunks.len(), chunk_size, concurrency, "writing batch");

    let requests = stream::iter(chunks.into_iter().map(|chunk| {
        let input = BatchWriteItemInput {
            request_items: HashMap::from([(
                table.to_owned(),
                chunk.iter().cloned().map(WriteRequest::put).collect(),
            )]),
            return_consumed_capacity: Some(ReturnConsumedCapacity::Total),
        };
        async move {
            let result = client.batch_write_item(input).await;
            (chunk, result)
        }
    }));

    let report = requests
        .buffer_unordered(concurrency)
        .fold(BatchWriteReport::default(), |mut report, (chunk, result)| async move {
            report.requests += 1;
            let output = match result {
                Ok(output) => output,
                Err(source) => {
                    warn!(table, items = chunk.len(), error = %source, "batch write chunk failed");
                    report.failed.push(FailedChunk {
                        items: chunk,
                        error: ExecutionError {
                            operation: DynamoDBOperation::BatchWriteItem,
                            table: table.to_owned(),
                            source,
                        },
                    });
                    return report;
                }
            };
            let unprocessed: Vec<Item> = output
                .unprocessed_items
                .into_values()
                .flatten()
                .filter_map(|request| request.put_request.map(|put| put.item))
                .collect();
            report.written += chunk.len() - unprocessed.len();
            report.unprocessed.extend(unprocessed);
            for capacity in &output.consumed_capacity {
                report
                    .consumed_capacity
                    .get_or_insert_with(ConsumedCapacity::default)
                    .accumulate(capacity);
            }
            report
        })
        .await;

    if !report.is_complete() {
        warn!(
            table,
            unprocessed = report.unprocessed.len(),
            failed_chunks = report.failed.len(),
            written = report.written,
            "batch write left items unwritten"
        );
    }
    report
}
