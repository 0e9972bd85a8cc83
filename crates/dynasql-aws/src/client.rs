use aws_sdk_dynamodb::Client;
use dynasql_core::DynamoDbApi;
use dynasql_model::input::{BatchWriteItemInput, QueryInput, ScanInput};
use dynasql_model::output::{BatchWriteItemOutput, QueryOutput, ScanOutput};
use dynasql_model::{DynamoDBError, Key};
use tracing::debug;

use crate::conversions::{
    from_sdk_consumed_capacity, from_sdk_item, from_sdk_items, from_sdk_write_request,
    to_sdk_map, to_sdk_return_consumed_capacity, to_sdk_select, to_sdk_value,
    to_sdk_write_request,
};
use crate::error::{map_batch_write_item_error, map_query_error, map_scan_error};

/// Overrides the endpoint of the default AWS configuration, e.g. for
/// DynamoDB Local.
pub const ENDPOINT_ENV: &str = "DYNAMODB_ENDPOINT_URL";

/// A DynamoDB backend over the AWS SDK.
#[derive(Debug, Clone)]
pub struct AwsDynamoDb {
    client: Client,
}

impl AwsDynamoDb {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the default AWS configuration chain, honouring
    /// `DYNAMODB_ENDPOINT_URL`.
    pub async fn from_env() -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            debug!(endpoint, "using DynamoDB endpoint override");
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;
        Self::new(Client::new(&config))
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn last_key(
    key: Option<std::collections::HashMap<String, aws_sdk_dynamodb::types::AttributeValue>>,
) -> Result<Key, DynamoDBError> {
    key.map_or_else(|| Ok(Key::new()), from_sdk_item)
}

#[async_trait::async_trait]
impl DynamoDbApi for AwsDynamoDb {
    async fn query(&self, input: QueryInput) -> Result<QueryOutput, DynamoDBError> {
        let output = self
            .client
            .query()
            .table_name(input.table_name)
            .set_index_name(input.index_name)
            .key_condition_expression(input.key_condition_expression)
            .set_filter_expression(input.filter_expression)
            .set_projection_expression(input.projection_expression)
            .set_expression_attribute_names(to_sdk_map(input.expression_attribute_names, |v| v))
            .set_expression_attribute_values(to_sdk_map(
                input.expression_attribute_values,
                to_sdk_value,
            ))
            .set_scan_index_forward(input.scan_index_forward)
            .set_limit(input.limit)
            .set_exclusive_start_key(to_sdk_map(input.exclusive_start_key, to_sdk_value))
            .set_select(input.select.map(to_sdk_select))
            .set_consistent_read(input.consistent_read)
            .set_return_consumed_capacity(
                input
                    .return_consumed_capacity
                    .map(to_sdk_return_consumed_capacity),
            )
            .send()
            .await
            .map_err(map_query_error)?;

        Ok(QueryOutput {
            items: from_sdk_items(output.items)?,
            count: output.count,
            scanned_count: output.scanned_count,
            last_evaluated_key: last_key(output.last_evaluated_key)?,
            consumed_capacity: output.consumed_capacity.map(from_sdk_consumed_capacity),
        })
    }

    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, DynamoDBError> {
        let output = self
            .client
            .scan()
            .table_name(input.table_name)
            .set_index_name(input.index_name)
            .set_filter_expression(input.filter_expression)
            .set_projection_expression(input.projection_expression)
            .set_expression_attribute_names(to_sdk_map(input.expression_attribute_names, |v| v))
            .set_expression_attribute_values(to_sdk_map(
                input.expression_attribute_values,
                to_sdk_value,
            ))
            .set_limit(input.limit)
            .set_exclusive_start_key(to_sdk_map(input.exclusive_start_key, to_sdk_value))
            .set_select(input.select.map(to_sdk_select))
            .set_segment(input.segment)
            .set_total_segments(input.total_segments)
            .set_consistent_read(input.consistent_read)
            .set_return_consumed_capacity(
                input
                    .return_consumed_capacity
                    .map(to_sdk_return_consumed_capacity),
            )
            .send()
            .await
            .map_err(map_scan_error)?;

        Ok(ScanOutput {
            items: from_sdk_items(output.items)?,
            count: output.count,
            scanned_count: output.scanned_count,
            last_evaluated_key: last_key(output.last_evaluated_key)?,
            consumed_capacity: output.consumed_capacity.map(from_sdk_consumed_capacity),
        })
    }

    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, DynamoDBError> {
        let request_items = input
            .request_items
            .into_iter()
            .map(|(table, requests)| {
                requests
                    .into_iter()
                    .map(to_sdk_write_request)
                    .collect::<Result<Vec<_>, _>>()
                    .map(|requests| (table, requests))
            })
            .collect::<Result<_, _>>()?;

        let output = self
            .client
            .batch_write_item()
            .set_request_items(Some(request_items))
            .set_return_consumed_capacity(
                input
                    .return_consumed_capacity
                    .map(to_sdk_return_consumed_capacity),
            )
            .send()
            .await
            .map_err(map_batch_write_item_error)?;

        let unprocessed_items = output
            .unprocessed_items
            .unwrap_or_default()
            .into_iter()
            .filter(|(_, requests)| !requests.is_empty())
            .map(|(table, requests)| {
                requests
                    .into_iter()
                    .map(from_sdk_write_request)
                    .collect::<Result<Vec<_>, _>>()
                    .map(|requests| (table, requests))
            })
            .collect::<Result<_, _>>()?;

        Ok(BatchWriteItemOutput {
            unprocessed_items,
            consumed_capacity: output
                .consumed_capacity
                .unwrap_or_default()
                .into_iter()
                .map(from_sdk_consumed_capacity)
                .collect(),
        })
    }
}
