//! DynamoDB response types for `Query`, `Scan` and `BatchWriteItem`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{ConsumedCapacity, Item, Key, WriteRequest};

/// Output for the `Query` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryOutput {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,

    /// Number of items returned after the filter was applied.
    pub count: i32,

    /// Number of items evaluated before the filter was applied.
    pub scanned_count: i32,

    /// Present when more results may follow; pass as `ExclusiveStartKey`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub last_evaluated_key: Key,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed_capacity: Option<ConsumedCapacity>,
}

/// Output for the `Scan` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanOutput {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,

    pub count: i32,

    pub scanned_count: i32,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub last_evaluated_key: Key,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed_capacity: Option<ConsumedCapacity>,
}

impl From<ScanOutput> for QueryOutput {
    fn from(out: ScanOutput) -> Self {
        Self {
            items: out.items,
            count: out.count,
            scanned_count: out.scanned_count,
            last_evaluated_key: out.last_evaluated_key,
            consumed_capacity: out.consumed_capacity,
        }
    }
}

/// Output for the `BatchWriteItem` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchWriteItemOutput {
    /// Requests the service did not process, keyed by table name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub unprocessed_items: HashMap<String, Vec<WriteRequest>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumed_capacity: Vec<ConsumedCapacity>,
}
