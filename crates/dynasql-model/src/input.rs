//! DynamoDB request types for the operations a compiled statement issues.
//!
//! Field names use `PascalCase` to match the DynamoDB JSON protocol. Optional
//! fields are omitted when `None`; empty maps are omitted.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{
    ExpressionAttributeNames, ExpressionAttributeValues, Key, ReturnConsumedCapacity, Select,
    WriteRequest,
};

/// Input for the `Query` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryInput {
    pub table_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,

    /// Condition on the partition key and, optionally, the sort key.
    pub key_condition_expression: String,

    /// Condition applied after items are read; does not reduce consumed capacity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: ExpressionAttributeNames,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: ExpressionAttributeValues,

    /// `true` (default) for ascending sort key order, `false` for descending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_index_forward: Option<bool>,

    /// Maximum number of items to evaluate in this request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,

    /// Continuation marker from the previous page.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub exclusive_start_key: Key,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<Select>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistent_read: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_consumed_capacity: Option<ReturnConsumedCapacity>,
}

/// Input for the `Scan` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanInput {
    pub table_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: ExpressionAttributeNames,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: ExpressionAttributeValues,

    /// Maximum number of items to evaluate in this request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub exclusive_start_key: Key,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<Select>,

    /// Segment this request reads, for a parallel scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<i32>,

    /// Number of segments the table is divided into, for a parallel scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_segments: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistent_read: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_consumed_capacity: Option<ReturnConsumedCapacity>,
}

/// Input for the `BatchWriteItem` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchWriteItemInput {
    /// Write requests keyed by table name.
    pub request_items: HashMap<String, Vec<WriteRequest>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_consumed_capacity: Option<ReturnConsumedCapacity>,
}

impl BatchWriteItemInput {
    /// Total number of write requests across all tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.request_items.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AttributeValue;

    #[test]
    fn test_should_serialize_query_input_with_wire_names() {
        let input = QueryInput {
            table_name: "GameScores".to_owned(),
            key_condition_expression: "#n0 = :v0".to_owned(),
            expression_attribute_names: HashMap::from([("#n0".to_owned(), "UserId".to_owned())]),
            expression_attribute_values: HashMap::from([(
                ":v0".to_owned(),
                AttributeValue::from("u1"),
            )]),
            consistent_read: Some(true),
            ..QueryInput::default()
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["TableName"], "GameScores");
        assert_eq!(json["KeyConditionExpression"], "#n0 = :v0");
        assert_eq!(json["ExpressionAttributeValues"][":v0"]["S"], "u1");
        assert!(json.get("ExclusiveStartKey").is_none());
        assert!(json.get("Limit").is_none());
    }

    #[test]
    fn test_should_serialize_scan_segments() {
        let input = ScanInput {
            table_name: "GameScores".to_owned(),
            segment: Some(1),
            total_segments: Some(2),
            ..ScanInput::default()
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["Segment"], 1);
        assert_eq!(json["TotalSegments"], 2);
    }
}
