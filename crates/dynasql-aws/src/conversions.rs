//! Conversions between DynaSQL wire types and `aws_sdk_dynamodb` types.
//!
//! Pure functions, testable without a service.

use std::collections::HashMap;

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types as sdk;
use bytes::Bytes;
use dynasql_model::AttributeValue;
use dynasql_model::types::{
    Capacity, ConsumedCapacity, DeleteRequest, PutRequest, ReturnConsumedCapacity, Select,
    WriteRequest,
};
use dynasql_model::{DynamoDBError, Item};

// ============================================================================
// Attribute values
// ============================================================================

#[must_use]
pub fn to_sdk_value(value: AttributeValue) -> sdk::AttributeValue {
    match value {
        AttributeValue::S(s) => sdk::AttributeValue::S(s),
        AttributeValue::N(n) => sdk::AttributeValue::N(n),
        AttributeValue::B(b) => sdk::AttributeValue::B(Blob::new(b.to_vec())),
        AttributeValue::Ss(v) => sdk::AttributeValue::Ss(v),
        AttributeValue::Ns(v) => sdk::AttributeValue::Ns(v),
        AttributeValue::Bs(v) => {
            sdk::AttributeValue::Bs(v.into_iter().map(|b| Blob::new(b.to_vec())).collect())
        }
        AttributeValue::Bool(b) => sdk::AttributeValue::Bool(b),
        AttributeValue::Null(b) => sdk::AttributeValue::Null(b),
        AttributeValue::L(l) => sdk::AttributeValue::L(l.into_iter().map(to_sdk_value).collect()),
        AttributeValue::M(m) => sdk::AttributeValue::M(to_sdk_item(m)),
    }
}

/// Convert an SDK value; variants this SDK version does not know fail.
pub fn from_sdk_value(value: sdk::AttributeValue) -> Result<AttributeValue, DynamoDBError> {
    let value = match value {
        sdk::AttributeValue::S(s) => AttributeValue::S(s),
        sdk::AttributeValue::N(n) => AttributeValue::N(n),
        sdk::AttributeValue::B(b) => AttributeValue::B(Bytes::from(b.into_inner())),
        sdk::AttributeValue::Ss(v) => AttributeValue::Ss(v),
        sdk::AttributeValue::Ns(v) => AttributeValue::Ns(v),
        sdk::AttributeValue::Bs(v) => {
            AttributeValue::Bs(v.into_iter().map(|b| Bytes::from(b.into_inner())).collect())
        }
        sdk::AttributeValue::Bool(b) => AttributeValue::Bool(b),
        sdk::AttributeValue::Null(b) => AttributeValue::Null(b),
        sdk::AttributeValue::L(l) => {
            AttributeValue::L(l.into_iter().map(from_sdk_value).collect::<Result<_, _>>()?)
        }
        sdk::AttributeValue::M(m) => AttributeValue::M(from_sdk_item(m)?),
        other => {
            return Err(DynamoDBError::transport(format!(
                "unsupported attribute value in response: {other:?}"
            )));
        }
    };
    Ok(value)
}

#[must_use]
pub fn to_sdk_item(item: Item) -> HashMap<String, sdk::AttributeValue> {
    item.into_iter().map(|(k, v)| (k, to_sdk_value(v))).collect()
}

pub fn from_sdk_item(item: HashMap<String, sdk::AttributeValue>) -> Result<Item, DynamoDBError> {
    item.into_iter()
        .map(|(k, v)| from_sdk_value(v).map(|v| (k, v)))
        .collect()
}

pub fn from_sdk_items(
    items: Option<Vec<HashMap<String, sdk::AttributeValue>>>,
) -> Result<Vec<Item>, DynamoDBError> {
    items.unwrap_or_default().into_iter().map(from_sdk_item).collect()
}

/// `None` for an empty map, which the SDK would otherwise send as `{}`.
#[must_use]
pub fn to_sdk_map<V, W>(map: HashMap<String, V>, f: impl Fn(V) -> W) -> Option<HashMap<String, W>> {
    (!map.is_empty()).then(|| map.into_iter().map(|(k, v)| (k, f(v))).collect())
}

// ============================================================================
// Enums
// ============================================================================

#[must_use]
pub fn to_sdk_select(select: Select) -> sdk::Select {
    sdk::Select::from(select.as_str())
}

#[must_use]
pub fn to_sdk_return_consumed_capacity(
    value: ReturnConsumedCapacity,
) -> sdk::ReturnConsumedCapacity {
    sdk::ReturnConsumedCapacity::from(value.as_str())
}

// ============================================================================
// Consumed capacity
// ============================================================================

fn from_sdk_capacity(capacity: &sdk::Capacity) -> Capacity {
    Capacity {
        read_capacity_units: capacity.read_capacity_units,
        write_capacity_units: capacity.write_capacity_units,
        capacity_units: capacity.capacity_units,
    }
}

#[must_use]
pub fn from_sdk_consumed_capacity(capacity: sdk::ConsumedCapacity) -> ConsumedCapacity {
    let indexes = |map: Option<HashMap<String, sdk::Capacity>>| -> HashMap<String, Capacity> {
        map.unwrap_or_default()
            .iter()
            .map(|(name, c)| (name.clone(), from_sdk_capacity(c)))
            .collect()
    };
    ConsumedCapacity {
        table: capacity.table.as_ref().map(from_sdk_capacity),
        local_secondary_indexes: indexes(capacity.local_secondary_indexes),
        global_secondary_indexes: indexes(capacity.global_secondary_indexes),
        table_name: capacity.table_name,
        capacity_units: capacity.capacity_units,
        read_capacity_units: capacity.read_capacity_units,
        write_capacity_units: capacity.write_capacity_units,
    }
}

// ============================================================================
// Write requests
// ============================================================================

pub fn to_sdk_write_request(request: WriteRequest) -> Result<sdk::WriteRequest, DynamoDBError> {
    let invalid = |e: aws_sdk_dynamodb::error::BuildError| {
        DynamoDBError::validation(format!("invalid write request: {e}"))
    };
    let put_request = request
        .put_request
        .map(|put| {
            sdk::PutRequest::builder()
                .set_item(Some(to_sdk_item(put.item)))
                .build()
                .map_err(invalid)
        })
        .transpose()?;
    let delete_request = request
        .delete_request
        .map(|delete| {
            sdk::DeleteRequest::builder()
                .set_key(Some(to_sdk_item(delete.key)))
                .build()
                .map_err(invalid)
        })
        .transpose()?;
    Ok(sdk::WriteRequest::builder()
        .set_put_request(put_request)
        .set_delete_request(delete_request)
        .build())
}

pub fn from_sdk_write_request(request: sdk::WriteRequest) -> Result<WriteRequest, DynamoDBError> {
    Ok(WriteRequest {
        put_request: request
            .put_request
            .map(|put| from_sdk_item(put.item).map(|item| PutRequest { item }))
            .transpose()?,
        delete_request: request
            .delete_request
            .map(|delete| from_sdk_item(delete.key).map(|key| DeleteRequest { key }))
            .transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> Item {
        Item::from([
            ("UserId".to_owned(), AttributeValue::from("u1")),
            ("TopScore".to_owned(), AttributeValue::N("5842".to_owned())),
            ("Avatar".to_owned(), AttributeValue::B(Bytes::from_static(b"\x89PNG"))),
            (
                "Badges".to_owned(),
                AttributeValue::L(vec![
                    AttributeValue::Bool(true),
                    AttributeValue::Null(true),
                    AttributeValue::M(HashMap::from([(
                        "Tags".to_owned(),
                        AttributeValue::Ss(vec!["a".to_owned()]),
                    )])),
                ]),
            ),
        ])
    }

    #[test]
    fn test_should_convert_nested_items_both_ways() {
        let item = sample_item();
        let sdk_item = to_sdk_item(item.clone());
        assert_eq!(sdk_item["TopScore"], sdk::AttributeValue::N("5842".to_owned()));
        assert!(matches!(
            sdk_item["Avatar"],
            sdk::AttributeValue::B(ref b) if b.as_ref() == b"\x89PNG"
        ));
        assert_eq!(from_sdk_item(sdk_item).unwrap(), item);
    }

    #[test]
    fn test_should_skip_empty_maps() {
        assert!(to_sdk_map(HashMap::<String, String>::new(), |v| v).is_none());
        let names = HashMap::from([("#n0".to_owned(), "UserId".to_owned())]);
        assert_eq!(to_sdk_map(names, |v| v).unwrap()["#n0"], "UserId");
    }

    #[test]
    fn test_should_convert_enums_by_wire_name() {
        assert_eq!(to_sdk_select(Select::Count), sdk::Select::Count);
        assert_eq!(
            to_sdk_select(Select::AllProjectedAttributes),
            sdk::Select::AllProjectedAttributes
        );
        assert_eq!(
            to_sdk_return_consumed_capacity(ReturnConsumedCapacity::Total),
            sdk::ReturnConsumedCapacity::Total
        );
    }

    #[test]
    fn test_should_convert_write_requests() {
        let put = to_sdk_write_request(WriteRequest::put(sample_item())).unwrap();
        assert!(put.put_request.is_some());
        assert!(put.delete_request.is_none());
        assert_eq!(from_sdk_write_request(put).unwrap(), WriteRequest::put(sample_item()));
    }

    #[test]
    fn test_should_convert_consumed_capacity() {
        let capacity = sdk::ConsumedCapacity::builder()
            .table_name("GameScores")
            .capacity_units(1.5)
            .global_secondary_indexes(
                "GameTitleIndex",
                sdk::Capacity::builder().capacity_units(0.5).build(),
            )
            .build();
        let converted = from_sdk_consumed_capacity(capacity);
        assert_eq!(converted.table_name.as_deref(), Some("GameScores"));
        assert_eq!(converted.capacity_units, Some(1.5));
        assert_eq!(
            converted.global_secondary_indexes["GameTitleIndex"].capacity_units,
            Some(0.5)
        );
    }
}
