//! Typed records.
//!
//! A [`Record`] converts itself to and from an attribute map. The helpers
//! below read attributes that may be projected out: a missing attribute
//! decodes to the type's default, a present attribute of the wrong type is a
//! [`MappingError`].

use std::str::FromStr;

use chrono::{DateTime, Utc};
use dynasql_model::AttributeValue;
use dynasql_model::types::Item;

use crate::error::MappingError;
use crate::value::{format_date, normalize_date};

/// A caller type stored as one DynamoDB item.
pub trait Record: Sized {
    fn to_item(&self) -> Item;

    /// # Errors
    ///
    /// Returns `MappingError` when a required attribute is missing or an
    /// attribute has the wrong type.
    fn from_item(item: &Item) -> Result<Self, MappingError>;
}

impl Record for Item {
    fn to_item(&self) -> Item {
        self.clone()
    }

    fn from_item(item: &Item) -> Result<Self, MappingError> {
        Ok(item.clone())
    }
}

fn mismatch(attribute: &str, expected: &'static str, found: &AttributeValue) -> MappingError {
    MappingError::TypeMismatch {
        attribute: attribute.to_owned(),
        expected,
        found: found.type_descriptor(),
    }
}

/// The attribute, or `MappingError::Missing`.
pub fn required<'a>(item: &'a Item, attribute: &str) -> Result<&'a AttributeValue, MappingError> {
    item.get(attribute).ok_or_else(|| MappingError::Missing {
        attribute: attribute.to_owned(),
    })
}

/// A required string attribute.
pub fn string(item: &Item, attribute: &str) -> Result<String, MappingError> {
    let value = required(item, attribute)?;
    value
        .as_s()
        .map(str::to_owned)
        .ok_or_else(|| mismatch(attribute, "S", value))
}

pub fn string_or_default(item: &Item, attribute: &str) -> Result<String, MappingError> {
    match item.get(attribute) {
        None | Some(AttributeValue::Null(_)) => Ok(String::new()),
        Some(_) => string(item, attribute),
    }
}

/// A required number attribute parsed as `T`.
pub fn number<T: FromStr>(item: &Item, attribute: &str) -> Result<T, MappingError> {
    let value = required(item, attribute)?;
    let raw = value.as_n().ok_or_else(|| mismatch(attribute, "N", value))?;
    raw.parse().map_err(|_| MappingError::Invalid {
        attribute: attribute.to_owned(),
        message: format!("'{raw}' does not fit the target number type"),
    })
}

pub fn number_or_default<T: FromStr + Default>(
    item: &Item,
    attribute: &str,
) -> Result<T, MappingError> {
    match item.get(attribute) {
        None | Some(AttributeValue::Null(_)) => Ok(T::default()),
        Some(_) => number(item, attribute),
    }
}

pub fn bool_or_default(item: &Item, attribute: &str) -> Result<bool, MappingError> {
    match item.get(attribute) {
        None | Some(AttributeValue::Null(_)) => Ok(false),
        Some(value) => value.as_bool().ok_or_else(|| mismatch(attribute, "BOOL", value)),
    }
}

/// A string set; missing decodes to an empty list.
pub fn string_set_or_default(item: &Item, attribute: &str) -> Result<Vec<String>, MappingError> {
    match item.get(attribute) {
        None | Some(AttributeValue::Null(_)) => Ok(Vec::new()),
        Some(AttributeValue::Ss(values)) => Ok(values.clone()),
        Some(value) => Err(mismatch(attribute, "SS", value)),
    }
}

/// A date stored as an ISO-8601 string; missing decodes to `None`.
pub fn date_or_none(item: &Item, attribute: &str) -> Result<Option<DateTime<Utc>>, MappingError> {
    let raw = match item.get(attribute) {
        None | Some(AttributeValue::Null(_)) => return Ok(None),
        Some(value) => value.as_s().ok_or_else(|| mismatch(attribute, "S", value))?,
    };
    let invalid = || MappingError::Invalid {
        attribute: attribute.to_owned(),
        message: format!("'{raw}' is not a date"),
    };
    let normalized = normalize_date(raw).ok_or_else(invalid)?;
    DateTime::parse_from_rfc3339(&normalized)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|_| invalid())
}

/// Encode a date the way `DATE "..."` literals are compared.
#[must_use]
pub fn date_value(dt: &DateTime<Utc>) -> AttributeValue {
    AttributeValue::S(format_date(dt))
}

/// Decode every item, failing on the first that does not map.
///
/// # Errors
///
/// Returns the first `MappingError`.
pub fn decode_all<T: Record>(items: &[Item]) -> Result<Vec<T>, MappingError> {
    items.iter().map(T::from_item).collect()
}
