//! DynamoDB `AttributeValue`.
//!
//! A tagged union where exactly one variant is present. On the wire it is a
//! single-key object such as `{"S": "hello"}`; binary payloads are base64.

use std::collections::HashMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// DynamoDB attribute value.
///
/// Numbers are kept as their decimal text so no precision is lost between the
/// SQL literal and the request.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// String value.
    S(String),
    /// Number value (decimal text).
    N(String),
    /// Binary value.
    B(bytes::Bytes),
    /// String Set.
    Ss(Vec<String>),
    /// Number Set.
    Ns(Vec<String>),
    /// Binary Set.
    Bs(Vec<bytes::Bytes>),
    /// Boolean value.
    Bool(bool),
    /// Null value.
    Null(bool),
    /// List of attribute values.
    L(Vec<AttributeValue>),
    /// Map of attribute values.
    M(HashMap<String, AttributeValue>),
}

impl AttributeValue {
    /// Build an `N` value from anything that formats as a number.
    #[must_use]
    pub fn number(n: impl fmt::Display) -> Self {
        Self::N(n.to_string())
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(true))
    }

    #[must_use]
    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_b(&self) -> Option<&bytes::Bytes> {
        match self {
            Self::B(b) => Some(b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_l(&self) -> Option<&[AttributeValue]> {
        match self {
            Self::L(l) => Some(l),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_m(&self) -> Option<&HashMap<String, AttributeValue>> {
        match self {
            Self::M(m) => Some(m),
            _ => None,
        }
    }

    /// Parse an `N` value as `f64`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.as_n().and_then(|n| n.parse().ok())
    }

    /// Parse an `N` value as `i64`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_n().and_then(|n| n.parse().ok())
    }

    /// Returns the DynamoDB type descriptor (`S`, `N`, `BOOL`, ...).
    #[must_use]
    pub fn type_descriptor(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::B(_) => "B",
            Self::Ss(_) => "SS",
            Self::Ns(_) => "NS",
            Self::Bs(_) => "BS",
            Self::Bool(_) => "BOOL",
            Self::Null(_) => "NULL",
            Self::L(_) => "L",
            Self::M(_) => "M",
        }
    }

    /// Approximate stored size in bytes, following DynamoDB's item size rules
    /// closely enough for capacity accounting.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        match self {
            Self::S(s) => s.len(),
            Self::N(n) => n.len().div_ceil(2) + 1,
            Self::B(b) => b.len(),
            Self::Ss(v) => v.iter().map(String::len).sum(),
            Self::Ns(v) => v.iter().map(|n| n.len().div_ceil(2) + 1).sum(),
            Self::Bs(v) => v.iter().map(bytes::Bytes::len).sum(),
            Self::Bool(_) | Self::Null(_) => 1,
            Self::L(v) => 3 + v.iter().map(|e| 1 + e.size_bytes()).sum::<usize>(),
            Self::M(m) => {
                3 + m
                    .iter()
                    .map(|(k, v)| 1 + k.len() + v.size_bytes())
                    .sum::<usize>()
            }
        }
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::S(s)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::S(s.to_owned())
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        Self::number(n)
    }
}

impl Eq for AttributeValue {}

impl std::hash::Hash for AttributeValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Self::S(s) | Self::N(s) => s.hash(state),
            Self::B(b) => b.hash(state),
            Self::Bool(b) | Self::Null(b) => b.hash(state),
            Self::Ss(v) | Self::Ns(v) => v.hash(state),
            Self::Bs(v) => v.iter().for_each(|b| b.hash(state)),
            Self::L(v) => v.hash(state),
            Self::M(m) => {
                let mut keys: Vec<_> = m.keys().collect();
                keys.sort();
                for k in keys {
                    k.hash(state);
                    m[k].hash(state);
                }
            }
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S(s) => write!(f, "{s:?}"),
            Self::N(n) => f.write_str(n),
            Self::B(b) => write!(f, "<{} bytes>", b.len()),
            Self::Ss(v) => write!(f, "{v:?}"),
            Self::Ns(v) => write!(f, "[{}]", v.join(", ")),
            Self::Bs(v) => write!(f, "<{} binaries>", v.len()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null(_) => f.write_str("null"),
            Self::L(v) => {
                f.write_str("[")?;
                for (i, e) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{e}")?;
                }
                f.write_str("]")
            }
            Self::M(m) => write!(f, "{{{} keys}}", m.len()),
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        let tag = self.type_descriptor();
        match self {
            Self::S(s) | Self::N(s) => map.serialize_entry(tag, s)?,
            Self::B(b) => map.serialize_entry(tag, &BASE64.encode(b))?,
            Self::Ss(v) | Self::Ns(v) => map.serialize_entry(tag, v)?,
            Self::Bs(v) => {
                let encoded: Vec<String> = v.iter().map(|b| BASE64.encode(b)).collect();
                map.serialize_entry(tag, &encoded)?;
            }
            Self::Bool(b) | Self::Null(b) => map.serialize_entry(tag, b)?,
            Self::L(list) => map.serialize_entry(tag, list)?,
            Self::M(m) => map.serialize_entry(tag, m)?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(AttributeValueVisitor)
    }
}

const TAGS: &[&str] = &["S", "N", "B", "SS", "NS", "BS", "BOOL", "NULL", "L", "M"];

fn decode_binary<E: de::Error>(encoded: &str) -> Result<bytes::Bytes, E> {
    BASE64
        .decode(encoded)
        .map(bytes::Bytes::from)
        .map_err(E::custom)
}

struct AttributeValueVisitor;

impl<'de> Visitor<'de> for AttributeValueVisitor {
    type Value = AttributeValue;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a DynamoDB AttributeValue object with exactly one type key")
    }

    fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<Self::Value, M::Error> {
        let Some(tag) = map.next_key::<String>()? else {
            return Err(de::Error::custom("AttributeValue must have exactly one key"));
        };

        let value = match tag.as_str() {
            "S" => AttributeValue::S(map.next_value()?),
            "N" => AttributeValue::N(map.next_value()?),
            "B" => AttributeValue::B(decode_binary::<M::Error>(&map.next_value::<String>()?)?),
            "SS" => AttributeValue::Ss(map.next_value()?),
            "NS" => AttributeValue::Ns(map.next_value()?),
            "BS" => {
                let encoded: Vec<String> = map.next_value()?;
                AttributeValue::Bs(
                    encoded
                        .iter()
                        .map(|e| decode_binary::<M::Error>(e))
                        .collect::<Result<_, _>>()?,
                )
            }
            "BOOL" => AttributeValue::Bool(map.next_value()?),
            "NULL" => AttributeValue::Null(map.next_value()?),
            "L" => AttributeValue::L(map.next_value()?),
            "M" => AttributeValue::M(map.next_value()?),
            other => return Err(de::Error::unknown_field(other, TAGS)),
        };

        if map.next_key::<String>()?.is_some() {
            return Err(de::Error::custom("AttributeValue must have exactly one key"));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_serialize_number_as_tagged_string() {
        let json = serde_json::to_string(&AttributeValue::number(1500)).unwrap();
        assert_eq!(json, r#"{"N":"1500"}"#);
    }

    #[test]
    fn test_should_serialize_binary_as_base64() {
        let val = AttributeValue::B(bytes::Bytes::from_static(b"hi"));
        assert_eq!(serde_json::to_string(&val).unwrap(), r#"{"B":"aGk="}"#);
    }

    #[test]
    fn test_should_deserialize_nested_item() {
        let json = r#"{"M":{"Wins":{"N":"3"},"Tags":{"SS":["a","b"]}}}"#;
        let val: AttributeValue = serde_json::from_str(json).unwrap();
        let m = val.as_m().unwrap();
        assert_eq!(m["Wins"].as_i64(), Some(3));
        assert!(matches!(m["Tags"], AttributeValue::Ss(ref v) if v.len() == 2));
    }

    #[test]
    fn test_should_reject_multiple_type_keys() {
        let err = serde_json::from_str::<AttributeValue>(r#"{"S":"a","N":"1"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_should_reject_unknown_type_key() {
        assert!(serde_json::from_str::<AttributeValue>(r#"{"X":"a"}"#).is_err());
    }

    #[test]
    fn test_should_estimate_size() {
        assert_eq!(AttributeValue::from("abcd").size_bytes(), 4);
        assert_eq!(AttributeValue::number(1234).size_bytes(), 3);
        assert_eq!(AttributeValue::Bool(true).size_bytes(), 1);
    }

    #[test]
    fn test_should_display_scalars_compactly() {
        assert_eq!(AttributeValue::from("x").to_string(), "\"x\"");
        assert_eq!(AttributeValue::number(7).to_string(), "7");
        assert_eq!(
            AttributeValue::L(vec![AttributeValue::number(1), AttributeValue::Bool(false)])
                .to_string(),
            "[1, false]"
        );
    }
}
