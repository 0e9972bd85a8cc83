//! Literal to `AttributeValue` conversion.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use dynasql_model::AttributeValue;

use crate::sql::Literal;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Normalise a date literal to UTC with millisecond precision, e.g.
/// `2012-05-01T13:45:00.000Z`.
///
/// Every normalised value has the same width and field order, so string
/// comparison on stored dates matches chronological order.
#[must_use]
pub fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let utc = if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        dt.with_timezone(&Utc)
    } else if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
    {
        naive.and_utc()
    } else {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()?
            .and_hms_opt(0, 0, 0)?
            .and_utc()
    };
    Some(format_date(&utc))
}

/// Format a timestamp the way date literals are stored.
#[must_use]
pub fn format_date(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Convert a literal to the attribute value sent on the wire.
///
/// Returns `None` for a date that cannot be parsed.
#[must_use]
pub fn literal_to_attribute(literal: &Literal) -> Option<AttributeValue> {
    let value = match literal {
        Literal::String(s) => AttributeValue::S(s.clone()),
        Literal::Number(n) => AttributeValue::N(n.clone()),
        Literal::Date(d) => AttributeValue::S(normalize_date(d)?),
        Literal::Bool(b) => AttributeValue::Bool(*b),
    };
    Some(value)
}
