//! Semantic validation of a parsed statement against a table schema.
//!
//! Validation decides whether the statement can be served by a Query against
//! the table or the selected index, converts every literal to its wire value,
//! and rejects combinations DynamoDB would refuse.

use dynasql_model::AttributeValue;

use crate::error::ValidationError;
use crate::schema::{IndexKind, IndexProjection, KeySchema, SecondaryIndex, TableSchema};
use crate::sql::ast::Arity;
use crate::sql::{Literal, Operator, Predicate, Statement};
use crate::value::literal_to_attribute;

/// Upper bound DynamoDB accepts for `TotalSegments`.
pub const MAX_SEGMENTS: u32 = 1_000_000;

/// Which operation the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Query when the statement allows it, Scan otherwise.
    #[default]
    Auto,
    /// Fail unless the statement can be served by a Query.
    Query,
    /// Always Scan.
    Scan,
}

/// How the validated statement reads the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Indices into [`ValidatedStatement::conditions`] of the key conditions.
    Query { hash: usize, range: Option<usize> },
    Scan,
}

/// A predicate with its operands converted to wire values.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub attribute: String,
    pub operator: Operator,
    pub values: Vec<AttributeValue>,
}

/// A statement known to be legal against its schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedStatement {
    pub statement: Statement,
    /// One entry per predicate, in source order.
    pub conditions: Vec<Condition>,
    pub access: Access,
    /// The index named by `Index(..)`, if any.
    pub index: Option<SecondaryIndex>,
}

impl ValidatedStatement {
    #[must_use]
    pub fn is_query(&self) -> bool {
        matches!(self.access, Access::Query { .. })
    }
}

/// Outcome of checking the key conditions for Query eligibility.
enum Eligibility {
    Eligible { hash: usize, range: Option<usize> },
    /// Legal statement, but only as a Scan.
    ScanOnly(ValidationError),
}

/// Validate `statement` against `schema`.
///
/// # Errors
///
/// Returns the first `ValidationError` found.
pub fn validate(
    statement: &Statement,
    schema: &TableSchema,
    mode: Mode,
) -> Result<ValidatedStatement, ValidationError> {
    if statement.table != schema.name {
        return Err(ValidationError::TableMismatch {
            expected: schema.name.clone(),
            found: statement.table.clone(),
        });
    }
    check_options(statement)?;

    let index = match &statement.options.index {
        Some(selection) => Some(schema.index(&selection.name).cloned().ok_or_else(|| {
            ValidationError::UnknownIndex {
                table: schema.name.clone(),
                index: selection.name.clone(),
            }
        })?),
        None => None,
    };
    let keys = index.as_ref().map_or(&schema.keys, |i| &i.keys);

    let conditions = statement
        .predicates
        .iter()
        .map(|p| convert(p, schema))
        .collect::<Result<Vec<_>, _>>()?;

    // A statement may never carry two equality conditions on the hash key.
    let hash_eq = count_matching(statement, &keys.hash_key.name, |op| op == Operator::Eq);
    if hash_eq > 1 {
        return Err(ValidationError::DuplicateKeyCondition {
            attribute: keys.hash_key.name.clone(),
        });
    }

    let access = match mode {
        Mode::Scan => Access::Scan,
        Mode::Query => match eligibility(statement, keys)? {
            Eligibility::Eligible { hash, range } => Access::Query { hash, range },
            Eligibility::ScanOnly(reason) => {
                return Err(index_mismatch(statement, schema, index.as_ref()).unwrap_or(reason));
            }
        },
        Mode::Auto => match eligibility(statement, keys)? {
            Eligibility::Eligible { hash, range } => Access::Query { hash, range },
            Eligibility::ScanOnly(_) => {
                if let Some(err) = index_mismatch(statement, schema, index.as_ref()) {
                    return Err(err);
                }
                Access::Scan
            }
        },
    };

    if access == Access::Scan {
        if statement.order.is_some() {
            return Err(ValidationError::OrderRequiresQuery);
        }
        if let Some(selection) = statement.options.index.as_ref().filter(|s| s.all_attributes) {
            return Err(ValidationError::IndexAllAttributesRequiresQuery {
                index: selection.name.clone(),
            });
        }
    }

    if let Some(index) = index.as_ref().filter(|i| i.kind == IndexKind::Global) {
        if statement.options.consistent_read {
            return Err(ValidationError::ConsistentReadOnGlobalIndex {
                index: index.name.clone(),
            });
        }
        let fetches_all = statement.options.index.as_ref().is_some_and(|s| s.all_attributes);
        if fetches_all && index.projection != IndexProjection::All {
            return Err(ValidationError::GlobalIndexProjection {
                index: index.name.clone(),
            });
        }
    }

    Ok(ValidatedStatement {
        statement: statement.clone(),
        conditions,
        access,
        index,
    })
}

fn check_options(statement: &Statement) -> Result<(), ValidationError> {
    let invalid = |option, message: &str| ValidationError::InvalidOption {
        option,
        message: message.to_owned(),
    };
    if statement.limit == Some(0) {
        return Err(invalid("LIMIT", "must be at least 1"));
    }
    if statement.options.page_size == Some(0) {
        return Err(invalid("PageSize", "must be at least 1"));
    }
    match statement.options.segments {
        Some(0) => Err(invalid("Segments", "must be at least 1")),
        Some(n) if n > MAX_SEGMENTS => Err(invalid("Segments", "must not exceed 1000000")),
        _ => Ok(()),
    }
}

fn convert(predicate: &Predicate, schema: &TableSchema) -> Result<Condition, ValidationError> {
    let operand_error = |expected| ValidationError::InvalidOperand {
        attribute: predicate.attribute.clone(),
        operator: predicate.operator,
        expected,
    };
    let arity_ok = match predicate.operator.arity() {
        Arity::None => predicate.operands.is_empty(),
        Arity::One => predicate.operands.len() == 1,
        Arity::Two => predicate.operands.len() == 2,
        Arity::Many => !predicate.operands.is_empty(),
    };
    if !arity_ok {
        return Err(operand_error(match predicate.operator.arity() {
            Arity::None => "no operands",
            Arity::One => "exactly one operand",
            Arity::Two => "exactly two operands",
            Arity::Many => "at least one operand",
        }));
    }
    if predicate.operator == Operator::BeginsWith
        && !matches!(predicate.operands[0], Literal::String(_))
    {
        return Err(operand_error("a string prefix"));
    }

    let key_type = schema.key_type(&predicate.attribute);
    let mut values = Vec::with_capacity(predicate.operands.len());
    for literal in &predicate.operands {
        let value = literal_to_attribute(literal).ok_or_else(|| ValidationError::InvalidDate {
            value: literal.to_string(),
        })?;
        if let Some(expected) = key_type {
            if !expected.matches(&value) {
                return Err(ValidationError::KeyTypeMismatch {
                    attribute: predicate.attribute.clone(),
                    expected,
                    found: literal.kind(),
                });
            }
        }
        values.push(value);
    }

    Ok(Condition {
        attribute: predicate.attribute.clone(),
        operator: predicate.operator,
        values,
    })
}

fn count_matching(
    statement: &Statement,
    attribute: &str,
    pred: impl Fn(Operator) -> bool,
) -> usize {
    statement
        .predicates_on(attribute)
        .filter(|p| pred(p.operator))
        .count()
}

fn position_of(statement: &Statement, target: &Predicate) -> usize {
    statement
        .predicates
        .iter()
        .position(|p| std::ptr::eq(p, target))
        .unwrap_or_default()
}

/// Check whether `keys` can drive a Query.
///
/// Errors are returned only for statements that target a Query path (a hash
/// key equality without `Segments`) yet break its rules.
fn eligibility(statement: &Statement, keys: &KeySchema) -> Result<Eligibility, ValidationError> {
    let hash_name = &keys.hash_key.name;
    let hash_preds: Vec<&Predicate> = statement.predicates_on(hash_name).collect();

    let hash = match hash_preds.as_slice() {
        [] => {
            return Ok(Eligibility::ScanOnly(
                ValidationError::MissingHashKeyCondition {
                    key: hash_name.clone(),
                },
            ));
        }
        [p] if p.operator == Operator::Eq => *p,
        [p] => {
            return Ok(Eligibility::ScanOnly(
                ValidationError::UnsupportedKeyOperator {
                    attribute: hash_name.clone(),
                    operator: p.operator,
                },
            ));
        }
        _ => {
            return Ok(Eligibility::ScanOnly(
                ValidationError::DuplicateKeyCondition {
                    attribute: hash_name.clone(),
                },
            ));
        }
    };

    if statement.options.segments.is_some() {
        return Ok(Eligibility::ScanOnly(ValidationError::SegmentsRequireScan));
    }

    let range = match &keys.range_key {
        None => None,
        Some(range_key) => {
            let range_preds: Vec<&Predicate> = statement.predicates_on(&range_key.name).collect();
            match range_preds.as_slice() {
                [] => None,
                [p] if p.operator.is_range_key_operator() => Some(position_of(statement, p)),
                [p] => {
                    return Ok(Eligibility::ScanOnly(
                        ValidationError::UnsupportedKeyOperator {
                            attribute: range_key.name.clone(),
                            operator: p.operator,
                        },
                    ));
                }
                _ => {
                    return Err(ValidationError::DuplicateKeyCondition {
                        attribute: range_key.name.clone(),
                    });
                }
            }
        }
    };

    Ok(Eligibility::Eligible {
        hash: position_of(statement, hash),
        range,
    })
}

/// A named index whose hash key is unconstrained while the table's own hash
/// key has an equality condition: the caller picked the wrong index.
fn index_mismatch(
    statement: &Statement,
    schema: &TableSchema,
    index: Option<&SecondaryIndex>,
) -> Option<ValidationError> {
    let index = index?;
    let table_hash = &schema.keys.hash_key.name;
    let index_hash = &index.keys.hash_key.name;
    let table_hash_eq = count_matching(statement, table_hash, |op| op == Operator::Eq) == 1;
    let index_hash_eq = count_matching(statement, index_hash, |op| op == Operator::Eq) == 1;
    (table_hash != index_hash && table_hash_eq && !index_hash_eq).then(|| {
        ValidationError::IndexKeyMismatch {
            index: index.name.clone(),
            hash_key: index_hash.clone(),
        }
    })
}
