//! DynamoDB condition and projection expressions.
//!
//! The request builder emits these as text; the in-memory backend and
//! [`describe`](crate::request::describe) parse them back. The pipeline is
//! lexing, recursive-descent parsing into [`Expr`], then evaluation against an
//! item with [`EvalContext`].

pub mod ast;
pub mod evaluator;
pub mod parser;

use std::collections::{HashMap, HashSet};

use dynasql_model::AttributeValue;

pub use ast::{AttributePath, CompareOp, Expr, FunctionName, LogicalOp, Operand};
pub use evaluator::{EvalContext, compare_numbers, compare_values};
pub use parser::{ExpressionError, parse_condition, parse_projection};

/// Parsed expressions of one request.
#[derive(Debug, Default)]
pub struct ParsedExpressions {
    pub key_condition: Option<Expr>,
    pub filter: Option<Expr>,
    pub projection: Option<Vec<AttributePath>>,
}

impl ParsedExpressions {
    /// Parse each present expression and check that every supplied
    /// placeholder is referenced and every referenced one is supplied.
    ///
    /// # Errors
    ///
    /// Returns `ExpressionError` for a syntax error or a placeholder mismatch.
    pub fn parse(
        key_condition: Option<&str>,
        filter: Option<&str>,
        projection: Option<&str>,
        names: &HashMap<String, String>,
        values: &HashMap<String, AttributeValue>,
    ) -> Result<Self, ExpressionError> {
        let parsed = Self {
            key_condition: key_condition.map(parse_condition).transpose()?,
            filter: filter.map(parse_condition).transpose()?,
            projection: projection.map(parse_projection).transpose()?,
        };

        let mut used_names = HashSet::new();
        let mut used_values = HashSet::new();
        for expr in parsed.key_condition.iter().chain(&parsed.filter) {
            ast::collect_names(expr, &mut used_names);
            ast::collect_values(expr, &mut used_values);
        }
        if let Some(paths) = &parsed.projection {
            ast::collect_projection_names(paths, &mut used_names);
        }

        if let Some(name) = used_names.iter().find(|n| !names.contains_key(*n)) {
            return Err(ExpressionError::UnresolvedName { name: name.clone() });
        }
        if let Some(name) = used_values.iter().find(|v| !values.contains_key(*v)) {
            return Err(ExpressionError::UnresolvedValue { name: name.clone() });
        }
        if let Some(name) = names.keys().find(|n| !used_names.contains(*n)) {
            return Err(ExpressionError::Unused {
                kind: "Names",
                name: name.clone(),
            });
        }
        if let Some(name) = values.keys().find(|v| !used_values.contains(*v)) {
            return Err(ExpressionError::Unused {
                kind: "Values",
                name: name.clone(),
            });
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_reject_unused_placeholders() {
        let names = HashMap::from([
            ("#n0".to_owned(), "UserId".to_owned()),
            ("#n1".to_owned(), "Wins".to_owned()),
        ]);
        let values = HashMap::from([(":v0".to_owned(), AttributeValue::from("u1"))]);
        let err = ParsedExpressions::parse(Some("#n0 = :v0"), None, None, &names, &values)
            .unwrap_err();
        assert_eq!(
            err,
            ExpressionError::Unused {
                kind: "Names",
                name: "#n1".to_owned()
            }
        );
    }

    #[test]
    fn test_should_count_projection_names_as_used() {
        let names = HashMap::from([
            ("#n0".to_owned(), "UserId".to_owned()),
            ("#n1".to_owned(), "Wins".to_owned()),
        ]);
        let values = HashMap::from([(":v0".to_owned(), AttributeValue::from("u1"))]);
        let parsed =
            ParsedExpressions::parse(Some("#n0 = :v0"), None, Some("#n1"), &names, &values)
                .unwrap();
        assert!(parsed.filter.is_none());
        assert_eq!(parsed.projection.map(|p| p.len()), Some(1));
    }

    #[test]
    fn test_should_reject_missing_values() {
        let names = HashMap::new();
        let values = HashMap::new();
        assert!(matches!(
            ParsedExpressions::parse(None, Some("Wins > :v9"), None, &names, &values),
            Err(ExpressionError::UnresolvedValue { .. })
        ));
    }
}
