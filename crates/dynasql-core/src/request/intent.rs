//! Recovers the mode, index, key conditions and filters of a built request.

use dynasql_model::{AttributeValue, DynamoDBOperation};

use super::BuiltRequest;
use crate::expression::{
    CompareOp, EvalContext, Expr, ExpressionError, FunctionName, Operand, ParsedExpressions,
};
use crate::sql::Operator;
use crate::validate::Condition;

/// What a built request asks DynamoDB to do, recovered from its expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestIntent {
    pub operation: DynamoDBOperation,
    pub table: String,
    pub index: Option<String>,
    /// Key conditions in the order they appear; empty for a Scan.
    pub key_conditions: Vec<Condition>,
    pub filters: Vec<Condition>,
    pub projection: Option<Vec<String>>,
    pub forward: Option<bool>,
    pub total_segments: Option<u32>,
}

/// Parse the expressions of `request` back into conditions.
///
/// # Errors
///
/// Returns `ExpressionError` if an expression does not parse, references an
/// unknown placeholder, or uses a shape the builder never emits.
pub fn describe(request: &BuiltRequest) -> Result<RequestIntent, ExpressionError> {
    let (key_condition, filter, projection, names, values) = match request {
        BuiltRequest::Query(q) => (
            Some(q.key_condition_expression.as_str()),
            q.filter_expression.as_deref(),
            q.projection_expression.as_deref(),
            &q.expression_attribute_names,
            &q.expression_attribute_values,
        ),
        BuiltRequest::Scan(s) => (
            None,
            s.filter_expression.as_deref(),
            s.projection_expression.as_deref(),
            &s.expression_attribute_names,
            &s.expression_attribute_values,
        ),
    };
    let parsed = ParsedExpressions::parse(key_condition, filter, projection, names, values)?;

    let empty = std::collections::HashMap::new();
    let ctx = EvalContext {
        item: &empty,
        names,
        values,
    };
    let conditions = |expr: Option<&Expr>| -> Result<Vec<Condition>, ExpressionError> {
        expr.map_or_else(
            || Ok(Vec::new()),
            |e| {
                e.conjuncts()
                    .into_iter()
                    .map(|c| to_condition(&ctx, c))
                    .collect()
            },
        )
    };

    let projection = parsed
        .projection
        .as_ref()
        .map(|paths| {
            paths
                .iter()
                .filter_map(|p| p.top())
                .map(|top| ctx.resolve_name(top).map(str::to_owned))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    let (index, forward, total_segments) = match request {
        BuiltRequest::Query(q) => (q.index_name.clone(), q.scan_index_forward, None),
        BuiltRequest::Scan(s) => (
            s.index_name.clone(),
            None,
            s.total_segments.and_then(|n| u32::try_from(n).ok()),
        ),
    };

    Ok(RequestIntent {
        operation: request.operation(),
        table: request.table_name().to_owned(),
        index,
        key_conditions: conditions(parsed.key_condition.as_ref())?,
        filters: conditions(parsed.filter.as_ref())?,
        projection,
        forward,
        total_segments,
    })
}

fn to_condition(ctx: &EvalContext<'_>, expr: &Expr) -> Result<Condition, ExpressionError> {
    let unsupported = || ExpressionError::InvalidOperand {
        operation: "describe".to_owned(),
        message: "expression shape is not produced by the request builder".to_owned(),
    };
    let (path, operator, operands): (&Operand, Operator, Vec<&Operand>) = match expr {
        Expr::Compare { left, op, right } => {
            let operator = match op {
                CompareOp::Eq => Operator::Eq,
                CompareOp::Ne => Operator::Ne,
                CompareOp::Lt => Operator::Lt,
                CompareOp::Le => Operator::Le,
                CompareOp::Gt => Operator::Gt,
                CompareOp::Ge => Operator::Ge,
            };
            (left, operator, vec![right])
        }
        Expr::Between { value, low, high } => (value, Operator::Between, vec![low, high]),
        Expr::In { value, list } => (value, Operator::In, list.iter().collect()),
        Expr::Function { name, args } => {
            let (first, rest) = args.split_first().ok_or_else(unsupported)?;
            let operator = match name {
                FunctionName::BeginsWith => Operator::BeginsWith,
                FunctionName::Contains => Operator::Contains,
                FunctionName::AttributeExists => Operator::IsNotNull,
                FunctionName::AttributeNotExists => Operator::IsNull,
            };
            (first, operator, rest.iter().collect())
        }
        Expr::Not(inner) => match inner.as_ref() {
            Expr::Function {
                name: FunctionName::Contains,
                args,
            } => {
                let (first, rest) = args.split_first().ok_or_else(unsupported)?;
                (first, Operator::NotContains, rest.iter().collect())
            }
            _ => return Err(unsupported()),
        },
        Expr::Logical { .. } => return Err(unsupported()),
    };

    let Operand::Path(path) = path else {
        return Err(unsupported());
    };
    let attribute = path
        .segments
        .iter()
        .map(|s| ctx.resolve_name(s))
        .collect::<Result<Vec<_>, _>>()?
        .join(".");
    let values = operands
        .into_iter()
        .map(|operand| match operand {
            Operand::Value(_) => ctx.resolve_operand(operand)?.cloned().ok_or_else(unsupported),
            Operand::Path(_) => Err(unsupported()),
        })
        .collect::<Result<Vec<AttributeValue>, _>>()?;

    Ok(Condition {
        attribute,
        operator,
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{PlanMode, plan};
    use crate::request::build;
    use crate::sql::parse;
    use crate::test_support::game_scores_schema;
    use crate::validate::{Mode, validate};

    fn round_trip(sql: &str) {
        let validated = validate(&parse(sql).unwrap(), &game_scores_schema(), Mode::Auto).unwrap();
        let plan = plan(validated);
        let intent = describe(&build(&plan)).unwrap();

        assert_eq!(intent.table, plan.table);
        assert_eq!(intent.index, plan.index);
        assert_eq!(intent.filters, plan.filters);
        assert_eq!(intent.projection, plan.projection);
        match &plan.mode {
            PlanMode::Query {
                hash,
                range,
                forward,
            } => {
                assert_eq!(intent.operation, DynamoDBOperation::Query);
                let expected: Vec<_> = std::iter::once(hash).chain(range).cloned().collect();
                assert_eq!(intent.key_conditions, expected);
                assert_eq!(intent.forward, *forward);
            }
            PlanMode::Scan { segments } => {
                assert_eq!(intent.operation, DynamoDBOperation::Scan);
                assert!(intent.key_conditions.is_empty());
                assert_eq!(intent.total_segments, *segments);
            }
        }
    }

    #[test]
    fn test_should_round_trip_hash_key_query() {
        round_trip(r#"SELECT * FROM GameScores WHERE UserId = "u1""#);
    }

    #[test]
    fn test_should_round_trip_range_query_with_filters() {
        round_trip(
            r#"SELECT UserId, TopScore FROM GameScores
               WHERE UserId = "u1" AND GameTitle BETWEEN "A" AND "M"
               AND Wins > 2 AND Losses IN (0, 1) ORDER ASC"#,
        );
    }

    #[test]
    fn test_should_round_trip_index_query() {
        round_trip(
            r#"SELECT * FROM GameScores WHERE GameTitle = "Meteor Blasters" AND TopScore >= 1000
               WITH (Index(GameTitleIndex, false), NoConsistentRead)"#,
        );
    }

    #[test]
    fn test_should_round_trip_scan_filters() {
        round_trip(
            r#"SELECT * FROM GameScores WHERE GameTitle NOT CONTAINS "X" AND Rank IS NULL
               AND Wins IS NOT NULL AND TopScoreDateTime < DATE "2012-05-01T00:00:00Z"
               WITH (Segments(2), NoConsistentRead)"#,
        );
    }

    #[test]
    fn test_should_reject_shapes_the_builder_never_emits() {
        let request = BuiltRequest::Scan(dynasql_model::input::ScanInput {
            table_name: "GameScores".to_owned(),
            filter_expression: Some("Wins = :a OR Losses = :a".to_owned()),
            expression_attribute_values: [(":a".to_owned(), AttributeValue::N("1".to_owned()))]
                .into_iter()
                .collect(),
            ..Default::default()
        });
        assert!(describe(&request).is_err());
    }
}
