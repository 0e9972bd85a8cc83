//! Plan to `QueryInput` / `ScanInput`.
//!
//! Attribute names always travel as `#n<i>` placeholders and values as
//! `:v<i>`, numbered in order of first use, so the same plan always yields
//! byte-identical requests.

mod intent;

use std::collections::HashMap;

use dynasql_model::input::{QueryInput, ScanInput};
use dynasql_model::types::{
    ExpressionAttributeNames, ExpressionAttributeValues, Key, ReturnConsumedCapacity,
};
use dynasql_model::{AttributeValue, DynamoDBOperation};

use crate::plan::{Plan, PlanMode};
use crate::sql::Operator;
use crate::validate::Condition;

pub use intent::{RequestIntent, describe};

/// A ready-to-send request, minus per-page `Limit` and `ExclusiveStartKey`.
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltRequest {
    Query(QueryInput),
    Scan(ScanInput),
}

impl BuiltRequest {
    #[must_use]
    pub fn operation(&self) -> DynamoDBOperation {
        match self {
            Self::Query(_) => DynamoDBOperation::Query,
            Self::Scan(_) => DynamoDBOperation::Scan,
        }
    }

    #[must_use]
    pub fn table_name(&self) -> &str {
        match self {
            Self::Query(q) => &q.table_name,
            Self::Scan(s) => &s.table_name,
        }
    }

    /// `TotalSegments` of a parallel scan, or 1.
    #[must_use]
    pub fn total_segments(&self) -> u32 {
        match self {
            Self::Scan(s) => s.total_segments.and_then(|n| u32::try_from(n).ok()).unwrap_or(1),
            Self::Query(_) => 1,
        }
    }

    /// The request for one page: `segment` of a parallel scan, resuming after
    /// `start_key`, evaluating at most `limit` items.
    #[must_use]
    pub fn page(&self, segment: Option<u32>, start_key: Option<&Key>, limit: Option<i32>) -> Self {
        let start_key = start_key.cloned().unwrap_or_default();
        match self {
            Self::Query(q) => Self::Query(QueryInput {
                limit,
                exclusive_start_key: start_key,
                ..q.clone()
            }),
            Self::Scan(s) => Self::Scan(ScanInput {
                limit,
                exclusive_start_key: start_key,
                segment: segment
                    .filter(|_| s.total_segments.is_some())
                    .and_then(|n| i32::try_from(n).ok()),
                ..s.clone()
            }),
        }
    }
}

#[derive(Debug, Default)]
struct Placeholders {
    names: ExpressionAttributeNames,
    by_attribute: HashMap<String, String>,
    values: ExpressionAttributeValues,
}

impl Placeholders {
    fn name(&mut self, attribute: &str) -> String {
        if let Some(existing) = self.by_attribute.get(attribute) {
            return existing.clone();
        }
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), attribute.to_owned());
        self.by_attribute.insert(attribute.to_owned(), placeholder.clone());
        placeholder
    }

    fn value(&mut self, value: &AttributeValue) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value.clone());
        placeholder
    }

    fn render(&mut self, condition: &Condition) -> String {
        let name = self.name(&condition.attribute);
        let values: Vec<String> = condition.values.iter().map(|v| self.value(v)).collect();
        let first = values.first().map_or("", String::as_str);
        match condition.operator {
            Operator::Eq => format!("{name} = {first}"),
            Operator::Ne => format!("{name} <> {first}"),
            Operator::Lt => format!("{name} < {first}"),
            Operator::Le => format!("{name} <= {first}"),
            Operator::Gt => format!("{name} > {first}"),
            Operator::Ge => format!("{name} >= {first}"),
            Operator::BeginsWith => format!("begins_with({name}, {first})"),
            Operator::Between => {
                let second = values.get(1).map_or("", String::as_str);
                format!("{name} BETWEEN {first} AND {second}")
            }
            Operator::Contains => format!("contains({name}, {first})"),
            Operator::NotContains => format!("NOT contains({name}, {first})"),
            Operator::In => format!("{name} IN ({})", values.join(", ")),
            Operator::IsNull => format!("attribute_not_exists({name})"),
            Operator::IsNotNull => format!("attribute_exists({name})"),
        }
    }

    fn conjunction<'c>(
        &mut self,
        conditions: impl IntoIterator<Item = &'c Condition>,
    ) -> Option<String> {
        let rendered: Vec<String> = conditions.into_iter().map(|c| self.render(c)).collect();
        (!rendered.is_empty()).then(|| rendered.join(" AND "))
    }
}

/// Build the request for a plan.
///
/// `Limit` and `ExclusiveStartKey` are left empty; the executor sets them per
/// page with [`BuiltRequest::page`].
#[must_use]
pub fn build(plan: &Plan) -> BuiltRequest {
    let mut placeholders = Placeholders::default();
    let return_consumed_capacity = Some(if plan.return_consumed_capacity {
        ReturnConsumedCapacity::Total
    } else {
        ReturnConsumedCapacity::None
    });

    match &plan.mode {
        PlanMode::Query {
            hash,
            range,
            forward,
        } => {
            let key_condition_expression = placeholders
                .conjunction(std::iter::once(hash).chain(range))
                .unwrap_or_default();
            let filter_expression = placeholders.conjunction(&plan.filters);
            let projection_expression = projection(&mut placeholders, plan);
            BuiltRequest::Query(QueryInput {
                table_name: plan.table.clone(),
                index_name: plan.index.clone(),
                key_condition_expression,
                filter_expression,
                projection_expression,
                expression_attribute_names: placeholders.names,
                expression_attribute_values: placeholders.values,
                scan_index_forward: *forward,
                limit: None,
                exclusive_start_key: Key::new(),
                select: plan.select,
                consistent_read: Some(plan.consistent_read),
                return_consumed_capacity,
            })
        }
        PlanMode::Scan { segments } => {
            let filter_expression = placeholders.conjunction(&plan.filters);
            let projection_expression = projection(&mut placeholders, plan);
            BuiltRequest::Scan(ScanInput {
                table_name: plan.table.clone(),
                index_name: plan.index.clone(),
                filter_expression,
                projection_expression,
                expression_attribute_names: placeholders.names,
                expression_attribute_values: placeholders.values,
                limit: None,
                exclusive_start_key: Key::new(),
                select: plan.select,
                segment: None,
                total_segments: segments.and_then(|n| i32::try_from(n).ok()),
                consistent_read: Some(plan.consistent_read),
                return_consumed_capacity,
            })
        }
    }
}

fn projection(placeholders: &mut Placeholders, plan: &Plan) -> Option<String> {
    let names = plan.projection.as_ref()?;
    let rendered: Vec<String> = names.iter().map(|n| placeholders.name(n)).collect();
    Some(rendered.join(", "))
}

#[cfg(test)]
mod tests {
    use dynasql_model::types::Select;

    use super::*;
    use crate::plan::plan;
    use crate::sql::parse;
    use crate::test_support::game_scores_schema;
    use crate::validate::{Mode, validate};

    fn build_sql(sql: &str) -> BuiltRequest {
        let validated = validate(&parse(sql).unwrap(), &game_scores_schema(), Mode::Auto).unwrap();
        build(&plan(validated))
    }

    #[test]
    fn test_should_build_range_key_query() {
        let BuiltRequest::Query(q) = build_sql(
            r#"SELECT * FROM GameScores
               WHERE UserId = "u1" AND GameTitle BEGINS WITH "A" ORDER DESC"#,
        ) else {
            panic!("expected a query");
        };
        assert_eq!(q.key_condition_expression, "#n0 = :v0 AND begins_with(#n1, :v1)");
        assert_eq!(q.expression_attribute_names["#n0"], "UserId");
        assert_eq!(q.expression_attribute_names["#n1"], "GameTitle");
        assert_eq!(q.expression_attribute_values[":v1"], AttributeValue::from("A"));
        assert_eq!(q.scan_index_forward, Some(false));
        assert_eq!(q.consistent_read, Some(true));
        assert_eq!(q.return_consumed_capacity, Some(ReturnConsumedCapacity::Total));
        assert_eq!(q.filter_expression, None);
        assert_eq!(q.limit, None);
    }

    #[test]
    fn test_should_render_every_filter_operator() {
        let BuiltRequest::Scan(s) = build_sql(
            r#"SELECT * FROM GameScores WHERE Wins != 1 AND GameTitle CONTAINS "Ship"
               AND GameTitle NOT CONTAINS "X" AND Losses IN (1, 2) AND Rank IS NULL
               AND Wins IS NOT NULL AND TopScore BETWEEN 10 AND 20"#,
        ) else {
            panic!("expected a scan");
        };
        assert_eq!(
            s.filter_expression.as_deref(),
            Some(
                "#n0 <> :v0 AND contains(#n1, :v1) AND NOT contains(#n1, :v2) \
                 AND #n2 IN (:v3, :v4) AND attribute_not_exists(#n3) \
                 AND attribute_exists(#n0) AND #n4 BETWEEN :v5 AND :v6"
            )
        );
        assert_eq!(s.expression_attribute_names.len(), 5);
        assert_eq!(s.expression_attribute_values.len(), 7);
    }

    #[test]
    fn test_should_normalize_dates_and_keep_number_text() {
        let BuiltRequest::Scan(s) = build_sql(
            r#"SELECT * FROM GameScores
               WHERE TopScoreDateTime > DATE "2012-05-01" AND Wins >= 1.50"#,
        ) else {
            panic!("expected a scan");
        };
        assert_eq!(
            s.expression_attribute_values[":v0"],
            AttributeValue::from("2012-05-01T00:00:00.000Z")
        );
        assert_eq!(s.expression_attribute_values[":v1"], AttributeValue::N("1.50".to_owned()));
    }

    #[test]
    fn test_should_project_through_placeholders() {
        let BuiltRequest::Query(q) = build_sql(
            r#"SELECT UserId, Wins FROM GameScores WHERE UserId = "u1" WITH (NoReturnedCapacity)"#,
        ) else {
            panic!("expected a query");
        };
        assert_eq!(q.projection_expression.as_deref(), Some("#n0, #n1"));
        assert_eq!(q.select, Some(Select::SpecificAttributes));
        assert_eq!(q.return_consumed_capacity, Some(ReturnConsumedCapacity::None));
    }

    #[test]
    fn test_should_be_deterministic() {
        let sql = r#"SELECT * FROM GameScores WHERE UserId = "u1" AND Wins > 3 AND Losses < 2"#;
        assert_eq!(build_sql(sql), build_sql(sql));
    }

    #[test]
    fn test_should_page_segmented_scan() {
        let built = build_sql("SELECT * FROM GameScores WITH (Segments(2), NoConsistentRead)");
        assert_eq!(built.total_segments(), 2);
        let key = Key::from([("UserId".to_owned(), AttributeValue::from("u9"))]);
        let BuiltRequest::Scan(s) = built.page(Some(1), Some(&key), Some(5)) else {
            panic!("expected a scan");
        };
        assert_eq!(s.segment, Some(1));
        assert_eq!(s.total_segments, Some(2));
        assert_eq!(s.limit, Some(5));
        assert_eq!(s.exclusive_start_key, key);
        assert_eq!(s.consistent_read, Some(false));
    }
}
