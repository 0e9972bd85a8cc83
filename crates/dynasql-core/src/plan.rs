//! Query planning: choose Query or Scan, split key conditions from filters and
//! settle the request-level options.

use dynasql_model::types::Select;

use crate::sql::Projection;
use crate::validate::{Access, Condition, ValidatedStatement};

/// How the plan reads the table.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanMode {
    Query {
        hash: Condition,
        range: Option<Condition>,
        /// `ScanIndexForward`; `None` leaves the service default (ascending).
        forward: Option<bool>,
    },
    Scan {
        /// Parallel scan fan-out; `None` for a single sequential scan.
        segments: Option<u32>,
    },
}

/// Everything the request builder and executor need.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub table: String,
    pub index: Option<String>,
    pub mode: PlanMode,
    /// Non-key conditions, applied by the service after items are read.
    pub filters: Vec<Condition>,
    /// Attributes to return; `None` returns whatever `select` implies.
    pub projection: Option<Vec<String>>,
    pub select: Option<Select>,
    pub consistent_read: bool,
    pub return_consumed_capacity: bool,
    /// Overall cap on returned items.
    pub limit: Option<u32>,
    /// Items requested per round trip.
    pub page_size: Option<u32>,
}

impl Plan {
    #[must_use]
    pub fn is_query(&self) -> bool {
        matches!(self.mode, PlanMode::Query { .. })
    }

    /// Number of independent page streams the executor runs.
    #[must_use]
    pub fn segments(&self) -> u32 {
        match self.mode {
            PlanMode::Scan {
                segments: Some(n), ..
            } => n,
            _ => 1,
        }
    }
}

/// Build the plan for a validated statement.
#[must_use]
pub fn plan(validated: ValidatedStatement) -> Plan {
    let ValidatedStatement {
        statement,
        conditions,
        access,
        index,
    } = validated;

    let (mode, filters) = match access {
        Access::Query { hash, range } => {
            let mut filters = Vec::with_capacity(conditions.len());
            let mut hash_condition = None;
            let mut range_condition = None;
            for (i, condition) in conditions.into_iter().enumerate() {
                if i == hash {
                    hash_condition = Some(condition);
                } else if Some(i) == range {
                    range_condition = Some(condition);
                } else {
                    filters.push(condition);
                }
            }
            match hash_condition {
                Some(hash) => (
                    PlanMode::Query {
                        hash,
                        range: range_condition,
                        forward: statement.order.map(|o| o.is_forward()),
                    },
                    filters,
                ),
                // Access indices always point into `conditions`; fall back to a
                // scan over everything rather than dropping a predicate.
                None => (
                    PlanMode::Scan { segments: None },
                    range_condition.into_iter().chain(filters).collect(),
                ),
            }
        }
        Access::Scan => (
            PlanMode::Scan {
                segments: statement.options.segments,
            },
            conditions,
        ),
    };

    let selection = statement.options.index.as_ref();
    let (projection, select) = match statement.projection {
        Projection::Count => (None, Some(Select::Count)),
        Projection::Attributes(names) => (Some(names), Some(Select::SpecificAttributes)),
        Projection::All => match selection {
            Some(s) if s.all_attributes => (None, Some(Select::AllAttributes)),
            Some(_) => (None, Some(Select::AllProjectedAttributes)),
            None => (None, None),
        },
    };

    Plan {
        table: statement.table,
        index: index.map(|i| i.name),
        mode,
        filters,
        projection,
        select,
        consistent_read: statement.options.consistent_read,
        return_consumed_capacity: statement.options.return_consumed_capacity,
        limit: statement.limit,
        page_size: statement.options.page_size,
    }
}
