//! In-memory DynamoDB backend.
//!
//! Serves `Query`, `Scan` and `BatchWriteItem` from process memory so the
//! compiler and executor can be exercised without a service.
//!
//! # Layout
//!
//! ```text
//! DashMap<TableName, MemoryTable>
//! MemoryTable: DashMap<PartitionKey, BTreeMap<SortableAttributeValue, Item>>
//! ```
//!
//! Items within a partition are ordered by sort key following DynamoDB
//! comparison rules. Secondary indexes are not materialised; an index read
//! collects every item carrying the index keys and orders it on the fly.
//!
//! Paging mirrors the service: `Limit` caps items *evaluated* (before the
//! filter), a page stops at 1 MiB of evaluated data, and `LastEvaluatedKey`
//! is returned only when more items remain.

use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use dashmap::DashMap;
use dynasql_model::input::{BatchWriteItemInput, QueryInput, ScanInput};
use dynasql_model::output::{BatchWriteItemOutput, QueryOutput, ScanOutput};
use dynasql_model::types::{
    ConsumedCapacity, Item, Key, ReturnConsumedCapacity, ScalarAttributeType, Select, WriteRequest,
};
use dynasql_model::{AttributeValue, DynamoDBError, DynamoDBErrorCode};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::batch::MAX_BATCH_WRITE;
use crate::client::DynamoDbApi;
use crate::error::expression_error_to_dynamodb;
use crate::expression::{CompareOp, EvalContext, Expr, FunctionName, Operand, ParsedExpressions};
use crate::schema::{
    IndexKind, IndexProjection, KeyAttribute, KeySchema, SecondaryIndex, TableSchema,
};

/// Evaluated bytes after which a page ends.
pub const MAX_PAGE_BYTES: usize = 1024 * 1024;

const READ_UNIT_BYTES: usize = 4 * 1024;
const WRITE_UNIT_BYTES: usize = 1024;

/// Item-level failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("One of the required keys was not given a value: {attr}")]
    MissingKeyAttribute { attr: String },

    #[error("Type mismatch for key {attr} expected: {expected} actual: {actual}")]
    InvalidKeyType {
        attr: String,
        expected: ScalarAttributeType,
        actual: &'static str,
    },
}

impl From<StorageError> for DynamoDBError {
    fn from(e: StorageError) -> Self {
        DynamoDBError::validation(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Sort keys
// ---------------------------------------------------------------------------

/// A key value with DynamoDB ordering: strings by UTF-8 bytes, numbers
/// numerically, binaries byte-wise.
#[derive(Debug, Clone)]
pub enum SortableAttributeValue {
    S(String),
    N(String),
    B(bytes::Bytes),
    /// Stands in for an absent sort key.
    Sentinel,
}

impl SortableAttributeValue {
    /// Wrap a key-eligible value; other types map to `Sentinel`.
    #[must_use]
    pub fn new(value: Option<&AttributeValue>) -> Self {
        match value {
            Some(AttributeValue::S(s)) => Self::S(s.clone()),
            Some(AttributeValue::N(n)) => Self::N(n.clone()),
            Some(AttributeValue::B(b)) => Self::B(b.clone()),
            _ => Self::Sentinel,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::S(_) => 0,
            Self::N(_) => 1,
            Self::B(_) => 2,
            Self::Sentinel => 3,
        }
    }
}

impl PartialEq for SortableAttributeValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortableAttributeValue {}

impl PartialOrd for SortableAttributeValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortableAttributeValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::S(a), Self::S(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Self::N(a), Self::N(b)) => {
                let fa = a.parse::<f64>().unwrap_or(f64::NAN);
                let fb = b.parse::<f64>().unwrap_or(f64::NAN);
                fa.partial_cmp(&fb).unwrap_or(Ordering::Equal)
            }
            (Self::B(a), Self::B(b)) => a.as_ref().cmp(b.as_ref()),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// A sort-key condition taken from a key-condition expression.
#[derive(Debug, Clone)]
enum SortKeyCondition {
    Compare(CompareOp, SortableAttributeValue),
    Between(SortableAttributeValue, SortableAttributeValue),
    BeginsWith(String),
}

impl SortKeyCondition {
    fn matches(&self, value: &SortableAttributeValue) -> bool {
        match self {
            Self::Compare(op, target) => {
                let ord = value.cmp(target);
                match op {
                    CompareOp::Eq => ord == Ordering::Equal,
                    CompareOp::Lt => ord == Ordering::Less,
                    CompareOp::Le => ord != Ordering::Greater,
                    CompareOp::Gt => ord == Ordering::Greater,
                    CompareOp::Ge => ord != Ordering::Less,
                    CompareOp::Ne => false,
                }
            }
            Self::Between(lo, hi) => value >= lo && value <= hi,
            Self::BeginsWith(prefix) => {
                matches!(value, SortableAttributeValue::S(s) if s.starts_with(prefix.as_str()))
            }
        }
    }

    /// Bounds for a `BTreeMap::range` over a partition.
    fn bounds(&self) -> (Bound<SortableAttributeValue>, Bound<SortableAttributeValue>) {
        match self {
            Self::Compare(CompareOp::Eq, v) => {
                (Bound::Included(v.clone()), Bound::Included(v.clone()))
            }
            Self::Compare(CompareOp::Lt, v) => (Bound::Unbounded, Bound::Excluded(v.clone())),
            Self::Compare(CompareOp::Le, v) => (Bound::Unbounded, Bound::Included(v.clone())),
            Self::Compare(CompareOp::Gt, v) => (Bound::Excluded(v.clone()), Bound::Unbounded),
            Self::Compare(CompareOp::Ge, v) => (Bound::Included(v.clone()), Bound::Unbounded),
            Self::Compare(CompareOp::Ne, _) => (Bound::Unbounded, Bound::Unbounded),
            Self::Between(lo, hi) => (Bound::Included(lo.clone()), Bound::Included(hi.clone())),
            Self::BeginsWith(prefix) => (
                Bound::Included(SortableAttributeValue::S(prefix.clone())),
                Bound::Unbounded,
            ),
        }
    }
}

/// Hash value and optional sort condition of a `Query`.
#[derive(Debug)]
struct KeyConditions {
    hash: AttributeValue,
    range: Option<SortKeyCondition>,
}

impl KeyConditions {
    fn extract(
        expr: &Expr,
        ctx: &EvalContext<'_>,
        keys: &KeySchema,
    ) -> Result<Self, DynamoDBError> {
        let invalid = |msg: &str| {
            DynamoDBError::validation(format!("Query key condition not supported: {msg}"))
        };
        let mut hash = None;
        let mut range = None;

        for part in expr.conjuncts() {
            let (attribute, condition) = match part {
                Expr::Compare { left, op, right } => {
                    let value = resolve_value(ctx, right)?;
                    (path_name(ctx, left)?, KeyPart::Compare(*op, value))
                }
                Expr::Between { value, low, high } => (
                    path_name(ctx, value)?,
                    KeyPart::Between(resolve_value(ctx, low)?, resolve_value(ctx, high)?),
                ),
                Expr::Function {
                    name: FunctionName::BeginsWith,
                    args,
                } if args.len() == 2 => (
                    path_name(ctx, &args[0])?,
                    KeyPart::BeginsWith(resolve_value(ctx, &args[1])?),
                ),
                _ => {
                    return Err(invalid(
                        "only =, <, <=, >, >=, BETWEEN and begins_with are allowed",
                    ));
                }
            };

            if attribute == keys.hash_key.name {
                let KeyPart::Compare(CompareOp::Eq, value) = condition else {
                    return Err(invalid("the partition key requires an equality condition"));
                };
                if hash.replace(check_key_type(&keys.hash_key, value)?).is_some() {
                    return Err(invalid("multiple conditions on the partition key"));
                }
            } else if let Some(range_key) =
                keys.range_key.as_ref().filter(|k| k.name == attribute)
            {
                let sort = match condition {
                    KeyPart::Compare(CompareOp::Ne, _) => {
                        return Err(invalid("<> is not allowed on the sort key"));
                    }
                    KeyPart::Compare(op, v) => {
                        let v = check_key_type(range_key, v)?;
                        SortKeyCondition::Compare(op, SortableAttributeValue::new(Some(&v)))
                    }
                    KeyPart::Between(lo, hi) => {
                        let lo = SortableAttributeValue::new(Some(&check_key_type(range_key, lo)?));
                        let hi = SortableAttributeValue::new(Some(&check_key_type(range_key, hi)?));
                        if lo > hi {
                            return Err(DynamoDBError::validation(
                                "Invalid KeyConditionExpression: The BETWEEN operator requires \
                                 upper bound to be greater than or equal to lower bound",
                            ));
                        }
                        SortKeyCondition::Between(lo, hi)
                    }
                    KeyPart::BeginsWith(AttributeValue::S(prefix))
                        if range_key.attr_type == ScalarAttributeType::S =>
                    {
                        SortKeyCondition::BeginsWith(prefix)
                    }
                    KeyPart::BeginsWith(_) => {
                        return Err(invalid("begins_with requires a string sort key and prefix"));
                    }
                };
                if range.replace(sort).is_some() {
                    return Err(invalid("multiple conditions on the sort key"));
                }
            } else {
                return Err(invalid(&format!("'{attribute}' is not a key attribute")));
            }
        }

        let hash = hash.ok_or_else(|| invalid("missing partition key equality condition"))?;
        Ok(Self { hash, range })
    }
}

#[derive(Debug)]
enum KeyPart {
    Compare(CompareOp, AttributeValue),
    Between(AttributeValue, AttributeValue),
    BeginsWith(AttributeValue),
}

fn path_name(ctx: &EvalContext<'_>, operand: &Operand) -> Result<String, DynamoDBError> {
    let Operand::Path(path) = operand else {
        return Err(DynamoDBError::validation(
            "key condition must compare an attribute with a value",
        ));
    };
    let top = path.top().unwrap_or_default();
    ctx.resolve_name(top).map(str::to_owned).map_err(expression_error_to_dynamodb)
}

fn resolve_value(
    ctx: &EvalContext<'_>,
    operand: &Operand,
) -> Result<AttributeValue, DynamoDBError> {
    match operand {
        Operand::Value(_) => ctx
            .resolve_operand(operand)
            .map_err(expression_error_to_dynamodb)?
            .cloned()
            .ok_or_else(|| DynamoDBError::validation("unresolved value")),
        Operand::Path(_) => Err(DynamoDBError::validation(
            "key condition must compare an attribute with a value",
        )),
    }
}

fn check_key_type(
    key: &KeyAttribute,
    value: AttributeValue,
) -> Result<AttributeValue, DynamoDBError> {
    if key.attr_type.matches(&value) {
        Ok(value)
    } else {
        Err(StorageError::InvalidKeyType {
            attr: key.name.clone(),
            expected: key.attr_type,
            actual: value.type_descriptor(),
        }
        .into())
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct MemoryTable {
    schema: TableSchema,
    partitions: DashMap<AttributeValue, BTreeMap<SortableAttributeValue, Item>>,
}

impl MemoryTable {
    fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            partitions: DashMap::new(),
        }
    }

    fn primary_key(
        &self,
        attrs: &Item,
    ) -> Result<(AttributeValue, SortableAttributeValue), StorageError> {
        let keys = &self.schema.keys;
        let hash = key_value(&keys.hash_key, attrs)?.clone();
        let sort = match &keys.range_key {
            Some(range) => SortableAttributeValue::new(Some(key_value(range, attrs)?)),
            None => SortableAttributeValue::Sentinel,
        };
        Ok((hash, sort))
    }

    fn put(&self, item: Item) -> Result<(), StorageError> {
        let (hash, sort) = self.primary_key(&item)?;
        for index in &self.schema.indexes {
            // Index keys are optional on an item, but must have the right type when present.
            for key in std::iter::once(&index.keys.hash_key).chain(&index.keys.range_key) {
                if let Some(value) = item.get(&key.name) {
                    if !key.attr_type.matches(value) {
                        return Err(StorageError::InvalidKeyType {
                            attr: key.name.clone(),
                            expected: key.attr_type,
                            actual: value.type_descriptor(),
                        });
                    }
                }
            }
        }
        self.partitions.entry(hash).or_default().insert(sort, item);
        Ok(())
    }

    fn delete(&self, key: &Key) -> Result<(), StorageError> {
        let (hash, sort) = self.primary_key(key)?;
        if let Some(mut partition) = self.partitions.get_mut(&hash) {
            partition.remove(&sort);
        }
        Ok(())
    }

    fn get(&self, key: &Key) -> Option<Item> {
        let (hash, sort) = self.primary_key(key).ok()?;
        self.partitions.get(&hash)?.get(&sort).cloned()
    }

    fn len(&self) -> usize {
        self.partitions.iter().map(|p| p.value().len()).sum()
    }

    /// Names of the key attributes identifying an item read through `index`.
    fn key_names(&self, index: Option<&SecondaryIndex>) -> Vec<String> {
        let mut names = Vec::with_capacity(4);
        for keys in std::iter::once(&self.schema.keys).chain(index.map(|i| &i.keys)) {
            for key in std::iter::once(&keys.hash_key).chain(&keys.range_key) {
                if !names.contains(&key.name) {
                    names.push(key.name.clone());
                }
            }
        }
        names
    }
}

fn key_value<'a>(key: &KeyAttribute, item: &'a Item) -> Result<&'a AttributeValue, StorageError> {
    let value = item.get(&key.name).ok_or_else(|| StorageError::MissingKeyAttribute {
        attr: key.name.clone(),
    })?;
    if key.attr_type.matches(value) {
        Ok(value)
    } else {
        Err(StorageError::InvalidKeyType {
            attr: key.name.clone(),
            expected: key.attr_type,
            actual: value.type_descriptor(),
        })
    }
}

fn has_keys(keys: &KeySchema, item: &Item) -> bool {
    std::iter::once(&keys.hash_key)
        .chain(&keys.range_key)
        .all(|k| item.get(&k.name).is_some_and(|v| k.attr_type.matches(v)))
}

fn sort_tuple(item: &Item, names: &[String]) -> Vec<SortableAttributeValue> {
    names.iter().map(|n| SortableAttributeValue::new(item.get(n))).collect()
}

fn project_key(item: &Item, names: &[String]) -> Key {
    names
        .iter()
        .filter_map(|n| item.get(n).map(|v| (n.clone(), v.clone())))
        .collect()
}

/// Segment of a parallel scan that owns partition `hash`.
fn segment_of(hash: &AttributeValue, total_segments: u32) -> u32 {
    let mut hasher = DefaultHasher::new();
    hash.hash(&mut hasher);
    // Truncation is fine: only the remainder matters.
    #[allow(clippy::cast_possible_truncation)]
    let h = hasher.finish() as u32;
    h % total_segments.max(1)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Fields shared by `Query` and `Scan`.
#[derive(Debug)]
struct ReadRequest<'a> {
    table_name: &'a str,
    index_name: Option<&'a str>,
    key_condition: Option<&'a str>,
    filter: Option<&'a str>,
    projection: Option<&'a str>,
    names: &'a HashMap<String, String>,
    values: &'a HashMap<String, AttributeValue>,
    forward: bool,
    limit: Option<i32>,
    start_key: &'a Key,
    select: Option<Select>,
    segment: Option<(i32, i32)>,
    consistent_read: bool,
    return_consumed_capacity: Option<ReturnConsumedCapacity>,
}

#[derive(Debug)]
struct ReadOutput {
    items: Vec<Item>,
    count: i32,
    scanned_count: i32,
    last_evaluated_key: Key,
    consumed_capacity: Option<ConsumedCapacity>,
}

/// In-memory implementation of [`DynamoDbApi`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: DashMap<String, Arc<MemoryTable>>,
    read_requests: AtomicUsize,
    write_requests: AtomicUsize,
    /// Calls left before every call fails with the stored code.
    failure: Mutex<Option<(usize, DynamoDBErrorCode)>>,
    throttled_writes: AtomicUsize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) an empty table.
    pub fn create_table(&self, schema: TableSchema) {
        debug!(table = %schema.name, indexes = schema.indexes.len(), "creating in-memory table");
        self.tables
            .insert(schema.name.clone(), Arc::new(MemoryTable::new(schema)));
    }

    /// Store one item directly, bypassing the request counters.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFoundException` for an unknown table or
    /// `ValidationException` if a key attribute is missing or mistyped.
    pub fn put_item(&self, table: &str, item: Item) -> Result<(), DynamoDBError> {
        Ok(self.table(table)?.put(item)?)
    }

    #[must_use]
    pub fn get_item(&self, table: &str, key: &Key) -> Option<Item> {
        self.tables.get(table)?.get(key)
    }

    #[must_use]
    pub fn item_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |t| t.len())
    }

    /// `Query` and `Scan` calls served so far.
    #[must_use]
    pub fn read_requests(&self) -> usize {
        self.read_requests.load(AtomicOrdering::Relaxed)
    }

    /// `BatchWriteItem` calls served so far.
    #[must_use]
    pub fn write_requests(&self) -> usize {
        self.write_requests.load(AtomicOrdering::Relaxed)
    }

    /// Let `calls` more calls succeed, then fail every call with `code`.
    pub fn fail_after(&self, calls: usize, code: DynamoDBErrorCode) {
        *self.failure.lock() = Some((calls, code));
    }

    /// Return the next `requests` batch write requests as unprocessed.
    pub fn throttle_batch_writes(&self, requests: usize) {
        self.throttled_writes.store(requests, AtomicOrdering::Relaxed);
    }

    fn table(&self, name: &str) -> Result<Arc<MemoryTable>, DynamoDBError> {
        self.tables
            .get(name)
            .map(|t| Arc::clone(t.value()))
            .ok_or_else(|| DynamoDBError::resource_not_found("Requested resource not found"))
    }

    fn injected_failure(&self) -> Result<(), DynamoDBError> {
        let mut failure = self.failure.lock();
        match failure.as_mut() {
            Some((0, code)) => Err(DynamoDBError::with_message(*code, "injected failure")),
            Some((left, _)) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn take_throttled(&self) -> bool {
        self.throttled_writes
            .fetch_update(AtomicOrdering::Relaxed, AtomicOrdering::Relaxed, |n| n.checked_sub(1))
            .is_ok()
    }

    fn read(&self, req: &ReadRequest<'_>) -> Result<ReadOutput, DynamoDBError> {
        self.read_requests.fetch_add(1, AtomicOrdering::Relaxed);
        self.injected_failure()?;
        let table = self.table(req.table_name)?;
        let schema = &table.schema;

        let index = req
            .index_name
            .map(|name| {
                schema.index(name).ok_or_else(|| {
                    DynamoDBError::validation(format!(
                        "The table does not have the specified index: {name}"
                    ))
                })
            })
            .transpose()?;
        if req.consistent_read && index.is_some_and(|i| i.kind == IndexKind::Global) {
            return Err(DynamoDBError::validation(
                "Consistent reads are not supported on global secondary indexes",
            ));
        }
        if req.limit.is_some_and(|l| l < 1) {
            return Err(DynamoDBError::validation("Limit must be greater than or equal to 1"));
        }
        check_select(req, index)?;

        let parsed = ParsedExpressions::parse(
            req.key_condition,
            req.filter,
            req.projection,
            req.names,
            req.values,
        )
        .map_err(expression_error_to_dynamodb)?;
        let empty = Item::new();
        let ctx = EvalContext {
            item: &empty,
            names: req.names,
            values: req.values,
        };

        let effective_keys = index.map_or(&schema.keys, |i| &i.keys);
        let key_names = table.key_names(index);
        let (mut candidates, order) = match &parsed.key_condition {
            Some(expr) => {
                let conditions = KeyConditions::extract(expr, &ctx, effective_keys)?;
                query_candidates(&table, index, &conditions)
            }
            None => scan_candidates(&table, index, req.segment)?,
        };
        if !req.forward {
            candidates.reverse();
        }

        let start = if req.start_key.is_empty() {
            0
        } else {
            let start = sort_tuple(req.start_key, &order);
            candidates
                .iter()
                .position(|(t, _)| if req.forward { *t > start } else { *t < start })
                .unwrap_or(candidates.len())
        };

        let limit = req
            .limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);
        let mut evaluated = Vec::new();
        let mut bytes = 0;
        for (_, item) in candidates.iter().skip(start) {
            if evaluated.len() >= limit || bytes >= MAX_PAGE_BYTES {
                break;
            }
            bytes += item_size(item);
            evaluated.push(item);
        }
        let more = start + evaluated.len() < candidates.len();
        let last_evaluated_key = match evaluated.last() {
            Some(last) if more => project_key(last, &key_names),
            _ => Key::new(),
        };

        let scanned_count = evaluated.len();
        let mut items = Vec::new();
        for item in evaluated {
            let item_ctx = EvalContext {
                item,
                names: req.names,
                values: req.values,
            };
            if let Some(filter) = &parsed.filter {
                if !item_ctx.evaluate(filter).map_err(expression_error_to_dynamodb)? {
                    continue;
                }
            }
            let projected = match (&parsed.projection, req.select, index) {
                (Some(paths), _, _) => item_ctx
                    .apply_projection(paths)
                    .map_err(expression_error_to_dynamodb)?,
                (None, Some(Select::AllAttributes), _) | (None, _, None) => item.clone(),
                (None, _, Some(index)) => match schema.projected_attributes(index) {
                    Some(names) => project_key(item, &names),
                    None => item.clone(),
                },
            };
            items.push(projected);
        }

        let count = items.len();
        if req.select == Some(Select::Count) {
            items.clear();
        }

        let consumed_capacity = req
            .return_consumed_capacity
            .filter(ReturnConsumedCapacity::should_report)
            .map(|_| {
                ConsumedCapacity::read(req.table_name, read_units(bytes, req.consistent_read))
            });

        debug!(
            table = req.table_name,
            index = ?req.index_name,
            scanned_count,
            count,
            more,
            "served in-memory read"
        );

        Ok(ReadOutput {
            items,
            count: i32::try_from(count).unwrap_or(i32::MAX),
            scanned_count: i32::try_from(scanned_count).unwrap_or(i32::MAX),
            last_evaluated_key,
            consumed_capacity,
        })
    }
}

fn check_select(
    req: &ReadRequest<'_>,
    index: Option<&SecondaryIndex>,
) -> Result<(), DynamoDBError> {
    if let Some(select) = req.select.filter(|s| *s != Select::SpecificAttributes) {
        if req.projection.is_some() {
            return Err(DynamoDBError::validation(format!(
                "Cannot specify the ProjectionExpression when choosing to get {select}"
            )));
        }
    }
    if req.select == Some(Select::SpecificAttributes) && req.projection.is_none() {
        return Err(DynamoDBError::validation(
            "SPECIFIC_ATTRIBUTES requires a ProjectionExpression",
        ));
    }
    if req.select == Some(Select::AllProjectedAttributes) && index.is_none() {
        return Err(DynamoDBError::validation(
            "ALL_PROJECTED_ATTRIBUTES can be used only when querying an index",
        ));
    }
    if let Some(index) = index {
        if req.select == Some(Select::AllAttributes)
            && index.kind == IndexKind::Global
            && index.projection != IndexProjection::All
        {
            return Err(DynamoDBError::validation(format!(
                "One or more parameter values were invalid: Select type ALL_ATTRIBUTES is not \
                 supported for global secondary index {} because its projection type is not ALL",
                index.name
            )));
        }
    }
    Ok(())
}

type Candidates = Vec<(Vec<SortableAttributeValue>, Item)>;

/// Items matching the key conditions, in ascending key order, plus the names
/// of the attributes that order them.
fn query_candidates(
    table: &MemoryTable,
    index: Option<&SecondaryIndex>,
    conditions: &KeyConditions,
) -> (Candidates, Vec<String>) {
    let schema = &table.schema;
    let Some(index) = index else {
        let order: Vec<String> = schema.keys.range_key.iter().map(|k| k.name.clone()).collect();
        let Some(partition) = table.partitions.get(&conditions.hash) else {
            return (Vec::new(), order);
        };
        let items: Vec<&Item> = match &conditions.range {
            Some(cond) => partition
                .range(cond.bounds())
                .filter(|(k, _)| cond.matches(k))
                .map(|(_, item)| item)
                .collect(),
            None => partition.values().collect(),
        };
        let candidates = items
            .into_iter()
            .map(|item| (sort_tuple(item, &order), item.clone()))
            .collect();
        return (candidates, order);
    };

    let mut order: Vec<String> = index.keys.range_key.iter().map(|k| k.name.clone()).collect();
    for name in table.key_names(None) {
        if !order.contains(&name) && name != index.keys.hash_key.name {
            order.push(name);
        }
    }
    let range_key = index.keys.range_key.as_ref().map(|k| k.name.as_str());
    let mut candidates: Candidates = Vec::new();
    let mut collect = |partition: &BTreeMap<SortableAttributeValue, Item>| {
        for item in partition.values() {
            if !has_keys(&index.keys, item)
                || item.get(&index.keys.hash_key.name) != Some(&conditions.hash)
            {
                continue;
            }
            let range_ok = match (&conditions.range, range_key) {
                (Some(cond), Some(name)) => {
                    cond.matches(&SortableAttributeValue::new(item.get(name)))
                }
                _ => true,
            };
            if range_ok {
                candidates.push((sort_tuple(item, &order), item.clone()));
            }
        }
    };
    if index.kind == IndexKind::Local {
        if let Some(partition) = table.partitions.get(&conditions.hash) {
            collect(partition.value());
        }
    } else {
        for partition in &table.partitions {
            collect(partition.value());
        }
    }
    candidates.sort_by(|a, b| a.0.cmp(&b.0));
    (candidates, order)
}

/// Every item of the table (or every item carrying the index keys), ordered
/// by key, restricted to one segment when scanning in parallel.
fn scan_candidates(
    table: &MemoryTable,
    index: Option<&SecondaryIndex>,
    segment: Option<(i32, i32)>,
) -> Result<(Candidates, Vec<String>), DynamoDBError> {
    let segment = match segment {
        Some((segment, total)) => {
            let total = u32::try_from(total)
                .ok()
                .filter(|t| (1..=crate::validate::MAX_SEGMENTS).contains(t))
                .ok_or_else(|| {
                    DynamoDBError::validation("TotalSegments must be between 1 and 1000000")
                })?;
            let segment = u32::try_from(segment)
                .ok()
                .filter(|s| *s < total)
                .ok_or_else(|| {
                    DynamoDBError::validation("Segment must be less than TotalSegments")
                })?;
            Some((segment, total))
        }
        None => None,
    };

    let order = match index {
        Some(index) => {
            let mut order = Vec::new();
            for keys in [&index.keys, &table.schema.keys] {
                for key in std::iter::once(&keys.hash_key).chain(&keys.range_key) {
                    if !order.contains(&key.name) {
                        order.push(key.name.clone());
                    }
                }
            }
            order
        }
        None => table.key_names(None),
    };

    let mut candidates: Candidates = Vec::new();
    for partition in &table.partitions {
        if let Some((segment, total)) = segment {
            if segment_of(partition.key(), total) != segment {
                continue;
            }
        }
        for item in partition.value().values() {
            if index.is_none_or(|i| has_keys(&i.keys, item)) {
                candidates.push((sort_tuple(item, &order), item.clone()));
            }
        }
    }
    candidates.sort_by(|a, b| a.0.cmp(&b.0));
    Ok((candidates, order))
}

/// Approximate DynamoDB item size: attribute names plus values.
fn item_size(item: &Item) -> usize {
    item.iter().map(|(k, v)| k.len() + v.size_bytes()).sum()
}

fn read_units(bytes: usize, consistent: bool) -> f64 {
    let units = bytes.div_ceil(READ_UNIT_BYTES).max(1);
    #[allow(clippy::cast_precision_loss)]
    let units = units as f64;
    if consistent { units } else { units / 2.0 }
}

#[async_trait::async_trait]
impl DynamoDbApi for MemoryStore {
    async fn query(&self, input: QueryInput) -> Result<QueryOutput, DynamoDBError> {
        let out = self.read(&ReadRequest {
            table_name: &input.table_name,
            index_name: input.index_name.as_deref(),
            key_condition: Some(&input.key_condition_expression),
            filter: input.filter_expression.as_deref(),
            projection: input.projection_expression.as_deref(),
            names: &input.expression_attribute_names,
            values: &input.expression_attribute_values,
            forward: input.scan_index_forward.unwrap_or(true),
            limit: input.limit,
            start_key: &input.exclusive_start_key,
            select: input.select,
            segment: None,
            consistent_read: input.consistent_read.unwrap_or(false),
            return_consumed_capacity: input.return_consumed_capacity,
        })?;
        Ok(QueryOutput {
            items: out.items,
            count: out.count,
            scanned_count: out.scanned_count,
            last_evaluated_key: out.last_evaluated_key,
            consumed_capacity: out.consumed_capacity,
        })
    }

    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, DynamoDBError> {
        let segment = match (input.segment, input.total_segments) {
            (Some(s), Some(t)) => Some((s, t)),
            (None, None) => None,
            _ => {
                return Err(DynamoDBError::validation(
                    "Segment and TotalSegments must be specified together",
                ));
            }
        };
        let out = self.read(&ReadRequest {
            table_name: &input.table_name,
            index_name: input.index_name.as_deref(),
            key_condition: None,
            filter: input.filter_expression.as_deref(),
            projection: input.projection_expression.as_deref(),
            names: &input.expression_attribute_names,
            values: &input.expression_attribute_values,
            forward: true,
            limit: input.limit,
            start_key: &input.exclusive_start_key,
            select: input.select,
            segment,
            consistent_read: input.consistent_read.unwrap_or(false),
            return_consumed_capacity: input.return_consumed_capacity,
        })?;
        Ok(ScanOutput {
            items: out.items,
            count: out.count,
            scanned_count: out.scanned_count,
            last_evaluated_key: out.last_evaluated_key,
            consumed_capacity: out.consumed_capacity,
        })
    }

    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, DynamoDBError> {
        self.write_requests.fetch_add(1, AtomicOrdering::Relaxed);
        self.injected_failure()?;
        if input.is_empty() {
            return Err(DynamoDBError::validation(
                "1 validation error detected: Value at 'requestItems' failed to satisfy \
                 constraint: Member must have length greater than or equal to 1",
            ));
        }
        if input.len() > MAX_BATCH_WRITE {
            return Err(DynamoDBError::validation(format!(
                "Too many items requested for the BatchWriteItem call: {} > {MAX_BATCH_WRITE}",
                input.len()
            )));
        }
        let tables = input
            .request_items
            .keys()
            .map(|name| self.table(name).map(|t| (name.clone(), t)))
            .collect::<Result<HashMap<_, _>, _>>()?;

        let mut output = BatchWriteItemOutput::default();
        for (table_name, requests) in input.request_items {
            let Some(table) = tables.get(&table_name) else { continue };
            let mut bytes = 0;
            for request in requests {
                if self.take_throttled() {
                    output
                        .unprocessed_items
                        .entry(table_name.clone())
                        .or_default()
                        .push(request);
                    continue;
                }
                apply_write(table, &request, &mut bytes)?;
            }
            if input
                .return_consumed_capacity
                .as_ref()
                .is_some_and(ReturnConsumedCapacity::should_report)
            {
                #[allow(clippy::cast_precision_loss)]
                let units = bytes as f64;
                output.consumed_capacity.push(ConsumedCapacity {
                    table_name: Some(table_name.clone()),
                    capacity_units: Some(units),
                    write_capacity_units: Some(units),
                    ..ConsumedCapacity::default()
                });
            }
        }
        debug!(
            unprocessed = output.unprocessed_items.values().map(Vec::len).sum::<usize>(),
            "served in-memory batch write"
        );
        Ok(output)
    }
}

/// Apply one write; `units` accumulates write capacity units.
fn apply_write(
    table: &MemoryTable,
    request: &WriteRequest,
    units: &mut usize,
) -> Result<(), DynamoDBError> {
    match (&request.put_request, &request.delete_request) {
        (Some(put), None) => {
            *units += item_size(&put.item).div_ceil(WRITE_UNIT_BYTES).max(1);
            table.put(put.item.clone())?;
        }
        (None, Some(delete)) => {
            *units += 1;
            table.delete(&delete.key)?;
        }
        _ => {
            return Err(DynamoDBError::validation(
                "A WriteRequest must contain exactly one of PutRequest or DeleteRequest",
            ));
        }
    }
    Ok(())
}
