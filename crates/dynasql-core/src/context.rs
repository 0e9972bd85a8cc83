//! The `DynamoSql` façade.
//!
//! Raw and typed callers go through the same pipeline: parse, validate
//! against the [`Catalog`], plan, build, execute. The typed entry points only
//! add a [`Record::from_item`] step at the end.

use std::fmt;
use std::sync::Arc;

use dynasql_model::DynamoDBOperation;
use dynasql_model::types::Item;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::batch::{self, BatchWriteReport};
use crate::client::DynamoDbApi;
use crate::config::DynaSqlConfig;
use crate::error::DynaSqlError;
use crate::execute::{ExecutionOutput, Executor};
use crate::expression::ExpressionError;
use crate::mapping::{Record, decode_all};
use crate::plan::{Plan, plan};
use crate::request::{BuiltRequest, RequestIntent, build, describe};
use crate::schema::Catalog;
use crate::sql;
use crate::validate::{Mode, validate};

/// A compiled statement, ready to run any number of times.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedStatement {
    pub sql: String,
    pub plan: Plan,
    pub request: BuiltRequest,
}

impl PreparedStatement {
    #[must_use]
    pub fn operation(&self) -> DynamoDBOperation {
        self.request.operation()
    }

    /// Decode the built request back into conditions.
    ///
    /// # Errors
    ///
    /// Returns `ExpressionError` if the request expressions do not parse.
    pub fn describe(&self) -> Result<RequestIntent, ExpressionError> {
        describe(&self.request)
    }
}

impl fmt::Display for PreparedStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.request {
            BuiltRequest::Query(q) => write!(
                f,
                "Query {}{} KeyCondition={:?} Filter={:?}",
                q.table_name,
                q.index_name.as_deref().map(|i| format!("/{i}")).unwrap_or_default(),
                q.key_condition_expression,
                q.filter_expression.as_deref().unwrap_or(""),
            ),
            BuiltRequest::Scan(s) => write!(
                f,
                "Scan {}{} Filter={:?} Segments={}",
                s.table_name,
                s.index_name.as_deref().map(|i| format!("/{i}")).unwrap_or_default(),
                s.filter_expression.as_deref().unwrap_or(""),
                self.request.total_segments(),
            ),
        }
    }
}

/// SQL access to the tables described by a [`Catalog`].
#[derive(Debug)]
pub struct DynamoSql<C> {
    client: Arc<C>,
    catalog: Catalog,
    config: DynaSqlConfig,
    executor: Executor<C>,
}

impl<C: DynamoDbApi + 'static> DynamoSql<C> {
    /// A façade with [`DynaSqlConfig::default`].
    pub fn new(client: C, catalog: Catalog) -> Self {
        Self::with_config(client, catalog, DynaSqlConfig::default())
    }

    pub fn with_config(client: C, catalog: Catalog, config: DynaSqlConfig) -> Self {
        Self::from_shared(Arc::new(client), catalog, config)
    }

    /// A façade over a client shared with other owners.
    pub fn from_shared(client: Arc<C>, catalog: Catalog, config: DynaSqlConfig) -> Self {
        let executor = Executor::new(Arc::clone(&client), &config);
        Self {
            client,
            catalog,
            config,
            executor,
        }
    }

    #[must_use]
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn config(&self) -> &DynaSqlConfig {
        &self.config
    }

    /// Compile `sql` without sending anything.
    ///
    /// # Errors
    ///
    /// Returns `Syntax`, `UnknownTable` or `Validation` errors.
    pub fn prepare(&self, sql: &str, mode: Mode) -> Result<PreparedStatement, DynaSqlError> {
        let statement = sql::parse(sql)?;
        let schema = self
            .catalog
            .table(&statement.table)
            .ok_or_else(|| DynaSqlError::UnknownTable(statement.table.clone()))?;
        let plan = plan(validate(&statement, schema, mode)?);
        let request = build(&plan);
        let prepared = PreparedStatement {
            sql: sql.to_owned(),
            plan,
            request,
        };
        if self.config.log_statements {
            info!(statement = %prepared, limit = ?prepared.plan.limit, "prepared statement");
        } else {
            debug!(statement = %prepared, "prepared statement");
        }
        Ok(prepared)
    }

    /// Run a statement that must compile to a `Query`.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error if `sql` has no hash-key equality, or any
    /// error [`DynamoSql::execute`] returns.
    pub async fn query(&self, sql: &str) -> Result<ExecutionOutput, DynaSqlError> {
        self.run(sql, Mode::Query).await
    }

    /// Run `sql` as a `Scan`, even if it could be a `Query`.
    ///
    /// # Errors
    ///
    /// See [`DynamoSql::execute`].
    pub async fn scan(&self, sql: &str) -> Result<ExecutionOutput, DynaSqlError> {
        self.run(sql, Mode::Scan).await
    }

    /// Run `sql` as a `Query` when possible, otherwise as a `Scan`.
    ///
    /// # Errors
    ///
    /// Returns statement errors before sending anything and
    /// `DynaSqlError::Execution` if a page request fails.
    pub async fn execute(&self, sql: &str) -> Result<ExecutionOutput, DynaSqlError> {
        self.run(sql, Mode::Auto).await
    }

    /// Run an already prepared statement.
    ///
    /// # Errors
    ///
    /// Returns `DynaSqlError::Execution` if a page request fails.
    pub async fn execute_prepared(
        &self,
        prepared: &PreparedStatement,
    ) -> Result<ExecutionOutput, DynaSqlError> {
        self.executor
            .run(prepared.request.clone(), prepared.plan.limit, prepared.plan.page_size)
            .await
    }

    async fn run(&self, sql: &str, mode: Mode) -> Result<ExecutionOutput, DynaSqlError> {
        let prepared = self.prepare(sql, mode)?;
        self.execute_prepared(&prepared).await
    }

    /// Lazy item stream; pages are fetched as the stream is polled.
    ///
    /// # Errors
    ///
    /// Statement errors are returned here, execution errors in the stream.
    pub fn stream(
        &self,
        sql: &str,
        mode: Mode,
    ) -> Result<BoxStream<'static, Result<Item, DynaSqlError>>, DynaSqlError> {
        let prepared = self.prepare(sql, mode)?;
        Ok(self
            .executor
            .records(prepared.request, prepared.plan.limit, prepared.plan.page_size))
    }

    /// Lazy typed stream.
    ///
    /// # Errors
    ///
    /// See [`DynamoSql::stream`]; decoding failures arrive in the stream.
    pub fn stream_records<T: Record + Send + 'static>(
        &self,
        sql: &str,
        mode: Mode,
    ) -> Result<BoxStream<'static, Result<T, DynaSqlError>>, DynaSqlError> {
        Ok(self
            .stream(sql, mode)?
            .and_then(|item| async move { T::from_item(&item).map_err(DynaSqlError::from) })
            .boxed())
    }

    /// Typed counterpart of [`DynamoSql::query`].
    ///
    /// # Errors
    ///
    /// See [`DynamoSql::query`]; also `Mapping` if an item does not decode.
    pub async fn exec_query<T: Record>(&self, sql: &str) -> Result<Vec<T>, DynaSqlError> {
        let output = self.query(sql).await?;
        Ok(decode_all(&output.items)?)
    }

    /// Typed counterpart of [`DynamoSql::scan`].
    ///
    /// # Errors
    ///
    /// See [`DynamoSql::scan`]; also `Mapping` if an item does not decode.
    pub async fn exec_scan<T: Record>(&self, sql: &str) -> Result<Vec<T>, DynaSqlError> {
        let output = self.scan(sql).await?;
        Ok(decode_all(&output.items)?)
    }

    /// Write `records` to `table` in `BatchWriteItem` chunks.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTable` for a table missing from the catalog. Failed
    /// chunks are reported in [`BatchWriteReport::failed`].
    pub async fn batch_put<T: Record>(
        &self,
        table: &str,
        records: &[T],
    ) -> Result<BatchWriteReport, DynaSqlError> {
        self.batch_put_items(table, records.iter().map(Record::to_item).collect())
            .await
    }

    /// Raw counterpart of [`DynamoSql::batch_put`].
    ///
    /// # Errors
    ///
    /// See [`DynamoSql::batch_put`].
    pub async fn batch_put_items(
        &self,
        table: &str,
        items: Vec<Item>,
    ) -> Result<BatchWriteReport, DynaSqlError> {
        if self.catalog.table(table).is_none() {
            return Err(DynaSqlError::UnknownTable(table.to_owned()));
        }
        Ok(batch::batch_put(self.client.as_ref(), table, items, &self.config).await)
    }
}
