//! SQL-subset compiler and pagination engine for DynamoDB.
//!
//! A `SELECT` statement is parsed ([`sql`]), checked against a table schema
//! ([`validate`]), planned as a `Query` or `Scan` ([`plan`]), turned into
//! request parameters ([`request`]) and executed page by page ([`execute`])
//! against any [`DynamoDbApi`]. [`DynamoSql`] ties the stages together.
#![allow(missing_docs, clippy::doc_markdown, clippy::module_name_repetitions)]

pub mod batch;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod execute;
pub mod expression;
pub mod mapping;
pub mod memory;
pub mod plan;
pub mod request;
pub mod schema;
pub mod sql;
pub mod validate;
pub mod value;

#[cfg(test)]
mod test_support;

pub use batch::{BatchWriteReport, FailedChunk, MAX_BATCH_WRITE};
pub use client::DynamoDbApi;
pub use config::DynaSqlConfig;
pub use context::{DynamoSql, PreparedStatement};
pub use error::{DynaSqlError, ExecutionError, MappingError, SyntaxError, ValidationError};
pub use execute::{ExecutionOutput, ResultPage};
pub use mapping::Record;
pub use memory::MemoryStore;
pub use schema::{Catalog, IndexProjection, KeyAttribute, KeySchema, TableSchema};
pub use validate::Mode;
