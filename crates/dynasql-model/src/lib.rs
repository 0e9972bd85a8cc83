//! DynamoDB wire types for DynaSQL.
//!
//! The compiler in `dynasql-core` emits these request types and the
//! `DynamoDbApi` backends consume and produce them. Only the three operations
//! a compiled statement can issue are modelled: `Query`, `Scan` and
//! `BatchWriteItem`. Field names follow the DynamoDB JSON protocol so a built
//! request can be dumped with `serde_json` for inspection.
// "DynamoDB" appears in virtually every doc comment in this crate.
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]
#![allow(missing_docs)]

pub mod attribute_value;
pub mod error;
pub mod input;
pub mod operations;
pub mod output;
pub mod types;

pub use attribute_value::AttributeValue;
pub use error::{DynamoDBError, DynamoDBErrorCode};
pub use operations::DynamoDBOperation;
pub use types::{Item, Key};
