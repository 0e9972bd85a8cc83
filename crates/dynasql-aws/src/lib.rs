//! `DynamoDbApi` over `aws_sdk_dynamodb::Client`.
//!
//! Transport, signing and retries are the SDK's; this crate only converts
//! between the DynaSQL wire types and the SDK's and normalises SDK errors
//! into [`DynamoDBError`](dynasql_model::DynamoDBError).
#![allow(missing_docs, clippy::doc_markdown, clippy::module_name_repetitions)]

mod client;
pub mod conversions;
pub mod error;

pub use client::{AwsDynamoDb, ENDPOINT_ENV};
