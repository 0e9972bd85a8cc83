//! Integration tests for DynaSQL against a real DynamoDB endpoint.
//!
//! These tests require DynamoDB Local, LocalStack or a RustStack server at
//! `localhost:4566` (override with `DYNAMODB_ENDPOINT_URL`). They are marked
//! `#[ignore]` so they don't run during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! cargo test -p dynasql-integration -- --ignored
//! ```

use std::sync::Once;

use aws_sdk_dynamodb::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType,
    LocalSecondaryIndex, Projection, ProjectionType, ScalarAttributeType as SdkScalarType,
};
use dynasql_aws::{AwsDynamoDb, ENDPOINT_ENV};
use dynasql_core::{
    Catalog, DynaSqlConfig, DynamoSql, IndexProjection, KeyAttribute, KeySchema, TableSchema,
};
use dynasql_model::types::{Item, ScalarAttributeType};
use dynasql_model::AttributeValue;

static INIT: Once = Once::new();

/// Titles seeded for every user.
pub const GAMES: [&str; 5] = [
    "Alien Adventure",
    "Attack Ships",
    "Galaxy Invaders",
    "Meteor Blasters",
    "Starship X",
];

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Endpoint URL for the server.
fn endpoint_url() -> String {
    std::env::var(ENDPOINT_ENV).unwrap_or_else(|_| "http://localhost:4566".to_owned())
}

/// Create a configured DynamoDB client pointing at the local server.
#[must_use]
pub fn dynamodb_client() -> aws_sdk_dynamodb::Client {
    init_tracing();

    let creds = Credentials::new("test", "test", None, None, "integration-test");

    let config = aws_sdk_dynamodb::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(creds)
        .endpoint_url(endpoint_url())
        .build();

    aws_sdk_dynamodb::Client::from_conf(config)
}

/// Generate a unique table name for a test.
#[must_use]
pub fn test_table_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

/// A `GameScores`-shaped schema under `table_name`.
#[must_use]
pub fn game_scores_schema(table_name: &str) -> TableSchema {
    TableSchema::new(table_name, KeyAttribute::new("UserId", ScalarAttributeType::S))
        .with_range_key(KeyAttribute::new("GameTitle", ScalarAttributeType::S))
        .with_local_index(
            "TopScoreIndex",
            KeyAttribute::new("TopScore", ScalarAttributeType::N),
            IndexProjection::KeysOnly,
        )
        .with_global_index(
            "GameTitleIndex",
            KeySchema {
                hash_key: KeyAttribute::new("GameTitle", ScalarAttributeType::S),
                range_key: Some(KeyAttribute::new("TopScore", ScalarAttributeType::N)),
            },
            IndexProjection::KeysOnly,
        )
}

fn key(name: &str, key_type: KeyType) -> KeySchemaElement {
    KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()
        .unwrap()
}

fn attribute(name: &str, attr_type: SdkScalarType) -> AttributeDefinition {
    AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(attr_type)
        .build()
        .unwrap()
}

fn keys_only() -> Projection {
    Projection::builder()
        .projection_type(ProjectionType::KeysOnly)
        .build()
}

/// Create a `GameScores`-shaped table. Caller is responsible for cleanup.
pub async fn create_game_scores_table(client: &aws_sdk_dynamodb::Client, table_name: &str) {
    client
        .create_table()
        .table_name(table_name)
        .key_schema(key("UserId", KeyType::Hash))
        .key_schema(key("GameTitle", KeyType::Range))
        .attribute_definitions(attribute("UserId", SdkScalarType::S))
        .attribute_definitions(attribute("GameTitle", SdkScalarType::S))
        .attribute_definitions(attribute("TopScore", SdkScalarType::N))
        .local_secondary_indexes(
            LocalSecondaryIndex::builder()
                .index_name("TopScoreIndex")
                .key_schema(key("UserId", KeyType::Hash))
                .key_schema(key("TopScore", KeyType::Range))
                .projection(keys_only())
                .build()
                .unwrap(),
        )
        .global_secondary_indexes(
            GlobalSecondaryIndex::builder()
                .index_name("GameTitleIndex")
                .key_schema(key("GameTitle", KeyType::Hash))
                .key_schema(key("TopScore", KeyType::Range))
                .projection(keys_only())
                .build()
                .unwrap(),
        )
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await
        .unwrap_or_else(|e| panic!("failed to create table {table_name}: {e}"));
}

/// Delete a table, ignoring errors.
pub async fn cleanup_table(client: &aws_sdk_dynamodb::Client, table_name: &str) {
    let _ = client.delete_table().table_name(table_name).send().await;
}

/// A context over `client` that knows `table_name`.
#[must_use]
pub fn dynasql(client: &aws_sdk_dynamodb::Client, table_name: &str) -> DynamoSql<AwsDynamoDb> {
    DynamoSql::with_config(
        AwsDynamoDb::new(client.clone()),
        Catalog::new().with_table(game_scores_schema(table_name)),
        DynaSqlConfig::default(),
    )
}

/// Score row for `user` and the game at `game` in [`GAMES`].
#[must_use]
pub fn game_score(user: usize, game: usize) -> Item {
    Item::from([
        ("UserId".to_owned(), AttributeValue::from(format!("user-{user}"))),
        ("GameTitle".to_owned(), AttributeValue::from(GAMES[game])),
        ("TopScore".to_owned(), AttributeValue::number((user * 37 + game * 1009) % 5000)),
        (
            "TopScoreDateTime".to_owned(),
            AttributeValue::from(format!("2012-{:02}-01T10:00:00.000Z", user % 12 + 1)),
        ),
        ("Wins".to_owned(), AttributeValue::number((user + game) % 9 + 1)),
        ("Losses".to_owned(), AttributeValue::number((user * 3 + game) % 7)),
    ])
}

/// Rows for `users` players, one per game each.
#[must_use]
pub fn game_scores(users: usize) -> Vec<Item> {
    (0..users)
        .flat_map(|user| (0..GAMES.len()).map(move |game| game_score(user, game)))
        .collect()
}

mod test_batch;
mod test_query;
mod test_scan;
