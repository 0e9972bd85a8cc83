//! GameScores fixtures shared by unit tests.

use std::sync::Arc;

use dynasql_model::input::{BatchWriteItemInput, QueryInput, ScanInput};
use dynasql_model::output::{BatchWriteItemOutput, QueryOutput, ScanOutput};
use dynasql_model::types::{Item, ScalarAttributeType};
use dynasql_model::{AttributeValue, DynamoDBError, DynamoDBOperation};
use parking_lot::Mutex;

use crate::client::DynamoDbApi;
use crate::memory::MemoryStore;
use crate::schema::{IndexProjection, KeyAttribute, KeySchema, TableSchema};

pub const GAMES: [&str; 5] = [
    "Alien Adventure",
    "Attack Ships",
    "Galaxy Invaders",
    "Meteor Blasters",
    "Starship X",
];

/// `GameScores`: `UserId`/`GameTitle`, LSI `TopScoreIndex` on `TopScore`,
/// GSI `GameTitleIndex` on `GameTitle`/`TopScore`, both keys-only.
pub fn game_scores_schema() -> TableSchema {
    TableSchema::new("GameScores", KeyAttribute::new("UserId", ScalarAttributeType::S))
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

/// Deterministic score row for user `user` and game index `game`.
pub fn game_score(user: usize, game: usize) -> Item {
    let title = GAMES[game % GAMES.len()];
    Item::from([
        ("UserId".to_owned(), AttributeValue::from(format!("user-{user}"))),
        ("GameTitle".to_owned(), AttributeValue::from(title)),
        (
            "TopScore".to_owned(),
            AttributeValue::N(((user * 37 + game * 1009) % 5000).to_string()),
        ),
        (
            "TopScoreDateTime".to_owned(),
            AttributeValue::from(format!(
                "2012-{:02}-{:02}T10:00:00.000Z",
                user % 12 + 1,
                game * 5 + 1
            )),
        ),
        ("Wins".to_owned(), AttributeValue::N(((user + game) % 10).to_string())),
        ("Losses".to_owned(), AttributeValue::N(((user * 3 + game) % 7).to_string())),
    ])
}

/// A store holding `users` users with one row per game each.
pub fn seeded_store(users: usize) -> MemoryStore {
    let store = MemoryStore::new();
    store.create_table(game_scores_schema());
    for user in 0..users {
        for game in 0..GAMES.len() {
            store
                .put_item("GameScores", game_score(user, game))
                .expect("fixture rows carry every key");
        }
    }
    store
}

/// One request seen by a [`RecordingClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub operation: DynamoDBOperation,
    pub limit: Option<i32>,
    pub segment: Option<i32>,
    pub resumed: bool,
}

/// Forwards to a [`MemoryStore`] and records every request.
#[derive(Debug, Clone)]
pub struct RecordingClient {
    pub store: Arc<MemoryStore>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl RecordingClient {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store: Arc::new(store),
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait::async_trait]
impl DynamoDbApi for RecordingClient {
    async fn query(&self, input: QueryInput) -> Result<QueryOutput, DynamoDBError> {
        self.requests.lock().push(RecordedRequest {
            operation: DynamoDBOperation::Query,
            limit: input.limit,
            segment: None,
            resumed: !input.exclusive_start_key.is_empty(),
        });
        self.store.query(input).await
    }

    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, DynamoDBError> {
        self.requests.lock().push(RecordedRequest {
            operation: DynamoDBOperation::Scan,
            limit: input.limit,
            segment: input.segment,
            resumed: !input.exclusive_start_key.is_empty(),
        });
        self.store.scan(input).await
    }

    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, DynamoDBError> {
        self.requests.lock().push(RecordedRequest {
            operation: DynamoDBOperation::BatchWriteItem,
            limit: None,
            segment: None,
            resumed: false,
        });
        self.store.batch_write_item(input).await
    }
}
