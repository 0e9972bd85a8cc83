//! The `GameScores` table: schema, record type and generated rows.

use anyhow::{Context, Result};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType,
    LocalSecondaryIndex, Projection, ProjectionType, ScalarAttributeType as SdkScalarType,
};
use chrono::{DateTime, TimeZone, Utc};
use dynasql_core::mapping::{date_or_none, date_value, number_or_default, string, string_or_default};
use dynasql_core::{IndexProjection, KeyAttribute, KeySchema, MappingError, Record, TableSchema};
use dynasql_model::types::{Item, ScalarAttributeType};
use dynasql_model::AttributeValue;
use tracing::info;

pub const TABLE: &str = "GameScores";
pub const TOP_SCORE_INDEX: &str = "TopScoreIndex";
pub const GAME_TITLE_INDEX: &str = "GameTitleIndex";

pub const ALIEN_ADVENTURE: &str = "Alien Adventure";
pub const ATTACK_SHIPS: &str = "Attack Ships";
pub const GALAXY_INVADERS: &str = "Galaxy Invaders";
pub const METEOR_BLASTERS: &str = "Meteor Blasters";
pub const STARSHIP_X: &str = "Starship X";

pub const GAMES: [&str; 5] = [
    ALIEN_ADVENTURE,
    ATTACK_SHIPS,
    GALAXY_INVADERS,
    METEOR_BLASTERS,
    STARSHIP_X,
];

/// One player's best result in one game.
#[derive(Debug, Clone, PartialEq)]
pub struct GameScore {
    pub user_id: String,
    pub game_title: String,
    pub top_score: i64,
    pub top_score_date_time: Option<DateTime<Utc>>,
    pub wins: i64,
    pub losses: i64,
}

impl Record for GameScore {
    fn to_item(&self) -> Item {
        let mut item = Item::from([
            ("UserId".to_owned(), AttributeValue::from(self.user_id.as_str())),
            ("GameTitle".to_owned(), AttributeValue::from(self.game_title.as_str())),
            ("TopScore".to_owned(), AttributeValue::number(self.top_score)),
            ("Wins".to_owned(), AttributeValue::number(self.wins)),
            ("Losses".to_owned(), AttributeValue::number(self.losses)),
        ]);
        if let Some(at) = &self.top_score_date_time {
            item.insert("TopScoreDateTime".to_owned(), date_value(at));
        }
        item
    }

    fn from_item(item: &Item) -> Result<Self, MappingError> {
        Ok(Self {
            user_id: string(item, "UserId")?,
            game_title: string_or_default(item, "GameTitle")?,
            top_score: number_or_default(item, "TopScore")?,
            top_score_date_time: date_or_none(item, "TopScoreDateTime")?,
            wins: number_or_default(item, "Wins")?,
            losses: number_or_default(item, "Losses")?,
        })
    }
}

pub fn user_id(user: usize) -> String {
    format!("theburningmonk-{user}")
}

/// Rows for `users` players, one per game each.
///
/// Scores are spread so every player has games both below and above 1000,
/// and every row has at least one win.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn game_scores(users: usize) -> Vec<GameScore> {
    (0..users)
        .flat_map(|user| {
            GAMES.iter().enumerate().map(move |(game, title)| GameScore {
                user_id: user_id(user),
                game_title: (*title).to_owned(),
                top_score: ((user * 37 + game * 1009) % 5000) as i64,
                top_score_date_time: Utc
                    .with_ymd_and_hms(2012, (user % 12 + 1) as u32, (game * 5 + 1) as u32, 10, 0, 0)
                    .single(),
                wins: ((user + game) % 9 + 1) as i64,
                losses: ((user * 3 + game) % 7) as i64,
            })
        })
        .collect()
}

/// Keys of the table and both keys-only indexes.
pub fn game_scores_schema() -> TableSchema {
    TableSchema::new(TABLE, KeyAttribute::new("UserId", ScalarAttributeType::S))
        .with_range_key(KeyAttribute::new("GameTitle", ScalarAttributeType::S))
        .with_local_index(
            TOP_SCORE_INDEX,
            KeyAttribute::new("TopScore", ScalarAttributeType::N),
            IndexProjection::KeysOnly,
        )
        .with_global_index(
            GAME_TITLE_INDEX,
            KeySchema {
                hash_key: KeyAttribute::new("GameTitle", ScalarAttributeType::S),
                range_key: Some(KeyAttribute::new("TopScore", ScalarAttributeType::N)),
            },
            IndexProjection::KeysOnly,
        )
}

fn key(name: &str, key_type: KeyType) -> Result<KeySchemaElement> {
    KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()
        .with_context(|| format!("invalid key schema element {name}"))
}

fn attribute(name: &str, attr_type: SdkScalarType) -> Result<AttributeDefinition> {
    AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(attr_type)
        .build()
        .with_context(|| format!("invalid attribute definition {name}"))
}

fn keys_only() -> Projection {
    Projection::builder()
        .projection_type(ProjectionType::KeysOnly)
        .build()
}

/// Create `GameScores` unless it already exists.
pub async fn ensure_aws_table(client: &aws_sdk_dynamodb::Client) -> Result<()> {
    let existing = client.list_tables().send().await.context("failed to list tables")?;
    if existing.table_names().iter().any(|name| name == TABLE) {
        info!(table = TABLE, "table already exists");
        return Ok(());
    }

    let local_index = LocalSecondaryIndex::builder()
        .index_name(TOP_SCORE_INDEX)
        .key_schema(key("UserId", KeyType::Hash)?)
        .key_schema(key("TopScore", KeyType::Range)?)
        .projection(keys_only())
        .build()
        .context("invalid local secondary index")?;
    let global_index = GlobalSecondaryIndex::builder()
        .index_name(GAME_TITLE_INDEX)
        .key_schema(key("GameTitle", KeyType::Hash)?)
        .key_schema(key("TopScore", KeyType::Range)?)
        .projection(keys_only())
        .build()
        .context("invalid global secondary index")?;

    client
        .create_table()
        .table_name(TABLE)
        .key_schema(key("UserId", KeyType::Hash)?)
        .key_schema(key("GameTitle", KeyType::Range)?)
        .attribute_definitions(attribute("UserId", SdkScalarType::S)?)
        .attribute_definitions(attribute("GameTitle", SdkScalarType::S)?)
        .attribute_definitions(attribute("TopScore", SdkScalarType::N)?)
        .local_secondary_indexes(local_index)
        .global_secondary_indexes(global_index)
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await
        .with_context(|| format!("failed to create table {TABLE}"))?;
    info!(table = TABLE, "table created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_map_game_scores_both_ways() {
        let scores = game_scores(3);
        assert_eq!(scores.len(), 15);
        for score in &scores {
            assert_eq!(&GameScore::from_item(&score.to_item()).unwrap(), score);
        }
    }

    #[test]
    fn test_should_spread_scores_around_one_thousand() {
        let scores = game_scores(1);
        assert!(scores.iter().any(|s| s.top_score < 1000));
        assert!(scores.iter().any(|s| s.top_score >= 1000));
        assert!(scores.iter().all(|s| s.wins > 0 && s.top_score_date_time.is_some()));
    }
}
