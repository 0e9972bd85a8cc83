//! DynaSQL demo - replays the GameScores walkthrough.
//!
//! Seeds the `GameScores` table through a chunked batch write, then runs
//! every example query and scan on both the raw and the typed path, checking
//! each result. Exits non-zero on the first check that fails.
//!
//! # Usage
//!
//! ```text
//! DYNASQL_BACKEND=aws DYNAMODB_ENDPOINT_URL=http://localhost:4566 dynasql-demo
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DYNASQL_BACKEND` | `memory` | `memory` or `aws` |
//! | `DYNASQL_SEED_USERS` | `1000` | Players to seed, five rows each |
//! | `DYNASQL_SKIP_SEED` | `false` | Reuse rows already in the table |
//! | `DYNAMODB_ENDPOINT_URL` | *(unset)* | Endpoint override for the `aws` backend |
//! | `DYNASQL_BATCH_WRITE_SIZE` | `25` | Items per `BatchWriteItem` call |
//! | `DYNASQL_BATCH_CONCURRENCY` | `4` | Batch calls in flight |
//! | `DYNASQL_DEFAULT_PAGE_SIZE` | *(unset)* | Page size when a statement sets none |
//! | `DYNASQL_LOG_STATEMENTS` | `false` | Log every compiled statement at `info` |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

mod fixtures;
mod scenarios;

use std::time::Instant;

use anyhow::{Context, Result, bail, ensure};
use dynasql_aws::AwsDynamoDb;
use dynasql_core::{Catalog, DynaSqlConfig, DynamoDbApi, DynamoSql, MemoryStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::fixtures::{TABLE, game_scores, game_scores_schema, user_id};

const DEFAULT_SEED_USERS: usize = 1000;

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

fn log_level() -> String {
    std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}

fn seed_users() -> Result<usize> {
    match std::env::var("DYNASQL_SEED_USERS") {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("invalid DYNASQL_SEED_USERS: {raw}")),
        Err(_) => Ok(DEFAULT_SEED_USERS),
    }
}

fn skip_seed() -> bool {
    std::env::var("DYNASQL_SKIP_SEED")
        .is_ok_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

async fn run<C: DynamoDbApi + 'static>(ctx: DynamoSql<C>, users: usize) -> Result<()> {
    if skip_seed() {
        info!(table = TABLE, "skipping seed");
    } else {
        let started = Instant::now();
        let report = ctx
            .batch_put(TABLE, &game_scores(users))
            .await
            .context("failed to seed GameScores")?;
        info!(
            written = report.written,
            requests = report.requests,
            elapsed = ?started.elapsed(),
            "seeded {TABLE}"
        );
        if !report.is_complete() {
            warn!(
                unprocessed = report.unprocessed.len(),
                failed_chunks = report.failed.len(),
                "seed did not complete"
            );
            bail!("{} items were not written", report.not_written());
        }
    }

    scenarios::run_queries(&ctx, &user_id(1)).await?;
    scenarios::run_scans(&ctx, users).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(&log_level())?;

    let users = seed_users()?;
    ensure!(users >= 2, "DYNASQL_SEED_USERS must be at least 2");
    let config = DynaSqlConfig::from_env();
    let catalog = Catalog::new().with_table(game_scores_schema());
    let backend = std::env::var("DYNASQL_BACKEND").unwrap_or_else(|_| "memory".to_owned());

    info!(%backend, users, ?config, "starting DynaSQL demo");

    match backend.as_str() {
        "memory" => {
            let store = MemoryStore::new();
            store.create_table(game_scores_schema());
            run(DynamoSql::with_config(store, catalog, config), users).await?;
        }
        "aws" => {
            let client = AwsDynamoDb::from_env().await;
            fixtures::ensure_aws_table(client.client()).await?;
            run(DynamoSql::with_config(client, catalog, config), users).await?;
        }
        other => bail!("unknown DYNASQL_BACKEND '{other}', expected 'memory' or 'aws'"),
    }

    info!("all done");
    Ok(())
}
