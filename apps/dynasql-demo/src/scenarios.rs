//! Query and scan walkthrough over `GameScores`.
//!
//! Every statement runs twice: once returning raw attribute maps and once
//! decoded into [`GameScore`]. Each run checks what it got back.

use anyhow::{Result, ensure};
use dynasql_core::{DynamoDbApi, DynamoSql};
use dynasql_model::types::Item;
use tracing::info;

use crate::fixtures::{GameScore, METEOR_BLASTERS, STARSHIP_X, TABLE};

fn s<'a>(item: &'a Item, attribute: &str) -> Option<&'a str> {
    item.get(attribute).and_then(|v| v.as_s())
}

fn n(item: &Item, attribute: &str) -> Option<i64> {
    item.get(attribute)
        .and_then(|v| v.as_n())
        .and_then(|raw| raw.parse().ok())
}

/// Runs the query half of the walkthrough for `user_id`.
pub async fn run_queries<C: DynamoDbApi + 'static>(
    ctx: &DynamoSql<C>,
    user_id: &str,
) -> Result<()> {
    let owned_by = |item: &Item| s(item, "UserId") == Some(user_id);
    let high_score = |item: &Item| n(item, "TopScore").is_some_and(|v| v >= 1000);

    // by hash key
    let sql = format!(r#"SELECT * FROM {TABLE} WHERE UserId = "{user_id}""#);
    info!(%sql, "basic hash key query");
    let out = ctx.query(&sql).await?;
    ensure!(out.items.len() == 5, "expected 5 items, got {}", out.items.len());
    ensure!(out.items.iter().all(owned_by));
    let scores = ctx.exec_query::<GameScore>(&sql).await?;
    ensure!(scores.len() == 5 && scores.iter().all(|gs| gs.user_id == user_id));

    // range key condition
    let sql = format!(
        r#"SELECT * FROM {TABLE} WHERE UserId = "{user_id}" AND GameTitle BEGINS WITH "A""#
    );
    info!(%sql, "query with range key");
    let out = ctx.query(&sql).await?;
    ensure!(out.items.len() == 2, "expected 2 items, got {}", out.items.len());
    ensure!(out.items.iter().all(|i| {
        owned_by(i) && s(i, "GameTitle").is_some_and(|t| t.starts_with('A'))
    }));
    let scores = ctx.exec_query::<GameScore>(&sql).await?;
    ensure!(scores.len() == 2 && scores.iter().all(|gs| gs.game_title.starts_with('A')));

    // order and limit
    let sql = format!(r#"SELECT * FROM {TABLE} WHERE UserId = "{user_id}" ORDER ASC LIMIT 3"#);
    info!(%sql, "query with order and limit");
    let out = ctx.query(&sql).await?;
    ensure!(out.items.len() == 3, "expected 3 items, got {}", out.items.len());
    ensure!(out.items.iter().all(|i| {
        owned_by(i) && s(i, "GameTitle").is_some_and(|t| t < METEOR_BLASTERS)
    }));
    let scores = ctx.exec_query::<GameScore>(&sql).await?;
    ensure!(scores.len() == 3 && scores.iter().all(|gs| gs.game_title.as_str() < METEOR_BLASTERS));

    // eventually consistent
    let sql = format!(
        r#"SELECT * FROM {TABLE} WHERE UserId = "{user_id}" WITH (NoConsistentRead)"#
    );
    info!(%sql, "query with no consistent read");
    let out = ctx.query(&sql).await?;
    ensure!(out.items.len() == 5 && out.items.iter().all(owned_by));
    let scores = ctx.exec_query::<GameScore>(&sql).await?;
    ensure!(scores.len() == 5);

    // one item per page
    let sql = format!(
        r#"SELECT * FROM {TABLE} WHERE UserId = "{user_id}" LIMIT 3 WITH (PageSize(1))"#
    );
    info!(%sql, "query with page size");
    let out = ctx.query(&sql).await?;
    ensure!(out.items.len() == 3 && out.items.iter().all(owned_by));
    ensure!(out.pages == 3, "expected 3 pages, got {}", out.pages);
    let scores = ctx.exec_query::<GameScore>(&sql).await?;
    ensure!(scores.len() == 3);

    // projection
    let sql = format!(r#"SELECT UserId, GameTitle, Wins FROM {TABLE} WHERE UserId = "{user_id}""#);
    info!(%sql, "query with specific attributes");
    let out = ctx.query(&sql).await?;
    ensure!(out.items.len() == 5 && out.items.iter().all(|i| owned_by(i) && i.len() == 3));
    let scores = ctx.exec_query::<GameScore>(&sql).await?;
    ensure!(scores.len() == 5);
    ensure!(scores.iter().all(|gs| {
        !gs.game_title.is_empty()
            && gs.wins > 0
            && gs.losses == 0
            && gs.top_score == 0
            && gs.top_score_date_time.is_none()
    }));

    // no consumed capacity
    let sql = format!(
        r#"SELECT * FROM {TABLE} WHERE UserId = "{user_id}" WITH (NoReturnedCapacity)"#
    );
    info!(%sql, "query with no returned consumed capacity");
    let out = ctx.query(&sql).await?;
    ensure!(out.items.len() == 5 && out.consumed_capacity.is_none());

    // local index, every attribute
    let sql = format!(
        r#"SELECT * FROM {TABLE} WHERE UserId = "{user_id}" AND TopScore >= 1000
           WITH(Index(TopScoreIndex, true))"#
    );
    info!(%sql, "query with local secondary index (all attributes)");
    let out = ctx.query(&sql).await?;
    ensure!(!out.items.is_empty());
    ensure!(out.items.iter().all(|i| owned_by(i) && high_score(i) && i.len() == 6));
    let scores = ctx.exec_query::<GameScore>(&sql).await?;
    ensure!(!scores.is_empty());
    ensure!(scores.iter().all(|gs| gs.top_score >= 1000 && gs.top_score_date_time.is_some()));

    // local index, projected attributes
    let sql = format!(
        r#"SELECT * FROM {TABLE} WHERE UserId = "{user_id}" AND TopScore >= 1000
           WITH(Index(TopScoreIndex, false))"#
    );
    info!(%sql, "query with local secondary index (projected attributes)");
    let out = ctx.query(&sql).await?;
    ensure!(!out.items.is_empty());
    ensure!(out.items.iter().all(|i| {
        owned_by(i) && high_score(i) && i.len() == 3 && !i.contains_key("TopScoreDateTime")
    }));
    let scores = ctx.exec_query::<GameScore>(&sql).await?;
    ensure!(!scores.is_empty());
    ensure!(scores.iter().all(|gs| gs.top_score >= 1000 && gs.top_score_date_time.is_none()));

    // global index
    let sql = format!(
        r#"SELECT * FROM {TABLE} WHERE GameTitle = "{STARSHIP_X}" AND TopScore >= 1000
           WITH(Index(GameTitleIndex, false), NoConsistentRead)"#
    );
    info!(%sql, "query with global secondary index (projected attributes)");
    let out = ctx.query(&sql).await?;
    ensure!(!out.items.is_empty());
    ensure!(out.items.iter().all(|i| {
        s(i, "UserId").is_some_and(|u| !u.trim().is_empty())
            && s(i, "GameTitle") == Some(STARSHIP_X)
            && high_score(i)
            && i.len() == 3
    }));
    let scores = ctx.exec_query::<GameScore>(&sql).await?;
    ensure!(!scores.is_empty());
    ensure!(scores.iter().all(|gs| {
        gs.game_title == STARSHIP_X && gs.top_score_date_time.is_none()
    }));

    Ok(())
}

/// Runs the scan half of the walkthrough; `users` is how many players were
/// seeded, so it is also the number of `Starship X` rows.
pub async fn run_scans<C: DynamoDbApi + 'static>(ctx: &DynamoSql<C>, users: usize) -> Result<()> {
    let starship = |item: &Item| s(item, "GameTitle") == Some(STARSHIP_X);
    let base = format!(r#"SELECT * FROM {TABLE} WHERE GameTitle = "{STARSHIP_X}""#);

    for (label, suffix, expected) in [
        ("basic scan", "", users),
        ("scan with limit", " LIMIT 10", users.min(10)),
        ("scan with page size", " WITH (PageSize(20))", users),
        ("scan with page size and 2 segments", " WITH (PageSize(20), Segments(2))", users),
    ] {
        let sql = format!("{base}{suffix}");
        info!(%sql, label);
        let out = ctx.scan(&sql).await?;
        ensure!(
            out.items.len() == expected,
            "{label}: expected {expected} items, got {}",
            out.items.len()
        );
        ensure!(out.items.iter().all(starship));
        let scores = ctx.exec_scan::<GameScore>(&sql).await?;
        ensure!(scores.len() == expected && scores.iter().all(|gs| gs.game_title == STARSHIP_X));
    }

    let sql = format!("{base} WITH (NoReturnedCapacity)");
    info!(%sql, "scan with no returned consumed capacity");
    let out = ctx.scan(&sql).await?;
    ensure!(out.items.len() == users && out.items.iter().all(starship));
    ensure!(out.consumed_capacity.is_none());

    Ok(())
}

#[cfg(test)]
mod tests {
    use dynasql_core::{Catalog, DynaSqlConfig, MemoryStore};

    use super::*;
    use crate::fixtures::{game_scores, game_scores_schema, user_id};

    async fn seeded(users: usize) -> DynamoSql<MemoryStore> {
        let store = MemoryStore::new();
        store.create_table(game_scores_schema());
        let ctx = DynamoSql::with_config(
            store,
            Catalog::new().with_table(game_scores_schema()),
            DynaSqlConfig::default(),
        );
        let report = ctx.batch_put(TABLE, &game_scores(users)).await.unwrap();
        assert!(report.is_complete());
        ctx
    }

    #[tokio::test]
    async fn test_should_pass_every_query_against_memory() {
        let ctx = seeded(20).await;
        run_queries(&ctx, &user_id(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_should_pass_every_scan_against_memory() {
        let ctx = seeded(50).await;
        run_scans(&ctx, 50).await.unwrap();
    }
}
