//! Scan statements against a live table.

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use crate::{
        cleanup_table, create_game_scores_table, dynamodb_client, dynasql, game_scores,
        test_table_name,
    };

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_scan_with_filter_limit_and_segments() {
        let client = dynamodb_client();
        let table_name = test_table_name("scan");
        create_game_scores_table(&client, &table_name).await;
        let ctx = dynasql(&client, &table_name);
        ctx.batch_put_items(&table_name, game_scores(40)).await.unwrap();

        let base = format!(r#"SELECT * FROM {table_name} WHERE GameTitle = "Starship X""#);
        for (suffix, expected) in [
            ("", 40),
            (" LIMIT 10", 10),
            (" WITH (PageSize(20))", 40),
            (" WITH (PageSize(20), Segments(2))", 40),
        ] {
            let out = ctx.scan(&format!("{base}{suffix}")).await.unwrap();
            assert_eq!(out.items.len(), expected, "suffix {suffix:?}");
            assert!(
                out.items
                    .iter()
                    .all(|i| i.get("GameTitle").and_then(|v| v.as_s()) == Some("Starship X"))
            );
        }

        cleanup_table(&client, &table_name).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_count_without_items() {
        let client = dynamodb_client();
        let table_name = test_table_name("count");
        create_game_scores_table(&client, &table_name).await;
        let ctx = dynasql(&client, &table_name);
        ctx.batch_put_items(&table_name, game_scores(6)).await.unwrap();

        let out = ctx.scan(&format!("SELECT COUNT(*) FROM {table_name}")).await.unwrap();
        assert_eq!(out.count, 30);
        assert!(out.items.is_empty());

        cleanup_table(&client, &table_name).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_stream_scan_lazily() {
        let client = dynamodb_client();
        let table_name = test_table_name("stream");
        create_game_scores_table(&client, &table_name).await;
        let ctx = dynasql(&client, &table_name);
        ctx.batch_put_items(&table_name, game_scores(8)).await.unwrap();

        let items: Vec<_> = ctx
            .stream(
                &format!("SELECT * FROM {table_name} WITH (PageSize(7))"),
                dynasql_core::Mode::Scan,
            )
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(items.len(), 40);

        cleanup_table(&client, &table_name).await;
    }
}
