//! Query statements against a live table.

#[cfg(test)]
mod tests {
    use dynasql_model::types::Item;

    use crate::{
        cleanup_table, create_game_scores_table, dynamodb_client, dynasql, game_scores,
        test_table_name,
    };

    fn user_id(item: &Item) -> Option<&str> {
        item.get("UserId").and_then(|v| v.as_s())
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_query_by_hash_and_range_key() {
        let client = dynamodb_client();
        let table_name = test_table_name("query");
        create_game_scores_table(&client, &table_name).await;
        let ctx = dynasql(&client, &table_name);
        ctx.batch_put_items(&table_name, game_scores(4)).await.unwrap();

        let out = ctx
            .query(&format!(r#"SELECT * FROM {table_name} WHERE UserId = "user-1""#))
            .await
            .unwrap();
        assert_eq!(out.items.len(), 5);
        assert!(out.items.iter().all(|i| user_id(i) == Some("user-1")));
        assert!(out.consumed_capacity.is_some());

        let out = ctx
            .query(&format!(
                r#"SELECT * FROM {table_name} WHERE UserId = "user-1"
                   AND GameTitle BEGINS WITH "A""#
            ))
            .await
            .unwrap();
        assert_eq!(out.items.len(), 2);

        let out = ctx
            .query(&format!(
                r#"SELECT * FROM {table_name} WHERE UserId = "user-1" ORDER DESC LIMIT 2"#
            ))
            .await
            .unwrap();
        let titles: Vec<_> = out
            .items
            .iter()
            .filter_map(|i| i.get("GameTitle").and_then(|v| v.as_s()))
            .collect();
        assert_eq!(titles, vec!["Starship X", "Meteor Blasters"]);

        cleanup_table(&client, &table_name).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_page_queries_one_item_at_a_time() {
        let client = dynamodb_client();
        let table_name = test_table_name("paging");
        create_game_scores_table(&client, &table_name).await;
        let ctx = dynasql(&client, &table_name);
        ctx.batch_put_items(&table_name, game_scores(2)).await.unwrap();

        let out = ctx
            .query(&format!(
                r#"SELECT * FROM {table_name} WHERE UserId = "user-0" LIMIT 3
                   WITH (PageSize(1), NoReturnedCapacity)"#
            ))
            .await
            .unwrap();
        assert_eq!(out.items.len(), 3);
        assert_eq!(out.pages, 3);
        assert!(out.consumed_capacity.is_none());

        cleanup_table(&client, &table_name).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_query_secondary_indexes() {
        let client = dynamodb_client();
        let table_name = test_table_name("index");
        create_game_scores_table(&client, &table_name).await;
        let ctx = dynasql(&client, &table_name);
        ctx.batch_put_items(&table_name, game_scores(10)).await.unwrap();

        let out = ctx
            .query(&format!(
                r#"SELECT * FROM {table_name} WHERE UserId = "user-1" AND TopScore >= 1000
                   WITH(Index(TopScoreIndex, true))"#
            ))
            .await
            .unwrap();
        assert!(!out.items.is_empty());
        assert!(out.items.iter().all(|i| i.len() == 6));

        let out = ctx
            .query(&format!(
                r#"SELECT * FROM {table_name} WHERE UserId = "user-1" AND TopScore >= 1000
                   WITH(Index(TopScoreIndex, false))"#
            ))
            .await
            .unwrap();
        assert!(!out.items.is_empty());
        assert!(out.items.iter().all(|i| i.len() == 3 && !i.contains_key("Wins")));

        let out = ctx
            .query(&format!(
                r#"SELECT * FROM {table_name} WHERE GameTitle = "Starship X" AND TopScore >= 1000
                   WITH(Index(GameTitleIndex, false), NoConsistentRead)"#
            ))
            .await
            .unwrap();
        assert_eq!(out.items.len(), 10);

        cleanup_table(&client, &table_name).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_surface_missing_table_as_execution_error() {
        let client = dynamodb_client();
        let table_name = test_table_name("missing");
        let ctx = dynasql(&client, &table_name);

        let err = ctx
            .query(&format!(r#"SELECT * FROM {table_name} WHERE UserId = "user-1""#))
            .await
            .unwrap_err();
        assert!(!err.is_statement_error());
        assert!(matches!(err, dynasql_core::DynaSqlError::Execution(_)));
    }
}
