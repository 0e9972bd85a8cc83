//! Chunked batch writes against a live table.

#[cfg(test)]
mod tests {
    use crate::{
        cleanup_table, create_game_scores_table, dynamodb_client, dynasql, game_scores,
        test_table_name,
    };

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_write_more_than_one_batch() {
        let client = dynamodb_client();
        let table_name = test_table_name("batch");
        create_game_scores_table(&client, &table_name).await;
        let ctx = dynasql(&client, &table_name);

        let report = ctx.batch_put_items(&table_name, game_scores(12)).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.written, 60);
        assert_eq!(report.requests, 3);

        let out = ctx.scan(&format!("SELECT COUNT(*) FROM {table_name}")).await.unwrap();
        assert_eq!(out.count, 60);

        cleanup_table(&client, &table_name).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_unregistered_table_before_writing() {
        let client = dynamodb_client();
        let ctx = dynasql(&client, &test_table_name("known"));

        let err = ctx
            .batch_put_items("unregistered", game_scores(1))
            .await
            .unwrap_err();
        assert!(matches!(err, dynasql_core::DynaSqlError::UnknownTable(_)));
    }
}
