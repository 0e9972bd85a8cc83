//! Pagination executor.
//!
//! Turns a [`BuiltRequest`] into a lazy stream of [`ResultPage`]s. Each page
//! request asks for `Limit = min(page_size, remaining)` items and the stream
//! follows `LastEvaluatedKey` until the service stops returning one or the
//! overall limit is reached. A parallel scan runs one page stream per segment
//! and merges them with [`select_all`]; all segments share the remaining-item
//! counter, which only the merge stage decrements.
//!
//! Nothing is sent until the stream is polled, and dropping it stops before
//! the next request (in-flight segment fetches are cancelled with it).

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dynasql_model::output::QueryOutput;
use dynasql_model::types::{ConsumedCapacity, Item, Key};
use futures::stream::{self, BoxStream, select_all};
use futures::{StreamExt, TryStreamExt};
use tracing::debug;

use crate::client::DynamoDbApi;
use crate::config::DynaSqlConfig;
use crate::error::{DynaSqlError, ExecutionError};
use crate::request::BuiltRequest;

/// One service response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultPage {
    pub items: Vec<Item>,
    /// Items matched, including a `COUNT(*)` page that returns none.
    pub count: usize,
    /// Items evaluated before the filter.
    pub scanned_count: usize,
    pub last_evaluated_key: Option<Key>,
    pub consumed_capacity: Option<ConsumedCapacity>,
    /// Scan segment that produced the page.
    pub segment: Option<u32>,
    /// The page held more items than the overall limit allowed.
    pub truncated: bool,
}

/// Everything a statement returned, pages folded together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionOutput {
    pub items: Vec<Item>,
    pub count: usize,
    pub scanned_count: usize,
    /// Summed over pages; `None` when the request asked for none.
    pub consumed_capacity: Option<ConsumedCapacity>,
    /// Pages received.
    pub pages: usize,
    /// Continuation marker of the last page received.
    pub last_evaluated_key: Option<Key>,
}

impl ExecutionOutput {
    /// Fold one page in.
    pub fn push(&mut self, page: ResultPage) {
        self.items.extend(page.items);
        self.count += page.count;
        self.scanned_count += page.scanned_count;
        self.pages += 1;
        self.last_evaluated_key = page.last_evaluated_key;
        if let Some(capacity) = page.consumed_capacity {
            self.consumed_capacity
                .get_or_insert_with(ConsumedCapacity::default)
                .accumulate(&capacity);
        }
    }

    /// Drain a page stream.
    ///
    /// # Errors
    ///
    /// Returns the first error the stream yields.
    pub async fn collect<S>(mut pages: S) -> Result<Self, DynaSqlError>
    where
        S: futures::Stream<Item = Result<ResultPage, DynaSqlError>> + Unpin,
    {
        let mut output = Self::default();
        while let Some(page) = pages.try_next().await? {
            output.push(page);
        }
        Ok(output)
    }
}

/// Runs built requests against a [`DynamoDbApi`].
#[derive(Debug)]
pub struct Executor<C> {
    client: Arc<C>,
    default_page_size: Option<u32>,
}

impl<C> Clone for Executor<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            default_page_size: self.default_page_size,
        }
    }
}

impl<C: DynamoDbApi + 'static> Executor<C> {
    pub fn new(client: Arc<C>, config: &DynaSqlConfig) -> Self {
        Self {
            client,
            default_page_size: config.default_page_size,
        }
    }

    /// Lazy page stream for `request`, returning at most `limit` items and
    /// asking for at most `page_size` per round trip.
    pub fn pages(
        &self,
        request: BuiltRequest,
        limit: Option<u32>,
        page_size: Option<u32>,
    ) -> BoxStream<'static, Result<ResultPage, DynaSqlError>> {
        if limit == Some(0) {
            return stream::empty().boxed();
        }
        let page_size = page_size.or(self.default_page_size);
        let remaining = limit.map(|n| Arc::new(AtomicUsize::new(n as usize)));
        let request = Arc::new(request);

        let segmented = matches!(&*request, BuiltRequest::Scan(s) if s.total_segments.is_some());
        let segments: Vec<BoxStream<'static, Result<ResultPage, DynaSqlError>>> = if segmented {
            (0..request.total_segments())
                .map(|segment| {
                    segment_pages(
                        Arc::clone(&self.client),
                        Arc::clone(&request),
                        Some(segment),
                        remaining.clone(),
                        page_size,
                    )
                })
                .collect()
        } else {
            vec![segment_pages(
                Arc::clone(&self.client),
                request,
                None,
                remaining.clone(),
                page_size,
            )]
        };

        let merged = select_all(segments);
        stream::unfold(Some(merged), move |state| {
            let remaining = remaining.clone();
            async move {
                let mut merged = state?;
                match merged.next().await? {
                    Err(e) => Some((Err(e), None)),
                    Ok(page) => {
                        let Some(remaining) = remaining else {
                            return Some((Ok(page), Some(merged)));
                        };
                        let (page, left) = enforce_limit(page, &remaining);
                        // Dropping `merged` here cancels the other segments.
                        Some((Ok(page), (left > 0).then_some(merged)))
                    }
                }
            }
        })
        .boxed()
    }

    /// Items of every page, in page order.
    pub fn records(
        &self,
        request: BuiltRequest,
        limit: Option<u32>,
        page_size: Option<u32>,
    ) -> BoxStream<'static, Result<Item, DynaSqlError>> {
        self.pages(request, limit, page_size)
            .map_ok(|page| stream::iter(page.items.into_iter().map(Ok)))
            .try_flatten()
            .boxed()
    }

    /// Run `request` to completion.
    ///
    /// # Errors
    ///
    /// Returns `DynaSqlError::Execution` if any page request fails.
    pub async fn run(
        &self,
        request: BuiltRequest,
        limit: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<ExecutionOutput, DynaSqlError> {
        ExecutionOutput::collect(self.pages(request, limit, page_size)).await
    }
}

/// Charge `page` against the shared allowance, truncating it if it overshoots.
fn enforce_limit(mut page: ResultPage, remaining: &AtomicUsize) -> (ResultPage, usize) {
    let left = remaining.load(Ordering::Acquire);
    if page.count > left {
        debug!(
            segment = ?page.segment,
            received = page.count,
            allowed = left,
            "truncating page to the remaining limit"
        );
        page.items.truncate(left);
        page.count = left;
        page.truncated = true;
    }
    let left = left - page.count;
    remaining.store(left, Ordering::Release);
    (page, left)
}

fn segment_pages<C: DynamoDbApi + 'static>(
    client: Arc<C>,
    request: Arc<BuiltRequest>,
    segment: Option<u32>,
    remaining: Option<Arc<AtomicUsize>>,
    page_size: Option<u32>,
) -> BoxStream<'static, Result<ResultPage, DynaSqlError>> {
    // `None` once the segment is exhausted; an empty key means "from the start".
    stream::try_unfold(Some(Key::new()), move |cursor| {
        let client = Arc::clone(&client);
        let request = Arc::clone(&request);
        let remaining = remaining.clone();
        async move {
            let Some(start_key) = cursor else {
                return Ok(None);
            };
            let left = remaining.as_ref().map(|r| r.load(Ordering::Acquire));
            if left == Some(0) {
                return Ok(None);
            }
            let limit = match (page_size.map(|n| n as usize), left) {
                (Some(size), Some(left)) => Some(size.min(left)),
                (size, left) => size.or(left),
            };
            let limit = limit.map(|n| i32::try_from(n).unwrap_or(i32::MAX));
            let resume = (!start_key.is_empty()).then_some(&start_key);
            debug!(
                operation = %request.operation(),
                table = request.table_name(),
                segment = ?segment,
                limit = ?limit,
                resumed = resume.is_some(),
                "requesting page"
            );

            let page = fetch(client.as_ref(), request.page(segment, resume, limit), segment).await?;
            debug!(
                table = request.table_name(),
                segment = ?segment,
                count = page.count,
                scanned_count = page.scanned_count,
                more = page.last_evaluated_key.is_some(),
                "received page"
            );
            let next = page.last_evaluated_key.clone();
            Ok(Some((page, next)))
        }
    })
    .boxed()
}

async fn fetch<C: DynamoDbApi>(
    client: &C,
    request: BuiltRequest,
    segment: Option<u32>,
) -> Result<ResultPage, DynaSqlError> {
    let operation = request.operation();
    let table = request.table_name().to_owned();
    let output: Result<QueryOutput, _> = match request {
        BuiltRequest::Query(input) => client.query(input).await,
        BuiltRequest::Scan(input) => client.scan(input).await.map(QueryOutput::from),
    };
    let output = output.map_err(|source| ExecutionError {
        operation,
        table,
        source,
    })?;

    Ok(ResultPage {
        count: usize::try_from(output.count).unwrap_or_default(),
        scanned_count: usize::try_from(output.scanned_count).unwrap_or_default(),
        items: output.items,
        last_evaluated_key: (!output.last_evaluated_key.is_empty())
            .then_some(output.last_evaluated_key),
        consumed_capacity: output.consumed_capacity,
        segment,
        truncated: false,
    })
}

#[cfg(test)]
mod tests {
    use dynasql_model::{DynamoDBErrorCode, DynamoDBOperation};

    use super::*;
    use crate::plan::{Plan, plan};
    use crate::request::build;
    use crate::sql::parse;
    use crate::test_support::{RecordingClient, game_scores_schema, seeded_store};
    use crate::validate::{Mode, validate};

    fn compile(sql: &str) -> (Plan, BuiltRequest) {
        let validated = validate(&parse(sql).unwrap(), &game_scores_schema(), Mode::Auto).unwrap();
        let plan = plan(validated);
        let request = build(&plan);
        (plan, request)
    }

    fn executor(users: usize) -> (Executor<RecordingClient>, RecordingClient) {
        let client = RecordingClient::new(seeded_store(users));
        let executor = Executor::new(Arc::new(client.clone()), &DynaSqlConfig::default());
        (executor, client)
    }

    async fn run(executor: &Executor<RecordingClient>, sql: &str) -> ExecutionOutput {
        let (plan, request) = compile(sql);
        executor.run(request, plan.limit, plan.page_size).await.unwrap()
    }

    #[tokio::test]
    async fn test_should_return_min_of_limit_and_available() {
        let (executor, _) = executor(3);
        let out = run(
            &executor,
            r#"SELECT * FROM GameScores WHERE UserId = "user-0" LIMIT 3"#,
        )
        .await;
        assert_eq!(out.items.len(), 3);
        let out = run(
            &executor,
            r#"SELECT * FROM GameScores WHERE UserId = "user-0" LIMIT 10"#,
        )
        .await;
        assert_eq!(out.items.len(), 5);
    }

    #[tokio::test]
    async fn test_should_issue_ceil_limit_over_page_size_requests() {
        let (executor, client) = executor(5);
        let out = run(
            &executor,
            "SELECT * FROM GameScores LIMIT 7 WITH (PageSize(2), NoConsistentRead)",
        )
        .await;
        assert_eq!(out.items.len(), 7);
        assert_eq!(out.pages, 4);
        let limits: Vec<_> = client.requests().iter().map(|r| r.limit).collect();
        assert_eq!(limits, vec![Some(2), Some(2), Some(2), Some(1)]);
    }

    #[tokio::test]
    async fn test_should_follow_continuation_without_limit() {
        let (executor, client) = executor(2);
        let out = run(
            &executor,
            r#"SELECT * FROM GameScores WHERE UserId = "user-1" WITH (PageSize(2))"#,
        )
        .await;
        assert_eq!(out.items.len(), 5);
        assert!(out.last_evaluated_key.is_none());
        let requests = client.requests();
        assert_eq!(requests.len(), 3);
        assert!(!requests[0].resumed);
        assert!(requests[1..].iter().all(|r| r.resumed));
    }

    #[tokio::test]
    async fn test_should_use_default_page_size() {
        let client = RecordingClient::new(seeded_store(1));
        let config = DynaSqlConfig::default().with_default_page_size(Some(4));
        let executor = Executor::new(Arc::new(client.clone()), &config);
        let (plan, request) = compile(r#"SELECT * FROM GameScores WHERE UserId = "user-0""#);
        let out = executor.run(request, plan.limit, plan.page_size).await.unwrap();
        assert_eq!(out.items.len(), 5);
        assert_eq!(client.requests()[0].limit, Some(4));
    }

    #[tokio::test]
    async fn test_should_merge_parallel_segments() {
        let (executor, client) = executor(20);
        let out = run(
            &executor,
            "SELECT * FROM GameScores WITH (Segments(2), NoConsistentRead)",
        )
        .await;
        assert_eq!(out.items.len(), 100);
        let mut segments: Vec<_> = client.requests().iter().map(|r| r.segment).collect();
        segments.sort_unstable();
        segments.dedup();
        assert_eq!(segments, vec![Some(0), Some(1)]);
    }

    #[tokio::test]
    async fn test_should_share_limit_across_segments() {
        let (executor, _) = executor(20);
        let out = run(
            &executor,
            "SELECT * FROM GameScores LIMIT 10 WITH (Segments(3), PageSize(4), NoConsistentRead)",
        )
        .await;
        assert_eq!(out.items.len(), 10);
        assert_eq!(out.count, 10);
    }

    #[tokio::test]
    async fn test_should_count_without_items() {
        let (executor, _) = executor(4);
        let out = run(&executor, "SELECT COUNT(*) FROM GameScores WITH (NoConsistentRead)").await;
        assert!(out.items.is_empty());
        assert_eq!(out.count, 20);
    }

    #[tokio::test]
    async fn test_should_sum_consumed_capacity() {
        let (executor, _) = executor(1);
        let out = run(
            &executor,
            r#"SELECT * FROM GameScores WHERE UserId = "user-0" WITH (PageSize(2))"#,
        )
        .await;
        let capacity = out.consumed_capacity.unwrap();
        assert_eq!(capacity.capacity_units, Some(3.0));
        let out = run(
            &executor,
            r#"SELECT * FROM GameScores WHERE UserId = "user-0" WITH (NoReturnedCapacity)"#,
        )
        .await;
        assert!(out.consumed_capacity.is_none());
    }

    #[tokio::test]
    async fn test_should_surface_failure_after_yielded_pages() {
        let (executor, client) = executor(1);
        client
            .store
            .fail_after(1, DynamoDBErrorCode::ProvisionedThroughputExceededException);
        let (plan, request) = compile(
            r#"SELECT * FROM GameScores WHERE UserId = "user-0" WITH (PageSize(2))"#,
        );
        let mut pages = executor.pages(request, plan.limit, plan.page_size);

        let first = pages.next().await.unwrap().unwrap();
        assert_eq!(first.items.len(), 2);
        let err = pages.next().await.unwrap().unwrap_err();
        let DynaSqlError::Execution(err) = err else {
            panic!("expected an execution error, got {err:?}");
        };
        assert_eq!(err.operation, DynamoDBOperation::Query);
        assert_eq!(err.source.code, DynamoDBErrorCode::ProvisionedThroughputExceededException);
        assert!(pages.next().await.is_none());
    }

    #[tokio::test]
    async fn test_should_stop_requesting_when_dropped() {
        let (executor, client) = executor(3);
        let (plan, request) = compile(
            "SELECT * FROM GameScores WITH (PageSize(1), NoConsistentRead)",
        );
        let mut records = executor.records(request, plan.limit, plan.page_size);
        assert!(records.next().await.unwrap().is_ok());
        drop(records);
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_should_not_request_anything_for_limit_zero() {
        let (executor, client) = executor(1);
        let (_, request) = compile("SELECT * FROM GameScores WITH (NoConsistentRead)");
        let out = executor.run(request, Some(0), None).await.unwrap();
        assert_eq!(out.pages, 0);
        assert!(client.requests().is_empty());
    }

    #[test]
    fn test_should_truncate_overlong_page() {
        let remaining = AtomicUsize::new(2);
        let page = ResultPage {
            items: vec![Item::new(), Item::new(), Item::new()],
            count: 3,
            scanned_count: 3,
            ..ResultPage::default()
        };
        let (page, left) = enforce_limit(page, &remaining);
        assert!(page.truncated);
        assert_eq!(page.items.len(), 2);
        assert_eq!(left, 0);
    }
}
