/// Bucketed concurrent full-table export
///
/// The ID space `[1, max_id]` is split into fixed-size buckets. A coordinator
/// task runs one worker per bucket, at most `max_concurrency` at a time, and
/// each worker sends its rows to the caller's channel as one `Vec`. The call
/// returns immediately with the coordinator's handle; the channel closes once
/// every worker has finished.
///
/// Workers are best-effort: a failed bucket is logged and counted, and the
/// siblings carry on. Workers stop early when the cancellation token fires or
/// the receiver is dropped. Results arrive in no particular order.
///
/// # Example
///
/// ```no_run
/// use todo_shared::db::exporter::{BatchExporter, ExportConfig};
/// use tokio::sync::mpsc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() {
/// let exporter = BatchExporter::new(ExportConfig::default());
/// let (tx, mut rx) = mpsc::channel(4);
///
/// let handle = exporter.export("numbers", 2500, |bucket| async move {
///     Ok((bucket.begin + 1..bucket.end).collect::<Vec<i64>>())
/// }, tx, CancellationToken::new());
///
/// while let Some(batch) = rx.recv().await {
///     println!("{} rows", batch.len());
/// }
/// let summary = handle.await.unwrap();
/// assert_eq!(summary.rows_sent, 3000);
/// # }
/// ```

use crate::db::query_builder::Predicate;
use crate::error::DatabaseResult;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Export tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportConfig {
    /// IDs covered by one bucket
    pub bucket_size: u64,

    /// Buckets queried at the same time
    pub max_concurrency: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            bucket_size: 1000,
            max_concurrency: 8,
        }
    }
}

/// Exclusive ID bounds for one bucket: `id > begin AND id < end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdBucket {
    pub begin: i64,
    pub end: i64,
}

impl IdBucket {
    /// Range predicates on `<table>.id`
    pub fn predicates(&self, table: &str) -> [Predicate; 2] {
        let column = format!("{}.id", table);
        [
            Predicate::gt(column.clone(), self.begin),
            Predicate::lt(column, self.end),
        ]
    }
}

/// Splits `[1, max_id]` into buckets of `bucket_size` IDs
///
/// Bucket `k` covers `k*B + 1 ..= (k+1)*B`, so every ID lands in exactly one
/// bucket.
pub fn partition(max_id: u64, bucket_size: u64) -> Vec<IdBucket> {
    let bucket_size = bucket_size.max(1);
    let bucket_count = max_id.div_ceil(bucket_size);

    (0..bucket_count)
        .map(|k| {
            let begin = k * bucket_size;
            IdBucket {
                begin: begin as i64,
                end: (begin + bucket_size + 1) as i64,
            }
        })
        .collect()
}

/// What the coordinator observed once every worker finished
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub buckets: usize,
    pub rows_sent: u64,
    pub failed_buckets: usize,
    /// Cancellation fired or the receiver went away before all buckets ran
    pub cancelled: bool,
}

enum BucketOutcome {
    Sent(u64),
    Empty,
    Failed,
    Stopped,
}

/// Runs bounded, cancellation-aware export workers
#[derive(Debug, Clone, Default)]
pub struct BatchExporter {
    config: ExportConfig,
}

impl BatchExporter {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> ExportConfig {
        self.config
    }

    /// Starts exporting `[1, max_id]` and returns the coordinator's handle
    ///
    /// `fetch` is called once per bucket. Callers drain `results`
    /// concurrently; the channel's capacity is the only backpressure.
    pub fn export<T, F, Fut>(
        &self,
        entity: &'static str,
        max_id: u64,
        fetch: F,
        results: mpsc::Sender<Vec<T>>,
        cancel: CancellationToken,
    ) -> JoinHandle<ExportSummary>
    where
        T: Send + 'static,
        F: Fn(IdBucket) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DatabaseResult<Vec<T>>> + Send + 'static,
    {
        let buckets = partition(max_id, self.config.bucket_size);
        let max_concurrency = self.config.max_concurrency.max(1);

        info!(
            entity,
            max_id,
            buckets = buckets.len(),
            max_concurrency,
            "Starting export"
        );

        tokio::spawn(async move {
            let mut summary = ExportSummary {
                buckets: buckets.len(),
                ..Default::default()
            };
            let semaphore = Arc::new(Semaphore::new(max_concurrency));
            let fetch = Arc::new(fetch);
            let mut workers = JoinSet::new();

            for bucket in buckets {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        summary.cancelled = true;
                        break;
                    }
                    _ = results.closed() => {
                        debug!(entity, "Export receiver dropped, no more buckets scheduled");
                        summary.cancelled = true;
                        break;
                    }
                    permit = semaphore.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                let fetch = fetch.clone();
                let results = results.clone();
                let cancel = cancel.clone();

                workers.spawn(async move {
                    let _permit = permit;
                    run_bucket(entity, bucket, fetch.as_ref(), results, cancel).await
                });
            }

            // Workers hold the remaining senders
            drop(results);

            while let Some(outcome) = workers.join_next().await {
                match outcome {
                    Ok(BucketOutcome::Sent(rows)) => summary.rows_sent += rows,
                    Ok(BucketOutcome::Empty) => {}
                    Ok(BucketOutcome::Failed) => summary.failed_buckets += 1,
                    Ok(BucketOutcome::Stopped) => summary.cancelled = true,
                    Err(e) => {
                        error!(entity, error = %e, "Export worker panicked");
                        summary.failed_buckets += 1;
                    }
                }
            }

            info!(
                entity,
                rows_sent = summary.rows_sent,
                failed_buckets = summary.failed_buckets,
                cancelled = summary.cancelled,
                "Export finished"
            );
            summary
        })
    }
}

async fn run_bucket<T, F, Fut>(
    entity: &'static str,
    bucket: IdBucket,
    fetch: &F,
    results: mpsc::Sender<Vec<T>>,
    cancel: CancellationToken,
) -> BucketOutcome
where
    F: Fn(IdBucket) -> Fut,
    Fut: Future<Output = DatabaseResult<Vec<T>>>,
{
    if results.is_closed() {
        return BucketOutcome::Stopped;
    }

    let fetched = tokio::select! {
        biased;
        _ = cancel.cancelled() => return BucketOutcome::Stopped,
        fetched = fetch(bucket) => fetched,
    };

    let rows = match fetched {
        Ok(rows) => rows,
        Err(e) => {
            error!(
                entity,
                begin = bucket.begin,
                end = bucket.end,
                error = %e,
                "Querying export bucket"
            );
            return BucketOutcome::Failed;
        }
    };

    if rows.is_empty() {
        debug!(entity, begin = bucket.begin, end = bucket.end, "Export bucket empty");
        return BucketOutcome::Empty;
    }

    let count = rows.len() as u64;
    tokio::select! {
        biased;
        _ = cancel.cancelled() => BucketOutcome::Stopped,
        sent = results.send(rows) => match sent {
            Ok(()) => BucketOutcome::Sent(count),
            Err(_) => {
                warn!(entity, begin = bucket.begin, "Export receiver dropped");
                BucketOutcome::Stopped
            }
        },
    }
}
