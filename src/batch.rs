//! Concurrent batch scheduling over the per-item pipeline
//!
//! Fans a list of item ids out over a bounded worker pool. Concurrency is a
//! semaphore, cancellation (for fail-fast) is a [`CancellationToken`], and
//! every worker shares the pipeline's rate limiter, so worker count bounds
//! parallelism while the limiter bounds request rate independently.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::{FetchError, FetchErrorCode};
use crate::pipeline::Pipeline;
use crate::types::{BatchResult, FetchPhase, ItemId, ItemResult};

impl Pipeline {
    /// Process many items concurrently and aggregate the outcomes
    ///
    /// Duplicate ids are processed once, keeping the first occurrence.
    /// Results come back in input (post-dedup) order regardless of
    /// completion order. One item's failure never disturbs its neighbours;
    /// with `fail_fast` set, a critical failure stops further items from
    /// being dispatched, and the returned counts cover only the items that
    /// actually ran.
    pub async fn process_batch(&self, item_ids: &[ItemId]) -> BatchResult {
        let mut seen = HashSet::new();
        let ids: Vec<ItemId> = item_ids
            .iter()
            .filter(|id| seen.insert((*id).clone()))
            .cloned()
            .collect();
        if ids.len() < item_ids.len() {
            tracing::debug!(
                dropped = item_ids.len() - ids.len(),
                "dropped duplicate item ids"
            );
        }

        tracing::info!(
            items = ids.len(),
            workers = self.config().workers,
            fail_fast = self.config().fail_fast,
            "starting batch"
        );

        let semaphore = Arc::new(Semaphore::new(self.config().workers));
        let cancel = CancellationToken::new();
        let fail_fast = self.config().fail_fast;

        let mut handles = Vec::with_capacity(ids.len());
        for id in &ids {
            let pipeline = self.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            let id = id.clone();

            handles.push(tokio::spawn(async move {
                if cancel.is_cancelled() {
                    return None;
                }
                // Semaphore closes only on drop, which cannot happen while
                // this task holds a clone
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return None;
                };
                // Cancellation may have arrived while we queued for a permit
                if cancel.is_cancelled() {
                    return None;
                }

                let result = pipeline.process_item(&id).await;
                if fail_fast && !result.success {
                    tracing::warn!(item = %id, "critical failure, cancelling remaining items");
                    cancel.cancel();
                }
                Some(result)
            }));
        }

        // Joining in spawn order keeps results in input order
        let mut results = Vec::with_capacity(ids.len());
        for (id, joined) in ids.into_iter().zip(join_all(handles).await) {
            match joined {
                Ok(Some(result)) => results.push(result),
                Ok(None) => {} // cancelled before dispatch
                Err(join_error) => {
                    tracing::error!(item = %id, error = %join_error, "item worker panicked");
                    let mut result = ItemResult::new(id.clone());
                    result.success = false;
                    result.errors.push(FetchError::new(
                        id,
                        FetchPhase::Metadata,
                        FetchErrorCode::Unknown,
                        format!("item worker panicked: {join_error}"),
                    ));
                    results.push(result);
                }
            }
        }

        let batch = BatchResult::from_results(results);
        tracing::info!(
            total = batch.total,
            succeeded = batch.succeeded,
            failed = batch.failed,
            "batch finished"
        );
        batch
    }
}
