//! Bounded worker pool over an ordered work queue.
//!
//! A fixed number of workers pull items from a shared queue until it is
//! empty. Results are gathered only once every worker has finished and are
//! returned in input order, whatever order they completed in.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{WorkerError, WorkerResult};

/// Run `worker` over `items` with at most `concurrency` in flight.
pub async fn run_ordered<T, R, F, Fut>(
    items: Vec<T>,
    concurrency: usize,
    worker: F,
) -> WorkerResult<Vec<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let total = items.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let queue: Arc<Mutex<VecDeque<(usize, T)>>> =
        Arc::new(Mutex::new(items.into_iter().enumerate().collect()));
    let worker = Arc::new(worker);
    let workers = concurrency.clamp(1, total);

    debug!(items = total, workers, "Starting worker pool");

    let handles = (0..workers).map(|worker_id| {
        let queue = Arc::clone(&queue);
        let worker = Arc::clone(&worker);
        tokio::spawn(async move {
            let mut done = Vec::new();
            loop {
                // Hold the lock only while popping
                let next = queue.lock().await.pop_front();
                let Some((index, item)) = next else {
                    break;
                };
                debug!(worker = worker_id, item = index, "Worker picked item");
                done.push((index, worker(item).await));
            }
            done
        })
    });

    // Barrier: every worker drains the queue before anything is returned
    let mut results = Vec::with_capacity(total);
    for joined in join_all(handles).await {
        let done = joined
            .map_err(|e| WorkerError::processing_failed(format!("pool worker panicked: {}", e)))?;
        results.extend(done);
    }

    results.sort_by_key(|(index, _)| *index);
    Ok(results.into_iter().map(|(_, result)| result).collect())
}
