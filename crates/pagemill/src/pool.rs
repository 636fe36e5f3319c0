// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Bounded concurrent task queue.
//!
//! Used by the data scheduler and the compiler adapter: every task is queued
//! up front, at most `limit` run at once, and the batch fails fast on the
//! first error. Results come back in queue order regardless of completion
//! order.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Default number of tasks in flight.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// A fixed-size pool of concurrently running tasks.
#[derive(Debug, Clone, Copy)]
pub struct BoundedPool {
    limit: usize,
}

impl Default for BoundedPool {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl BoundedPool {
    /// Creates a pool running at most `limit` tasks at once (minimum 1).
    pub fn new(limit: usize) -> Self {
        Self { limit: limit.max(1) }
    }

    /// Maximum number of tasks in flight.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Runs every task and returns their results in queue order.
    ///
    /// Returns the first error encountered; tasks still queued or running at
    /// that point are aborted. Work already finished is not undone.
    pub async fn run<T, E, F>(&self, tasks: Vec<F>) -> Result<Vec<T>, E>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let total = tasks.len();
        let semaphore = Arc::new(Semaphore::new(self.limit));
        let mut set = JoinSet::new();

        for (index, task) in tasks.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            set.spawn(async move {
                // never closed, so acquire only fails if the pool is dropped
                let _permit = semaphore.acquire_owned().await.ok();
                (index, task.await)
            });
        }

        let mut results: Vec<Option<T>> = (0..total).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, Ok(value))) => results[index] = Some(value),
                Ok((_, Err(err))) => {
                    set.abort_all();
                    return Err(err);
                }
                Err(join_err) => {
                    if join_err.is_panic() {
                        std::panic::resume_unwind(join_err.into_panic());
                    }
                }
            }
        }

        Ok(results.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_never_exceeds_limit() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..25)
            .map(|i| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, String>(i)
                }
            })
            .collect();

        let results = BoundedPool::new(4).run(tasks).await.unwrap();

        assert_eq!(results, (0..25).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 4);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_results_keep_queue_order() {
        let tasks: Vec<_> = (0..5u64)
            .map(|i| async move {
                tokio::time::sleep(Duration::from_millis(25 - i * 5)).await;
                Ok::<_, String>(i)
            })
            .collect();

        let results = BoundedPool::new(5).run(tasks).await.unwrap();
        assert_eq!(results, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_fails_fast_with_first_error() {
        let tasks: Vec<std::pin::Pin<Box<dyn Future<Output = Result<u32, String>> + Send>>> = vec![
            Box::pin(async { Ok(1) }),
            Box::pin(async { Err("boom".to_string()) }),
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(3)
            }),
        ];

        let err = BoundedPool::new(2).run(tasks).await.unwrap_err();
        assert_eq!(err, "boom");
    }

    #[tokio::test]
    async fn test_zero_limit_is_clamped() {
        let pool = BoundedPool::new(0);
        assert_eq!(pool.limit(), 1);
        let results = pool
            .run(vec![async { Ok::<_, String>("only") }])
            .await
            .unwrap();
        assert_eq!(results, vec!["only"]);
    }
}
