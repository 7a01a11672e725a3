//! Bounded-concurrency processing of an ordered work list.
//!
//! A fixed number of lanes share one atomic cursor. Each lane claims the
//! next index, awaits the worker for that item and keeps the result tagged
//! with its index; once every lane is drained the results are laid out in
//! input order. Lanes are polled together on the current task, so no item
//! ever needs to be `Send`.

use futures::future::join_all;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Runs a per-item async operation over a slice with at most
/// `max_concurrency` items in flight.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrentProcessor {
    max_concurrency: usize,
}

impl ConcurrentProcessor {
    /// Create a processor. A limit of zero is treated as one.
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Process every item and return the results in input order.
    ///
    /// `worker` receives the item and its 0-based index. `on_complete` is
    /// called once per item as soon as its result is ready, in completion
    /// order. Failures should be encoded in `R`; the processor never stops
    /// early.
    pub async fn run<'a, T, R, F, Fut, C>(
        &self,
        items: &'a [T],
        worker: F,
        on_complete: C,
    ) -> Vec<R>
    where
        F: Fn(&'a T, usize) -> Fut,
        Fut: Future<Output = R>,
        C: Fn(&R),
    {
        if items.is_empty() {
            return Vec::new();
        }

        let cursor = AtomicUsize::new(0);
        let lanes = self.max_concurrency.min(items.len());

        let cursor = &cursor;
        let worker = &worker;
        let on_complete = &on_complete;

        let lane_futures = (0..lanes).map(|_| async move {
            let mut finished = Vec::new();
            loop {
                let index = cursor.fetch_add(1, Ordering::SeqCst);
                if index >= items.len() {
                    break;
                }
                let result = worker(&items[index], index).await;
                on_complete(&result);
                finished.push((index, result));
            }
            finished
        });

        let mut slots: Vec<Option<R>> = items.iter().map(|_| None).collect();
        for (index, result) in join_all(lane_futures).await.into_iter().flatten() {
            slots[index] = Some(result);
        }

        // Every index below len was claimed exactly once
        slots.into_iter().flatten().collect()
    }
}
