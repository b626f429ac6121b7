//! Bounded concurrent runner.
//!
//! At most `limit` futures are in flight at once; completion order is not
//! preserved internally but results come back in input order.

use futures::stream::{self, StreamExt};
use std::future::Future;

/// Run `worker` over `items` with at most `limit` in flight.
///
/// `on_complete(done, total)` is called after every settled item, in
/// completion order.
pub async fn run_bounded<T, U, F, Fut, P>(
    items: Vec<T>,
    limit: usize,
    worker: F,
    mut on_complete: P,
) -> Vec<U>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = U>,
    P: FnMut(usize, usize),
{
    let total = items.len();
    let limit = limit.max(1);

    let mut indexed: Vec<(usize, U)> = Vec::with_capacity(total);
    let mut results = stream::iter(items.into_iter().enumerate().map(|(index, item)| {
        let fut = worker(item);
        async move { (index, fut.await) }
    }))
    .buffer_unordered(limit);

    while let Some(entry) = results.next().await {
        indexed.push(entry);
        on_complete(indexed.len(), total);
    }

    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, value)| value).collect()
}

/// Whether a progress line is due after `done` of `total` completions.
///
/// Completions are grouped into batches of `batch_size`. A line is due after
/// the first batch, after every `every_batches`-th batch from there, and at
/// the end: with 80 and 10 that is 80, 880, 1680, ... and `total`.
pub fn progress_due(done: usize, total: usize, batch_size: usize, every_batches: usize) -> bool {
    let batch_size = batch_size.max(1);
    if done == total {
        return true;
    }
    if done == 0 || done % batch_size != 0 {
        return false;
    }
    (done / batch_size - 1) % every_batches.max(1) == 0
}
