use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};

/// Polls every task concurrently until all have settled and returns the
/// outcomes in input order, whatever order they completed in.
///
/// A failure never cancels its siblings.
pub async fn settle_all<T, E, Fut>(tasks: impl IntoIterator<Item = Fut>) -> Vec<Result<T, E>>
where
    Fut: Future<Output = Result<T, E>>,
{
    let mut pending: FuturesUnordered<_> = tasks
        .into_iter()
        .enumerate()
        .map(|(index, task)| async move { (index, task.await) })
        .collect();

    let mut slots: Vec<Option<Result<T, E>>> = (0..pending.len()).map(|_| None).collect();
    while let Some((index, outcome)) = pending.next().await {
        slots[index] = Some(outcome);
    }

    // Each indexed task yields exactly once, so every slot is filled.
    slots.into_iter().flatten().collect()
}
