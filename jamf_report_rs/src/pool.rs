//! Bounded, order-preserving fan-out.
//!
//! The HTTP transport owns the global in-flight cap; `limit` here only bounds
//! how many futures a single walker keeps alive at once.

use std::future::Future;

use futures::stream::{self, StreamExt};

/// Run `f` over `items` with at most `limit` futures in flight.
/// Results come back in input order.
pub async fn map_ordered<I, T, F, Fut>(items: I, limit: usize, f: F) -> Vec<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = T>,
{
    stream::iter(items)
        .map(f)
        .buffered(limit.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn keeps_input_order() {
        let out = map_ordered(vec![30u64, 1, 15], 3, |ms| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            ms
        })
        .await;
        assert_eq!(out, vec![30, 1, 15]);
    }

    #[tokio::test]
    async fn zero_limit_still_runs() {
        let out = map_ordered(1..=3, 0, |n| async move { n * 2 }).await;
        assert_eq!(out, vec![2, 4, 6]);
    }
}
