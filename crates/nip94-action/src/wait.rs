//! Bounded, cancellable waiting shared by publish and verify.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Waited<T> {
    Ready(T),
    TimedOut,
    Cancelled,
}

/// Drive `future` until it completes, `limit` elapses, or `cancel` fires.
///
/// Cancellation is checked first so a cancelled token wins over a future that
/// happens to be ready in the same poll.
pub async fn wait_bounded<F>(future: F, limit: Duration, cancel: &CancellationToken) -> Waited<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Waited::Cancelled,
        output = future => Waited::Ready(output),
        _ = tokio::time::sleep(limit) => Waited::TimedOut,
    }
}
