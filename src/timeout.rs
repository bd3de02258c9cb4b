//! Deadline races for async work.
//! The losing branch is dropped, so an operation that misses its deadline
//! can produce no later side effect.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaceOutcome<T> {
    Completed(T),
    TimedOut,
    /// The caller's token fired first.
    Cancelled,
}

impl<T> RaceOutcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            RaceOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }
}

/// Run `op` against `deadline` and `cancel`, whichever settles first.
/// `op` receives a child token that is cancelled once the race is decided,
/// so work it spawned elsewhere can stop too.
pub async fn race<T, F, Fut>(deadline: Duration, cancel: &CancellationToken, op: F) -> RaceOutcome<T>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = T>,
{
    let child = cancel.child_token();
    let fut = op(child.clone());
    tokio::pin!(fut);

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => RaceOutcome::Cancelled,
        value = &mut fut => RaceOutcome::Completed(value),
        _ = tokio::time::sleep(deadline) => RaceOutcome::TimedOut,
    };

    child.cancel();
    outcome
}

/// `None` when `fut` misses the deadline.
pub async fn with_timeout<T, Fut>(deadline: Duration, fut: Fut) -> Option<T>
where
    Fut: Future<Output = T>,
{
    tokio::time::timeout(deadline, fut).await.ok()
}
