//! First-settled race between a spawned task and a deadline.

use std::future::Future;
use std::time::Duration;

/// Outcome of [`first_settled`].
#[derive(Debug)]
pub enum Settled<T> {
    /// The task finished before the deadline.
    Finished(T),
    /// The task panicked before the deadline.
    Crashed(String),
    /// The deadline passed first. The task keeps running detached and its result is dropped.
    TimedOut,
}

/// Run `task` on the runtime and wait for it at most `deadline`.
///
/// The task is spawned, not polled inline: losing the race detaches it without
/// cancelling it, so a slow upload may still complete after the caller has moved on.
pub async fn first_settled<F>(task: F, deadline: Duration) -> Settled<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let handle = tokio::spawn(task);

    match tokio::time::timeout(deadline, handle).await {
        Ok(Ok(output)) => Settled::Finished(output),
        Ok(Err(join_err)) => Settled::Crashed(join_err.to_string()),
        Err(_) => Settled::TimedOut,
    }
}
