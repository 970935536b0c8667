//! Structured fan-out with first-failure cancellation
//!
//! [`run_all`] spawns every task on a [`JoinSet`] and waits for all of
//! them. The first task to fail aborts its siblings and its error is
//! returned; tasks that already finished keep their side effects. When the
//! returned future is itself dropped (because a sibling at a higher level
//! failed), the `JoinSet` is dropped with it and every task it still owns
//! is aborted, so cancellation cascades down a recursive tree of groups.

use std::future::Future;

use anyhow::{anyhow, Result};
use tokio::task::JoinSet;
use tracing::debug;

/// Runs `tasks` concurrently and returns their values in input order
///
/// # Errors
///
/// Returns the first error reported by any task. A panicking task resumes
/// the panic on the caller.
pub async fn run_all<T, F, I>(tasks: I) -> Result<Vec<T>>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let mut join_set = JoinSet::new();
    let mut count = 0usize;
    for (index, task) in tasks.into_iter().enumerate() {
        join_set.spawn(async move { task.await.map(|value| (index, value)) });
        count += 1;
    }

    let mut slots: Vec<Option<T>> = (0..count).map(|_| None).collect();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(Ok((index, value))) => slots[index] = Some(value),
            Ok(Err(err)) => {
                let pending = join_set.len();
                join_set.abort_all();
                debug!(pending, "Task failed, cancelling siblings");
                return Err(err);
            }
            Err(join_err) if join_err.is_panic() => {
                join_set.abort_all();
                std::panic::resume_unwind(join_err.into_panic());
            }
            Err(join_err) => {
                join_set.abort_all();
                return Err(anyhow!("Task was cancelled: {join_err}"));
            }
        }
    }

    Ok(slots.into_iter().flatten().collect())
}
