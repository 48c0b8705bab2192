//! Runs one network step on its own task so it can be abandoned when the
//! caller's [`Context`] is done.
//!
//! The spawned task never outlives [`execute`]: on cancellation it is aborted
//! and then joined before returning, whether or not the operation honours the
//! abort promptly.

use std::future::Future;

use tracing::debug;

use crate::context::Context;
use crate::error::{RemoteError, RemoteResult};

/// Run `op` to completion or until `ctx` is done, whichever comes first.
///
/// - `op` finishes first: its result is returned as-is.
/// - `ctx` finishes first: the task is aborted, joined, and the context's
///   error is returned in place of whatever the operation produced.
/// - `ctx` is already done: `op` is never started.
pub async fn execute<F, T>(ctx: &Context, op: F) -> RemoteResult<T>
where
    F: Future<Output = RemoteResult<T>> + Send + 'static,
    T: Send + 'static,
{
    if let Some(err) = ctx.err() {
        return Err(err);
    }

    let mut task = tokio::spawn(op);

    tokio::select! {
        biased;
        joined = &mut task => match joined {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            // only reachable if the runtime is shutting down under us
            Err(_) => Err(RemoteError::Canceled),
        },
        err = ctx.done() => {
            task.abort();
            // the abort only lands at the task's next yield point; wait for it
            let _ = (&mut task).await;
            debug!(error = %err, "abandoned in-flight request");
            Err(err)
        }
    }
}
