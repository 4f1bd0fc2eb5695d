use std::{future::Future, time::Duration};

use tokio::task::JoinHandle;

use crate::error::Result;

/// Spawn a task in the background to run a future.
///
/// Note: this must only be called from an async block or function running on a runtime.
pub(crate) fn spawn<F, O>(fut: F) -> JoinHandle<O>
where
    F: Future<Output = O> + Send + 'static,
    O: Send + 'static,
{
    let handle = tokio::runtime::Handle::current();
    handle.spawn(fut)
}

/// Spawn a task in the background to run a future, without keeping a handle to it.
pub(crate) fn execute<F, O>(fut: F)
where
    F: Future<Output = O> + Send + 'static,
    O: Send + 'static,
{
    spawn(fut);
}

/// Spawn a task in the background if a runtime is available, returning whether it was spawned.
/// Unlike [`execute`], this may be called from synchronous contexts such as `Drop`.
pub(crate) fn try_execute<F, O>(fut: F) -> bool
where
    F: Future<Output = O> + Send + 'static,
    O: Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(fut);
            true
        }
        Err(_) => false,
    }
}

/// Await on a future for a maximum amount of time before returning an error.
pub(crate) async fn timeout<F: Future>(timeout: Duration, future: F) -> Result<F::Output> {
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| std::io::ErrorKind::TimedOut.into())
}
