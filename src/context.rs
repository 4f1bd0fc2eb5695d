//! Contains [`OperationContext`], the cancellation signal and deadline threaded through every
//! blocking phase of a dispatch.


use std::{future::Future, time::Duration};

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    error::{Error, Result},
    trace::Phase,
};

/// Bound on a detached unit of work, such as an unacknowledged write or a background
/// `killCursors`.
pub(crate) const DETACHED_TIMEOUT: Duration = Duration::from_secs(30);

/// The cancellation scope of a single dispatched operation.
///
/// Server selection, connection checkout, and each network exchange race against both the
/// cancellation token and the deadline; whichever fires first fails the phase with a
/// cancellation error.
#[derive(Clone, Debug, Default)]
pub struct OperationContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl OperationContext {
    /// Creates a context that is never cancelled and has no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context cancelled through `token`.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Sets a deadline `timeout` from now. An earlier existing deadline is kept.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Sets an absolute deadline. An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// The token that cancels this context.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The deadline of this context, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether this context has been cancelled or has run past its deadline.
    pub fn is_done(&self) -> bool {
        self.token.is_cancelled()
            || self
                .deadline
                .map(|deadline| Instant::now() >= deadline)
                .unwrap_or(false)
    }

    /// The context a detached unit of work runs under. It shares neither the caller's token nor
    /// its deadline, and is bounded by [`DETACHED_TIMEOUT`] instead.
    pub(crate) fn detached(&self) -> Self {
        Self::new().with_timeout(DETACHED_TIMEOUT)
    }

    /// Runs `fut` as `phase`, failing with a cancellation error if this context is cancelled or its
    /// deadline elapses first.
    pub(crate) async fn run<F, T>(&self, phase: Phase, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Error::cancelled(format!(
                "operation cancelled during {}",
                phase.span_name()
            ))),
            _ = deadline => Err(Error::cancelled(format!(
                "deadline exceeded during {}",
                phase.span_name()
            ))),
            result = fut => result,
        }
    }
}
