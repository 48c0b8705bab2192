//! Cancellation and deadline signal carried into every remote call.

use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::RemoteError;

/// Cancellation signal for a remote call: an explicit abort token plus an
/// optional deadline.
///
/// Cloning shares the same token, so cancelling any clone cancels them all.
/// Use [`Context::child`] to derive a context that can be cancelled on its own.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never done unless cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing token, e.g. one tied to process shutdown.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a context cancelled together with `self` but cancellable
    /// independently. The deadline is inherited.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Tighten the deadline to `timeout` from now. An earlier existing
    /// deadline wins.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.with_deadline(deadline)
    }

    /// Tighten the deadline to `deadline`. An earlier existing deadline wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The deadline, if one is set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The underlying cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// `Some(err)` once the context is done, `None` while it is live.
    pub fn err(&self) -> Option<RemoteError> {
        if self.token.is_cancelled() {
            return Some(RemoteError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(RemoteError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves when the context is cancelled or its deadline passes,
    /// yielding the matching error.
    pub async fn done(&self) -> RemoteError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => RemoteError::Canceled,
                    _ = time::sleep_until(deadline) => RemoteError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                RemoteError::Canceled
            }
        }
    }
}
