//! Attempt handles produced by operation factories.

use std::future::Future;

use futures::future::BoxFuture;

/// Failure channel of a single attempt.
///
/// `Abort` is a typed control-flow signal recognized by the engine ahead of
/// transience classification: it ends the retry loop immediately, resolving
/// with the nested cause when one is present and as cancelled otherwise.
#[derive(Debug, PartialEq, Eq)]
pub enum AttemptError<E> {
    /// Ordinary operation failure, subject to transience classification.
    Error(E),
    /// Stop retrying now, regardless of what the classifier would say.
    Abort(Option<E>),
}

impl<E> From<E> for AttemptError<E> {
    fn from(error: E) -> Self {
        Self::Error(error)
    }
}

/// Handle to one attempt of the underlying operation.
///
/// A factory hands the engine either an already-settled outcome or an
/// in-flight future the engine awaits inline. An unscheduled handle marks an
/// attempt that was constructed but never submitted anywhere; the engine
/// treats driving one as a caller bug.
pub struct Attempt<T, E> {
    state: AttemptState<T, E>,
}

pub(crate) enum AttemptState<T, E> {
    Settled(Result<T, AttemptError<E>>),
    Pending(BoxFuture<'static, Result<T, AttemptError<E>>>),
    Unscheduled,
}

impl<T, E> Attempt<T, E> {
    /// An attempt whose successful outcome is already known.
    pub fn ready(value: T) -> Self {
        Self {
            state: AttemptState::Settled(Ok(value)),
        }
    }

    /// An attempt that already failed before it could suspend.
    pub fn failed(error: E) -> Self {
        Self {
            state: AttemptState::Settled(Err(AttemptError::Error(error))),
        }
    }

    /// An already-settled forced-stop signal.
    pub fn aborted(cause: Option<E>) -> Self {
        Self {
            state: AttemptState::Settled(Err(AttemptError::Abort(cause))),
        }
    }

    /// An in-flight attempt the engine awaits inline, with no extra task
    /// spawn or thread hop.
    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: 'static,
        E: 'static,
    {
        Self {
            state: AttemptState::Pending(Box::pin(async move {
                future.await.map_err(AttemptError::Error)
            })),
        }
    }

    /// An in-flight attempt reporting through the full failure channel,
    /// including the forced-stop signal.
    pub fn signal_future<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, AttemptError<E>>> + Send + 'static,
        T: 'static,
        E: 'static,
    {
        Self {
            state: AttemptState::Pending(Box::pin(future)),
        }
    }

    /// Placeholder for an attempt that was constructed but never handed to
    /// an executor. The engine refuses to drive one of these.
    pub fn unscheduled() -> Self {
        Self {
            state: AttemptState::Unscheduled,
        }
    }

    /// Whether the outcome is already known without awaiting.
    pub fn is_settled(&self) -> bool {
        matches!(self.state, AttemptState::Settled(_))
    }

    pub fn is_unscheduled(&self) -> bool {
        matches!(self.state, AttemptState::Unscheduled)
    }

    pub(crate) fn into_state(self) -> AttemptState<T, E> {
        self.state
    }
}
