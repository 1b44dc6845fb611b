//! Retry Engine
//!
//! [`RetryEngine`] drives one logical call through attempt, classification,
//! delay and re-attempt until it succeeds, fails permanently, or observes
//! cancellation. One engine per call; the strategy behind it is shared
//! freely between any number of engines.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::RetryError;
use crate::strategy::{Decider, RetryStrategy};

use super::attempt::{Attempt, AttemptError, AttemptState};

type RetryObserver<E> = Box<dyn FnMut(u32, &E, Duration) + Send>;

/// Per-call retry state machine.
///
/// Captures an operation factory, the decision function and fast-first-retry
/// flag bound from a [`RetryStrategy`], a transience classifier, an optional
/// retry observer, and a cancellation token. [`execute`](Self::execute)
/// consumes the engine; instances are never reused across calls.
pub struct RetryEngine<E, F, C> {
    factory: F,
    classifier: C,
    decider: Decider,
    fast_first_retry: bool,
    cancel: CancellationToken,
    on_retry: Option<RetryObserver<E>>,
    attempt_index: u32,
    last_failure: Option<E>,
}

impl<E, F, C> RetryEngine<E, F, C> {
    /// Bind a strategy, an operation factory and a transience classifier.
    ///
    /// The strategy's parameters are copied here, once per engine; the
    /// engine never observes later changes to a cloned strategy.
    pub fn new(strategy: &RetryStrategy, factory: F, classifier: C) -> Self {
        Self {
            factory,
            classifier,
            decider: strategy.decider(),
            fast_first_retry: strategy.fast_first_retry(),
            cancel: CancellationToken::new(),
            on_retry: None,
            attempt_index: 0,
            last_failure: None,
        }
    }

    /// Engine over an operation with no meaningful result.
    ///
    /// Success resolves to the unit value, a single zero-sized sentinel
    /// shared by every call. The factory contract is the same as for
    /// [`new`](Self::new): no missing and no unscheduled attempts.
    pub fn new_unit(strategy: &RetryStrategy, factory: F, classifier: C) -> Self
    where
        F: FnMut() -> Option<Attempt<(), E>>,
    {
        Self::new(strategy, factory, classifier)
    }

    /// Observe cancellation through `token`.
    ///
    /// Cancellation is cooperative: it is checked at attempt boundaries only
    /// and never aborts an attempt already in flight.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Side-effecting observation hook, invoked as
    /// `(attempt_index, last_error, delay)` before each re-attempt.
    pub fn with_on_retry(
        mut self,
        observer: impl FnMut(u32, &E, Duration) + Send + 'static,
    ) -> Self {
        self.on_retry = Some(Box::new(observer));
        self
    }
}

impl<E, F, C> RetryEngine<E, F, C>
where
    C: Fn(&E) -> bool,
{
    /// Run the call to completion.
    ///
    /// Attempts are strictly sequential; the Nth observer call happens
    /// before the Nth re-attempt. When cancellation is observed at an
    /// attempt boundary after at least one failure, the last real failure is
    /// surfaced instead of a bare cancelled outcome.
    ///
    /// # Panics
    ///
    /// When the factory violates its contract by returning `None` or an
    /// unscheduled attempt. Panics raised inside the factory itself are
    /// never caught.
    pub async fn execute<T>(mut self) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Option<Attempt<T, E>>,
    {
        loop {
            if self.cancel.is_cancelled() {
                return Err(match self.last_failure.take() {
                    Some(error) => RetryError::Permanent(error),
                    None => RetryError::Cancelled,
                });
            }

            let attempt = match (self.factory)() {
                Some(attempt) => attempt,
                None => panic!("operation factory returned no attempt"),
            };

            let failure = match attempt.into_state() {
                // Outcome known before any suspension: success returns
                // without attaching a continuation; a settled failure is
                // classified like any completed attempt.
                AttemptState::Settled(Ok(value)) => return Ok(value),
                AttemptState::Settled(Err(failure)) => failure,
                AttemptState::Pending(future) => match future.await {
                    Ok(value) => return Ok(value),
                    Err(failure) => failure,
                },
                AttemptState::Unscheduled => {
                    panic!("operation factory returned an unscheduled attempt")
                }
            };

            // The attempt ran to completion. Cancellation observed now
            // suppresses further retries but keeps the real failure.
            if self.cancel.is_cancelled() {
                return Err(match failure {
                    AttemptError::Error(error) | AttemptError::Abort(Some(error)) => {
                        RetryError::Permanent(error)
                    }
                    AttemptError::Abort(None) => RetryError::Cancelled,
                });
            }

            let error = match failure {
                AttemptError::Abort(Some(cause)) => return Err(RetryError::Permanent(cause)),
                AttemptError::Abort(None) => return Err(RetryError::Cancelled),
                AttemptError::Error(error) => error,
            };

            if !(self.classifier)(&error) {
                return Err(RetryError::Permanent(error));
            }

            self.attempt_index += 1;
            let decision = self.decider.decide(self.attempt_index, &error);
            if !decision.retry {
                tracing::warn!(
                    attempts = self.attempt_index,
                    "retry budget exhausted, surfacing last transient failure"
                );
                return Err(RetryError::Permanent(error));
            }

            let delay = decision.delay;
            if let Some(observer) = self.on_retry.as_mut() {
                observer(self.attempt_index, &error, delay);
            }
            tracing::debug!(
                attempt = self.attempt_index,
                delay_ms = delay.as_millis() as u64,
                "transient failure, retrying"
            );
            self.last_failure = Some(error);

            let skip_delay = self.fast_first_retry && self.attempt_index == 1;
            if !delay.is_zero() && !skip_delay {
                tokio::time::sleep(delay).await;
            }
        }
    }
}
