//! End-to-end behavior of the retry engine: ordering of notifications,
//! cancellation at attempt boundaries, forced stops, and the factory
//! contract.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use reattempt::{Attempt, AttemptError, RetryEngine, RetryError, RetryStrategy};

#[derive(Debug, Clone, PartialEq, Eq)]
struct FlakyError {
    attempt: u32,
    transient: bool,
}

impl FlakyError {
    fn transient(attempt: u32) -> Self {
        Self {
            attempt,
            transient: true,
        }
    }

    fn permanent(attempt: u32) -> Self {
        Self {
            attempt,
            transient: false,
        }
    }
}

fn is_transient(error: &FlakyError) -> bool {
    error.transient
}

/// Factory that fails transiently until `succeed_at`, then yields `value`.
fn flaky_factory(
    calls: Arc<AtomicU32>,
    succeed_at: u32,
    value: u32,
) -> impl FnMut() -> Option<Attempt<u32, FlakyError>> {
    move || {
        let calls = calls.clone();
        Some(Attempt::future(async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < succeed_at {
                Err(FlakyError::transient(n))
            } else {
                Ok(value)
            }
        }))
    }
}

fn quick(limit: u32) -> RetryStrategy {
    RetryStrategy::fixed_interval("quick", limit, Duration::from_millis(1))
}

#[tokio::test]
async fn first_attempt_success_touches_neither_classifier_nor_observer() {
    let calls = Arc::new(AtomicU32::new(0));
    let classified = Arc::new(AtomicU32::new(0));
    let notified = Arc::new(AtomicU32::new(0));

    let classified_in_engine = classified.clone();
    let notified_in_engine = notified.clone();
    let result = RetryEngine::new(
        &quick(5),
        flaky_factory(calls.clone(), 1, 42),
        move |error: &FlakyError| {
            classified_in_engine.fetch_add(1, Ordering::SeqCst);
            is_transient(error)
        },
    )
    .with_on_retry(move |_, _, _| {
        notified_in_engine.fetch_add(1, Ordering::SeqCst);
    })
    .execute()
    .await;

    assert_eq!(result, Ok(42));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(classified.load(Ordering::SeqCst), 0);
    assert_eq!(notified.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn transient_failures_then_success_notify_in_order() {
    let calls = Arc::new(AtomicU32::new(0));
    let observed: Arc<Mutex<Vec<(u32, u32)>>> = Arc::new(Mutex::new(Vec::new()));

    let observed_in_engine = observed.clone();
    let result = RetryEngine::new(
        &quick(10),
        flaky_factory(calls.clone(), 4, 7),
        is_transient,
    )
    .with_on_retry(move |attempt_index, error: &FlakyError, _delay| {
        observed_in_engine
            .lock()
            .unwrap()
            .push((attempt_index, error.attempt));
    })
    .execute()
    .await;

    assert_eq!(result, Ok(7));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    // Three failures, three notifications, strictly increasing indices,
    // each carrying the error of the attempt that just failed.
    assert_eq!(*observed.lock().unwrap(), vec![(1, 1), (2, 2), (3, 3)]);
}

#[tokio::test]
async fn always_failing_returns_the_last_attempts_failure() {
    let calls = Arc::new(AtomicU32::new(0));
    let indices: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

    // Attempt budget of four: the initial attempt plus three permitted
    // retries; the fourth failure is final.
    let indices_in_engine = indices.clone();
    let result = RetryEngine::new(
        &quick(4),
        flaky_factory(calls.clone(), u32::MAX, 0),
        is_transient,
    )
    .with_on_retry(move |attempt_index, _, _| {
        indices_in_engine.lock().unwrap().push(attempt_index);
    })
    .execute()
    .await;

    assert_eq!(result, Err(RetryError::Permanent(FlakyError::transient(4))));
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(*indices.lock().unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn non_transient_failure_is_final_without_retrying() {
    let calls = Arc::new(AtomicU32::new(0));
    let notified = Arc::new(AtomicU32::new(0));

    let calls_in_factory = calls.clone();
    let notified_in_engine = notified.clone();
    let result: Result<u32, _> = RetryEngine::new(
        &quick(10),
        move || {
            let n = calls_in_factory.fetch_add(1, Ordering::SeqCst) + 1;
            Some(Attempt::future(async move {
                Err(FlakyError::permanent(n))
            }))
        },
        is_transient,
    )
    .with_on_retry(move |_, _, _| {
        notified_in_engine.fetch_add(1, Ordering::SeqCst);
    })
    .execute()
    .await;

    assert_eq!(result, Err(RetryError::Permanent(FlakyError::permanent(1))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(notified.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancellation_before_any_attempt_resolves_cancelled() {
    let calls = Arc::new(AtomicU32::new(0));
    let token = CancellationToken::new();
    token.cancel();

    let result = RetryEngine::new(
        &quick(5),
        flaky_factory(calls.clone(), 1, 0),
        is_transient,
    )
    .with_cancellation(token)
    .execute()
    .await;

    assert_eq!(result, Err(RetryError::Cancelled));
    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancellation_after_a_failure_surfaces_that_failure() {
    let calls = Arc::new(AtomicU32::new(0));
    let token = CancellationToken::new();

    // Cancel from inside the observer: the request lands after the first
    // failure and before the next attempt starts.
    let token_in_observer = token.clone();
    let result = RetryEngine::new(
        &quick(10),
        flaky_factory(calls.clone(), u32::MAX, 0),
        is_transient,
    )
    .with_cancellation(token)
    .with_on_retry(move |_, _, _| token_in_observer.cancel())
    .execute()
    .await;

    assert_eq!(result, Err(RetryError::Permanent(FlakyError::transient(1))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn forced_stop_with_cause_skips_classification() {
    let classified = Arc::new(AtomicU32::new(0));

    let classified_in_engine = classified.clone();
    let result: Result<u32, _> = RetryEngine::new(
        &quick(10),
        || Some(Attempt::aborted(Some(FlakyError::transient(1)))),
        move |error: &FlakyError| {
            classified_in_engine.fetch_add(1, Ordering::SeqCst);
            is_transient(error)
        },
    )
    .execute()
    .await;

    assert_eq!(result, Err(RetryError::Permanent(FlakyError::transient(1))));
    assert_eq!(classified.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn forced_stop_without_cause_resolves_cancelled() {
    let result: Result<u32, _> = RetryEngine::new(
        &quick(10),
        || {
            Some(Attempt::signal_future(async {
                Err(AttemptError::<FlakyError>::Abort(None))
            }))
        },
        is_transient,
    )
    .execute()
    .await;

    assert_eq!(result, Err(RetryError::Cancelled));
}

#[tokio::test]
#[should_panic(expected = "operation factory returned no attempt")]
async fn missing_attempt_panics() {
    let _: Result<u32, _> = RetryEngine::new(
        &quick(3),
        || None::<Attempt<u32, FlakyError>>,
        is_transient,
    )
    .execute()
    .await;
}

#[tokio::test]
#[should_panic(expected = "operation factory returned an unscheduled attempt")]
async fn unscheduled_attempt_panics() {
    let _: Result<u32, _> = RetryEngine::new(
        &quick(3),
        || Some(Attempt::<u32, FlakyError>::unscheduled()),
        is_transient,
    )
    .execute()
    .await;
}

#[tokio::test]
async fn settled_failures_reenter_the_loop() {
    let calls = Arc::new(AtomicU32::new(0));
    let notified = Arc::new(AtomicU32::new(0));

    let calls_in_factory = calls.clone();
    let notified_in_engine = notified.clone();
    let result = RetryEngine::new(
        &quick(5),
        move || {
            // First attempt fails before it could suspend; the engine
            // classifies it like any completed attempt.
            if calls_in_factory.fetch_add(1, Ordering::SeqCst) == 0 {
                Some(Attempt::failed(FlakyError::transient(1)))
            } else {
                Some(Attempt::ready(7))
            }
        },
        is_transient,
    )
    .with_on_retry(move |_, _, _| {
        notified_in_engine.fetch_add(1, Ordering::SeqCst);
    })
    .execute()
    .await;

    assert_eq!(result, Ok(7));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(notified.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fast_first_retry_skips_the_initial_delay() {
    let calls = Arc::new(AtomicU32::new(0));
    let strategy = RetryStrategy::fixed_interval("slow", 5, Duration::from_millis(150));

    let started = Instant::now();
    let result = RetryEngine::new(&strategy, flaky_factory(calls, 2, 1), is_transient)
        .execute()
        .await;

    assert_eq!(result, Ok(1));
    assert!(
        started.elapsed() < Duration::from_millis(100),
        "first retry should not have waited, took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn disabled_fast_first_retry_waits_the_full_interval() {
    let calls = Arc::new(AtomicU32::new(0));
    let strategy = RetryStrategy::fixed_interval("slow", 5, Duration::from_millis(150))
        .with_fast_first_retry(false);

    let started = Instant::now();
    let result = RetryEngine::new(&strategy, flaky_factory(calls, 2, 1), is_transient)
        .execute()
        .await;

    assert_eq!(result, Ok(1));
    assert!(
        started.elapsed() >= Duration::from_millis(150),
        "first retry should have waited, took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn unit_operations_share_the_sentinel() {
    let calls = Arc::new(AtomicU32::new(0));

    let calls_in_factory = calls.clone();
    let result = RetryEngine::new_unit(
        &quick(5),
        move || {
            let calls = calls_in_factory.clone();
            Some(Attempt::future(async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(FlakyError::transient(1))
                } else {
                    Ok(())
                }
            }))
        },
        is_transient,
    )
    .execute()
    .await;

    assert_eq!(result, Ok(()));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
