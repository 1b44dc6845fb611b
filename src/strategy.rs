//! Retry Strategies
//!
//! A [`RetryStrategy`] is an immutable, named policy. Engines never consult
//! the strategy while running: they bind its parameters once through
//! [`RetryStrategy::decider`] and evaluate the resulting [`Decider`] per
//! failed attempt. Attempt counting belongs to the engine, not the strategy.

use std::sync::OnceLock;
use std::time::Duration;

use rand::Rng;

use crate::error::ConfigError;

/// Well-known names of the shared default strategies.
pub mod names {
    pub const NO_RETRY: &str = "no-retry";
    pub const FIXED_INTERVAL: &str = "fixed-interval";
    pub const INCREMENTAL: &str = "incremental";
    pub const EXPONENTIAL_BACKOFF: &str = "exponential-backoff";
}

const DEFAULT_ATTEMPT_LIMIT: u32 = 10;
const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_MIN_BACKOFF: Duration = Duration::from_secs(1);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);
const DEFAULT_DELTA_BACKOFF: Duration = Duration::from_secs(10);

/// Verdict for one failed attempt: whether to retry, and after what delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub retry: bool,
    pub delay: Duration,
}

impl Decision {
    const fn stop() -> Self {
        Self {
            retry: false,
            delay: Duration::ZERO,
        }
    }

    const fn after(delay: Duration) -> Self {
        Self { retry: true, delay }
    }
}

/// Parameter set behind a strategy, tagged per algorithm.
#[derive(Debug, Clone, Copy)]
enum Kind {
    NoRetry,
    FixedInterval {
        limit: u32,
        interval: Duration,
    },
    Incremental {
        limit: u32,
        initial: Duration,
        increment: Duration,
    },
    ExponentialBackoff {
        limit: u32,
        min_backoff: Duration,
        max_backoff: Duration,
        delta_backoff: Duration,
    },
}

/// An immutable, named retry policy shared by any number of engines.
///
/// Limits and intervals are unsigned, so the negative ranges the policy
/// rules out are unrepresentable; the one residual check is
/// `min_backoff <= max_backoff` on the exponential variant.
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    name: String,
    fast_first_retry: bool,
    kind: Kind,
}

impl RetryStrategy {
    /// A strategy that never retries.
    pub fn no_retry(name: impl Into<String>) -> Self {
        Self::from_kind(name, Kind::NoRetry)
    }

    /// Retry up to `limit` times with a constant delay.
    pub fn fixed_interval(name: impl Into<String>, limit: u32, interval: Duration) -> Self {
        Self::from_kind(name, Kind::FixedInterval { limit, interval })
    }

    /// Retry up to `limit` times, growing the delay linearly per attempt:
    /// `initial + increment * attempt_index`.
    pub fn incremental(
        name: impl Into<String>,
        limit: u32,
        initial: Duration,
        increment: Duration,
    ) -> Self {
        Self::from_kind(
            name,
            Kind::Incremental {
                limit,
                initial,
                increment,
            },
        )
    }

    /// Retry up to `limit` times with exponentially growing, jittered
    /// delays: `min(min_backoff + (2^n - 1) * U(0.8*delta, 1.2*delta), max_backoff)`.
    ///
    /// The ±20% jitter window decorrelates retries from independent
    /// concurrent callers.
    pub fn exponential_backoff(
        name: impl Into<String>,
        limit: u32,
        min_backoff: Duration,
        max_backoff: Duration,
        delta_backoff: Duration,
    ) -> Result<Self, ConfigError> {
        if min_backoff > max_backoff {
            return Err(ConfigError::InvalidParameter {
                field: "min_backoff",
                reason: format!(
                    "must not exceed max_backoff ({min_backoff:?} > {max_backoff:?})"
                ),
            });
        }
        Ok(Self::from_kind(
            name,
            Kind::ExponentialBackoff {
                limit,
                min_backoff,
                max_backoff,
                delta_backoff,
            },
        ))
    }

    fn from_kind(name: impl Into<String>, kind: Kind) -> Self {
        Self {
            name: name.into(),
            fast_first_retry: true,
            kind,
        }
    }

    /// Allow or suppress the zero-delay first retry. Enabled by default.
    pub fn with_fast_first_retry(mut self, fast_first_retry: bool) -> Self {
        self.fast_first_retry = fast_first_retry;
        self
    }

    /// Unique key of this strategy within a registry.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the first retry may proceed without the configured delay.
    pub fn fast_first_retry(&self) -> bool {
        self.fast_first_retry
    }

    /// Bind this strategy's parameters into a per-engine decision function.
    pub fn decider(&self) -> Decider {
        Decider { kind: self.kind }
    }
}

/// Decision function bound to one engine instance.
///
/// Holds a copy of the strategy parameters taken at [`RetryStrategy::decider`]
/// time; the engine passes the attempt index in per evaluation.
#[derive(Debug, Clone, Copy)]
pub struct Decider {
    kind: Kind,
}

impl Decider {
    /// Evaluate the policy for a failed attempt.
    ///
    /// `last_error` is part of the contract for error-aware policies; the
    /// built-in algorithms decide on the attempt index alone.
    pub fn decide<E>(&self, attempt_index: u32, _last_error: &E) -> Decision {
        match self.kind {
            Kind::NoRetry => Decision::stop(),
            Kind::FixedInterval { limit, interval } => {
                if attempt_index < limit {
                    Decision::after(interval)
                } else {
                    Decision::stop()
                }
            }
            Kind::Incremental {
                limit,
                initial,
                increment,
            } => {
                if attempt_index < limit {
                    Decision::after(initial.saturating_add(increment.saturating_mul(attempt_index)))
                } else {
                    Decision::stop()
                }
            }
            Kind::ExponentialBackoff {
                limit,
                min_backoff,
                max_backoff,
                delta_backoff,
            } => {
                if attempt_index < limit {
                    Decision::after(exponential_delay(
                        attempt_index,
                        min_backoff,
                        max_backoff,
                        delta_backoff,
                    ))
                } else {
                    Decision::stop()
                }
            }
        }
    }
}

/// `min + (2^attempt - 1) * U(0.8*delta, 1.2*delta)`, capped at `max`.
///
/// Uses the thread-local generator; concurrent engines never contend on a
/// shared random source.
fn exponential_delay(
    attempt_index: u32,
    min_backoff: Duration,
    max_backoff: Duration,
    delta_backoff: Duration,
) -> Duration {
    let delta_ms = delta_backoff.as_millis() as f64;
    let jitter_unit = rand::thread_rng().gen_range(delta_ms * 0.8..=delta_ms * 1.2);
    // Growth saturates well below f64 trouble; the cap keeps 2^n finite.
    let growth = 2f64.powi(attempt_index.min(63) as i32) - 1.0;
    let delay_ms =
        (min_backoff.as_millis() as f64 + growth * jitter_unit).min(max_backoff.as_millis() as f64);
    Duration::from_millis(delay_ms as u64)
}

/// Shared `NoRetry` strategy.
pub fn default_no_retry() -> &'static RetryStrategy {
    static INSTANCE: OnceLock<RetryStrategy> = OnceLock::new();
    INSTANCE.get_or_init(|| RetryStrategy::no_retry(names::NO_RETRY))
}

/// Shared fixed-interval strategy: 10 attempts, 1s apart.
pub fn default_fixed_interval() -> &'static RetryStrategy {
    static INSTANCE: OnceLock<RetryStrategy> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        RetryStrategy::fixed_interval(names::FIXED_INTERVAL, DEFAULT_ATTEMPT_LIMIT, DEFAULT_INTERVAL)
    })
}

/// Shared incremental strategy: 10 attempts, 1s initial, 1s increment.
pub fn default_incremental() -> &'static RetryStrategy {
    static INSTANCE: OnceLock<RetryStrategy> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        RetryStrategy::incremental(
            names::INCREMENTAL,
            DEFAULT_ATTEMPT_LIMIT,
            DEFAULT_INTERVAL,
            DEFAULT_INTERVAL,
        )
    })
}

/// Shared exponential strategy: 10 attempts, 1s min / 30s max / 10s delta.
pub fn default_exponential() -> &'static RetryStrategy {
    static INSTANCE: OnceLock<RetryStrategy> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        RetryStrategy::exponential_backoff(
            names::EXPONENTIAL_BACKOFF,
            DEFAULT_ATTEMPT_LIMIT,
            DEFAULT_MIN_BACKOFF,
            DEFAULT_MAX_BACKOFF,
            DEFAULT_DELTA_BACKOFF,
        )
        .expect("default exponential parameters are valid")
    })
}
