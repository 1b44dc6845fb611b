//! reattempt
//!
//! Transient-fault retry engine for async Rust. A [`RetryEngine`] drives one
//! logical call through attempt, classification, backoff and re-attempt,
//! steered by immutable named [`RetryStrategy`] policies (fixed, incremental
//! and exponential backoff) and an optional process-wide
//! [`StrategyRegistry`].
//!
//! The engine performs no I/O of its own: the operation factory produces
//! attempts, a caller-supplied classifier separates transient failures from
//! permanent ones, and the engine owns only the loop between them.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use reattempt::{Attempt, RetryEngine, RetryStrategy};
//!
//! # async fn fetch() -> Result<&'static str, std::io::Error> { Ok("ok") }
//! # async fn example() -> Result<(), reattempt::RetryError<std::io::Error>> {
//! let strategy = RetryStrategy::fixed_interval("api-calls", 3, Duration::from_millis(200));
//!
//! let greeting = RetryEngine::new(
//!     &strategy,
//!     || Some(Attempt::future(fetch())),
//!     |error: &std::io::Error| error.kind() == std::io::ErrorKind::TimedOut,
//! )
//! .execute()
//! .await?;
//! # let _ = greeting;
//! # Ok(())
//! # }
//! ```
#![deny(unsafe_code)]

pub mod engine;
pub mod error;
pub mod registry;
pub mod strategy;

pub use engine::{Attempt, AttemptError, RetryEngine};
pub use error::{ConfigError, RetryError};
pub use registry::{StrategyRegistry, process_registry, set_process_registry};
pub use strategy::{Decider, Decision, RetryStrategy};
