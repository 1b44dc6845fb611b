//! Retry engine
//! - attempt.rs: attempt handles and the per-attempt failure channel
//! - executor.rs: the state machine driving one logical call

pub mod attempt;
pub mod executor;

pub use attempt::{Attempt, AttemptError};
pub use executor::RetryEngine;
