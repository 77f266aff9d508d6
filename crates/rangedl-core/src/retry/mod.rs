//! Retry policy shared by chunk workers and the single-stream path.
//!
//! Every transfer failure is retried with a fixed pause until the attempt
//! budget runs out; cancellation is never retried.

mod policy;
mod run;

pub use policy::{RetryDecision, RetryPolicy};
pub use run::{run_with_retry, Exhausted};
