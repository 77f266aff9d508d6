//! Retry loop: run a closure until success or the policy says stop.

use super::policy::{RetryDecision, RetryPolicy};
use crate::control::CancelToken;
use crate::error::TransferError;

/// Final error after the retry loop gave up.
#[derive(Debug)]
pub struct Exhausted {
    pub attempts: u32,
    pub last: TransferError,
}

/// Runs `f` (given the 1-based attempt number) until it succeeds or the policy
/// stops. Sleeps between attempts; the sleep wakes early on cancellation, in
/// which case the result is `TransferError::Cancelled`.
pub fn run_with_retry<T, F>(
    policy: &RetryPolicy,
    cancel: &CancelToken,
    mut f: F,
) -> Result<T, Exhausted>
where
    F: FnMut(u32) -> Result<T, TransferError>,
{
    let mut attempt = 1u32;
    loop {
        if cancel.is_cancelled() {
            return Err(Exhausted {
                attempts: attempt - 1,
                last: TransferError::Cancelled,
            });
        }
        match f(attempt) {
            Ok(v) => return Ok(v),
            Err(e) => match policy.decide(attempt, &e) {
                RetryDecision::NoRetry => {
                    return Err(Exhausted {
                        attempts: attempt,
                        last: e,
                    })
                }
                RetryDecision::RetryAfter(d) => {
                    tracing::warn!(attempt, error = %e, "transfer attempt failed, retrying");
                    if cancel.sleep(d).is_err() {
                        return Err(Exhausted {
                            attempts: attempt,
                            last: TransferError::Cancelled,
                        });
                    }
                    attempt += 1;
                }
            },
        }
    }
}
