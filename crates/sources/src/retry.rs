use std::backtrace::Backtrace;

use crate::error::FetchError;

/// Run `op` up to `attempts` times, stopping at the first success.
///
/// Each call is a full re-run of the operation. Errors that cannot be fixed
/// by retrying are returned as-is; otherwise the final failure is wrapped in
/// [`FetchError::RetriesExhausted`] carrying the last error. There is no
/// delay between attempts. `attempts` of 0 is treated as 1.
pub fn with_retry<T>(
    group: &str,
    attempts: u32,
    mut op: impl FnMut(u32) -> Result<T, FetchError>,
) -> Result<T, FetchError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(group, attempt, "fetch succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                let backtrace = Backtrace::capture();
                tracing::warn!(
                    group,
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    backtrace = %backtrace,
                    "fetch attempt failed",
                );
                if attempt >= attempts {
                    return Err(FetchError::RetriesExhausted {
                        group: group.to_string(),
                        attempts,
                        last: Box::new(e),
                    });
                }
                attempt += 1;
            }
        }
    }
}
