use anyhow::{Context, Result};
use std::{thread::sleep, time::Duration};
use tracing::error;

/// Retry an operation, sleeping a fixed delay between attempts.
///
/// Returns the first success, or the last error once `max_attempts`
/// attempts have failed.
pub fn retry_with_delay<F, T>(max_attempts: u32, delay: Duration, mut f: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempts = 0;

    loop {
        match f() {
            Ok(result) => return Ok(result),
            Err(err) => {
                attempts += 1;

                if attempts >= max_attempts {
                    return Err(err)
                        .context(format!("Operation failed after {} attempts", max_attempts));
                }

                error!(
                    ?err,
                    attempt = attempts,
                    max_attempts,
                    "Operation failed, retrying in {:?}...",
                    delay
                );

                sleep(delay);
            }
        }
    }
}
