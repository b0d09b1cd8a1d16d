//! Bounded retry with exponential backoff for generator calls.

use std::time::Duration;

use tracing::warn;

use crate::AiError;

const BASE_DELAY: Duration = Duration::from_millis(500);
const MAX_DELAY: Duration = Duration::from_secs(10);

/// Delay before retry number `attempt` (1-based): base doubled per attempt,
/// capped.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    (BASE_DELAY.saturating_mul(factor)).min(MAX_DELAY)
}

/// Run `op` up to `max_attempts` times, sleeping with exponential backoff
/// between failures.
pub(crate) async fn with_retries<T, F, Fut>(
    max_attempts: u32,
    op_name: &'static str,
    mut op: F,
) -> Result<T, AiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AiError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut last = None;
    for attempt in 1..=max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(op = op_name, attempt, error = %e, "generator call failed");
                last = Some(e.to_string());
                if attempt < max_attempts {
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
            }
        }
    }
    Err(AiError::Exhausted {
        op: op_name,
        attempts: max_attempts,
        last: last.unwrap_or_default(),
    })
}
