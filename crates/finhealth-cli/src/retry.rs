//! Bounded retries for store calls.

use std::future::Future;

use anyhow::anyhow;
use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::settings::RetryPolicy;

/// Run `op` until it succeeds or `policy.attempts` is exhausted.
///
/// Each attempt is cut off after `policy.timeout()`. Between attempts the
/// task sleeps for the backoff delay, doubling it every time.
pub async fn with_retry<T, E, F, Fut>(
  policy: &RetryPolicy,
  what: &str,
  mut op: F,
) -> anyhow::Result<T>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, E>>,
  E: std::error::Error + Send + Sync + 'static,
{
  let attempts = policy.attempts.max(1);
  let mut delay = policy.backoff();
  let mut attempt = 1;

  loop {
    let err = match timeout(policy.timeout(), op()).await {
      Ok(Ok(value)) => return Ok(value),
      Ok(Err(e)) => anyhow::Error::new(e),
      Err(_) => anyhow!("timed out after {:?}", policy.timeout()),
    };

    if attempt >= attempts {
      return Err(err.context(format!("{what} failed after {attempts} attempt(s)")));
    }
    warn!(what, attempt, error = %err, "store call failed, retrying in {delay:?}");
    sleep(delay).await;
    delay = delay.saturating_mul(2);
    attempt += 1;
  }
}
