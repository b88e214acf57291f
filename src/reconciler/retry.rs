use std::future::Future;
use std::time::Duration;

use crate::kubernetes::model::ClientError;

/// Bounded backoff for conflicting writes.
#[derive(Clone, Debug, PartialEq)]
pub struct Backoff {
    /// Total number of attempts, including the first one.
    pub steps: u32,
    pub duration: Duration,
    pub factor: f64,
    pub cap: Option<Duration>,
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff {
            steps: 5,
            duration: Duration::from_millis(10),
            factor: 1.0,
            cap: None,
        }
    }
}

impl Backoff {
    /// Delay after the given (0-based) failed attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let nanos = self.duration.as_nanos() as f64 * self.factor.max(1.0).powi(attempt as i32);
        let delay = Duration::from_nanos(nanos.round() as u64);
        match self.cap {
            Some(cap) if delay > cap => cap,
            _ => delay,
        }
    }

    fn attempts(&self) -> u32 {
        self.steps.max(1)
    }
}

/// Runs `op` until it succeeds, fails with anything other than a conflict,
/// or the attempt budget is spent. `op` receives the 0-based attempt number.
pub async fn retry_on_conflict<T, F, Fut>(backoff: &Backoff, mut op: F) -> Result<T, ClientError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let attempts = backoff.attempts();
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Err(err) if err.is_conflict() && attempt + 1 < attempts => {
                let delay = backoff.delay(attempt);
                tracing::debug!(attempt, ?delay, "conflict, retrying: {err}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}
