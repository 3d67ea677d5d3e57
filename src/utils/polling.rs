/// Fixed-interval polling with a deadline
use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Re-checks a condition until it holds or the timeout expires
pub struct Poller {
    timeout: Duration,
    interval: Duration,
    description: String,
}

impl Poller {
    pub fn new(timeout_secs: u64, interval_secs: u64, description: impl Into<String>) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            interval: Duration::from_secs(interval_secs),
            description: description.into(),
        }
    }

    /// Poll until `check` returns `Ok(true)`.
    ///
    /// An error from `check` stops polling immediately. Returns the number of checks made.
    pub async fn until<F, Fut>(&self, mut check: F) -> Result<u32>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        info!("{}...", self.description);

        let deadline = Instant::now() + self.timeout;
        let mut attempts = 0;

        loop {
            attempts += 1;
            if check().await? {
                info!("✓ {}", self.description);
                return Ok(attempts);
            }

            if Instant::now() + self.interval > deadline {
                anyhow::bail!(
                    "Timeout after {} seconds: {}",
                    self.timeout.as_secs(),
                    self.description
                );
            }

            debug!(attempts, "{}: not ready yet", self.description);
            tokio::time::sleep(self.interval).await;
        }
    }
}
