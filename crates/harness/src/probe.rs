//! Reachability probing for the target application

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::{HarnessError, HarnessResult};

/// Longest a single probe request may take
const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Polls a URL over plain HTTP until something answers
pub struct TargetProbe {
    client: reqwest::Client,
    interval: Duration,
}

impl TargetProbe {
    pub fn new(interval: Duration) -> HarnessResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, interval })
    }

    /// Wait until `url` answers any HTTP request, or fail with
    /// `NavigationFailure` once `budget` is spent.
    pub async fn wait_reachable(&self, url: &str, budget: Duration) -> HarnessResult<()> {
        let start = Instant::now();
        let mut attempts = 0usize;

        loop {
            attempts += 1;

            let remaining = budget.saturating_sub(start.elapsed());
            match self.client.get(url).timeout(remaining.min(REQUEST_TIMEOUT)).send().await {
                Ok(resp) => {
                    if !resp.status().is_success() {
                        warn!("{} answered with {}", url, resp.status());
                    }
                    debug!("{} reachable after {} attempt(s)", url, attempts);
                    return Ok(());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for {} to respond...", url);
                    }
                    // Connection refused is expected while the dev server starts
                    if !e.is_connect() {
                        warn!("Probe error: {}", e);
                    }
                }
            }

            if start.elapsed() >= budget {
                return Err(HarnessError::NavigationFailure(format!(
                    "{} did not respond after {} attempt(s) in {}ms",
                    url,
                    attempts,
                    budget.as_millis()
                )));
            }
            sleep(self.interval.min(budget.saturating_sub(start.elapsed()))).await;
        }
    }
}
