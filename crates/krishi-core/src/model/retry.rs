use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{ModelClient, ModelRequest};
use crate::error::InvocationError;

const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);
const MAX_DELAY: Duration = Duration::from_secs(8);

/// Re-sends a request after transient failures (transport, timeout, 5xx)
/// with exponential delay. Quota and rejection errors are returned at once.
pub struct RetryingClient {
    inner: Arc<dyn ModelClient>,
    max_retries: u32,
    base_delay: Duration,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn ModelClient>, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(MAX_DELAY)
    }
}

#[async_trait]
impl ModelClient for RetryingClient {
    async fn invoke(&self, request: &ModelRequest) -> Result<Value, InvocationError> {
        let mut attempt = 0;
        loop {
            match self.inner.invoke(request).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.delay_for(attempt);
                    attempt += 1;
                    tracing::warn!(
                        "[ModelClient] '{}' failed ({}), retry {}/{} in {:?}",
                        request.flow,
                        e,
                        attempt,
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
