//! Connection establisher
//!
//! Speech backends occasionally refuse the first connection while they spin
//! up, so opening a session is retried a bounded number of times with a fixed
//! delay. Exhausting the attempts is fatal; nothing retries above this.

use crate::language::ConfigError;
use crate::session::{BackendError, Connector};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
#[error("failed to connect to speech backend after {attempts} attempts: {source}")]
pub struct ConnectionError {
    pub attempts: u32,
    #[source]
    pub source: BackendError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::InvalidRetryPolicy(
                "max_attempts must be at least 1".into(),
            ));
        }
        Ok(Self {
            max_attempts,
            delay,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

/// Open a session, retrying per `policy`. Returns on the first success.
pub async fn connect<C: Connector>(
    connector: &C,
    policy: RetryPolicy,
) -> Result<C::Session, ConnectionError> {
    let total = policy.max_attempts;
    let mut attempt = 1;
    loop {
        match connector.open().await {
            Ok(session) => {
                info!(target: "connect", attempt, "Connected to speech backend");
                return Ok(session);
            }
            Err(e) => {
                warn!(
                    target: "connect",
                    attempt,
                    total,
                    error = %e,
                    "Failed to connect to speech backend (attempt {}/{})",
                    attempt,
                    total
                );
                if attempt >= total {
                    return Err(ConnectionError {
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
        tokio::time::sleep(policy.delay).await;
        attempt += 1;
    }
}
