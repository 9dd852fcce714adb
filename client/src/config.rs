//! Client configuration: coordinator endpoint and reconnect policy

use std::env;
use std::time::Duration;

/// Environment variable consulted when no endpoint is passed explicitly.
pub const ENDPOINT_ENV_VAR: &str = "SKETCHJAM_SERVER";

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
pub const MAX_CONNECT_ATTEMPTS: u32 = 5;
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Coordinator endpoint. A missing endpoint surfaces as a connect error
    /// through the normal error path once the connection task starts.
    pub server_addr: Option<String>,
    pub connect_timeout: Duration,
    pub max_connect_attempts: u32,
    pub reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
}

impl ClientConfig {
    pub fn new(server_addr: impl Into<String>) -> Self {
        Self {
            server_addr: Some(server_addr.into()),
            ..Self::default()
        }
    }

    /// Reads the endpoint from [`ENDPOINT_ENV_VAR`].
    pub fn from_env() -> Self {
        Self {
            server_addr: env::var(ENDPOINT_ENV_VAR).ok(),
            ..Self::default()
        }
    }

    /// Delay before retry `attempt` (1-based): a linear ramp from the base
    /// delay, capped at the maximum.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay = self.reconnect_delay.saturating_mul(attempt.max(1));
        delay.min(self.max_reconnect_delay)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: None,
            connect_timeout: CONNECT_TIMEOUT,
            max_connect_attempts: MAX_CONNECT_ATTEMPTS,
            reconnect_delay: RECONNECT_DELAY,
            max_reconnect_delay: MAX_RECONNECT_DELAY,
        }
    }
}
