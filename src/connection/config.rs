// Connection Configuration
// Retry, timeout and settle-delay policy for the connection manager

use super::ConnectionError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for connecting to and pairing with a lamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Transport connect attempts before giving up
    pub connect_attempts: u32,
    /// Upper bound on a single connect attempt in milliseconds
    pub connect_timeout_ms: u64,
    /// Delay between connect attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Wait after the link comes up before using it
    pub post_connect_settle_ms: u64,
    /// Wait after the pairing frame before sending commands
    pub pair_settle_ms: u64,
    /// Upper bound on a single characteristic write in milliseconds
    pub write_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_attempts: 3,
            connect_timeout_ms: 10_000,
            retry_delay_ms: 500,
            post_connect_settle_ms: 1_000,
            pair_settle_ms: 5_000,
            write_timeout_ms: 5_000,
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// No settle delays or retry pauses; for simulated transports
    pub fn immediate() -> Self {
        Self::default()
            .with_retry_delay_ms(0)
            .with_post_connect_settle_ms(0)
            .with_pair_settle_ms(0)
    }

    pub fn with_connect_attempts(mut self, attempts: u32) -> Self {
        self.connect_attempts = attempts;
        self
    }

    pub fn with_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    pub fn with_retry_delay_ms(mut self, ms: u64) -> Self {
        self.retry_delay_ms = ms;
        self
    }

    pub fn with_post_connect_settle_ms(mut self, ms: u64) -> Self {
        self.post_connect_settle_ms = ms;
        self
    }

    pub fn with_pair_settle_ms(mut self, ms: u64) -> Self {
        self.pair_settle_ms = ms;
        self
    }

    pub fn with_write_timeout_ms(mut self, ms: u64) -> Self {
        self.write_timeout_ms = ms;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn post_connect_settle(&self) -> Duration {
        Duration::from_millis(self.post_connect_settle_ms)
    }

    pub fn pair_settle(&self) -> Duration {
        Duration::from_millis(self.pair_settle_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConnectionError> {
        if self.connect_attempts == 0 {
            return Err(ConnectionError::InvalidConfig(
                "connect_attempts cannot be 0".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConnectionError::InvalidConfig(
                "connect_timeout_ms cannot be 0".to_string(),
            ));
        }
        if self.write_timeout_ms == 0 {
            return Err(ConnectionError::InvalidConfig(
                "write_timeout_ms cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}
