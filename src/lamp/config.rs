// Lamp Configuration

use crate::connection::{ConnectionConfig, ConnectionError};
use crate::protocol::MAX_BRIGHTNESS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do with a brightness request above 100
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrightnessPolicy {
    /// Fail with `InvalidArgument` before any I/O
    #[default]
    Reject,
    /// Send 100 instead
    Clamp,
}

impl BrightnessPolicy {
    /// Apply the policy; `None` means the level must be rejected
    pub fn apply(&self, level: u8) -> Option<u8> {
        match self {
            _ if level <= MAX_BRIGHTNESS => Some(level),
            Self::Reject => None,
            Self::Clamp => Some(MAX_BRIGHTNESS),
        }
    }
}

/// Configuration for a lamp client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LampConfig {
    pub connection: ConnectionConfig,
    /// Default listening window for `read_notifications`
    pub notification_window_ms: u64,
    pub brightness_policy: BrightnessPolicy,
}

impl Default for LampConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            notification_window_ms: 1_000,
            brightness_policy: BrightnessPolicy::Reject,
        }
    }
}

impl LampConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }

    pub fn with_notification_window_ms(mut self, ms: u64) -> Self {
        self.notification_window_ms = ms;
        self
    }

    pub fn with_brightness_policy(mut self, policy: BrightnessPolicy) -> Self {
        self.brightness_policy = policy;
        self
    }

    pub fn notification_window(&self) -> Duration {
        Duration::from_millis(self.notification_window_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConnectionError> {
        self.connection.validate()
    }
}
