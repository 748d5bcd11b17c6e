// Transport Traits and Core Types
// Defines the GATT client capabilities the lamp client consumes from a BLE stack

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

// ============================================================================
// PERIPHERAL HANDLE
// ============================================================================

/// Identifies one physical lamp by its Bluetooth MAC address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeripheralHandle {
    address: String,
}

impl PeripheralHandle {
    /// Parse a colon-delimited MAC address (`AA:BB:CC:DD:EE:FF`), case-insensitive
    pub fn parse(address: &str) -> Result<Self, TransportError> {
        let parts: Vec<&str> = address.trim().split(':').collect();
        let well_formed = parts.len() == 6
            && parts
                .iter()
                .all(|p| p.len() == 2 && p.bytes().all(|b| b.is_ascii_hexdigit()));

        if !well_formed {
            return Err(TransportError::InvalidAddress(address.to_string()));
        }

        Ok(Self {
            address: address.trim().to_uppercase(),
        })
    }

    /// Normalized (upper-case) address
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl FromStr for PeripheralHandle {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PeripheralHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ble://{}", self.address)
    }
}

// ============================================================================
// SUBSCRIPTIONS AND LINK EVENTS
// ============================================================================

/// Identifies an active notification subscription on a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// An active subscription: raw notification payloads arrive on `notifications`
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub notifications: mpsc::UnboundedReceiver<Vec<u8>>,
}

/// Events raised by the transport's own I/O task for one link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The peripheral dropped the link (or the stack tore it down)
    Disconnected { reason: String },
}

/// A freshly established link: the session plus its event channel
pub struct Link {
    pub session: Arc<dyn Session>,
    pub events: mpsc::UnboundedReceiver<LinkEvent>,
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}

// ============================================================================
// TRANSPORT ERRORS
// ============================================================================

/// Errors that can occur in the transport layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Subscribe failed: {0}")]
    SubscribeFailed(String),

    #[error("Characteristic not found: {0}")]
    CharacteristicNotFound(Uuid),

    #[error("Peripheral not found: {0}")]
    PeripheralNotFound(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Operation timed out")]
    Timeout,

    #[error("Hardware unavailable")]
    HardwareUnavailable,
}

impl TransportError {
    /// Check if this error means the link is gone
    pub fn is_link_loss(&self) -> bool {
        matches!(self, Self::NotConnected)
    }

    /// Check if the operation can be retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::Timeout | Self::WriteFailed(_) | Self::PeripheralNotFound(_)
        )
    }
}

// ============================================================================
// TRANSPORT TRAITS
// ============================================================================

/// A BLE stack able to open GATT sessions to peripherals
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a session to the peripheral
    async fn connect(&self, peripheral: &PeripheralHandle) -> Result<Link, TransportError>;
}

/// One open GATT session
#[async_trait]
pub trait Session: Send + Sync {
    /// Write a value to a characteristic
    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<(), TransportError>;

    /// Start receiving notifications from a characteristic
    async fn subscribe(&self, characteristic: Uuid) -> Result<Subscription, TransportError>;

    /// Stop a subscription started with [`Session::subscribe`]
    async fn unsubscribe(&self, subscription: SubscriptionId) -> Result<(), TransportError>;

    /// Close the session
    async fn disconnect(&self) -> Result<(), TransportError>;
}
