// btleplug Transport Implementation
// Binds the lamp client to a real BLE adapter. Only peripherals the adapter
// already knows about are used; this transport never starts a scan.

use crate::transport::{
    Link, LinkEvent, PeripheralHandle, Session, Subscription, SubscriptionId, Transport,
    TransportError,
};
use async_trait::async_trait;
use btleplug::api::{BDAddr, Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

fn map_error(error: btleplug::Error, fallback: fn(String) -> TransportError) -> TransportError {
    match error {
        btleplug::Error::NotConnected => TransportError::NotConnected,
        btleplug::Error::DeviceNotFound => TransportError::PeripheralNotFound(error.to_string()),
        btleplug::Error::TimedOut(_) => TransportError::Timeout,
        btleplug::Error::PermissionDenied => TransportError::HardwareUnavailable,
        other => fallback(other.to_string()),
    }
}

// ============================================================================
// BTLE TRANSPORT
// ============================================================================

/// Transport backed by a btleplug adapter
pub struct BtleTransport {
    adapter: Adapter,
}

impl BtleTransport {
    pub fn new(adapter: Adapter) -> Self {
        Self { adapter }
    }

    /// Use the first Bluetooth adapter on this machine
    pub async fn first_adapter() -> Result<Self, TransportError> {
        let manager = Manager::new()
            .await
            .map_err(|e| map_error(e, TransportError::ConnectionFailed))?;
        let adapters = manager
            .adapters()
            .await
            .map_err(|e| map_error(e, TransportError::ConnectionFailed))?;

        adapters
            .into_iter()
            .next()
            .map(Self::new)
            .ok_or(TransportError::HardwareUnavailable)
    }

    async fn find_peripheral(&self, handle: &PeripheralHandle) -> Result<Peripheral, TransportError> {
        let wanted: BDAddr = handle
            .address()
            .parse()
            .map_err(|_| TransportError::InvalidAddress(handle.address().to_string()))?;

        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| map_error(e, TransportError::ConnectionFailed))?;

        peripherals
            .into_iter()
            .find(|p| p.address() == wanted)
            .ok_or_else(|| TransportError::PeripheralNotFound(handle.address().to_string()))
    }
}

#[async_trait]
impl Transport for BtleTransport {
    async fn connect(&self, handle: &PeripheralHandle) -> Result<Link, TransportError> {
        let peripheral = self.find_peripheral(handle).await?;

        // Subscribe before connecting so an early drop is not missed
        let mut central_events = self
            .adapter
            .events()
            .await
            .map_err(|e| map_error(e, TransportError::ConnectionFailed))?;

        if !peripheral.is_connected().await.unwrap_or(false) {
            peripheral
                .connect()
                .await
                .map_err(|e| map_error(e, TransportError::ConnectionFailed))?;
        }
        peripheral
            .discover_services()
            .await
            .map_err(|e| map_error(e, TransportError::ConnectionFailed))?;

        let characteristics: HashMap<Uuid, Characteristic> = peripheral
            .characteristics()
            .into_iter()
            .map(|c| (c.uuid, c))
            .collect();
        debug!(peripheral = %handle, count = characteristics.len(), "discovered characteristics");

        let (tx, rx) = mpsc::unbounded_channel();
        let id = peripheral.id();
        let watcher = tokio::spawn(async move {
            while let Some(event) = central_events.next().await {
                if let CentralEvent::DeviceDisconnected(gone) = event {
                    if gone == id {
                        let _ = tx.send(LinkEvent::Disconnected {
                            reason: "peripheral disconnected".to_string(),
                        });
                        break;
                    }
                }
            }
        });

        let session = BtleSession {
            peripheral,
            characteristics,
            watcher,
            subscriptions: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
        };

        Ok(Link {
            session: Arc::new(session),
            events: rx,
        })
    }
}

// ============================================================================
// BTLE SESSION
// ============================================================================

struct BtleSession {
    peripheral: Peripheral,
    characteristics: HashMap<Uuid, Characteristic>,
    watcher: JoinHandle<()>,
    subscriptions: Mutex<HashMap<SubscriptionId, (Characteristic, JoinHandle<()>)>>,
    next_subscription: AtomicU64,
}

impl BtleSession {
    fn characteristic(&self, uuid: Uuid) -> Result<&Characteristic, TransportError> {
        self.characteristics
            .get(&uuid)
            .ok_or(TransportError::CharacteristicNotFound(uuid))
    }

    fn abort_forwarders(&self) {
        let mut subscriptions = self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, (_, task)) in subscriptions.drain() {
            task.abort();
        }
    }
}

impl Drop for BtleSession {
    fn drop(&mut self) {
        self.watcher.abort();
        self.abort_forwarders();
    }
}

#[async_trait]
impl Session for BtleSession {
    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<(), TransportError> {
        let target = self.characteristic(characteristic)?;
        self.peripheral
            .write(target, data, WriteType::WithResponse)
            .await
            .map_err(|e| map_error(e, TransportError::WriteFailed))
    }

    async fn subscribe(&self, characteristic: Uuid) -> Result<Subscription, TransportError> {
        let target = self.characteristic(characteristic)?.clone();

        let mut stream = self
            .peripheral
            .notifications()
            .await
            .map_err(|e| map_error(e, TransportError::SubscribeFailed))?;
        self.peripheral
            .subscribe(&target)
            .await
            .map_err(|e| map_error(e, TransportError::SubscribeFailed))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let forwarder = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                if notification.uuid == characteristic && tx.send(notification.value).is_err() {
                    break;
                }
            }
        });

        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, (target, forwarder));

        Ok(Subscription {
            id,
            notifications: rx,
        })
    }

    async fn unsubscribe(&self, subscription: SubscriptionId) -> Result<(), TransportError> {
        let entry = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&subscription);

        let Some((target, forwarder)) = entry else {
            warn!(%subscription, "unsubscribe for unknown subscription");
            return Ok(());
        };
        forwarder.abort();

        self.peripheral
            .unsubscribe(&target)
            .await
            .map_err(|e| map_error(e, TransportError::SubscribeFailed))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.abort_forwarders();
        self.watcher.abort();
        self.peripheral
            .disconnect()
            .await
            .map_err(|e| map_error(e, TransportError::ConnectionFailed))
    }
}
