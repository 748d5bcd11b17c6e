// Mock Transport
// In-process simulated lamp used by tests and dry runs: records writes,
// fails connects on demand, drops the link and pushes notifications

use crate::transport::{
    Link, LinkEvent, PeripheralHandle, Session, Subscription, SubscriptionId, Transport,
    TransportError,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use uuid::Uuid;

/// A value written to a characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFrame {
    pub characteristic: Uuid,
    pub data: Vec<u8>,
}

#[derive(Default)]
struct MockState {
    unreachable: bool,
    connect_failures_remaining: usize,
    connect_calls: usize,
    connects: usize,
    disconnects: usize,
    generation: u64,
    link: Option<mpsc::UnboundedSender<LinkEvent>>,
    writes: Vec<WrittenFrame>,
    drop_on_next_write: bool,
    hang_on_next_disconnect: bool,
    next_write_error: Option<TransportError>,
    subscriptions: HashMap<SubscriptionId, (Uuid, mpsc::UnboundedSender<Vec<u8>>)>,
    next_subscription: u64,
    unsubscribes: usize,
    queued_notifications: Vec<Vec<u8>>,
}

impl MockState {
    fn is_current(&self, generation: u64) -> bool {
        self.link.is_some() && self.generation == generation
    }

    fn tear_down(&mut self, reason: Option<&str>) {
        if let Some(link) = self.link.take() {
            if let Some(reason) = reason {
                let _ = link.send(LinkEvent::Disconnected {
                    reason: reason.to_string(),
                });
            }
        }
        self.subscriptions.clear();
    }
}

// ============================================================================
// MOCK TRANSPORT
// ============================================================================

/// Simulated peripheral. Clones share the same device state.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a reachable mock lamp
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every connection attempt
    pub fn with_unreachable(self) -> Self {
        self.lock().unreachable = true;
        self
    }

    /// Fail N connection attempts, then succeed
    pub fn with_connect_failures(self, failures: usize) -> Self {
        self.lock().connect_failures_remaining = failures;
        self
    }

    /// Make the peripheral reachable (or not) from now on
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    /// Simulate the peripheral dropping the link
    pub fn drop_link(&self) {
        self.lock().tear_down(Some("link lost"));
    }

    /// Drop the link while the next write is in flight; that write never completes
    pub fn drop_on_next_write(&self) {
        self.lock().drop_on_next_write = true;
    }

    /// The next disconnect request never completes and leaves the link up
    pub fn hang_on_next_disconnect(&self) {
        self.lock().hang_on_next_disconnect = true;
    }

    /// Fail the next write with the given error
    pub fn fail_next_write(&self, error: TransportError) {
        self.lock().next_write_error = Some(error);
    }

    /// Deliver a notification to live subscribers, or queue it for the next subscription
    pub fn push_notification(&self, data: &[u8]) {
        let mut state = self.lock();
        let mut delivered = false;
        for (_, sender) in state.subscriptions.values() {
            delivered |= sender.send(data.to_vec()).is_ok();
        }
        if !delivered {
            state.queued_notifications.push(data.to_vec());
        }
    }

    /// All writes, in the order they reached the peripheral
    pub fn written(&self) -> Vec<WrittenFrame> {
        self.lock().writes.clone()
    }

    /// Payloads written to one characteristic
    pub fn written_to(&self, characteristic: Uuid) -> Vec<Vec<u8>> {
        self.lock()
            .writes
            .iter()
            .filter(|w| w.characteristic == characteristic)
            .map(|w| w.data.clone())
            .collect()
    }

    /// Connection attempts, successful or not
    pub fn connect_calls(&self) -> usize {
        self.lock().connect_calls
    }

    /// Successful connections
    pub fn connect_count(&self) -> usize {
        self.lock().connects
    }

    /// Sessions closed by the client
    pub fn disconnect_count(&self) -> usize {
        self.lock().disconnects
    }

    pub fn is_connected(&self) -> bool {
        self.lock().link.is_some()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.lock().subscriptions.len()
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.lock().unsubscribes
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, peripheral: &PeripheralHandle) -> Result<Link, TransportError> {
        let mut state = self.lock();
        state.connect_calls += 1;

        if state.unreachable {
            return Err(TransportError::ConnectionFailed(format!(
                "{} is out of range",
                peripheral.address()
            )));
        }
        if state.connect_failures_remaining > 0 {
            state.connect_failures_remaining -= 1;
            return Err(TransportError::ConnectionFailed("mock connect failure".to_string()));
        }

        state.tear_down(None);
        let (tx, rx) = mpsc::unbounded_channel();
        state.link = Some(tx);
        state.generation += 1;
        state.connects += 1;

        let session = MockSession {
            state: Arc::clone(&self.state),
            generation: state.generation,
        };

        Ok(Link {
            session: Arc::new(session),
            events: rx,
        })
    }
}

// ============================================================================
// MOCK SESSION
// ============================================================================

struct MockSession {
    state: Arc<Mutex<MockState>>,
    generation: u64,
}

impl MockSession {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Session for MockSession {
    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<(), TransportError> {
        {
            let mut state = self.lock();
            if !state.is_current(self.generation) {
                return Err(TransportError::NotConnected);
            }
            if let Some(error) = state.next_write_error.take() {
                return Err(error);
            }
            if !state.drop_on_next_write {
                state.writes.push(WrittenFrame {
                    characteristic,
                    data: data.to_vec(),
                });
                return Ok(());
            }
            state.drop_on_next_write = false;
            state.tear_down(Some("link lost during write"));
        }

        std::future::pending::<()>().await;
        Err(TransportError::NotConnected)
    }

    async fn subscribe(&self, characteristic: Uuid) -> Result<Subscription, TransportError> {
        let mut state = self.lock();
        if !state.is_current(self.generation) {
            return Err(TransportError::NotConnected);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for queued in state.queued_notifications.drain(..) {
            let _ = tx.send(queued);
        }

        state.next_subscription += 1;
        let id = SubscriptionId(state.next_subscription);
        state.subscriptions.insert(id, (characteristic, tx));

        Ok(Subscription {
            id,
            notifications: rx,
        })
    }

    async fn unsubscribe(&self, subscription: SubscriptionId) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.unsubscribes += 1;
        if !state.is_current(self.generation) {
            return Err(TransportError::NotConnected);
        }
        state.subscriptions.remove(&subscription);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        {
            let mut state = self.lock();
            if !state.hang_on_next_disconnect {
                if state.is_current(self.generation) {
                    state.disconnects += 1;
                    state.tear_down(None);
                }
                return Ok(());
            }
            state.hang_on_next_disconnect = false;
        }

        std::future::pending::<()>().await;
        Ok(())
    }
}
