// Lamp Client
// The surface a host integration calls: every command reconnects and re-pairs lazily,
// is serialized behind one lock, and updates the cached state only on success.

use super::{LampConfig, LampObservedState};
use crate::connection::{ConnectionError, ConnectionManager, ConnectionState, ConnectionStats};
use crate::diagnostics::{Diagnostic, DiagnosticSink, TracingSink};
use crate::protocol::{decode_notification, CodecError, Command, StateSnapshot, NOTIFY_UUID};
use crate::transport::{PeripheralHandle, Session, SubscriptionId, Transport};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

/// Errors returned by [`LampClient`] operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LampError {
    /// Rejected locally; nothing was sent
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Codec(CodecError),
}

impl LampError {
    /// Check if the link dropped while the operation was in flight
    pub fn is_dropped(&self) -> bool {
        matches!(self, Self::Connection(ConnectionError::Dropped))
    }
}

impl From<CodecError> for LampError {
    fn from(error: CodecError) -> Self {
        match error {
            CodecError::InvalidArgument(message) => Self::InvalidArgument(message),
            other => Self::Codec(other),
        }
    }
}

// ============================================================================
// LAMP CLIENT
// ============================================================================

/// Client for one lamp. Share it behind an `Arc`; operations are serialized internally.
pub struct LampClient {
    connection: tokio::sync::Mutex<ConnectionManager>,
    // Written only while `connection` is locked
    observed: Mutex<LampObservedState>,
    connection_state: watch::Receiver<ConnectionState>,
    peripheral: PeripheralHandle,
    config: LampConfig,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl LampClient {
    /// Client with default configuration, logging through `tracing`
    pub fn new(transport: Arc<dyn Transport>, peripheral: PeripheralHandle) -> Result<Self, LampError> {
        Self::with_config(transport, peripheral, LampConfig::default())
    }

    pub fn with_config(
        transport: Arc<dyn Transport>,
        peripheral: PeripheralHandle,
        config: LampConfig,
    ) -> Result<Self, LampError> {
        Self::with_diagnostics(transport, peripheral, config, Arc::new(TracingSink))
    }

    pub fn with_diagnostics(
        transport: Arc<dyn Transport>,
        peripheral: PeripheralHandle,
        config: LampConfig,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, LampError> {
        config.validate()?;
        let manager = ConnectionManager::new(
            transport,
            peripheral.clone(),
            config.connection.clone(),
            Arc::clone(&diagnostics),
        )?;
        let connection_state = manager.watch_state();

        Ok(Self {
            connection: tokio::sync::Mutex::new(manager),
            observed: Mutex::new(LampObservedState::new()),
            connection_state,
            peripheral,
            config,
            diagnostics,
        })
    }

    pub fn peripheral(&self) -> &PeripheralHandle {
        &self.peripheral
    }

    pub fn config(&self) -> &LampConfig {
        &self.config
    }

    /// Cached power state; never performs I/O
    pub fn is_on(&self) -> Option<bool> {
        self.observed().is_on
    }

    /// Cached brightness; never performs I/O
    pub fn brightness(&self) -> Option<u8> {
        self.observed().brightness
    }

    pub fn observed_state(&self) -> LampObservedState {
        *self.observed()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection_state.borrow()
    }

    /// Receiver that observes every connection state change
    pub fn watch_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection_state.clone()
    }

    pub async fn stats(&self) -> ConnectionStats {
        self.connection.lock().await.stats().clone()
    }

    // ========================================================================
    // CONNECTION LIFECYCLE
    // ========================================================================

    pub async fn connect(&self) -> Result<(), LampError> {
        self.connection.lock().await.connect().await?;
        Ok(())
    }

    pub async fn pair(&self) -> Result<(), LampError> {
        self.connection.lock().await.pair().await?;
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<(), LampError> {
        self.connection.lock().await.disconnect().await?;
        Ok(())
    }

    // ========================================================================
    // COMMANDS
    // ========================================================================

    pub async fn turn_on(&self) -> Result<(), LampError> {
        self.set_power(true).await
    }

    pub async fn turn_off(&self) -> Result<(), LampError> {
        self.set_power(false).await
    }

    async fn set_power(&self, on: bool) -> Result<(), LampError> {
        self.send_command(Command::Power(on), |state| state.is_on = Some(on))
            .await
    }

    /// Set brightness in percent. Levels above 100 follow the configured policy.
    pub async fn set_brightness(&self, level: u8) -> Result<(), LampError> {
        let Some(sent) = self.config.brightness_policy.apply(level) else {
            return Err(LampError::InvalidArgument(format!(
                "brightness {} out of range 0..=100",
                level
            )));
        };
        if sent != level {
            warn!(requested = level, sent, "brightness clamped");
        }

        self.send_command(Command::Brightness(sent), |state| state.brightness = Some(sent))
            .await
    }

    /// Ask the lamp to report its state; the answer arrives as a notification
    pub async fn request_state(&self) -> Result<(), LampError> {
        self.send_command(Command::GetState, |_| {}).await
    }

    async fn send_command(
        &self,
        command: Command,
        on_success: impl FnOnce(&mut LampObservedState),
    ) -> Result<(), LampError> {
        let frame = command.to_frame()?;

        let mut connection = self.connection.lock().await;
        connection.ensure_paired().await?;
        connection.send(&frame).await?;

        on_success(&mut *self.observed());
        Ok(())
    }

    // ========================================================================
    // NOTIFICATIONS
    // ========================================================================

    /// Listen on the notify characteristic for `window`, decoding every frame and
    /// folding state reports into the cache. The subscription is released on every
    /// exit path, including cancellation.
    pub async fn read_notifications(&self, window: Duration) -> Result<Vec<StateSnapshot>, LampError> {
        let mut connection = self.connection.lock().await;
        connection.ensure_paired().await?;

        let session = connection.session().ok_or(ConnectionError::Dropped)?;
        let subscription = session
            .subscribe(NOTIFY_UUID)
            .await
            .map_err(ConnectionError::from)?;
        let guard = SubscriptionGuard::new(session, subscription.id);

        let result = self
            .collect_notifications(&mut *connection, subscription.notifications, window)
            .await;

        guard.release().await;
        result
    }

    /// [`Self::read_notifications`] over the configured `notification_window_ms`
    pub async fn read_notifications_default(&self) -> Result<Vec<StateSnapshot>, LampError> {
        self.read_notifications(self.config.notification_window()).await
    }

    async fn collect_notifications(
        &self,
        connection: &mut ConnectionManager,
        mut notifications: mpsc::UnboundedReceiver<Vec<u8>>,
        window: Duration,
    ) -> Result<Vec<StateSnapshot>, LampError> {
        let deadline = Instant::now() + window;
        let mut snapshots = Vec::new();

        loop {
            tokio::select! {
                biased;
                error = connection.link_lost() => return Err(error.into()),
                raw = notifications.recv() => match raw {
                    Some(raw) => snapshots.extend(self.handle_notification(&raw)),
                    None => break,
                },
                _ = sleep_until(deadline) => break,
            }
        }

        Ok(snapshots)
    }

    fn handle_notification(&self, raw: &[u8]) -> Option<StateSnapshot> {
        match decode_notification(raw) {
            Ok(snapshot) => {
                self.diagnostics.record(Diagnostic::NotificationDecoded {
                    kind: snapshot.kind,
                });
                if snapshot.carries_state() && self.observed().apply(&snapshot) {
                    debug!(peripheral = %self.peripheral, ?snapshot, "state updated from notification");
                }
                Some(snapshot)
            }
            Err(error) => {
                self.diagnostics.record(Diagnostic::NotificationDropped {
                    error,
                    raw: hex::encode(raw),
                });
                None
            }
        }
    }

    fn observed(&self) -> MutexGuard<'_, LampObservedState> {
        self.observed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// SUBSCRIPTION GUARD
// ============================================================================

// Releases a notification subscription; falls back to a spawned task when dropped
// without `release` (the owning future was cancelled).
struct SubscriptionGuard {
    session: Arc<dyn Session>,
    id: Option<SubscriptionId>,
}

impl SubscriptionGuard {
    fn new(session: Arc<dyn Session>, id: SubscriptionId) -> Self {
        Self {
            session,
            id: Some(id),
        }
    }

    async fn release(mut self) {
        if let Some(id) = self.id.take() {
            if let Err(error) = self.session.unsubscribe(id).await {
                debug!(subscription = %id, %error, "unsubscribe failed");
            }
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        let session = Arc::clone(&self.session);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(error) = session.unsubscribe(id).await {
                        debug!(subscription = %id, %error, "unsubscribe failed");
                    }
                });
            }
            Err(_) => warn!(subscription = %id, "no runtime to release subscription"),
        }
    }
}
