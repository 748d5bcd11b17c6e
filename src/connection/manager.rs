// Connection Manager
// Owns the one logical link to a lamp: bounded-retry connect, the vendor pairing
// frame, link-loss events from the transport, and writes raced against those events.

use super::{ConnectionConfig, ConnectionState};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::protocol::{CodecError, Command, CommandFrame, CONTROL_UUID};
use crate::transport::{LinkEvent, PeripheralHandle, Session, Transport, TransportError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Errors raised while managing the connection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Peripheral unreachable after {attempts} attempt(s): {source}")]
    Unreachable {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("Link dropped during operation")]
    Dropped,

    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: ConnectionState,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Counters for one connection manager
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStats {
    /// Transport connect attempts, including failed ones
    pub connect_attempts: u64,
    /// Links established
    pub connects: u64,
    /// Pairing frames acknowledged by the transport
    pub pairings: u64,
    /// Command frames written, pairing included
    pub frames_sent: u64,
    /// Links lost without us asking
    pub drops: u64,
}

struct ActiveLink {
    session: Arc<dyn Session>,
    events: mpsc::UnboundedReceiver<LinkEvent>,
}

// ============================================================================
// CONNECTION MANAGER
// ============================================================================

/// Drives the connect / pair / disconnect state machine for one peripheral
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    peripheral: PeripheralHandle,
    config: ConnectionConfig,
    state: watch::Sender<ConnectionState>,
    link: Option<ActiveLink>,
    diagnostics: Arc<dyn DiagnosticSink>,
    stats: ConnectionStats,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        peripheral: PeripheralHandle,
        config: ConnectionConfig,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, ConnectionError> {
        config.validate()?;
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            transport,
            peripheral,
            config,
            state,
            link: None,
            diagnostics,
            stats: ConnectionStats::default(),
        })
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn peripheral(&self) -> &PeripheralHandle {
        &self.peripheral
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// The open session, if any
    pub fn session(&self) -> Option<Arc<dyn Session>> {
        self.link.as_ref().map(|link| Arc::clone(&link.session))
    }

    /// Establish the transport session with bounded retry
    pub async fn connect(&mut self) -> Result<(), ConnectionError> {
        self.poll_link_events();
        match self.state() {
            ConnectionState::Connected | ConnectionState::Paired => return Ok(()),
            // A previous connect was cancelled mid-flight
            ConnectionState::Connecting => self.transition(ConnectionState::Disconnected)?,
            ConnectionState::Disconnected => {}
        }

        self.transition(ConnectionState::Connecting)?;

        let max_attempts = self.config.connect_attempts;
        let mut attempts = 0u32;
        let mut last_error = TransportError::ConnectionFailed("no attempt made".to_string());

        while attempts < max_attempts {
            attempts += 1;
            self.stats.connect_attempts += 1;
            debug!(peripheral = %self.peripheral, attempt = attempts, "connecting");

            let result = match timeout(
                self.config.connect_timeout(),
                self.transport.connect(&self.peripheral),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout),
            };

            match result {
                Ok(link) => {
                    self.link = Some(ActiveLink {
                        session: link.session,
                        events: link.events,
                    });
                    self.stats.connects += 1;
                    self.transition(ConnectionState::Connected)?;
                    info!(peripheral = %self.peripheral, attempt = attempts, "connected");

                    let settle = self.config.post_connect_settle();
                    if !settle.is_zero() {
                        sleep(settle).await;
                    }
                    if self.poll_link_events() {
                        return Err(ConnectionError::Dropped);
                    }
                    return Ok(());
                }
                Err(error) => {
                    self.diagnostics.record(Diagnostic::ConnectAttemptFailed {
                        attempt: attempts,
                        error: error.to_string(),
                    });
                    let retryable = error.is_retryable();
                    last_error = error;

                    if !retryable {
                        break;
                    }
                    let delay = self.config.retry_delay();
                    if attempts < max_attempts && !delay.is_zero() {
                        sleep(delay).await;
                    }
                }
            }
        }

        self.transition(ConnectionState::Disconnected)?;
        Err(ConnectionError::Unreachable {
            attempts,
            source: last_error,
        })
    }

    /// Send the vendor pairing frame. Valid from Connected; a no-op once Paired.
    pub async fn pair(&mut self) -> Result<(), ConnectionError> {
        self.poll_link_events();
        match self.state() {
            ConnectionState::Paired => return Ok(()),
            ConnectionState::Connected => {}
            state => {
                return Err(ConnectionError::InvalidState {
                    operation: "pair",
                    state,
                })
            }
        }

        let frame = Command::Pair.to_frame()?;
        self.write(&frame).await?;

        // The lamp sends no acknowledgement we rely on; give it time to settle
        let settle = self.config.pair_settle();
        if !settle.is_zero() {
            sleep(settle).await;
        }
        if self.poll_link_events() {
            return Err(ConnectionError::Dropped);
        }

        self.transition(ConnectionState::Paired)?;
        self.stats.pairings += 1;
        info!(peripheral = %self.peripheral, "paired");
        Ok(())
    }

    /// Connect and pair as needed so commands will be honored
    pub async fn ensure_paired(&mut self) -> Result<(), ConnectionError> {
        self.poll_link_events();
        if !self.state().is_connected() {
            self.connect().await?;
        }
        if !self.state().is_paired() {
            self.pair().await?;
        }
        Ok(())
    }

    /// Write a command frame to the control characteristic
    pub async fn send(&mut self, frame: &CommandFrame) -> Result<(), ConnectionError> {
        self.write(frame).await
    }

    /// Close the session. Calling it while disconnected does nothing.
    pub async fn disconnect(&mut self) -> Result<(), ConnectionError> {
        self.poll_link_events();

        let Some(link) = self.link.take() else {
            if self.state() != ConnectionState::Disconnected {
                self.transition(ConnectionState::Disconnected)?;
            }
            return Ok(());
        };

        // Enter Disconnected before the await; a cancelled disconnect must not leave a stale state
        self.transition(ConnectionState::Disconnected)?;
        info!(peripheral = %self.peripheral, "disconnected");
        let result = link.session.disconnect().await;

        match result {
            Ok(()) => Ok(()),
            Err(error) if error.is_link_loss() => Ok(()),
            Err(error) => {
                warn!(peripheral = %self.peripheral, %error, "disconnect reported an error");
                Err(error.into())
            }
        }
    }

    /// Process link-loss events delivered by the transport.
    /// Returns true if the link was found to be gone.
    pub fn poll_link_events(&mut self) -> bool {
        let Some(link) = self.link.as_mut() else {
            let from = self.state();
            if from.is_connected() {
                warn!(peripheral = %self.peripheral, state = %from, "no session behind state, resetting");
                self.state.send_replace(ConnectionState::Disconnected);
                self.diagnostics.record(Diagnostic::StateChanged {
                    from,
                    to: ConnectionState::Disconnected,
                });
                return true;
            }
            return false;
        };

        let reason = match link.events.try_recv() {
            Ok(LinkEvent::Disconnected { reason }) => reason,
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => "transport event channel closed".to_string(),
        };

        self.mark_dropped(reason);
        true
    }

    /// Resolves when the transport reports the link gone; the manager is then Disconnected.
    /// Cancel-safe.
    pub async fn link_lost(&mut self) -> ConnectionError {
        let Some(link) = self.link.as_mut() else {
            return ConnectionError::Dropped;
        };

        let reason = match link.events.recv().await {
            Some(LinkEvent::Disconnected { reason }) => reason,
            None => "transport event channel closed".to_string(),
        };

        self.mark_dropped(reason);
        ConnectionError::Dropped
    }

    async fn write(&mut self, frame: &CommandFrame) -> Result<(), ConnectionError> {
        if self.poll_link_events() {
            return Err(ConnectionError::Dropped);
        }

        let state = self.state();
        let write_timeout = self.config.write_timeout();
        let link = self.link.as_mut().ok_or(ConnectionError::InvalidState {
            operation: "send",
            state,
        })?;
        let session = Arc::clone(&link.session);

        // A drop reported while the write is in flight wins over the write
        let outcome = tokio::select! {
            biased;
            event = link.events.recv() => Err(match event {
                Some(LinkEvent::Disconnected { reason }) => reason,
                None => "transport event channel closed".to_string(),
            }),
            result = timeout(write_timeout, session.write(CONTROL_UUID, frame.as_bytes())) => Ok(result),
        };

        match outcome {
            Err(reason) => {
                self.mark_dropped(reason);
                Err(ConnectionError::Dropped)
            }
            Ok(Err(_)) => Err(TransportError::Timeout.into()),
            Ok(Ok(Err(error))) if error.is_link_loss() => {
                self.mark_dropped(error.to_string());
                Err(ConnectionError::Dropped)
            }
            Ok(Ok(Err(error))) => Err(error.into()),
            Ok(Ok(Ok(()))) => {
                self.stats.frames_sent += 1;
                self.diagnostics.record(Diagnostic::FrameSent {
                    opcode: frame.opcode(),
                    frame: frame.to_hex(),
                });
                Ok(())
            }
        }
    }

    fn transition(&mut self, to: ConnectionState) -> Result<(), ConnectionError> {
        let from = self.state();
        if !from.can_transition_to(&to) {
            return Err(ConnectionError::InvalidState {
                operation: "change state",
                state: from,
            });
        }

        self.state.send_replace(to);
        self.diagnostics.record(Diagnostic::StateChanged { from, to });
        Ok(())
    }

    // Link loss is legal from every state, so it bypasses the transition table
    fn mark_dropped(&mut self, reason: String) {
        self.link = None;
        self.stats.drops += 1;
        self.diagnostics.record(Diagnostic::LinkDropped { reason });

        let from = self.state();
        if from != ConnectionState::Disconnected {
            self.state.send_replace(ConnectionState::Disconnected);
            self.diagnostics.record(Diagnostic::StateChanged {
                from,
                to: ConnectionState::Disconnected,
            });
        }
    }
}
