// Diagnostics - injected event sink
// Connection and notification events are reported to a sink handed in by the host
// instead of being printed. The default sink forwards to `tracing`.

use crate::connection::ConnectionState;
use crate::protocol::{DecodeError, ResponseKind};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Something worth telling the host about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Connection state machine moved
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },

    /// One connect attempt failed (more may follow)
    ConnectAttemptFailed { attempt: u32, error: String },

    /// A command frame reached the transport
    FrameSent { opcode: u8, frame: String },

    /// The link went away underneath us
    LinkDropped { reason: String },

    /// A notification was decoded
    NotificationDecoded { kind: ResponseKind },

    /// A notification could not be decoded and was discarded
    NotificationDropped { error: DecodeError, raw: String },
}

/// Receiver for [`Diagnostic`] events
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, diagnostic: Diagnostic);
}

// ============================================================================
// TRACING SINK
// ============================================================================

/// Default sink: logs every event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::StateChanged { from, to } => {
                debug!(?from, ?to, "connection state changed");
            }
            Diagnostic::ConnectAttemptFailed { attempt, error } => {
                warn!(attempt, %error, "connect attempt failed");
            }
            Diagnostic::FrameSent { opcode, frame } => {
                debug!(opcode = format_args!("0x{:02x}", opcode), %frame, "frame sent");
            }
            Diagnostic::LinkDropped { reason } => {
                info!(%reason, "link dropped");
            }
            Diagnostic::NotificationDecoded { kind } => {
                debug!(?kind, "notification decoded");
            }
            Diagnostic::NotificationDropped { error, raw } => {
                warn!(%error, %raw, "notification dropped");
            }
        }
    }
}

// ============================================================================
// MEMORY SINK
// ============================================================================

/// Collects events in memory; drain them with [`MemorySink::poll_events`]
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all events recorded so far (clears the queue)
    pub fn poll_events(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, diagnostic: Diagnostic) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_drains() {
        let sink = MemorySink::new();
        sink.record(Diagnostic::LinkDropped {
            reason: "gone".to_string(),
        });

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.poll_events().len(), 1);
        assert!(sink.is_empty());
    }
}
