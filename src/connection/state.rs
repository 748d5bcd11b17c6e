// Connection State
// The four states a lamp connection moves through and the legal moves between them

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of the connection to the lamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Connected and the vendor pairing frame has been sent
    Paired,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Disconnected
    }
}

impl ConnectionState {
    /// Check if transition to another state is valid
    pub fn can_transition_to(&self, target: &ConnectionState) -> bool {
        match (self, target) {
            (Self::Disconnected, Self::Connecting) => true,
            (Self::Connecting, Self::Connected) => true,
            (Self::Connecting, Self::Disconnected) => true, // Connection failed
            (Self::Connected, Self::Paired) => true,
            (Self::Connected, Self::Disconnected) => true,
            (Self::Paired, Self::Disconnected) => true,
            _ => false,
        }
    }

    /// Check if a transport session is open
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Paired)
    }

    /// Check if commands will be honored by the lamp
    pub fn is_paired(&self) -> bool {
        matches!(self, Self::Paired)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Paired => "paired",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cannot_skip_to_paired() {
        assert!(!ConnectionState::Disconnected.can_transition_to(&ConnectionState::Paired));
        assert!(!ConnectionState::Disconnected.can_transition_to(&ConnectionState::Connected));
        assert!(!ConnectionState::Connecting.can_transition_to(&ConnectionState::Paired));
    }

    #[test]
    fn test_every_state_can_fall_back_to_disconnected() {
        for state in [
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Paired,
        ] {
            assert!(state.can_transition_to(&ConnectionState::Disconnected));
        }
    }

    #[test]
    fn test_ordering_reflects_progress() {
        assert!(ConnectionState::Paired > ConnectionState::Connected);
        assert!(ConnectionState::Connected >= ConnectionState::Connected);
        assert!(ConnectionState::Connecting < ConnectionState::Connected);
    }
}
