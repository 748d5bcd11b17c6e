// Observed Lamp State
// Best-effort mirror of what the lamp was last told or last reported

use crate::protocol::StateSnapshot;
use serde::{Deserialize, Serialize};

/// Last known power and brightness; `None` until something is known
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LampObservedState {
    pub is_on: Option<bool>,
    pub brightness: Option<u8>,
}

impl LampObservedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a decoded notification into the cache. Returns true if anything changed.
    pub fn apply(&mut self, snapshot: &StateSnapshot) -> bool {
        let before = *self;
        if let Some(power) = snapshot.power {
            self.is_on = Some(power);
        }
        if let Some(brightness) = snapshot.brightness {
            self.brightness = Some(brightness);
        }
        before != *self
    }

    pub fn is_known(&self) -> bool {
        self.is_on.is_some() || self.brightness.is_some()
    }
}
