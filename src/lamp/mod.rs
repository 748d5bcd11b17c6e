// Lamp module - THE LIGHT
// Public client API: power and brightness commands, notifications, cached state

mod client;
mod config;
mod state;

pub use client::{LampClient, LampError};
pub use config::{BrightnessPolicy, LampConfig};
pub use state::LampObservedState;
