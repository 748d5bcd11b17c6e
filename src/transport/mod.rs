// Transport module - THE RADIO (abstract)
// GATT client interface the lamp client drives, plus a simulated and a btleplug implementation

mod traits;
mod mock;
#[cfg(feature = "ble")]
mod btle;

pub use traits::{
    // Core traits
    Transport, Session,
    // Link types
    Link, LinkEvent, PeripheralHandle,
    // Subscriptions
    Subscription, SubscriptionId,
    // Errors
    TransportError,
};

pub use mock::{MockTransport, WrittenFrame};

#[cfg(feature = "ble")]
pub use btle::BtleTransport;
