// candela - protocol client for Candela BLE smart lamps
//
// Layers, leaves first:
//   protocol    - 18-byte command frames and notification decoding (pure)
//   transport   - GATT client traits, a simulated lamp and a btleplug adapter
//   connection  - connect / pair / reconnect state machine
//   lamp        - the client hosts call: power, brightness, notifications
//   diagnostics - injected event sink

pub mod connection;
pub mod diagnostics;
pub mod lamp;
pub mod protocol;
pub mod transport;

pub use connection::{ConnectionConfig, ConnectionError, ConnectionState};
pub use lamp::{BrightnessPolicy, LampClient, LampConfig, LampError};
pub use transport::PeripheralHandle;
