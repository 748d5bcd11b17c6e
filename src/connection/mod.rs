// Connection module - THE LINK
// Lifecycle of the single logical connection to a lamp: connect, pair, detect drops, reconnect

mod config;
mod manager;
mod state;

pub use config::ConnectionConfig;
pub use manager::{ConnectionError, ConnectionManager, ConnectionStats};
pub use state::ConnectionState;
