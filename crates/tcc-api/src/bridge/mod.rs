// Protocol bridge adapter
//
// HTTP push of protocol-unit state plus the inbound command stream.

pub mod client;
pub mod events;
pub mod models;

pub use client::{BridgeClient, DEFAULT_BRIDGE_URL};
pub use events::{CommandStream, ReconnectConfig};
pub use models::{BridgeCommand, BridgeEvent, BridgeStatus, ProtocolState};
