// tcc-api: Async Rust client for the Total Connect Comfort portal and the protocol bridge

pub mod auth;
pub mod bridge;
pub mod client;
pub mod error;
pub mod models;
pub mod parser;
pub mod session;
pub mod state;
pub mod throttle;
pub mod transport;

pub use client::{CloudClient, CloudConfig, DEFAULT_BASE_URL};
pub use error::Error;
pub use state::{DeviceId, DeviceState, SystemMode, TemperatureUnit};
pub use transport::{TlsMode, TransportConfig};
