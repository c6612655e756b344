// tcc-core: state synchronization between the thermostat cloud portal and
// the protocol bridge.

pub mod convert;
pub mod echo;
pub mod engine;
pub mod error;
pub mod model;
pub mod ports;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use echo::GenerationTracker;
pub use engine::SyncEngine;
pub use error::{CoreError, FailureKind};
pub use model::{
    CommandAction, CommandOutcome, EngineStatus, EventLogEntry, EventSource, EventType,
    InboundCommand, LastError, PollReport, SetpointKind,
};
pub use ports::{CloudApi, DisabledSink, ProtocolSink, StateStore};
pub use store::{EventQuery, MemoryStore};

// Canonical types live in tcc-api; re-export them for consumers.
pub use tcc_api::{DeviceId, DeviceState, SystemMode, TemperatureUnit};
