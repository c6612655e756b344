// ── Engine domain types ──

pub mod command;
pub mod event;
pub mod status;

pub use command::{CommandAction, CommandOutcome, InboundCommand, SetpointKind};
pub use event::{EventLogEntry, EventSource, EventType};
pub use status::{EngineStatus, LastError, PollReport};
