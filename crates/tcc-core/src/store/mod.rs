// ── State persistence ──
//
// In-memory implementation of the `StateStore` contract.

mod memory;

pub use memory::{EventQuery, MemoryStore, DEFAULT_EVENT_CAPACITY};
