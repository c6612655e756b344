// In-memory state store
//
// Device snapshots live in a `DashMap`, so an upsert for one device never
// blocks readers of another. The event log is a bounded ring: once full,
// the oldest entry is dropped for each new one.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;

use tcc_api::{DeviceId, DeviceState};

use crate::error::CoreError;
use crate::model::{EventLogEntry, EventSource, EventType};
use crate::ports::StateStore;

pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

/// Filter for [`MemoryStore::events`]. Unset fields match everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventQuery {
    pub source: Option<EventSource>,
    pub event_type: Option<EventType>,
    pub limit: Option<usize>,
}

pub struct MemoryStore {
    states: DashMap<DeviceId, DeviceState>,
    events: Mutex<VecDeque<EventLogEntry>>,
    event_capacity: usize,
    next_event_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(event_capacity: usize) -> Self {
        Self {
            states: DashMap::new(),
            events: Mutex::new(VecDeque::with_capacity(event_capacity.min(DEFAULT_EVENT_CAPACITY))),
            event_capacity: event_capacity.max(1),
            next_event_id: AtomicU64::new(1),
        }
    }

    fn events_lock(&self) -> MutexGuard<'_, VecDeque<EventLogEntry>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Matching events, newest first.
    pub fn events(&self, query: &EventQuery) -> Vec<EventLogEntry> {
        let events = self.events_lock();
        events
            .iter()
            .rev()
            .filter(|e| query.source.is_none_or(|s| e.source == s))
            .filter(|e| query.event_type.is_none_or(|t| e.event_type == t))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.events_lock().len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for MemoryStore {
    fn save_state(&self, state: &DeviceState) -> Result<(), CoreError> {
        self.states.insert(state.device_id, state.clone());
        Ok(())
    }

    fn get_state(&self, id: DeviceId) -> Result<Option<DeviceState>, CoreError> {
        Ok(self.states.get(&id).map(|entry| entry.value().clone()))
    }

    fn all_states(&self) -> Result<Vec<DeviceState>, CoreError> {
        let mut states: Vec<DeviceState> =
            self.states.iter().map(|entry| entry.value().clone()).collect();
        states.sort_by_key(|s| s.device_id);
        Ok(states)
    }

    fn log_event(
        &self,
        source: EventSource,
        event_type: EventType,
        message: &str,
        details: Option<Value>,
    ) -> Result<(), CoreError> {
        let entry = EventLogEntry {
            id: self.next_event_id.fetch_add(1, Ordering::Relaxed),
            timestamp: Utc::now(),
            source,
            event_type,
            message: message.to_owned(),
            details,
        };
        let mut events = self.events_lock();
        while events.len() >= self.event_capacity {
            events.pop_front();
        }
        events.push_back(entry);
        Ok(())
    }
}
