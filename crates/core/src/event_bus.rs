//! Lifecycle event bus: trait for publishing committed contract-line
//! mutations to whatever audit trail or messaging layer the host wires in.

use crate::types::{EventType, LifecycleEvent};
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

/// Receives one event per committed mutation.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: LifecycleEvent);
}

/// No-op sink for callers that don't keep an audit trail.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: LifecycleEvent) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn count_type(&self, event_type: EventType) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: LifecycleEvent) {
        self.events.lock().push(event);
    }
}

/// Convenience builder for creating `LifecycleEvent` with minimal boilerplate.
pub fn make_event(
    event_type: EventType,
    contract_id: Uuid,
    line_id: Uuid,
    dates: (Option<NaiveDate>, Option<NaiveDate>),
    message: impl Into<String>,
) -> LifecycleEvent {
    LifecycleEvent {
        event_id: Uuid::new_v4(),
        event_type,
        contract_id,
        line_id,
        related_line_id: None,
        date_start: dates.0,
        date_end: dates.1,
        message: message.into(),
        timestamp: Utc::now(),
    }
}

/// Convenience: create a no-op event bus.
pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

/// Convenience: create a capture sink for tests.
pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}
