use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A committed change to a contract line, published after the owning
/// transaction succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub contract_id: Uuid,
    pub line_id: Uuid,
    /// The other line involved (successor planned, renewal line created).
    pub related_line_id: Option<Uuid>,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    LineCreated,
    LineUpdated,
    LineDeleted,
    LineStopped,
    LineCanceled,
    LineUncanceled,
    LineDelayed,
    SuccessorPlanned,
    LineSuspended,
    LineRenewed,
    LineInvoiced,
}
