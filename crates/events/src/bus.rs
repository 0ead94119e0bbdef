//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub a presentation layer attaches
//! to. It is designed to be shared via `Arc<EventBus>` between the
//! catalog, the query slots and the submission flow.

use chrono::{DateTime, Utc};
use mmm_core::job::JobRecord;
use mmm_core::query::SlotKey;
use serde::Serialize;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// The catalog's selection moved to a different job, to no job, or the
/// selected job's record changed status on refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionChanged {
    /// Previously selected job id.
    pub previous: Option<String>,
    /// The newly selected record, `None` when the selection was cleared.
    pub current: Option<JobRecord>,
}

impl SelectionChanged {
    pub fn current_id(&self) -> Option<&str> {
        self.current.as_ref().map(|job| job.job_id.as_str())
    }

    /// Whether the new selection may feed the derived queries.
    pub fn is_completed(&self) -> bool {
        self.current.as_ref().is_some_and(JobRecord::is_completed)
    }
}

/// How a slot fetch settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SlotOutcome {
    Ready,
    Failed { error: String },
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    SelectionChanged(SelectionChanged),
    CatalogRefreshed { job_count: usize },
    CatalogRefreshFailed { error: String },
    SlotSettled {
        slot: SlotKey,
        job_id: String,
        seq: u64,
        #[serde(flatten)]
        outcome: SlotOutcome,
    },
    JobSubmitted { job_name: String },
}

/// A timestamped explorer event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplorerEvent {
    #[serde(flatten)]
    pub kind: EventKind,
    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl ExplorerEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
        }
    }
}

impl From<EventKind> for ExplorerEvent {
    fn from(kind: EventKind) -> Self {
        Self::new(kind)
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`ExplorerEvent`].
///
/// # Usage
///
/// ```rust
/// use mmm_events::bus::{EventBus, EventKind};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(EventKind::CatalogRefreshed { job_count: 3 });
/// ```
pub struct EventBus {
    sender: broadcast::Sender<ExplorerEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: impl Into<ExplorerEvent>) {
        // A send error only means there are no receivers.
        let _ = self.sender.send(event.into());
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<ExplorerEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
