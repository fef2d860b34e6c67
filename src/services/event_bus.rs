//! EventBus service for domain event distribution.
//!
//! Provides a broadcast-based event system with sequence numbering and
//! correlation tracking. Mutations publish here and never wait on the
//! reactions their events cause.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::models::{EvidenceKind, PortfolioVerificationStatus, VerificationAction};

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically increasing sequence number assigned by EventBus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    pub fn zero() -> Self {
        Self(0)
    }
}

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Event category for filtering and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Block,
    Verification,
    Portfolio,
    Evidence,
    Rating,
    Reactor,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Block => write!(f, "block"),
            Self::Verification => write!(f, "verification"),
            Self::Portfolio => write!(f, "portfolio"),
            Self::Evidence => write!(f, "evidence"),
            Self::Rating => write!(f, "rating"),
            Self::Reactor => write!(f, "reactor"),
        }
    }
}

/// Event envelope containing all event metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: EventId,
    pub sequence: SequenceNumber,
    pub timestamp: DateTime<Utc>,
    pub severity: EventSeverity,
    pub category: EventCategory,
    pub portfolio_id: Option<Uuid>,
    pub correlation_id: Option<Uuid>,
    /// Number of reactions between this event and the mutation that
    /// started its chain. Zero for events published by services.
    pub chain_depth: u32,
    pub payload: EventPayload,
}

/// Domain event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventPayload {
    // Block events
    BlockAdded {
        portfolio_id: Uuid,
        block_id: String,
        block_type: String,
    },
    BlockUpdated {
        portfolio_id: Uuid,
        block_id: String,
        block_type: String,
    },
    BlockRemoved {
        portfolio_id: Uuid,
        block_id: String,
        block_type: String,
    },
    BlocksReordered {
        portfolio_id: Uuid,
        block_count: usize,
        /// Whether any reordered block is of a verification-required type.
        touches_required: bool,
    },

    // Verification events
    VerificationChanged {
        portfolio_id: Uuid,
        block_id: String,
        action: VerificationAction,
        portfolio_status: PortfolioVerificationStatus,
    },

    // Portfolio events
    IlsLevelChanged {
        portfolio_id: Uuid,
        from: u8,
        to: u8,
    },

    // Evidence events
    EvidenceRecorded {
        student_id: Uuid,
        kind: EvidenceKind,
        reference_id: String,
    },

    // Rating events
    RatingRecalculated {
        portfolio_id: Uuid,
        rating: f64,
    },

    // Reactor events
    HandlerError {
        handler_name: String,
        event_sequence: u64,
        error: String,
    },
}

impl EventPayload {
    /// Variant name, used by payload-type filters.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::BlockAdded { .. } => "BlockAdded",
            Self::BlockUpdated { .. } => "BlockUpdated",
            Self::BlockRemoved { .. } => "BlockRemoved",
            Self::BlocksReordered { .. } => "BlocksReordered",
            Self::VerificationChanged { .. } => "VerificationChanged",
            Self::IlsLevelChanged { .. } => "IlsLevelChanged",
            Self::EvidenceRecorded { .. } => "EvidenceRecorded",
            Self::RatingRecalculated { .. } => "RatingRecalculated",
            Self::HandlerError { .. } => "HandlerError",
        }
    }

    fn classify(&self) -> (EventSeverity, EventCategory, Option<Uuid>) {
        match self {
            Self::BlockAdded { portfolio_id, .. }
            | Self::BlockUpdated { portfolio_id, .. }
            | Self::BlockRemoved { portfolio_id, .. } => (EventSeverity::Info, EventCategory::Block, Some(*portfolio_id)),
            Self::BlocksReordered { portfolio_id, .. } => {
                (EventSeverity::Debug, EventCategory::Block, Some(*portfolio_id))
            }
            Self::VerificationChanged { portfolio_id, .. } => {
                (EventSeverity::Info, EventCategory::Verification, Some(*portfolio_id))
            }
            Self::IlsLevelChanged { portfolio_id, .. } => {
                (EventSeverity::Info, EventCategory::Portfolio, Some(*portfolio_id))
            }
            Self::EvidenceRecorded { .. } => (EventSeverity::Info, EventCategory::Evidence, None),
            Self::RatingRecalculated { portfolio_id, .. } => {
                (EventSeverity::Debug, EventCategory::Rating, Some(*portfolio_id))
            }
            Self::HandlerError { .. } => (EventSeverity::Warning, EventCategory::Reactor, None),
        }
    }
}

impl DomainEvent {
    /// Wrap a payload in a fresh envelope. Sequence is assigned on publish.
    pub fn new(payload: EventPayload) -> Self {
        let (severity, category, portfolio_id) = payload.classify();
        Self {
            id: EventId::new(),
            sequence: SequenceNumber::zero(),
            timestamp: Utc::now(),
            severity,
            category,
            portfolio_id,
            correlation_id: None,
            chain_depth: 0,
            payload,
        }
    }

    /// Build a reaction to `cause`, inheriting its correlation one level deeper.
    pub fn caused_by(cause: &DomainEvent, payload: EventPayload) -> Self {
        let mut event = Self::new(payload);
        event.correlation_id = cause.correlation_id;
        event.chain_depth = cause.chain_depth.saturating_add(1);
        event
    }

    pub fn with_severity(mut self, severity: EventSeverity) -> Self {
        self.severity = severity;
        self
    }
}

impl From<EventPayload> for DomainEvent {
    fn from(payload: EventPayload) -> Self {
        Self::new(payload)
    }
}

/// Configuration for the EventBus.
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Channel capacity for the broadcast channel.
    pub channel_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self { channel_capacity: 256 }
    }
}

/// Central event bus for broadcasting events to multiple consumers.
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
    sequence: AtomicU64,
}

impl EventBus {
    /// Create a new EventBus with the given configuration.
    pub fn new(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    /// Publish an event, returning the sequence number it was given.
    ///
    /// An event without a correlation id starts a new chain keyed by its
    /// own id.
    pub async fn publish(&self, mut event: DomainEvent) -> SequenceNumber {
        let seq = SequenceNumber(self.sequence.fetch_add(1, Ordering::SeqCst));
        event.sequence = seq;
        if event.correlation_id.is_none() {
            event.correlation_id = Some(event.id.0);
        }

        tracing::debug!(
            sequence = %seq,
            category = %event.category,
            payload = event.payload.variant_name(),
            "publishing event"
        );

        // No subscribers is not an error.
        let _ = self.sender.send(event);
        seq
    }

    /// Publish a bare payload.
    pub async fn emit(&self, payload: EventPayload) -> SequenceNumber {
        self.publish(DomainEvent::new(payload)).await
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    /// Get the current sequence number.
    pub fn current_sequence(&self) -> SequenceNumber {
        SequenceNumber(self.sequence.load(Ordering::SeqCst))
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventBusConfig::default())
    }
}
