//! Reactive event handler system.
//!
//! The EventReactor subscribes to the EventBus and dispatches events to
//! matching handlers. Handlers can produce reactions (new events) that
//! are fed back into the EventBus, enabling reactive event chains.
//!
//! Runaway chains are cut off by a maximum chain depth; handler failures
//! and timeouts become `HandlerError` events and never reach the publisher.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::event_bus::{DomainEvent, EventBus, EventCategory, EventPayload, EventSeverity};

/// Unique identifier for a registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub Uuid);

impl HandlerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HandlerId {
    fn default() -> Self {
        Self::new()
    }
}

/// Filter that determines which events a handler matches.
#[derive(Default)]
pub struct EventFilter {
    /// Match events in these categories (empty = match all).
    pub categories: Vec<EventCategory>,
    /// Match events for a specific portfolio.
    pub portfolio_id: Option<Uuid>,
    /// Match events whose payload variant name is in this list (empty = match all).
    pub payload_types: Vec<String>,
    /// Custom predicate for advanced filtering.
    pub custom_predicate: Option<Arc<dyn Fn(&DomainEvent) -> bool + Send + Sync>>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn categories(mut self, cats: Vec<EventCategory>) -> Self {
        self.categories = cats;
        self
    }

    pub fn payload_types(mut self, types: Vec<String>) -> Self {
        self.payload_types = types;
        self
    }

    pub fn predicate(mut self, pred: impl Fn(&DomainEvent) -> bool + Send + Sync + 'static) -> Self {
        self.custom_predicate = Some(Arc::new(pred));
        self
    }

    /// Check if an event matches this filter.
    pub fn matches(&self, event: &DomainEvent) -> bool {
        if !self.categories.is_empty() && !self.categories.contains(&event.category) {
            return false;
        }

        if let Some(pid) = self.portfolio_id {
            if event.portfolio_id != Some(pid) {
                return false;
            }
        }

        if !self.payload_types.is_empty() {
            let variant = event.payload.variant_name();
            if !self.payload_types.iter().any(|t| t == variant) {
                return false;
            }
        }

        if let Some(ref pred) = self.custom_predicate {
            if !pred(event) {
                return false;
            }
        }

        true
    }
}

/// Priority ordering for handlers (lower value = executes first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HandlerPriority(pub u32);

impl HandlerPriority {
    pub const SYSTEM: Self = Self(0);
    pub const HIGH: Self = Self(100);
    pub const NORMAL: Self = Self(500);
    pub const LOW: Self = Self(1000);
}

impl Default for HandlerPriority {
    fn default() -> Self {
        Self::NORMAL
    }
}

/// What a handler can produce as a reaction.
pub enum Reaction {
    /// Emit new events into the EventBus.
    EmitEvents(Vec<DomainEvent>),
    /// No reaction.
    None,
}

/// Metadata describing a handler.
pub struct HandlerMetadata {
    pub id: HandlerId,
    pub name: String,
    pub filter: EventFilter,
    pub priority: HandlerPriority,
}

/// Context passed to handlers during event processing.
pub struct HandlerContext {
    /// Current chain depth for this event cascade.
    pub chain_depth: u32,
    /// Correlation ID for tracking related events.
    pub correlation_id: Option<Uuid>,
}

/// Trait for reactive event handlers.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Return metadata describing this handler.
    fn metadata(&self) -> HandlerMetadata;

    /// Handle an event and optionally produce a reaction.
    async fn handle(&self, event: &DomainEvent, ctx: &HandlerContext) -> Result<Reaction, String>;
}

/// Configuration for the EventReactor.
#[derive(Debug, Clone)]
pub struct ReactorConfig {
    /// Maximum depth of event chain cascades.
    pub max_chain_depth: u32,
    /// Per-handler timeout in milliseconds.
    pub handler_timeout_ms: u64,
    /// How often the loop checks whether it should stop.
    pub poll_interval_ms: u64,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: 4,
            handler_timeout_ms: 5000,
            poll_interval_ms: 100,
        }
    }
}

/// Shared dispatch state, cloned into the background loop.
#[derive(Clone)]
struct Dispatcher {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
    config: ReactorConfig,
    events_processed: Arc<AtomicU64>,
    handler_failures: Arc<AtomicU64>,
}

impl Dispatcher {
    /// Run every matching handler on `event` and collect their reactions.
    async fn dispatch(&self, event: &DomainEvent) -> Vec<DomainEvent> {
        let suppress_reactions = event.chain_depth >= self.config.max_chain_depth;
        if suppress_reactions {
            tracing::warn!(
                chain_depth = event.chain_depth,
                max_chain_depth = self.config.max_chain_depth,
                correlation_id = ?event.correlation_id,
                "chain depth limit reached, suppressing reactions"
            );
        }

        let handlers = self.handlers.read().await;
        let mut reactions: Vec<DomainEvent> = Vec::new();

        for handler in handlers.iter() {
            let meta = handler.metadata();
            if !meta.filter.matches(event) {
                continue;
            }

            let ctx = HandlerContext {
                chain_depth: event.chain_depth,
                correlation_id: event.correlation_id,
            };

            let result = tokio::time::timeout(
                Duration::from_millis(self.config.handler_timeout_ms),
                handler.handle(event, &ctx),
            )
            .await;

            let failure = match result {
                Ok(Ok(Reaction::EmitEvents(events))) => {
                    if !suppress_reactions {
                        reactions.extend(events);
                    }
                    None
                }
                Ok(Ok(Reaction::None)) => None,
                Ok(Err(e)) => Some(e),
                Err(_) => Some(format!("handler timed out after {}ms", self.config.handler_timeout_ms)),
            };

            if let Some(error) = failure {
                self.handler_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    handler = %meta.name,
                    sequence = %event.sequence,
                    error = %error,
                    "event handler failed"
                );
                // Failures about failures would loop forever.
                if !matches!(event.payload, EventPayload::HandlerError { .. }) {
                    reactions.push(
                        DomainEvent::caused_by(
                            event,
                            EventPayload::HandlerError {
                                handler_name: meta.name.clone(),
                                event_sequence: event.sequence.0,
                                error,
                            },
                        )
                        .with_severity(EventSeverity::Warning),
                    );
                }
            }
        }

        self.events_processed.fetch_add(1, Ordering::Relaxed);
        reactions
    }
}

/// The reactive event dispatcher.
///
/// Subscribes to EventBus, dispatches matching events to registered handlers,
/// and processes reactions (cascaded events).
pub struct EventReactor {
    dispatcher: Dispatcher,
    event_bus: Arc<EventBus>,
    running: Arc<AtomicBool>,
}

impl EventReactor {
    /// Create a new EventReactor.
    pub fn new(event_bus: Arc<EventBus>, config: ReactorConfig) -> Self {
        Self {
            dispatcher: Dispatcher {
                handlers: Arc::new(RwLock::new(Vec::new())),
                config,
                events_processed: Arc::new(AtomicU64::new(0)),
                handler_failures: Arc::new(AtomicU64::new(0)),
            },
            event_bus,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Register a handler.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.dispatcher.handlers.write().await;
        handlers.push(handler);
        // Sort by priority (lower value first)
        handlers.sort_by_key(|h| h.metadata().priority);
    }

    /// Process one event synchronously and return the reactions it produced,
    /// without publishing them.
    pub async fn dispatch(&self, event: &DomainEvent) -> Vec<DomainEvent> {
        self.dispatcher.dispatch(event).await
    }

    /// Start the reactor event loop.
    ///
    /// The subscription is taken before this returns, so every event
    /// published afterwards is seen by the loop.
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        let receiver = self.event_bus.subscribe();
        let dispatcher = self.dispatcher.clone();
        let event_bus = self.event_bus.clone();
        let running = self.running.clone();

        tokio::spawn(run_loop(receiver, dispatcher, event_bus, running))
    }

    /// Stop the loop and wait for it to drain every queued event, including
    /// reactions produced while draining.
    pub async fn shutdown(&self, handle: tokio::task::JoinHandle<()>) {
        self.running.store(false, Ordering::SeqCst);
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "event reactor task ended abnormally");
        }
    }

    /// Get the number of events processed.
    pub fn events_processed(&self) -> u64 {
        self.dispatcher.events_processed.load(Ordering::Relaxed)
    }

    /// Get the number of handler failures and timeouts.
    pub fn handler_failures(&self) -> u64 {
        self.dispatcher.handler_failures.load(Ordering::Relaxed)
    }

    /// Check if the reactor is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the names of all registered handlers (snapshot).
    pub async fn handler_names(&self) -> Vec<String> {
        let handlers = self.dispatcher.handlers.read().await;
        handlers.iter().map(|h| h.metadata().name).collect()
    }
}

async fn run_loop(
    mut receiver: broadcast::Receiver<DomainEvent>,
    dispatcher: Dispatcher,
    event_bus: Arc<EventBus>,
    running: Arc<AtomicBool>,
) {
    let poll = Duration::from_millis(dispatcher.config.poll_interval_ms.max(1));

    while running.load(Ordering::SeqCst) {
        let event = match tokio::time::timeout(poll, receiver.recv()).await {
            Ok(Ok(event)) => event,
            Ok(Err(RecvError::Lagged(n))) => {
                tracing::warn!(missed = n, "event reactor lagged behind the bus");
                continue;
            }
            Ok(Err(RecvError::Closed)) => {
                tracing::info!("event bus closed, stopping reactor");
                return;
            }
            // Timeout: loop to check the running flag.
            Err(_) => continue,
        };
        for reaction in dispatcher.dispatch(&event).await {
            event_bus.publish(reaction).await;
        }
    }

    // Drain: reactions published here land on the same receiver.
    let mut drained = 0usize;
    loop {
        match receiver.try_recv() {
            Ok(event) => {
                drained += 1;
                for reaction in dispatcher.dispatch(&event).await {
                    event_bus.publish(reaction).await;
                }
            }
            Err(TryRecvError::Lagged(n)) => {
                tracing::warn!(missed = n, "event reactor lagged while draining");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    tracing::debug!(drained, "event reactor stopped");
}
