use crate::error::{BridgeError, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// A code entered the view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarcodeFoundEvent {
    pub content: String,
    pub format: String,
    pub timestamp: DateTime<Utc>,
}

/// Events delivered to the host application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScanEvent {
    /// A new code is in view
    BarcodeFound(BarcodeFoundEvent),
    /// The announced code left the view
    BarcodeLost,
    /// The decoder engine reported a non-fatal error
    DecodeError { detail: String },
}

impl ScanEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            ScanEvent::BarcodeFound(found) => {
                format!("Barcode found: {} ({})", found.content, found.format)
            }
            ScanEvent::BarcodeLost => "Barcode lost".to_string(),
            ScanEvent::DecodeError { detail } => format!("Decode error: {}", detail),
        }
    }

    /// Wire name of the event
    pub fn event_type(&self) -> &'static str {
        match self {
            ScanEvent::BarcodeFound(_) => "BarcodeFound",
            ScanEvent::BarcodeLost => "BarcodeLost",
            ScanEvent::DecodeError { .. } => "DecodeError",
        }
    }
}

/// Callback interface for scan events.
///
/// Implement the `on_*` methods, or pass a closure taking `&ScanEvent`.
/// Handlers run synchronously on the decoding task, in attempt order.
pub trait ScanEventHandler: Send + Sync {
    fn handle_event(&self, event: &ScanEvent) {
        match event {
            ScanEvent::BarcodeFound(found) => self.on_barcode_found(found),
            ScanEvent::BarcodeLost => self.on_barcode_lost(),
            ScanEvent::DecodeError { detail } => self.on_decode_error(detail),
        }
    }

    fn on_barcode_found(&self, _event: &BarcodeFoundEvent) {}

    fn on_barcode_lost(&self) {}

    fn on_decode_error(&self, _detail: &str) {}
}

impl<F> ScanEventHandler for F
where
    F: Fn(&ScanEvent) + Send + Sync,
{
    fn handle_event(&self, event: &ScanEvent) {
        self(event)
    }
}

/// Identity of a registered handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Async event bus using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<ScanEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all receivers, returning how many got it.
    /// Publishing with no receivers is not an error.
    pub fn publish(&self, event: ScanEvent) -> usize {
        if self.debug_logging {
            debug!("Publishing event: {}", event.description());
        }

        match self.sender.send(event) {
            Ok(count) => count,
            Err(_) => {
                trace!("No bus receivers for event");
                0
            }
        }
    }

    /// Get the number of active receivers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            debug_logging: self.debug_logging,
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    All,
    EventTypes(Vec<&'static str>),
    Custom(fn(&ScanEvent) -> bool),
}

impl EventFilter {
    pub fn matches(&self, event: &ScanEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Named bus receiver applying a filter
pub struct EventReceiver {
    receiver: broadcast::Receiver<ScanEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(receiver: broadcast::Receiver<ScanEvent>, filter: EventFilter, name: String) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next event passing the filter
    pub async fn recv(&mut self) -> Result<ScanEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(BridgeError::EventsLagged { skipped: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(BridgeError::component(
                        "event_bus".to_string(),
                        "Event bus closed".to_string(),
                    ));
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<ScanEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(BridgeError::EventsLagged { skipped: n });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(BridgeError::component(
                        "event_bus".to_string(),
                        "Event bus closed".to_string(),
                    ));
                }
            }
        }
    }
}

/// Fans events out to registered handlers and the broadcast bus.
///
/// Owned by one scanner; handlers live as long as the scanner or until
/// unsubscribed.
pub struct EventDispatcher {
    handlers: RwLock<BTreeMap<SubscriptionId, Arc<dyn ScanEventHandler>>>,
    bus: EventBus,
}

impl EventDispatcher {
    pub fn new(bus: EventBus) -> Self {
        Self {
            handlers: RwLock::new(BTreeMap::new()),
            bus,
        }
    }

    pub fn subscribe<H>(&self, handler: H) -> SubscriptionId
    where
        H: ScanEventHandler + 'static,
    {
        self.subscribe_arc(Arc::new(handler))
    }

    pub fn subscribe_arc(&self, handler: Arc<dyn ScanEventHandler>) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.handlers.write().insert(id, handler);
        info!("Registered scan event handler {}", id);
        id
    }

    /// Remove a handler; returns false if the id was unknown
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.handlers.write().remove(&id).is_some();
        if removed {
            info!("Removed scan event handler {}", id);
        } else {
            debug!("Unsubscribe for unknown handler {}", id);
        }
        removed
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Deliver an event to every handler, then to the bus
    pub fn dispatch(&self, event: ScanEvent) {
        // Snapshot so handlers may (un)subscribe without deadlocking
        let handlers: Vec<Arc<dyn ScanEventHandler>> =
            self.handlers.read().values().cloned().collect();

        match &event {
            ScanEvent::BarcodeFound(found) => {
                info!("Barcode found: {} ({})", found.content, found.format)
            }
            ScanEvent::BarcodeLost => info!("Barcode lost"),
            ScanEvent::DecodeError { detail } => warn!("Decode error: {}", detail),
        }

        for handler in &handlers {
            handler.handle_event(&event);
        }
        self.bus.publish(event);
    }
}
