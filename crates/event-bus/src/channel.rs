use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::RwLock;
use strategy_sync_core::EventEmitter;
use tokio::task;
use tracing::{debug, warn};

use crate::envelope::BusEvent;
use crate::error::EventBusError;

/// Result alias for publishing events to the bus.
pub type EventPublishResult = Result<(), EventBusError>;

/// Publication mode controlling how to handle backpressure on bounded channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    /// Block until there is capacity.
    Blocking,
    /// Return immediately with an error if the channel is full.
    Try,
    /// Block until capacity is available or the timeout elapses.
    Timeout(Duration),
}

impl Default for PublishMode {
    fn default() -> Self {
        PublishMode::Try
    }
}

/// Sender wrapper that enforces publish semantics.
#[derive(Clone)]
pub struct EventSender<T: Send + 'static> {
    inner: Sender<T>,
}

impl<T: Send + 'static> EventSender<T> {
    fn new(inner: Sender<T>) -> Self {
        Self { inner }
    }

    /// Publishes an event according to the supplied mode.
    pub fn publish(&self, event: T, mode: PublishMode) -> EventPublishResult {
        match mode {
            PublishMode::Blocking => self
                .inner
                .send(event)
                .map_err(EventBusError::from_send_error),
            PublishMode::Try => self
                .inner
                .try_send(event)
                .map_err(EventBusError::from_try_send_error),
            PublishMode::Timeout(timeout) => self
                .inner
                .send_timeout(event, timeout)
                .map_err(|err| EventBusError::from_send_timeout_error(err, timeout)),
        }
    }

    /// Attempts to publish without blocking.
    pub fn try_publish(&self, event: T) -> EventPublishResult {
        self.publish(event, PublishMode::Try)
    }
}

impl<T: Send + 'static> fmt::Debug for EventSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSender").finish_non_exhaustive()
    }
}

/// Receiver wrapper with async-friendly helpers.
#[derive(Clone)]
pub struct EventReceiver<T: Send + 'static> {
    inner: Receiver<T>,
}

impl<T: Send + 'static> EventReceiver<T> {
    fn new(inner: Receiver<T>) -> Self {
        Self { inner }
    }

    /// Receives synchronously, blocking the current thread.
    pub fn recv(&self) -> Result<T, EventBusError> {
        self.inner.recv().map_err(EventBusError::from_recv_error)
    }

    /// Receives synchronously with timeout semantics.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, EventBusError> {
        self.inner
            .recv_timeout(timeout)
            .map_err(EventBusError::from_recv_timeout)
    }

    /// Asynchronously awaits the next event, delegating to a blocking task so
    /// it plays nicely with Tokio's scheduler.
    pub async fn recv_async(&self) -> Result<T, EventBusError> {
        let rx = self.inner.clone();
        task::spawn_blocking(move || rx.recv())
            .await
            .map_err(|err| EventBusError::Join(err.to_string()))?
            .map_err(EventBusError::from_recv_error)
    }

    /// Like [`recv_async`](Self::recv_async), but gives up after `timeout`
    /// and releases the blocking task when it does.
    pub async fn recv_timeout_async(&self, timeout: Duration) -> Result<T, EventBusError> {
        let rx = self.inner.clone();
        task::spawn_blocking(move || rx.recv_timeout(timeout))
            .await
            .map_err(|err| EventBusError::Join(err.to_string()))?
            .map_err(EventBusError::from_recv_timeout)
    }

    /// Attempts to receive without blocking.
    pub fn try_recv(&self) -> Result<T, EventBusError> {
        self.inner
            .try_recv()
            .map_err(EventBusError::from_try_recv_error)
    }

    /// Number of events waiting to be received.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<T: Send + 'static> fmt::Debug for EventReceiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventReceiver").finish_non_exhaustive()
    }
}

/// Builder configuring subscriber capacity and publish semantics.
#[derive(Debug, Clone)]
pub struct EventBusBuilder {
    subscriber_capacity: usize,
    publish_mode: PublishMode,
}

impl Default for EventBusBuilder {
    fn default() -> Self {
        Self {
            subscriber_capacity: 256,
            publish_mode: PublishMode::Try,
        }
    }
}

impl EventBusBuilder {
    /// Adjusts the bounded capacity of every subscriber channel.
    pub fn subscriber_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_capacity = capacity.max(1);
        self
    }

    /// Sets how emission behaves when a subscriber channel is full.
    pub fn publish_mode(mut self, mode: PublishMode) -> Self {
        self.publish_mode = mode;
        self
    }

    pub fn build(self) -> EventBus {
        EventBus {
            inner: Arc::new(BusInner {
                topics: RwLock::new(HashMap::new()),
                wildcard: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(0),
                subscriber_capacity: self.subscriber_capacity,
                publish_mode: self.publish_mode,
            }),
        }
    }
}

struct Subscriber {
    id: u64,
    sender: EventSender<BusEvent>,
}

struct BusInner {
    topics: RwLock<HashMap<String, Vec<Subscriber>>>,
    wildcard: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
    subscriber_capacity: usize,
    publish_mode: PublishMode,
}

/// Broadcast bus keyed by event name.
///
/// Every subscriber owns a bounded channel. Emission is fire-and-forget: a full
/// subscriber misses the event, a dropped subscriber is pruned.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        EventBusBuilder::default().build()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_capacity", &self.inner.subscriber_capacity)
            .field("publish_mode", &self.inner.publish_mode)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder::default()
    }

    fn new_subscriber(&self) -> (Subscriber, EventReceiver<BusEvent>) {
        let (tx, rx) = bounded(self.inner.subscriber_capacity);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        (
            Subscriber {
                id,
                sender: EventSender::new(tx),
            },
            EventReceiver::new(rx),
        )
    }

    /// Subscribes to every event emitted under `name`.
    pub fn subscribe(&self, name: &str) -> EventReceiver<BusEvent> {
        let (subscriber, receiver) = self.new_subscriber();
        self.inner
            .topics
            .write()
            .entry(name.to_string())
            .or_default()
            .push(subscriber);
        receiver
    }

    /// Subscribes to every event regardless of name.
    pub fn subscribe_all(&self) -> EventReceiver<BusEvent> {
        let (subscriber, receiver) = self.new_subscriber();
        self.inner.wildcard.write().push(subscriber);
        receiver
    }

    /// Number of live subscribers that would receive an event named `name`.
    pub fn subscriber_count(&self, name: &str) -> usize {
        let named = self
            .inner
            .topics
            .read()
            .get(name)
            .map(Vec::len)
            .unwrap_or(0);
        named + self.inner.wildcard.read().len()
    }

    /// Broadcasts an event and returns how many subscribers accepted it.
    pub fn emit(&self, name: &str, payload: serde_json::Value) -> usize {
        let event = BusEvent::new(name, payload);
        let mode = self.inner.publish_mode;

        let targets: Vec<(u64, EventSender<BusEvent>)> = {
            let topics = self.inner.topics.read();
            let wildcard = self.inner.wildcard.read();
            topics
                .get(name)
                .into_iter()
                .flatten()
                .chain(wildcard.iter())
                .map(|s| (s.id, s.sender.clone()))
                .collect()
        };

        let mut delivered = 0;
        let mut disconnected = Vec::new();
        for (id, sender) in targets {
            match sender.publish(event.clone(), mode) {
                Ok(()) => delivered += 1,
                Err(err) if err.is_disconnected() => disconnected.push(id),
                Err(err) => {
                    metrics::increment_counter!("event_bus_events_dropped_total");
                    warn!(event = %name, subscriber = id, error = %err, "Dropped event for subscriber");
                }
            }
        }

        if !disconnected.is_empty() {
            self.prune(name, &disconnected);
        }

        metrics::increment_counter!("event_bus_events_emitted_total");
        debug!(event = %name, delivered, "Event emitted");
        delivered
    }

    fn prune(&self, name: &str, ids: &[u64]) {
        let mut topics = self.inner.topics.write();
        if let Some(subscribers) = topics.get_mut(name) {
            subscribers.retain(|s| !ids.contains(&s.id));
            if subscribers.is_empty() {
                topics.remove(name);
            }
        }
        drop(topics);
        self.inner.wildcard.write().retain(|s| !ids.contains(&s.id));
        debug!(event = %name, pruned = ids.len(), "Pruned disconnected subscribers");
    }
}

impl EventEmitter for EventBus {
    fn emit_event(&self, name: &str, payload: serde_json::Value) {
        self.emit(name, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_named_subscription_only_sees_its_topic() {
        let bus = EventBus::default();
        let aave = bus.subscribe("protocol::aaveV2::refresh");
        let maker = bus.subscribe("protocol::maker::refresh");

        assert_eq!(bus.emit("protocol::aaveV2::refresh", json!({})), 1);

        let event = aave.try_recv().unwrap();
        assert_eq!(event.name, "protocol::aaveV2::refresh");
        assert!(event.is_empty_payload());
        assert_eq!(maker.try_recv().unwrap_err(), EventBusError::Empty);
    }

    #[test]
    fn test_wildcard_subscription_sees_everything() {
        let bus = EventBus::default();
        let all = bus.subscribe_all();

        bus.emit("a", json!(1));
        bus.emit("b", json!(2));

        assert_eq!(all.try_recv().unwrap().name, "a");
        assert_eq!(all.try_recv().unwrap().name, "b");
    }

    #[test]
    fn test_full_subscriber_drops_event_without_blocking() {
        let bus = EventBus::builder().subscriber_capacity(1).build();
        let rx = bus.subscribe("tick");

        assert_eq!(bus.emit("tick", json!(1)), 1);
        assert_eq!(bus.emit("tick", json!(2)), 0);
        assert_eq!(rx.len(), 1);
        assert_eq!(rx.try_recv().unwrap().payload, json!(1));
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let bus = EventBus::default();
        let kept = bus.subscribe("tick");
        let dropped = bus.subscribe("tick");
        drop(dropped);

        assert_eq!(bus.subscriber_count("tick"), 2);
        assert_eq!(bus.emit("tick", json!(null)), 1);
        assert_eq!(bus.subscriber_count("tick"), 1);
        assert!(kept.try_recv().is_ok());
    }

    #[test]
    fn test_emitter_trait_object() {
        let bus = EventBus::default();
        let rx = bus.subscribe("protocol::liquity::refresh");
        let emitter: Arc<dyn EventEmitter> = Arc::new(bus.clone());

        emitter.emit_event("protocol::liquity::refresh", json!({}));
        assert!(rx.try_recv().is_ok());
    }
}
