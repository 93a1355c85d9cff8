use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;

use crate::event::Event;

/// Optional `(aggregate_types, event_types)` filter a subscriber registers
/// with. `None` on either side matches everything.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionFilter {
    pub aggregate_types: Option<Vec<String>>,
    pub event_types: Option<Vec<String>>,
}

impl SubscriptionFilter {
    fn matches(&self, event: &Event) -> bool {
        let aggregate_ok = self
            .aggregate_types
            .as_ref()
            .map_or(true, |types| types.iter().any(|t| t == &event.aggregate_type));
        let event_ok = self
            .event_types
            .as_ref()
            .map_or(true, |types| types.iter().any(|t| t == &event.event_type));
        aggregate_ok && event_ok
    }
}

struct Subscriber {
    id: u64,
    filter: SubscriptionFilter,
    sender: mpsc::UnboundedSender<Arc<Vec<Event>>>,
}

/// A registered subscriber's receiving half. Dropping it deregisters nothing
/// by itself - the bus notices a closed channel lazily, on the next publish -
/// but `Subscription::unsubscribe` removes it immediately.
pub struct Subscription {
    id: u64,
    bus: Arc<SubscriptionBusInner>,
    pub receiver: mpsc::UnboundedReceiver<Arc<Vec<Event>>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.bus.remove(self.id);
    }
}

struct SubscriptionBusInner {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl SubscriptionBusInner {
    fn remove(&self, id: u64) {
        let mut subscribers = self.subscribers.write().expect("subscription bus lock poisoned");
        subscribers.retain(|subscriber| subscriber.id != id);
    }
}

/// Process-local, instance-scoped fan-out of committed events to registered
/// subscribers. One bus per [`crate::EventStore`] - never a process-wide
/// singleton, so tests requiring true isolation just construct a fresh store.
///
/// Delivery happens after commit and is best-effort: a bus failure (a full or
/// closed channel) never affects the caller's `Push*` result, and a slow
/// subscriber never blocks the writer because each subscriber has its own
/// unbounded channel and notification only enqueues onto it.
#[derive(Clone)]
pub struct SubscriptionBus {
    inner: Arc<SubscriptionBusInner>,
    enabled: bool,
}

impl SubscriptionBus {
    pub fn new(enabled: bool) -> Self {
        Self {
            inner: Arc::new(SubscriptionBusInner {
                subscribers: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
            enabled,
        }
    }

    /// Registers a new subscriber. When subscriptions are disabled by
    /// configuration the returned subscription's receiver simply never yields.
    pub fn subscribe(&self, filter: SubscriptionFilter) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();

        if self.enabled {
            let mut subscribers = self.inner.subscribers.write().expect("subscription bus lock poisoned");
            subscribers.push(Subscriber { id, filter, sender });
        }

        Subscription {
            id,
            bus: Arc::clone(&self.inner),
            receiver,
        }
    }

    /// Delivers a just-committed batch to every matching subscriber. Iterates
    /// a snapshot taken under a short read-lock critical section, so
    /// registration/deregistration never blocks on a slow consumer and a slow
    /// consumer never blocks a fast one.
    pub fn publish(&self, events: Arc<Vec<Event>>) {
        if !self.enabled || events.is_empty() {
            return;
        }

        let subscribers = self.inner.subscribers.read().expect("subscription bus lock poisoned");

        for subscriber in subscribers.iter() {
            let matching: Vec<Event> = events.iter().filter(|event| subscriber.filter.matches(event)).cloned().collect();

            if matching.is_empty() {
                continue;
            }

            // A closed receiver means a dropped or panicked subscriber; never
            // propagate that failure to the writer.
            let _ = subscriber.sender.send(Arc::new(matching));
        }
    }

    /// Shuts down the bus: every subscriber's channel is closed so its
    /// receiver loop exits with `None`.
    pub fn close_all(&self) {
        let mut subscribers = self.inner.subscribers.write().expect("subscription bus lock poisoned");
        subscribers.clear();
    }
}
