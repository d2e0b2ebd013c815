//! Event bus routing helpers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::broadcast::{self, Receiver, Sender, error::RecvError};

use crate::payloads::{DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId};
use crate::topics::EventKind;

type Handler = Arc<dyn Fn(&EventEnvelope) + Send + Sync>;

struct Listener {
    id: u64,
    kind: EventKind,
    once: bool,
    handler: Handler,
}

/// Cancellable handle returned by [`EventBus::on`] and [`EventBus::once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: u64,
    kind: EventKind,
}

impl Subscription {
    /// Event kind this listener is registered for.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.kind
    }
}

/// Shared event bus built on top of `tokio::broadcast`.
///
/// Publishing never blocks: when the broadcast channel overflows, lagging
/// stream subscribers skip the oldest envelopes.
#[derive(Clone)]
pub struct EventBus {
    sender: Sender<EventEnvelope>,
    replay: Arc<Mutex<VecDeque<EventEnvelope>>>,
    replay_capacity: usize,
    next_id: Arc<AtomicU64>,
    listeners: Arc<Mutex<Vec<Listener>>>,
    next_listener: Arc<AtomicU64>,
}

impl EventBus {
    /// Construct a bus with a custom replay capacity.
    ///
    /// # Panics
    ///
    /// Panics if `replay_capacity` is zero.
    #[must_use]
    pub fn with_capacity(replay_capacity: usize) -> Self {
        assert!(replay_capacity > 0, "event bus capacity must be positive");
        let (sender, _) = broadcast::channel(replay_capacity);
        Self {
            sender,
            replay: Arc::new(Mutex::new(VecDeque::with_capacity(replay_capacity))),
            replay_capacity,
            next_id: Arc::new(AtomicU64::new(1)),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Construct a bus with the default replay capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    /// Subscribe to the bus, replaying buffered events newer than `since_id`.
    #[must_use]
    pub fn subscribe(&self, since_id: Option<EventId>) -> EventStream {
        let receiver = self.sender.subscribe();
        let backlog: VecDeque<EventEnvelope> = since_id
            .map(|since| self.backlog_since(since).into())
            .unwrap_or_default();
        let replayed_through = backlog.back().map(|env| env.id);
        EventStream {
            backlog,
            receiver,
            replayed_through,
        }
    }

    /// Register a listener invoked for every event of `kind`.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&EventEnvelope) + Send + Sync + 'static,
    {
        self.register(kind, false, Arc::new(handler))
    }

    /// Register a listener invoked for the next event of `kind` only.
    pub fn once<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&EventEnvelope) + Send + Sync + 'static,
    {
        self.register(kind, true, Arc::new(handler))
    }

    /// Cancel a listener. Returns `false` when it was already removed
    /// (including `once` listeners that have fired).
    pub fn off(&self, subscription: Subscription) -> bool {
        let mut listeners = self.lock_listeners();
        let before = listeners.len();
        listeners.retain(|listener| listener.id != subscription.id);
        listeners.len() != before
    }

    /// Number of registered listeners for `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.lock_listeners()
            .iter()
            .filter(|listener| listener.kind == kind)
            .count()
    }

    /// Publish an event to listeners and stream subscribers, returning the
    /// assigned id.
    pub fn publish(&self, event: Event) -> EventId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = EventEnvelope {
            id,
            timestamp: Utc::now(),
            event,
        };

        {
            let mut replay = self.lock_replay();
            if replay.len() == self.replay_capacity {
                let _ = replay.pop_front();
            }
            replay.push_back(envelope.clone());
        }

        let kind = envelope.event.kind();
        let handlers = {
            let mut listeners = self.lock_listeners();
            let handlers = listeners
                .iter()
                .filter(|listener| listener.kind == kind)
                .map(|listener| Arc::clone(&listener.handler))
                .collect::<Vec<_>>();
            listeners.retain(|listener| !(listener.once && listener.kind == kind));
            handlers
        };
        for handler in handlers {
            handler(&envelope);
        }

        let _ = self.sender.send(envelope);
        id
    }

    /// Last event id observed in the replay buffer.
    #[must_use]
    pub fn last_event_id(&self) -> Option<EventId> {
        self.lock_replay().back().map(|env| env.id)
    }

    /// Collect a backlog of events emitted after the specified id.
    #[must_use]
    pub fn backlog_since(&self, id: EventId) -> Vec<EventEnvelope> {
        let replay = self.lock_replay();
        replay.iter().filter(|env| env.id > id).cloned().collect()
    }

    fn register(&self, kind: EventKind, once: bool, handler: Handler) -> Subscription {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.lock_listeners().push(Listener {
            id,
            kind,
            once,
            handler,
        });
        Subscription { id, kind }
    }

    fn lock_replay(&self) -> MutexGuard<'_, VecDeque<EventEnvelope>> {
        self.replay.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Vec<Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream wrapper that yields events from the replay backlog first and then
/// from the live broadcast channel.
pub struct EventStream {
    backlog: VecDeque<EventEnvelope>,
    receiver: Receiver<EventEnvelope>,
    replayed_through: Option<EventId>,
}

impl EventStream {
    /// Receive the next event. Returns `None` once every bus handle is gone.
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        if let Some(envelope) = self.backlog.pop_front() {
            return Some(envelope);
        }

        loop {
            match self.receiver.recv().await {
                Ok(envelope) => {
                    if self
                        .replayed_through
                        .is_some_and(|through| envelope.id <= through)
                    {
                        continue;
                    }
                    return Some(envelope);
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Receive the next event of `kind`, skipping everything else.
    pub async fn next_of(&mut self, kind: EventKind) -> Option<EventEnvelope> {
        while let Some(envelope) = self.next().await {
            if envelope.event.kind() == kind {
                return Some(envelope);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::{INFO_HASH_LEN, InfoHash, TransferRates};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::time::timeout;

    fn removed(byte: u8) -> Event {
        Event::TransferRemoved {
            info_hash: InfoHash::new([byte; INFO_HASH_LEN]),
        }
    }

    fn rates() -> Event {
        Event::TransfersStatistics {
            stats: TransferRates::default(),
        }
    }

    #[tokio::test]
    async fn publish_and_replay_from_id() {
        let bus = EventBus::with_capacity(4);
        let first = bus.publish(removed(1));
        let second = bus.publish(removed(2));

        assert_eq!(bus.last_event_id(), Some(second));
        let backlog = bus.backlog_since(first);
        assert_eq!(backlog.len(), 1);
        assert_eq!(backlog[0].id, second);

        let mut stream = bus.subscribe(Some(first));
        let replayed = stream.next().await.expect("replayed event");
        assert_eq!(replayed.id, second);
    }

    #[tokio::test]
    async fn replay_ring_drops_oldest() {
        let bus = EventBus::with_capacity(2);
        for byte in 0..4 {
            let _ = bus.publish(removed(byte));
        }
        let ids = bus
            .backlog_since(0)
            .into_iter()
            .map(|env| env.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![3, 4]);
    }

    #[tokio::test]
    async fn stream_filters_by_kind() {
        let bus = EventBus::new();
        let mut stream = bus.subscribe(None);
        let _ = bus.publish(rates());
        let id = bus.publish(removed(9));

        let envelope = timeout(Duration::from_millis(100), stream.next_of(EventKind::TransferRemoved))
            .await
            .expect("stream timed out")
            .expect("stream item");
        assert_eq!(envelope.id, id);
    }

    #[test]
    fn on_listeners_fire_for_matching_kind_until_removed() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let subscription = bus.on(EventKind::TransferRemoved, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let _ = bus.publish(removed(1));
        let _ = bus.publish(rates());
        let _ = bus.publish(removed(2));
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        assert!(bus.off(subscription));
        assert!(!bus.off(subscription));
        let _ = bus.publish(removed(3));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn once_listeners_fire_a_single_time() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let subscription = bus.once(EventKind::TransferRemoved, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(bus.listener_count(EventKind::TransferRemoved), 1);

        let _ = bus.publish(rates());
        assert_eq!(bus.listener_count(EventKind::TransferRemoved), 1);

        let _ = bus.publish(removed(1));
        let _ = bus.publish(removed(2));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(EventKind::TransferRemoved), 0);
        assert!(!bus.off(subscription));
    }

    #[test]
    fn listeners_may_publish_reentrantly() {
        let bus = EventBus::new();
        let inner = bus.clone();
        let _ = bus.once(EventKind::TransferRemoved, move |_| {
            let _ = inner.publish(rates());
        });
        let _ = bus.publish(removed(1));
        assert_eq!(bus.last_event_id(), Some(2));
    }
}
