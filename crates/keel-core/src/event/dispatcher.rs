use std::any::TypeId;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::event::error::EventSystemError;
use crate::event::{AsyncEventHandler, BoxedEvent, Event, EventId, EventResult};
use crate::kernel::error::Result;

/// Boxed future a handler callback returns
pub type BoxFuture<'a> = Pin<Box<dyn Future<Output = EventResult> + Send + 'a>>;

/// Callback subscribed by event name
pub type NamedHandlerFn = Box<dyn Fn(&dyn Event) -> BoxFuture<'_> + Send + Sync>;

/// Callback subscribed by concrete event type
pub type TypedHandlerFn<E> = Box<dyn Fn(&E) -> BoxFuture<'_> + Send + Sync>;

type Subscriptions = Vec<(EventId, Box<dyn AsyncEventHandler>)>;

fn subscription_count<K>(table: &HashMap<K, Subscriptions>) -> usize {
    table.values().map(Vec::len).sum()
}

struct ByName(NamedHandlerFn);

#[async_trait]
impl AsyncEventHandler for ByName {
    async fn handle(&self, event: &dyn Event) -> EventResult {
        (self.0)(event).await
    }
}

struct ByType<E: Event>(TypedHandlerFn<E>);

#[async_trait]
impl<E: Event> AsyncEventHandler for ByType<E> {
    async fn handle(&self, event: &dyn Event) -> EventResult {
        let Some(event) = event.as_any().downcast_ref::<E>() else {
            return EventResult::Continue;
        };
        (self.0)(event).await
    }
}

/// Subscriptions by event name and by concrete event type.
///
/// Ids are unique across both tables so one call unsubscribes either kind.
#[derive(Default)]
pub struct EventDispatcher {
    by_name: HashMap<&'static str, Subscriptions>,
    by_type: HashMap<TypeId, Subscriptions>,
    last_id: EventId,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> EventId {
        self.last_id += 1;
        self.last_id
    }

    pub fn register_handler(&mut self, event_name: &'static str, handler: NamedHandlerFn) -> EventId {
        let id = self.allocate_id();
        self.by_name.entry(event_name).or_default().push((id, Box::new(ByName(handler))));
        id
    }

    pub fn register_type_handler<E: Event>(&mut self, handler: TypedHandlerFn<E>) -> EventId {
        let id = self.allocate_id();
        self.by_type
            .entry(TypeId::of::<E>())
            .or_default()
            .push((id, Box::new(ByType(handler))));
        id
    }

    /// Returns whether a handler with `id` was subscribed
    pub fn unregister_handler(&mut self, id: EventId) -> bool {
        let mut removed = false;
        for subscriptions in self.by_name.values_mut().chain(self.by_type.values_mut()) {
            if let Some(pos) = subscriptions.iter().position(|(sid, _)| *sid == id) {
                subscriptions.remove(pos);
                removed = true;
            }
        }
        removed
    }

    /// Run the handlers for `event`: name subscribers first, then type
    /// subscribers, each in registration order. `Stop` ends delivery.
    pub async fn deliver(&self, event: &dyn Event) -> EventResult {
        let named = self.by_name.get(event.name()).into_iter().flatten();
        let typed = self.by_type.get(&event.as_any().type_id()).into_iter().flatten();
        for (_, handler) in named.chain(typed) {
            if handler.handle(event).await == EventResult::Stop {
                return EventResult::Stop;
            }
        }
        EventResult::Continue
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("by_name", &subscription_count(&self.by_name))
            .field("by_type", &subscription_count(&self.by_type))
            .finish_non_exhaustive()
    }
}

/// Cloneable handle to the subscriptions plus the pending-event queue.
///
/// [`post`](Self::post) is synchronous so it can be called from the object
/// pool and from plugin lifecycle callbacks; handlers only run when the owner
/// of the event loop calls [`process_queue`](Self::process_queue).
#[derive(Clone, Default)]
pub struct SharedEventDispatcher {
    subscriptions: Arc<Mutex<EventDispatcher>>,
    pending: Arc<parking_lot::Mutex<VecDeque<BoxedEvent>>>,
}

impl SharedEventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event for the next drain of the event loop.
    ///
    /// The queue is unbounded. Whoever owns the event loop must call
    /// [`process_queue`](Self::process_queue) regularly, not only at startup
    /// and shutdown, or long-running hosts keep every posted event in memory.
    pub fn post(&self, event: impl Event) {
        log::trace!("Posting event '{}'", event.name());
        self.pending.lock().push_back(Box::new(event));
    }

    pub fn queue_size(&self) -> usize {
        self.pending.lock().len()
    }

    /// Deliver everything queued, higher priorities first within each batch.
    ///
    /// Events posted by handlers while draining are delivered in a later
    /// batch of the same call. Returns how many events were delivered.
    pub async fn process_queue(&self) -> Result<usize> {
        let mut delivered = 0;
        loop {
            let mut batch: Vec<BoxedEvent> = self.pending.lock().drain(..).collect();
            if batch.is_empty() {
                return Ok(delivered);
            }
            // Stable, so equal priorities keep posting order.
            batch.sort_by_key(|event| std::cmp::Reverse(event.priority()));
            let subscriptions = self.subscriptions.lock().await;
            for event in batch {
                subscriptions.deliver(&*event).await;
                delivered += 1;
            }
        }
    }

    /// Drain the queue every `period` until `stop` completes, then drain
    /// once more so nothing posted before the stop is left behind.
    pub async fn process_until<F: Future>(&self, period: Duration, stop: F) -> Result<F::Output> {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(stop);
        let output = loop {
            tokio::select! {
                output = &mut stop => break output,
                _ = ticker.tick() => {
                    self.process_queue().await?;
                }
            }
        };
        self.process_queue().await?;
        Ok(output)
    }

    pub async fn register_handler(&self, event_name: &'static str, handler: NamedHandlerFn) -> Result<EventId> {
        Ok(self.subscriptions.lock().await.register_handler(event_name, handler))
    }

    pub async fn register_type_handler<E: Event>(&self, handler: TypedHandlerFn<E>) -> Result<EventId> {
        Ok(self.subscriptions.lock().await.register_type_handler::<E>(handler))
    }

    pub async fn unregister_handler(&self, id: EventId) -> Result<()> {
        if self.subscriptions.lock().await.unregister_handler(id) {
            Ok(())
        } else {
            Err(EventSystemError::UnknownHandler(id).into())
        }
    }
}

impl fmt::Debug for SharedEventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedEventDispatcher")
            .field("pending", &self.pending.lock().len())
            .finish_non_exhaustive()
    }
}

/// Wrap a plain closure as a name handler
pub fn sync_event_handler<F>(f: F) -> NamedHandlerFn
where
    F: Fn(&dyn Event) -> EventResult + Send + Sync + 'static,
{
    Box::new(move |event| {
        let result = f(event);
        Box::pin(std::future::ready(result))
    })
}

/// Wrap a plain closure as a handler for events of type `E`
pub fn sync_typed_handler<E, F>(f: F) -> TypedHandlerFn<E>
where
    E: Event,
    F: Fn(&E) -> EventResult + Send + Sync + 'static,
{
    Box::new(move |event| {
        let result = f(event);
        Box::pin(std::future::ready(result))
    })
}
