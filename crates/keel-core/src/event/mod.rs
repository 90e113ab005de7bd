//! # Keel Core Event System
//!
//! Notifications emitted by the object pool, the aggregate registry and the
//! plugin manager. Producers post events synchronously into a pending queue;
//! the orchestrator drains the queue from its event loop, invoking the
//! registered asynchronous handlers in registration order.
pub mod dispatcher;
pub mod error;
pub mod types;

use std::any::Any;
use std::fmt;

use async_trait::async_trait;

/// Handle returned when registering a handler
pub type EventId = u64;

/// Within one drain of the queue, higher priorities are delivered first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum EventPriority {
    Low = 0,
    #[default]
    Normal = 1,
    High = 2,
}

/// Whether later handlers still see the event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    Continue,
    /// Skip the remaining handlers for this event
    Stop,
}

/// Something handlers can subscribe to, by name or by concrete type
pub trait Event: Any + fmt::Debug + Send + Sync {
    /// Key for name-based subscriptions, e.g. `plugins.changed`
    fn name(&self) -> &'static str;

    fn priority(&self) -> EventPriority {
        EventPriority::Normal
    }

    fn clone_event(&self) -> Box<dyn Event>;

    /// For typed handlers
    fn as_any(&self) -> &dyn Any;
}

#[async_trait]
pub trait AsyncEventHandler: Send + Sync {
    async fn handle(&self, event: &dyn Event) -> EventResult;
}

/// A queued event
pub type BoxedEvent = Box<dyn Event>;

pub use dispatcher::{EventDispatcher, SharedEventDispatcher, sync_event_handler, sync_typed_handler};
pub use types::PluginEvent;
