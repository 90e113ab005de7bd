use std::any::Any;

use crate::event::{Event, EventPriority};
use crate::object_pool::ObjectId;

/// Notifications produced by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginEvent {
    /// An object was added to the object pool
    ObjectAdded { id: ObjectId, name: String },
    /// An object is about to be removed from the object pool
    AboutToRemoveObject { id: ObjectId, name: String },
    /// A component was added to or removed from an aggregate
    AggregateChanged { aggregate: ObjectId },
    /// The set of known plugin specs (or their states) changed
    PluginsChanged,
    /// Every running plugin finished its delayed initialization
    InitializationDone,
    /// A requested test run finished
    TestsFinished { failed: usize },
}

impl Event for PluginEvent {
    fn name(&self) -> &'static str {
        match self {
            PluginEvent::ObjectAdded { .. } => "pool.object_added",
            PluginEvent::AboutToRemoveObject { .. } => "pool.about_to_remove_object",
            PluginEvent::AggregateChanged { .. } => "aggregate.changed",
            PluginEvent::PluginsChanged => "plugins.changed",
            PluginEvent::InitializationDone => "plugins.initialization_done",
            PluginEvent::TestsFinished { .. } => "plugins.tests_finished",
        }
    }

    fn priority(&self) -> EventPriority {
        match self {
            PluginEvent::InitializationDone | PluginEvent::TestsFinished { .. } => EventPriority::High,
            PluginEvent::AggregateChanged { .. } => EventPriority::Low,
            _ => EventPriority::Normal,
        }
    }

    fn clone_event(&self) -> Box<dyn Event> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
