use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::event::{PluginEvent, SharedEventDispatcher};
use crate::object_pool::object::{ObjectId, PoolObject};

struct AggregateEntry {
    object: Arc<PoolObject>,
    components: Vec<Arc<PoolObject>>,
}

#[derive(Default)]
struct AggregateTable {
    /// component id (and the aggregate's own id) -> aggregate id
    owners: HashMap<ObjectId, ObjectId>,
    aggregates: HashMap<ObjectId, AggregateEntry>,
}

/// Groups objects into aggregates that behave like one object for queries.
///
/// Every object belongs to at most one aggregate. Asking any member (or the
/// aggregate object itself) for a capability searches all members, and
/// destroying one member destroys the whole group.
pub struct AggregateRegistry {
    table: RwLock<AggregateTable>,
    events: SharedEventDispatcher,
}

impl AggregateRegistry {
    pub fn new(events: SharedEventDispatcher) -> Self {
        Self {
            table: RwLock::new(AggregateTable::default()),
            events,
        }
    }

    /// Create an empty aggregate and return the object that represents it
    pub fn create(&self, name: impl Into<String>) -> Arc<PoolObject> {
        let object = PoolObject::new(name);
        let id = object.id();
        let mut table = self.table.write();
        table.owners.insert(id, id);
        table.aggregates.insert(
            id,
            AggregateEntry {
                object: Arc::clone(&object),
                components: Vec::new(),
            },
        );
        log::debug!("Created aggregate '{}' ({})", object.name(), id);
        object
    }

    /// Attach `component` to `aggregate`.
    ///
    /// Adding a component twice to the same aggregate is a no-op; an object
    /// that already belongs to another aggregate is rejected.
    pub fn add(&self, aggregate: &PoolObject, component: Arc<PoolObject>) -> bool {
        let aggregate_id = aggregate.id();
        {
            let mut table = self.table.write();
            if !table.aggregates.contains_key(&aggregate_id) {
                log::warn!("Cannot add '{}' to '{}': not an aggregate", component.name(), aggregate.name());
                return false;
            }
            match table.owners.get(&component.id()) {
                Some(owner) if *owner == aggregate_id => return true,
                Some(owner) => {
                    log::warn!(
                        "Cannot add object '{}' to aggregate {}: it is already a member of aggregate {}",
                        component.name(),
                        aggregate_id,
                        owner
                    );
                    return false;
                }
                None => {}
            }
            table.owners.insert(component.id(), aggregate_id);
            if let Some(entry) = table.aggregates.get_mut(&aggregate_id) {
                entry.components.push(component);
            }
        }
        self.events.post(PluginEvent::AggregateChanged { aggregate: aggregate_id });
        true
    }

    /// Detach `component` from `aggregate`, returning it if it was a member
    pub fn remove(&self, aggregate: &PoolObject, component: &PoolObject) -> Option<Arc<PoolObject>> {
        let aggregate_id = aggregate.id();
        let removed = {
            let mut table = self.table.write();
            if table.owners.get(&component.id()) != Some(&aggregate_id) || component.id() == aggregate_id {
                return None;
            }
            table.owners.remove(&component.id());
            let entry = table.aggregates.get_mut(&aggregate_id)?;
            let index = entry.components.iter().position(|c| c.id() == component.id())?;
            entry.components.remove(index)
        };
        self.events.post(PluginEvent::AggregateChanged { aggregate: aggregate_id });
        Some(removed)
    }

    /// The aggregate object owning `object`, if any
    pub fn parent(&self, object: &PoolObject) -> Option<Arc<PoolObject>> {
        let table = self.table.read();
        let owner = table.owners.get(&object.id())?;
        table.aggregates.get(owner).map(|entry| Arc::clone(&entry.object))
    }

    pub fn is_member(&self, object: &PoolObject) -> bool {
        self.table.read().owners.contains_key(&object.id())
    }

    /// Members of the aggregate `object` belongs to, in insertion order
    pub fn components(&self, object: &PoolObject) -> Vec<Arc<PoolObject>> {
        let table = self.table.read();
        table
            .owners
            .get(&object.id())
            .and_then(|owner| table.aggregates.get(owner))
            .map(|entry| entry.components.clone())
            .unwrap_or_default()
    }

    /// First capability `T` found on `object` or any sibling in its aggregate
    pub fn query<T: ?Sized + Send + Sync + 'static>(&self, object: &PoolObject) -> Option<Arc<T>> {
        if let Some(found) = object.query::<T>() {
            return Some(found);
        }
        self.components(object).iter().find_map(|c| c.query::<T>())
    }

    /// Every capability `T` provided across the aggregate of `object`
    pub fn query_all<T: ?Sized + Send + Sync + 'static>(&self, object: &PoolObject) -> Vec<Arc<T>> {
        if !self.is_member(object) {
            return object.query::<T>().into_iter().collect();
        }
        let parent = self.parent(object);
        parent
            .iter()
            .chain(self.components(object).iter())
            .filter_map(|c| c.query::<T>())
            .collect()
    }

    /// Dissolve the aggregate containing `object`.
    ///
    /// Returns every member followed by the aggregate object itself, or an
    /// empty list when `object` is not part of an aggregate.
    pub fn destroy(&self, object: &PoolObject) -> Vec<Arc<PoolObject>> {
        let (aggregate_id, doomed) = {
            let mut table = self.table.write();
            let Some(aggregate_id) = table.owners.get(&object.id()).copied() else {
                return Vec::new();
            };
            let Some(entry) = table.aggregates.remove(&aggregate_id) else {
                return Vec::new();
            };
            let mut doomed = entry.components;
            doomed.push(entry.object);
            for member in &doomed {
                table.owners.remove(&member.id());
            }
            (aggregate_id, doomed)
        };
        log::debug!("Destroyed aggregate {} with {} member(s)", aggregate_id, doomed.len() - 1);
        self.events.post(PluginEvent::AggregateChanged { aggregate: aggregate_id });
        doomed
    }

    pub fn aggregate_count(&self) -> usize {
        self.table.read().aggregates.len()
    }
}
