use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::event::{PluginEvent, SharedEventDispatcher};
use crate::object_pool::aggregate::AggregateRegistry;
use crate::object_pool::object::{ObjectId, PoolObject};

struct PoolEntry {
    id: ObjectId,
    name: String,
    object: Weak<PoolObject>,
}

/// Process-wide registry of shared service objects.
///
/// The pool does not own what it lists: entries are weak, and objects live as
/// long as their registrant (or anyone who queried them) keeps a strong
/// reference. Registrants must remove what they added before shutdown;
/// whatever is still listed at that point is reported as leaked.
pub struct ObjectPool {
    objects: RwLock<Vec<PoolEntry>>,
    aggregates: AggregateRegistry,
    events: SharedEventDispatcher,
}

impl ObjectPool {
    pub fn new(events: SharedEventDispatcher) -> Self {
        Self {
            objects: RwLock::new(Vec::new()),
            aggregates: AggregateRegistry::new(events.clone()),
            events,
        }
    }

    pub fn aggregates(&self) -> &AggregateRegistry {
        &self.aggregates
    }

    pub fn events(&self) -> &SharedEventDispatcher {
        &self.events
    }

    /// Add an object to the pool. Duplicates are rejected with a warning.
    pub fn add_object(&self, object: &Arc<PoolObject>) -> bool {
        {
            let mut objects = self.objects.write();
            if objects.iter().any(|e| e.id == object.id()) {
                log::warn!("ObjectPool::add_object(): trying to add duplicate object '{}'", object.name());
                return false;
            }
            objects.push(PoolEntry {
                id: object.id(),
                name: object.name().to_string(),
                object: Arc::downgrade(object),
            });
        }
        log::trace!("Object '{}' ({}) added to pool", object.name(), object.id());
        self.events.post(PluginEvent::ObjectAdded {
            id: object.id(),
            name: object.name().to_string(),
        });
        true
    }

    /// Remove an object from the pool. Unknown objects are rejected with a warning.
    pub fn remove_object(&self, object: &PoolObject) -> bool {
        self.remove_by_id(object.id(), object.name())
    }

    fn remove_by_id(&self, id: ObjectId, name: &str) -> bool {
        // Check and removal share one guard so concurrent removes of the same
        // object post a single AboutToRemoveObject.
        {
            let mut objects = self.objects.write();
            let Some(pos) = objects.iter().position(|e| e.id == id) else {
                log::warn!("ObjectPool::remove_object(): object '{}' not in list", name);
                return false;
            };
            self.events.post(PluginEvent::AboutToRemoveObject {
                id,
                name: name.to_string(),
            });
            objects.remove(pos);
        }
        log::trace!("Object '{}' ({}) removed from pool", name, id);
        true
    }

    pub fn contains(&self, object: &PoolObject) -> bool {
        self.objects.read().iter().any(|e| e.id == object.id())
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Snapshot of all live objects, in insertion order
    pub fn all_objects(&self) -> Vec<Arc<PoolObject>> {
        self.objects.read().iter().filter_map(|e| e.object.upgrade()).collect()
    }

    /// First object (or aggregate sibling) providing `T`
    pub fn get_object<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.all_objects().iter().find_map(|o| self.aggregates.query::<T>(o))
    }

    /// Every capability `T` provided by pooled objects, one per pooled object
    pub fn get_objects<T: ?Sized + Send + Sync + 'static>(&self) -> Vec<Arc<T>> {
        self.all_objects()
            .iter()
            .filter_map(|o| self.aggregates.query::<T>(o))
            .collect()
    }

    pub fn get_object_by_name(&self, name: &str) -> Option<Arc<PoolObject>> {
        self.objects
            .read()
            .iter()
            .filter(|e| e.name == name)
            .find_map(|e| e.object.upgrade())
    }

    /// Pool-aware lookup of capability `T` on one specific object
    pub fn query<T: ?Sized + Send + Sync + 'static>(&self, object: &PoolObject) -> Option<Arc<T>> {
        self.aggregates.query::<T>(object)
    }

    /// Destroy `object`: if it belongs to an aggregate, the whole aggregate
    /// is dissolved and every member is removed from the pool.
    ///
    /// Returns the number of objects that were taken out of the pool.
    pub fn destroy_object(&self, object: &Arc<PoolObject>) -> usize {
        let mut doomed = self.aggregates.destroy(object);
        if doomed.is_empty() {
            doomed.push(Arc::clone(object));
        }
        doomed
            .iter()
            .filter(|member| self.contains(member))
            .filter(|member| self.remove_object(member))
            .count()
    }

    /// Names of everything still listed, including entries whose object was
    /// already dropped without being removed.
    pub fn leaked_objects(&self) -> Vec<String> {
        self.objects
            .read()
            .iter()
            .map(|e| {
                if e.object.strong_count() == 0 {
                    format!("{} (dropped)", e.name)
                } else {
                    e.name.clone()
                }
            })
            .collect()
    }

    /// Log every object still in the pool; returns how many there were
    pub fn report_leaks(&self) -> usize {
        let leaked = self.leaked_objects();
        if !leaked.is_empty() {
            log::warn!("There are {} object(s) left in the object pool:", leaked.len());
            for name in &leaked {
                log::warn!("  leaked object: {}", name);
            }
        }
        leaked.len()
    }
}

impl std::fmt::Debug for ObjectPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectPool")
            .field("objects", &self.len())
            .field("aggregates", &self.aggregates.aggregate_count())
            .finish()
    }
}
