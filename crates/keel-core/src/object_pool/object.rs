use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`PoolObject`], unique for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn from_raw(raw: u64) -> Self {
        ObjectId(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A shareable service object with an explicitly declared set of capabilities.
///
/// Each capability is stored as an `Arc<T>` keyed by `TypeId::of::<T>()`, where
/// `T` is usually a trait object type such as `dyn EditorFactory`. Lookups
/// never guess: an object only answers [`query`](Self::query) for the exact
/// types it declared through [`PoolObjectBuilder::provide`].
pub struct PoolObject {
    id: ObjectId,
    name: String,
    capabilities: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    capability_names: Vec<&'static str>,
}

impl PoolObject {
    /// Start declaring an object with the given display name
    pub fn builder(name: impl Into<String>) -> PoolObjectBuilder {
        PoolObjectBuilder {
            object: PoolObject {
                id: ObjectId::next(),
                name: name.into(),
                capabilities: HashMap::new(),
                capability_names: Vec::new(),
            },
        }
    }

    /// An object without capabilities (aggregates, markers)
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Self::builder(name).build()
    }

    /// An object whose single capability is the concrete value itself
    pub fn from_value<T: Send + Sync + 'static>(name: impl Into<String>, value: T) -> Arc<Self> {
        Self::builder(name).provide(Arc::new(value)).build()
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Typed lookup against this object's own capability set
    pub fn query<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.capabilities
            .get(&TypeId::of::<T>())
            .and_then(|cap| cap.downcast_ref::<Arc<T>>())
            .cloned()
    }

    pub fn implements<T: ?Sized + 'static>(&self) -> bool {
        self.capabilities.contains_key(&TypeId::of::<T>())
    }

    pub fn capability_names(&self) -> &[&'static str] {
        &self.capability_names
    }
}

impl fmt::Debug for PoolObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolObject")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("capabilities", &self.capability_names)
            .finish()
    }
}

/// Builder declaring the capabilities of a [`PoolObject`]
pub struct PoolObjectBuilder {
    object: PoolObject,
}

impl PoolObjectBuilder {
    /// Declare that the object can be viewed as `T`.
    ///
    /// Declaring the same `T` twice keeps the last value.
    pub fn provide<T: ?Sized + Send + Sync + 'static>(mut self, capability: Arc<T>) -> Self {
        let previous = self.object.capabilities.insert(TypeId::of::<T>(), Box::new(capability));
        if previous.is_none() {
            self.object.capability_names.push(std::any::type_name::<T>());
        }
        self
    }

    pub fn build(self) -> Arc<PoolObject> {
        Arc::new(self.object)
    }
}
