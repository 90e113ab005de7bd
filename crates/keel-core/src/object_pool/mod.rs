//! # Keel Core Object Pool
//!
//! A registry of shared service objects that plugins use to discover each
//! other's capabilities without compile-time coupling.
//!
//! Objects declare their capabilities explicitly when they are built:
//!
//! ```ignore
//! let object = PoolObject::builder("MarkdownEditor")
//!     .provide::<dyn EditorFactory>(factory)
//!     .build();
//! pool.add_object(&object);
//! let factory: Option<Arc<dyn EditorFactory>> = pool.get_object::<dyn EditorFactory>();
//! ```
//!
//! Objects can be grouped into aggregates through [`AggregateRegistry`];
//! a query against any member then searches the whole group.
pub mod aggregate;
pub mod object;
pub mod pool;

pub use aggregate::AggregateRegistry;
pub use object::{ObjectId, PoolObject, PoolObjectBuilder};
pub use pool::ObjectPool;

#[cfg(test)]
mod tests;
