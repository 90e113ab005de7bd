#![cfg(test)]

use std::sync::Arc;

use crate::event::SharedEventDispatcher;
use crate::object_pool::{AggregateRegistry, ObjectPool, PoolObject};

trait Render: Send + Sync {
    fn render(&self) -> &'static str;
}

trait Save: Send + Sync {
    fn save(&self) -> bool;
}

struct Canvas;

impl Render for Canvas {
    fn render(&self) -> &'static str {
        "canvas"
    }
}

struct Document;

impl Save for Document {
    fn save(&self) -> bool {
        true
    }
}

fn canvas() -> Arc<PoolObject> {
    PoolObject::builder("canvas").provide::<dyn Render>(Arc::new(Canvas)).build()
}

fn document() -> Arc<PoolObject> {
    PoolObject::builder("document").provide::<dyn Save>(Arc::new(Document)).build()
}

#[test]
fn test_query_through_sibling() {
    let registry = AggregateRegistry::new(SharedEventDispatcher::new());
    let aggregate = registry.create("editor");
    let canvas = canvas();
    let document = document();
    assert!(registry.add(&aggregate, canvas.clone()));
    assert!(registry.add(&aggregate, document.clone()));

    assert_eq!(registry.query::<dyn Save>(&canvas).map(|s| s.save()), Some(true));
    assert_eq!(registry.query::<dyn Render>(&document).map(|r| r.render()), Some("canvas"));
    assert!(registry.query::<dyn Render>(&aggregate).is_some());
    assert_eq!(registry.parent(&canvas).map(|p| p.id()), Some(aggregate.id()));
}

#[test]
fn test_query_without_aggregate_uses_object_only() {
    let registry = AggregateRegistry::new(SharedEventDispatcher::new());
    let canvas = canvas();
    assert!(registry.query::<dyn Render>(&canvas).is_some());
    assert!(registry.query::<dyn Save>(&canvas).is_none());
    assert_eq!(registry.query_all::<dyn Render>(&canvas).len(), 1);
}

#[test]
fn test_query_all_collects_every_member() {
    let registry = AggregateRegistry::new(SharedEventDispatcher::new());
    let aggregate = registry.create("multi");
    let first = canvas();
    let second = canvas();
    registry.add(&aggregate, first.clone());
    registry.add(&aggregate, second);
    registry.add(&aggregate, document());

    assert_eq!(registry.query_all::<dyn Render>(&first).len(), 2);
    assert_eq!(registry.query_all::<dyn Save>(&first).len(), 1);
}

#[test]
fn test_component_cannot_join_two_aggregates() {
    let registry = AggregateRegistry::new(SharedEventDispatcher::new());
    let first = registry.create("first");
    let second = registry.create("second");
    let canvas = canvas();

    assert!(registry.add(&first, canvas.clone()));
    assert!(registry.add(&first, canvas.clone()));
    assert_eq!(registry.components(&first).len(), 1);
    assert!(!registry.add(&second, canvas.clone()));
    assert_eq!(registry.parent(&canvas).map(|p| p.id()), Some(first.id()));
    assert!(registry.components(&second).is_empty());
}

#[test]
fn test_remove_component() {
    let registry = AggregateRegistry::new(SharedEventDispatcher::new());
    let aggregate = registry.create("editor");
    let canvas = canvas();
    let document = document();
    registry.add(&aggregate, canvas.clone());
    registry.add(&aggregate, document.clone());

    let removed = registry.remove(&aggregate, &canvas).expect("canvas was a member");
    assert_eq!(removed.id(), canvas.id());
    assert!(registry.parent(&canvas).is_none());
    assert!(registry.query::<dyn Save>(&canvas).is_none());
    assert!(registry.remove(&aggregate, &canvas).is_none());
}

#[test]
fn test_destroy_returns_members_and_aggregate() {
    let registry = AggregateRegistry::new(SharedEventDispatcher::new());
    let aggregate = registry.create("editor");
    let canvas = canvas();
    registry.add(&aggregate, canvas.clone());
    registry.add(&aggregate, document());

    let doomed = registry.destroy(&canvas);
    assert_eq!(doomed.len(), 3);
    assert_eq!(doomed.last().map(|o| o.id()), Some(aggregate.id()));
    assert_eq!(registry.aggregate_count(), 0);
    assert!(!registry.is_member(&canvas));
    assert!(registry.destroy(&canvas).is_empty());
}

#[test]
fn test_destroying_member_removes_whole_aggregate_from_pool() {
    let pool = ObjectPool::new(SharedEventDispatcher::new());
    let aggregate = pool.aggregates().create("editor");
    let canvas = canvas();
    let document = document();
    let bystander = PoolObject::new("bystander");
    pool.aggregates().add(&aggregate, canvas.clone());
    pool.aggregates().add(&aggregate, document.clone());
    pool.add_object(&aggregate);
    pool.add_object(&canvas);
    pool.add_object(&document);
    pool.add_object(&bystander);

    assert!(pool.get_object::<dyn Save>().is_some());
    assert_eq!(pool.destroy_object(&document), 3);
    assert_eq!(pool.len(), 1);
    assert!(pool.contains(&bystander));
    assert!(pool.get_object::<dyn Render>().is_none());
}

#[test]
fn test_destroying_standalone_object() {
    let pool = ObjectPool::new(SharedEventDispatcher::new());
    let canvas = canvas();
    pool.add_object(&canvas);
    assert_eq!(pool.destroy_object(&canvas), 1);
    assert!(pool.is_empty());
}
