#![cfg(test)]

use std::sync::Arc;

use crate::event::{PluginEvent, SharedEventDispatcher};
use crate::object_pool::{ObjectPool, PoolObject};

trait Greeter: Send + Sync {
    fn greet(&self) -> String;
}

struct English;

impl Greeter for English {
    fn greet(&self) -> String {
        "hello".to_string()
    }
}

struct Counter(u32);

fn greeter_object(name: &str) -> Arc<PoolObject> {
    PoolObject::builder(name)
        .provide::<dyn Greeter>(Arc::new(English))
        .build()
}

#[test]
fn test_object_ids_are_unique() {
    let a = PoolObject::new("a");
    let b = PoolObject::new("b");
    assert_ne!(a.id(), b.id());
}

#[test]
fn test_query_only_answers_declared_capabilities() {
    let object = greeter_object("greeter");
    assert_eq!(object.query::<dyn Greeter>().map(|g| g.greet()), Some("hello".to_string()));
    assert!(object.query::<Counter>().is_none());
    assert!(object.implements::<dyn Greeter>());
    assert!(!object.implements::<Counter>());
}

#[test]
fn test_from_value_provides_concrete_type() {
    let object = PoolObject::from_value("counter", Counter(3));
    assert_eq!(object.query::<Counter>().map(|c| c.0), Some(3));
}

#[test]
fn test_add_and_get_object() {
    let pool = ObjectPool::new(SharedEventDispatcher::new());
    let object = greeter_object("greeter");
    assert!(pool.add_object(&object));
    assert_eq!(pool.len(), 1);

    let greeter = pool.get_object::<dyn Greeter>().expect("greeter should be found");
    assert_eq!(greeter.greet(), "hello");
    assert!(pool.get_object::<Counter>().is_none());
    assert_eq!(pool.get_object_by_name("greeter").map(|o| o.id()), Some(object.id()));
}

#[test]
fn test_duplicate_add_is_rejected() {
    let pool = ObjectPool::new(SharedEventDispatcher::new());
    let object = greeter_object("greeter");
    assert!(pool.add_object(&object));
    assert!(!pool.add_object(&object));
    assert_eq!(pool.len(), 1);
}

#[test]
fn test_remove_unknown_object_has_no_effect() {
    let events = SharedEventDispatcher::new();
    let pool = ObjectPool::new(events.clone());
    let listed = greeter_object("listed");
    pool.add_object(&listed);
    let before = events.queue_size();

    let stranger = greeter_object("stranger");
    assert!(!pool.remove_object(&stranger));
    assert_eq!(pool.len(), 1);
    assert_eq!(events.queue_size(), before);
}

#[test]
fn test_get_objects_returns_all_providers() {
    let pool = ObjectPool::new(SharedEventDispatcher::new());
    let first = greeter_object("first");
    let second = greeter_object("second");
    let other = PoolObject::from_value("other", Counter(1));
    pool.add_object(&first);
    pool.add_object(&other);
    pool.add_object(&second);

    assert_eq!(pool.get_objects::<dyn Greeter>().len(), 2);
    assert_eq!(pool.all_objects().len(), 3);
}

#[test]
fn test_pool_does_not_keep_objects_alive() {
    let pool = ObjectPool::new(SharedEventDispatcher::new());
    let object = greeter_object("short-lived");
    pool.add_object(&object);
    drop(object);

    assert!(pool.all_objects().is_empty());
    assert!(pool.get_object::<dyn Greeter>().is_none());
    assert_eq!(pool.leaked_objects(), vec!["short-lived (dropped)".to_string()]);
}

#[test]
fn test_report_leaks_counts_remaining_objects() {
    let pool = ObjectPool::new(SharedEventDispatcher::new());
    let object = greeter_object("left-behind");
    pool.add_object(&object);
    assert_eq!(pool.report_leaks(), 1);
    pool.remove_object(&object);
    assert_eq!(pool.report_leaks(), 0);
}

#[tokio::test]
async fn test_add_and_remove_post_events_in_order() {
    let events = SharedEventDispatcher::new();
    let pool = ObjectPool::new(events.clone());
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = seen.clone();
    events
        .register_type_handler::<PluginEvent>(crate::event::sync_typed_handler(move |event: &PluginEvent| {
            sink.lock().push(event.clone());
            crate::event::EventResult::Continue
        }))
        .await
        .expect("register handler");

    let object = greeter_object("announced");
    pool.add_object(&object);
    pool.remove_object(&object);
    assert_eq!(events.process_queue().await.expect("drain"), 2);

    let seen = seen.lock();
    assert_eq!(
        *seen,
        vec![
            PluginEvent::ObjectAdded { id: object.id(), name: "announced".to_string() },
            PluginEvent::AboutToRemoveObject { id: object.id(), name: "announced".to_string() },
        ]
    );
}

#[test]
fn test_concurrent_removes_succeed_once() {
    let events = SharedEventDispatcher::new();
    let pool = ObjectPool::new(events.clone());
    let object = greeter_object("contested");
    pool.add_object(&object);
    let before = events.queue_size();

    let removed = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..8).map(|_| scope.spawn(|| pool.remove_object(&object))).collect();
        workers
            .into_iter()
            .map(|worker| worker.join().expect("remover thread panicked"))
            .filter(|removed| *removed)
            .count()
    });

    assert_eq!(removed, 1);
    assert!(pool.is_empty());
    assert_eq!(events.queue_size(), before + 1);
}
