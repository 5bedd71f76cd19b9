use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use tempfile::tempdir;

use super::{CollectionRef, DocumentStore, Durability, SledStore};
use crate::broker::message::{DocumentUpdate, MessageDocument, TopicKey};
use crate::config::Settings;
use crate::matcher::TopicMatcher;
use crate::utils::error::StoreError;

fn create_test_store() -> (SledStore, CollectionRef) {
    let store = SledStore::temporary().unwrap();
    let collection = CollectionRef::new("MQ", "messages");
    store.create_namespace("MQ").unwrap();
    store.create_collection(&collection, Durability::Soft).unwrap();
    (store, collection)
}

#[test]
fn test_create_namespace_twice_reports_already_exists() {
    let store = SledStore::temporary().unwrap();
    store.create_namespace("MQ").unwrap();
    let err = store.create_namespace("MQ").unwrap_err();
    assert!(err.is_already_exists());
}

#[test]
fn test_create_collection_requires_namespace() {
    let store = SledStore::temporary().unwrap();
    let err = store
        .create_collection(&CollectionRef::new("nope", "messages"), Durability::Soft)
        .unwrap_err();
    assert!(matches!(err, StoreError::Missing { kind: "namespace", .. }));
}

#[test]
fn test_create_collection_twice_reports_already_exists() {
    let (store, collection) = create_test_store();
    let err = store.create_collection(&collection, Durability::Hard).unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists { kind: "collection", .. }));
    assert_eq!(store.collections().unwrap(), vec!["MQ/messages".to_string()]);
}

#[test]
fn test_writes_require_collection() {
    let store = SledStore::temporary().unwrap();
    let collection = CollectionRef::new("MQ", "missing");
    let doc = MessageDocument::new(TopicKey::name("a"), json!(1));
    assert!(matches!(
        store.insert(&collection, &doc),
        Err(StoreError::Missing { .. })
    ));
}

#[test]
fn test_update_by_topic_counts_matches() {
    let (store, collection) = create_test_store();
    let update = DocumentUpdate::new(json!("new"));
    assert_eq!(store.update_by_topic(&collection, &TopicKey::name("a"), &update).unwrap(), 0);

    store
        .insert(&collection, &MessageDocument::new(TopicKey::name("a"), json!("old")))
        .unwrap();
    store
        .insert(&collection, &MessageDocument::new(TopicKey::name("b"), json!("other")))
        .unwrap();
    assert_eq!(store.update_by_topic(&collection, &TopicKey::name("a"), &update).unwrap(), 1);

    // a second document for the same topic is updated as well
    store
        .insert(&collection, &MessageDocument::new(TopicKey::name("a"), json!("dup")))
        .unwrap();
    assert_eq!(store.update_by_topic(&collection, &TopicKey::name("a"), &update).unwrap(), 2);

    let docs = store.documents(&collection).unwrap();
    let a: Vec<_> = docs.iter().filter(|d| d.topic == TopicKey::name("a")).collect();
    assert!(a.iter().all(|d| d.payload == json!("new")));
    let b = docs.iter().find(|d| d.topic == TopicKey::name("b")).unwrap();
    assert_eq!(b.payload, json!("other"));
}

#[test]
fn test_hard_durability_collection_accepts_writes() {
    let store = SledStore::temporary().unwrap();
    let collection = CollectionRef::new("MQ", "durable");
    store.create_namespace("MQ").unwrap();
    store.create_collection(&collection, Durability::Hard).unwrap();
    store
        .insert(&collection, &MessageDocument::new(TopicKey::name("a"), json!(1)))
        .unwrap();
    assert_eq!(store.documents(&collection).unwrap().len(), 1);
}

#[test]
fn test_catalog_survives_reconnect() {
    let dir = tempdir().unwrap();
    let mut settings = Settings::default().store;
    settings.path = dir.path().join("db").to_str().unwrap().to_string();

    {
        let store = SledStore::connect(&settings).unwrap();
        store.create_namespace("MQ").unwrap();
    }

    let store = SledStore::connect(&settings).unwrap();
    assert!(store.create_namespace("MQ").unwrap_err().is_already_exists());
}

#[test]
fn test_disconnected_store_rejects_requests() {
    let (store, collection) = create_test_store();
    let other_handle = store.clone();
    store.disconnect();

    assert!(!other_handle.is_connected());
    assert!(matches!(
        other_handle.create_namespace("x"),
        Err(StoreError::Disconnected)
    ));
    let update = DocumentUpdate::new(json!(1));
    assert!(matches!(
        other_handle.update_by_topic(&collection, &TopicKey::name("a"), &update),
        Err(StoreError::Disconnected)
    ));
}

#[test]
fn test_watch_works_outside_runtime() {
    let (store, collection) = create_test_store();
    let matcher = TopicMatcher::compile(["#"]).unwrap();
    let mut cursor = store.watch(&collection, matcher).unwrap();

    store
        .insert(&collection, &MessageDocument::new(TopicKey::name("plain"), json!(1)))
        .unwrap();

    let doc = futures::executor::block_on(cursor.next()).unwrap().unwrap();
    assert_eq!(doc.payload, json!(1));
}

#[tokio::test]
async fn test_feed_drains_bursts_without_blocking_writers() {
    let (store, collection) = create_test_store();
    let mut cursor = store
        .watch(&collection, TopicMatcher::compile(["burst"]).unwrap())
        .unwrap();

    // More than sled buffers per subscriber, written without yielding.
    let total = 1500;
    for i in 0..total {
        store
            .insert(&collection, &MessageDocument::new(TopicKey::name("burst"), json!(i)))
            .unwrap();
    }

    for i in 0..total {
        let doc = tokio::time::timeout(Duration::from_secs(10), cursor.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(doc.payload, json!(i));
    }
}

#[tokio::test]
async fn test_watch_filters_on_store_side() {
    let (store, collection) = create_test_store();
    let matcher = TopicMatcher::compile(["a.*"]).unwrap();
    let mut cursor = store.watch(&collection, matcher).unwrap();

    for topic in ["a.b", "b.c", "a.b.c", "a.z"] {
        store
            .insert(&collection, &MessageDocument::new(TopicKey::name(topic), json!(topic)))
            .unwrap();
    }

    let mut seen = Vec::new();
    for _ in 0..2 {
        let doc = tokio::time::timeout(Duration::from_secs(5), cursor.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        seen.push(doc.payload);
    }
    assert_eq!(seen, vec![json!("a.b"), json!("a.z")]);
}

#[tokio::test]
async fn test_cursor_ends_after_disconnect() {
    let (store, collection) = create_test_store();
    let mut cursor = store
        .watch(&collection, TopicMatcher::compile(["#"]).unwrap())
        .unwrap();
    store.disconnect();

    assert!(matches!(cursor.next().await, Some(Err(StoreError::Disconnected))));
    assert!(cursor.next().await.is_none());
    assert!(cursor.is_finished());
}
