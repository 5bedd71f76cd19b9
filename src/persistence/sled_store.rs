//! Document store backed by `sled`
//!
//! Layout:
//! - a reserved `__catalog` tree records namespaces and collections; entries
//!   are created with compare-and-swap so that racing creators observe
//!   `AlreadyExists` instead of silently overwriting each other
//! - each collection is its own tree named `<namespace>/<collection>`
//! - documents are keyed by their `id` and stored as JSON
//!
//! Change feeds use `Tree::watch_prefix`. Each `watch` call starts a feed
//! thread which decodes events, applies the subscriber's matcher and forwards
//! matches into that subscriber's unbounded buffer. sled reserves events in a
//! bounded channel and blocks writers when it is full, so the feed must keep
//! draining independently of whatever the consumer's runtime is doing.
//!
//! `disconnect` closes the connection for every clone of the handle: requests
//! fail with `StoreError::Disconnected` and all live feeds terminate.

use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sled::{Db, Event, Subscriber, Tree};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::{ChangeCursor, CollectionRef, DocumentStore, Durability};
use crate::broker::message::{DocumentUpdate, MessageDocument, TopicKey};
use crate::config::StoreSettings;
use crate::matcher::TopicMatcher;
use crate::utils::error::StoreError;

const CATALOG_TREE: &str = "__catalog";

/// How long the feed waits for an event before rechecking for shutdown.
const FEED_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Serialize, Deserialize, Debug, Clone)]
struct CatalogEntry {
    durability: Durability,
    created_at: i64,
}

#[derive(Clone)]
pub struct SledStore {
    db: Db,
    catalog: Tree,
    closed: Arc<watch::Sender<bool>>,
}

impl SledStore {
    /// Open the database described by `settings`.
    pub fn connect(settings: &StoreSettings) -> Result<Self, StoreError> {
        let mut config = sled::Config::new()
            .path(&settings.path)
            .temporary(settings.temporary);
        if let Some(ms) = settings.flush_every_ms {
            config = config.flush_every_ms(Some(ms));
        }
        let db = config
            .open()
            .map_err(|e| StoreError::Connection(format!("{}: {e}", settings.path)))?;
        info!(path = %settings.path, temporary = settings.temporary, "connected to document store");
        Self::from_db(db)
    }

    /// Open a throwaway in-memory database that is removed on drop.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        let catalog = db.open_tree(CATALOG_TREE)?;
        let (closed, _) = watch::channel(false);
        Ok(Self {
            db,
            catalog,
            closed: Arc::new(closed),
        })
    }

    /// Close the connection. Undelivered notifications are lost.
    pub fn disconnect(&self) {
        if !self.closed.send_replace(true) {
            info!("document store connection closed");
        }
    }

    /// Snapshot of every document currently stored in `collection`.
    pub fn documents(&self, collection: &CollectionRef) -> Result<Vec<MessageDocument>, StoreError> {
        let tree = self.collection_tree(collection)?;
        let mut documents = Vec::new();
        for entry in tree.iter() {
            let (_, value) = entry?;
            documents.push(serde_json::from_slice(&value)?);
        }
        Ok(documents)
    }

    /// Names of all collections known to the catalog, as `<namespace>/<name>`.
    pub fn collections(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        for entry in self.catalog.scan_prefix(b"collection:") {
            let (key, _) = entry?;
            let key = String::from_utf8_lossy(&key);
            if let Some(name) = key.strip_prefix("collection:") {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn ensure_connected(&self) -> Result<(), StoreError> {
        if *self.closed.borrow() {
            return Err(StoreError::Disconnected);
        }
        Ok(())
    }

    fn catalog_create(&self, kind: &'static str, name: String, durability: Durability) -> Result<(), StoreError> {
        let entry = CatalogEntry {
            durability,
            created_at: Utc::now().timestamp_millis(),
        };
        let key = format!("{kind}:{name}");
        let value = serde_json::to_vec(&entry)?;
        match self.catalog.compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(value))? {
            Ok(()) => {
                self.catalog.flush()?;
                Ok(())
            }
            Err(_) => Err(StoreError::AlreadyExists { kind, name }),
        }
    }

    fn catalog_entry(&self, kind: &'static str, name: String) -> Result<CatalogEntry, StoreError> {
        let key = format!("{kind}:{name}");
        match self.catalog.get(key.as_bytes())? {
            Some(value) => Ok(serde_json::from_slice(&value)?),
            None => Err(StoreError::Missing { kind, name }),
        }
    }

    fn collection_tree(&self, collection: &CollectionRef) -> Result<Tree, StoreError> {
        self.catalog_entry("collection", collection.to_string())?;
        Ok(self.db.open_tree(collection.to_string())?)
    }

    fn flush_if_hard(&self, collection: &CollectionRef, tree: &Tree) -> Result<(), StoreError> {
        let entry = self.catalog_entry("collection", collection.to_string())?;
        if entry.durability == Durability::Hard {
            tree.flush()?;
        }
        Ok(())
    }
}

impl DocumentStore for SledStore {
    fn create_namespace(&self, namespace: &str) -> Result<(), StoreError> {
        self.ensure_connected()?;
        self.catalog_create("namespace", namespace.to_string(), Durability::Hard)?;
        info!(namespace, "created namespace");
        Ok(())
    }

    fn create_collection(&self, collection: &CollectionRef, durability: Durability) -> Result<(), StoreError> {
        self.ensure_connected()?;
        self.catalog_entry("namespace", collection.namespace.clone())?;
        self.catalog_create("collection", collection.to_string(), durability)?;
        self.db.open_tree(collection.to_string())?;
        info!(%collection, ?durability, "created collection");
        Ok(())
    }

    fn update_by_topic(
        &self,
        collection: &CollectionRef,
        topic: &TopicKey,
        update: &DocumentUpdate,
    ) -> Result<usize, StoreError> {
        self.ensure_connected()?;
        let tree = self.collection_tree(collection)?;
        let mut matched = 0;
        for entry in tree.iter() {
            let (key, value) = entry?;
            let mut doc: MessageDocument = match serde_json::from_slice(&value) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(%collection, "skipping undecodable document: {e}");
                    continue;
                }
            };
            if doc.topic != *topic {
                continue;
            }
            update.apply_to(&mut doc);
            tree.insert(key, serde_json::to_vec(&doc)?)?;
            matched += 1;
        }
        self.flush_if_hard(collection, &tree)?;
        Ok(matched)
    }

    fn insert(&self, collection: &CollectionRef, document: &MessageDocument) -> Result<(), StoreError> {
        self.ensure_connected()?;
        let tree = self.collection_tree(collection)?;
        tree.insert(document.id.as_bytes(), serde_json::to_vec(document)?)?;
        self.flush_if_hard(collection, &tree)?;
        Ok(())
    }

    fn watch(&self, collection: &CollectionRef, matcher: TopicMatcher) -> Result<ChangeCursor, StoreError> {
        self.ensure_connected()?;
        let tree = self.collection_tree(collection)?;

        // Register before returning so no write after this call is missed.
        let subscriber = tree.watch_prefix(b"");
        let (tx, rx) = mpsc::unbounded_channel();
        let closed = self.closed.subscribe();
        let cursor = ChangeCursor::new(rx, self.closed.subscribe());
        let feed = ChangeFeed {
            collection: collection.clone(),
            matcher,
            subscriber,
            tx,
            closed,
        };

        thread::Builder::new()
            .name(format!("upsub-feed-{collection}"))
            .spawn(move || feed.run())
            .map_err(|e| StoreError::Connection(format!("failed to start change feed: {e}")))?;

        Ok(cursor)
    }

    fn is_connected(&self) -> bool {
        !*self.closed.borrow()
    }
}

/// Drains one sled subscriber into a cursor's buffer.
struct ChangeFeed {
    collection: CollectionRef,
    matcher: TopicMatcher,
    subscriber: Subscriber,
    tx: mpsc::UnboundedSender<Result<MessageDocument, StoreError>>,
    closed: watch::Receiver<bool>,
}

impl ChangeFeed {
    fn run(mut self) {
        let collection = self.collection.clone();
        debug!(%collection, bindings = %self.matcher, "change feed started");
        loop {
            if *self.closed.borrow() {
                let _ = self.tx.send(Err(StoreError::Disconnected));
                break;
            }
            if self.tx.is_closed() {
                break;
            }
            let value = match self.subscriber.next_timeout(FEED_POLL_INTERVAL) {
                Ok(Event::Insert { value, .. }) => value,
                Ok(Event::Remove { .. }) | Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    let _ = self.tx.send(Err(StoreError::Disconnected));
                    break;
                }
            };
            let doc: MessageDocument = match serde_json::from_slice(&value) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(%collection, "dropping undecodable change: {e}");
                    continue;
                }
            };
            if !self.matcher.matches(&doc.topic) {
                continue;
            }
            if self.tx.send(Ok(doc)).is_err() {
                break;
            }
        }
        debug!(%collection, "change feed stopped");
    }
}

impl fmt::Debug for SledStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SledStore")
            .field("db", &"sled::Db")
            .field("connected", &self.is_connected())
            .finish()
    }
}
