//! Exchange
//!
//! An exchange owns one collection in the document store. Publishing writes
//! the topic's mailbox document; consuming watches the collection for writes
//! whose topic matches a queue's bindings.
//!
//! Concurrency notes:
//! - Setup is idempotent and tolerant of racing creators: a namespace or
//!   collection that already exists is not an error. The ready flag is only
//!   set once both exist, after which setup is skipped.
//! - Publish is update-then-insert. Two publishers hitting a topic that has
//!   no document yet can both fall through to the insert and leave two
//!   documents for one topic. Every later publish then updates both and
//!   subscribers receive that topic's messages twice. This is accepted: the
//!   store contract has no atomic upsert to close the gap.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::broker::message::{DocumentUpdate, TopicKey};
use crate::broker::queue::{Queue, Subscription};
use crate::broker::topic::Topic;
use crate::config::ExchangeSettings;
use crate::matcher::{Binding, TopicMatcher};
use crate::persistence::{CollectionRef, DocumentStore, Durability};
use crate::utils::error::{BrokerError, PatternError, Result, StoreError};

#[derive(Debug)]
pub struct Exchange {
    collection: CollectionRef,
    durability: Durability,
    store: Arc<dyn DocumentStore>,
    ready: AtomicBool,
}

impl Exchange {
    /// Create an exchange backed by collection `name` in `namespace`.
    /// Nothing is created in the store until first use.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            collection: CollectionRef::new(namespace, name),
            durability: Durability::default(),
            store,
            ready: AtomicBool::new(false),
        }
    }

    pub fn from_settings(store: Arc<dyn DocumentStore>, settings: &ExchangeSettings) -> Self {
        Self::new(store, settings.namespace.clone(), settings.name.clone())
            .with_durability(settings.durability)
    }

    pub fn with_durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    pub fn name(&self) -> &str {
        &self.collection.name
    }

    pub fn namespace(&self) -> &str {
        &self.collection.namespace
    }

    pub fn collection(&self) -> &CollectionRef {
        &self.collection
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Handle for publishing on `key`.
    pub fn topic(self: &Arc<Self>, key: impl Into<TopicKey>) -> Topic {
        Topic::new(Arc::clone(self), key)
    }

    /// New queue on this exchange with the given bindings.
    pub fn queue<I, B>(self: &Arc<Self>, bindings: I) -> Result<Queue>
    where
        I: IntoIterator<Item = B>,
        B: Into<Binding>,
    {
        let mut queue = Queue::new(Arc::clone(self));
        queue.bind_all(bindings)?;
        Ok(queue)
    }

    /// Make sure the namespace and collection exist.
    pub fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }

        let namespace = self.store.create_namespace(&self.collection.namespace);
        self.tolerate_existing(namespace)?;

        let collection = self.store.create_collection(&self.collection, self.durability);
        self.tolerate_existing(collection)?;

        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    fn tolerate_existing(&self, result: std::result::Result<(), StoreError>) -> Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_already_exists() => {
                debug!("{e}, moving on");
                Ok(())
            }
            Err(source) => Err(BrokerError::Setup {
                exchange: self.collection.to_string(),
                source,
            }),
        }
    }

    /// Publish `payload` on `topic`.
    pub fn publish(&self, topic: &TopicKey, payload: impl Serialize) -> Result<()> {
        self.ensure_ready()?;

        let payload = serde_json::to_value(payload).map_err(|e| BrokerError::Publish {
            topic: topic.to_string(),
            source: e.into(),
        })?;
        let update = DocumentUpdate::new(payload);

        match self.store.update_by_topic(&self.collection, topic, &update) {
            Ok(0) => {}
            Ok(1) => {
                debug!(exchange = %self, %topic, "published");
                return Ok(());
            }
            Ok(documents) => {
                debug!(exchange = %self, %topic, documents, "published to duplicated topic");
                return Ok(());
            }
            Err(e) => warn!(exchange = %self, %topic, "update failed, trying insert: {e}"),
        }

        // No document yet. A concurrent first publish may insert one too.
        let document = update.into_document(topic.clone());
        self.store
            .insert(&self.collection, &document)
            .map_err(|source| BrokerError::Publish {
                topic: topic.to_string(),
                source,
            })?;
        debug!(exchange = %self, %topic, "published to new topic");
        Ok(())
    }

    /// Open a change stream of every write whose topic satisfies `matcher`.
    pub fn open_filtered_stream(&self, matcher: TopicMatcher) -> Result<Subscription> {
        if matcher.is_empty() {
            return Err(PatternError::NoBindings.into());
        }
        self.ensure_ready()?;

        info!(exchange = %self, bindings = %matcher, "listening");
        let cursor = self
            .store
            .watch(&self.collection, matcher.clone())
            .map_err(BrokerError::Stream)?;
        Ok(Subscription::new(cursor, matcher))
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Exchange({})", self.collection.name)
    }
}
