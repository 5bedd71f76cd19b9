//! The `persistence` module is the boundary to the external document store.
//!
//! `upsub` needs only two things from a store: keyed writes to named
//! collections and a filtered stream of change notifications. The
//! `DocumentStore` trait captures exactly that, and `sled_store` provides an
//! implementation on top of the embedded `sled` database, whose trees double
//! as collections and whose prefix subscribers double as change feeds.
//!
//! Notifications are never stored. A `ChangeCursor` is the per-subscriber
//! buffer of pending notifications and disappears with its subscriber.

pub mod sled_store;

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};

use crate::broker::message::{DocumentUpdate, MessageDocument, TopicKey};
use crate::matcher::TopicMatcher;
use crate::utils::error::StoreError;

pub use sled_store::SledStore;

/// Write durability requested for a collection.
///
/// Message delivery is ephemeral, so the mailbox documents rarely need to
/// reach disk before the write is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    #[default]
    Soft,
    Hard,
}

/// Address of a collection inside a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionRef {
    pub namespace: String,
    pub name: String,
}

impl CollectionRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Operations `upsub` requires from a document store connection.
///
/// Implementations must be safe to share between threads; a single
/// connection serves an exchange and all of its topics and queues.
pub trait DocumentStore: Send + Sync + fmt::Debug {
    /// Create a namespace. Fails with `StoreError::AlreadyExists` if present.
    fn create_namespace(&self, namespace: &str) -> Result<(), StoreError>;

    /// Create a collection. Fails with `StoreError::AlreadyExists` if present.
    fn create_collection(
        &self,
        collection: &CollectionRef,
        durability: Durability,
    ) -> Result<(), StoreError>;

    /// Apply `update` to every document whose topic equals `topic`.
    /// Returns the number of documents matched.
    fn update_by_topic(
        &self,
        collection: &CollectionRef,
        topic: &TopicKey,
        update: &DocumentUpdate,
    ) -> Result<usize, StoreError>;

    fn insert(&self, collection: &CollectionRef, document: &MessageDocument)
    -> Result<(), StoreError>;

    /// Start a change feed over `collection`. The matcher is evaluated on the
    /// store side; only inserts and updates whose topic matches are buffered.
    fn watch(
        &self,
        collection: &CollectionRef,
        matcher: TopicMatcher,
    ) -> Result<ChangeCursor, StoreError>;

    fn is_connected(&self) -> bool;
}

/// Receiving end of a change feed.
///
/// Yields documents in the order the store observed the writes. Once the
/// connection goes away the cursor yields a single `StoreError::Disconnected`
/// and then ends; anything still buffered at that point is discarded.
#[derive(Debug)]
pub struct ChangeCursor {
    rx: mpsc::UnboundedReceiver<Result<MessageDocument, StoreError>>,
    closed: watch::Receiver<bool>,
    finished: bool,
}

impl ChangeCursor {
    pub fn new(
        rx: mpsc::UnboundedReceiver<Result<MessageDocument, StoreError>>,
        closed: watch::Receiver<bool>,
    ) -> Self {
        Self {
            rx,
            closed,
            finished: false,
        }
    }

    /// Stop receiving. Pending notifications are dropped.
    pub fn close(&mut self) {
        self.rx.close();
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Stream for ChangeCursor {
    type Item = Result<MessageDocument, StoreError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        if *self.closed.borrow() {
            self.close();
            return Poll::Ready(Some(Err(StoreError::Disconnected)));
        }
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(Ok(doc))) => Poll::Ready(Some(Ok(doc))),
            Poll::Ready(Some(Err(err))) => {
                self.close();
                Poll::Ready(Some(Err(err)))
            }
            // the feed only goes away with the connection
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(Some(Err(StoreError::Disconnected)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests;
