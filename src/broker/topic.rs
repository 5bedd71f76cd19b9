//! Topic handles
//!
//! A `Topic` is an address: one key on one exchange. It keeps no state of its
//! own and every publish goes straight to the exchange.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::broker::exchange::Exchange;
use crate::broker::message::TopicKey;
use crate::broker::queue::Queue;
use crate::matcher::Binding;
use crate::utils::error::{BrokerError, Result};

#[derive(Debug, Clone)]
pub struct Topic {
    key: TopicKey,
    exchange: Arc<Exchange>,
}

impl Topic {
    pub fn new(exchange: Arc<Exchange>, key: impl Into<TopicKey>) -> Self {
        Self {
            key: key.into(),
            exchange,
        }
    }

    pub fn key(&self) -> &TopicKey {
        &self.key
    }

    pub fn exchange(&self) -> &Arc<Exchange> {
        &self.exchange
    }

    /// Publish a payload on this topic.
    pub fn publish(&self, payload: impl Serialize) -> Result<()> {
        self.exchange.publish(&self.key, payload)
    }

    /// Child topic `<self>.<name>`. Only name topics have children.
    pub fn subtopic(&self, name: &str) -> Result<Topic> {
        match &self.key {
            TopicKey::Name(parent) if parent.is_empty() => {
                Ok(Topic::new(Arc::clone(&self.exchange), name))
            }
            TopicKey::Name(parent) => Ok(Topic::new(
                Arc::clone(&self.exchange),
                format!("{parent}.{name}"),
            )),
            other => Err(BrokerError::NotHierarchical(other.to_string())),
        }
    }

    /// Queue receiving this topic and all of its subtopics.
    pub fn queue(&self) -> Result<Queue> {
        let mut queue = Queue::new(Arc::clone(&self.exchange));
        queue.bind(self)?;
        Ok(queue)
    }
}

impl From<&Topic> for Binding {
    fn from(topic: &Topic) -> Self {
        match &topic.key {
            TopicKey::Name(name) if name.is_empty() => Binding::pattern("#"),
            TopicKey::Name(name) => Binding::pattern(format!("{name}.#")),
            other => Binding::Exact(other.clone()),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Topic({})", self.key)
    }
}
