//! Message definitions for the broker
//!
//! A topic owns exactly one `MessageDocument` in its exchange's collection.
//! The document is a mailbox trigger, not a log: every publish overwrites it,
//! and it is the resulting change notification that carries the message.
//!
//! Notes on fields:
//! - `id`: store-side identity of the document, independent of the topic
//! - `topic`: the `TopicKey` used for routing
//! - `payload`: opaque JSON value
//! - `updated_at`: milliseconds since UNIX epoch; set on every publish
//! - `change_id`: fresh for every write so that repeating the same payload
//!   still counts as a mutation

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Routing key of a topic.
///
/// Serialized untagged: a JSON string is a `Name`, an array of strings is a
/// `Tags` set and an object is a nested `Record`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TopicKey {
    /// Dot-delimited hierarchical name, e.g. `weather.us.temp`.
    Name(String),
    /// Sorted tag set; two keys with the same tags are the same topic.
    Tags(BTreeSet<String>),
    /// Structured key, e.g. `{"fights": {"superheroes": ["Batman"]}}`.
    Record(BTreeMap<String, TopicKey>),
}

impl TopicKey {
    pub fn name(name: impl Into<String>) -> Self {
        TopicKey::Name(name.into())
    }

    pub fn tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TopicKey::Tags(tags.into_iter().map(Into::into).collect())
    }

    pub fn record<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, TopicKey)>,
        K: Into<String>,
    {
        TopicKey::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            TopicKey::Name(name) => Some(name),
            _ => None,
        }
    }
}

impl From<&str> for TopicKey {
    fn from(name: &str) -> Self {
        TopicKey::Name(name.to_string())
    }
}

impl From<String> for TopicKey {
    fn from(name: String) -> Self {
        TopicKey::Name(name)
    }
}

impl From<BTreeSet<String>> for TopicKey {
    fn from(tags: BTreeSet<String>) -> Self {
        TopicKey::Tags(tags)
    }
}

impl From<BTreeMap<String, TopicKey>> for TopicKey {
    fn from(fields: BTreeMap<String, TopicKey>) -> Self {
        TopicKey::Record(fields)
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicKey::Name(name) => f.write_str(name),
            TopicKey::Tags(tags) => {
                let tags: Vec<String> = tags.iter().map(|t| format!("#{t}")).collect();
                f.write_str(&tags.join(" "))
            }
            TopicKey::Record(fields) => {
                f.write_str("{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

/// The stored mailbox document for one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDocument {
    pub id: Uuid,
    pub topic: TopicKey,
    pub payload: Value,
    pub updated_at: i64,
    pub change_id: Uuid,
}

impl MessageDocument {
    /// Build a fresh document for a topic that has no document yet.
    pub fn new(topic: TopicKey, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic,
            payload,
            updated_at: chrono::Utc::now().timestamp_millis(),
            change_id: Uuid::new_v4(),
        }
    }
}

/// The fields written to an existing document on publish.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentUpdate {
    pub payload: Value,
    pub updated_at: i64,
    pub change_id: Uuid,
}

impl DocumentUpdate {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            updated_at: chrono::Utc::now().timestamp_millis(),
            change_id: Uuid::new_v4(),
        }
    }

    /// Overwrite the mutable fields of `doc`. Identity and topic are kept.
    pub fn apply_to(&self, doc: &mut MessageDocument) {
        doc.payload = self.payload.clone();
        doc.updated_at = self.updated_at;
        doc.change_id = self.change_id;
    }

    /// Insert form of this update, used when no document matched.
    pub fn into_document(self, topic: TopicKey) -> MessageDocument {
        MessageDocument {
            id: Uuid::new_v4(),
            topic,
            payload: self.payload,
            updated_at: self.updated_at,
            change_id: self.change_id,
        }
    }
}

/// A delivered message: one document mutation seen by one queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub topic: TopicKey,
    pub payload: Value,
}

impl From<MessageDocument> for Notification {
    fn from(doc: MessageDocument) -> Self {
        Self {
            topic: doc.topic,
            payload: doc.payload,
        }
    }
}
