//! # upsub
//!
//! `upsub` implements publish/subscribe on top of a document store that only
//! offers keyed writes and change notifications. There is no broker process
//! and no message log: each topic is a single document whose content is the
//! last message sent, and the change notifications produced by overwriting it
//! are the messages themselves.
//!
//! The store buffers notifications per subscriber, which plays the part of an
//! AMQP queue. Those buffers live only as long as the subscriber: closing a
//! subscription or losing the connection discards anything unread.
//!
//! ## Core Modules
//!
//! - `broker`: `Exchange`, `Topic`, `Queue` and `Subscription`.
//! - `matcher`: compiles bindings (wildcard patterns, tag sets, nested paths,
//!   regexes) into topic predicates.
//! - `persistence`: the `DocumentStore` contract and its `sled` adapter.
//! - `config`: settings loaded from file and environment.
//! - `demo`: content and drivers for the command line demos.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod config;
pub mod demo;
pub mod matcher;
pub mod persistence;
pub mod utils;

pub use broker::{Exchange, Notification, Queue, Subscription, Topic, TopicKey};
pub use matcher::{Binding, TopicMatcher};
pub use persistence::{DocumentStore, Durability, SledStore};
pub use utils::error::{BrokerError, PatternError, StoreError};
