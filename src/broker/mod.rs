//! The broker protocol: exchanges, topics and queues on top of a
//! `DocumentStore`.
//!
//! Public types:
//! - `Exchange`: one collection; setup, publish and filtered change streams.
//! - `Topic`: a key on an exchange that can be published to.
//! - `Queue` / `Subscription`: bindings and the live feed they select.

pub mod exchange;
pub mod message;
pub mod queue;
pub mod topic;

pub use exchange::Exchange;
pub use message::{Notification, TopicKey};
pub use queue::{Queue, Subscription};
pub use topic::Topic;
