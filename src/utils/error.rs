//! The `error` module defines the error types used within `upsub`.
//!
//! Errors are grouped by the layer that raises them: the document store
//! adapter (`StoreError`), the pattern compiler (`PatternError`) and the
//! exchange/topic/queue protocol (`BrokerError`).

use thiserror::Error;

/// Errors reported by a `DocumentStore` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be opened or reached.
    #[error("failed to connect to document store: {0}")]
    Connection(String),

    /// A namespace or collection that was asked to be created already exists.
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: &'static str, name: String },

    /// A namespace or collection was used before being created.
    #[error("{kind} '{name}' does not exist")]
    Missing { kind: &'static str, name: String },

    /// The connection was closed; no further requests or notifications.
    #[error("document store connection is closed")]
    Disconnected,

    #[error("storage backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("document codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether this error only reports that the resource is already present.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }
}

/// Errors raised while compiling binding patterns.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("pattern '{pattern}' has an empty segment")]
    EmptySegment { pattern: String },

    #[error("pattern '{pattern}' has invalid segment '{segment}': wildcards must stand alone")]
    InvalidSegment { pattern: String, segment: String },

    #[error("tag binding needs at least one tag")]
    EmptyTags,

    #[error("invalid nested path {path:?}")]
    InvalidPath { path: Vec<String> },

    #[error("invalid regular expression: {0}")]
    Regex(#[from] regex::Error),

    #[error("nothing to consume, no bindings provided")]
    NoBindings,
}

/// Errors surfaced by `Exchange`, `Topic` and `Queue`.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Creating the namespace or collection failed for a reason other than
    /// it already existing.
    #[error("failed to set up exchange '{exchange}': {source}")]
    Setup {
        exchange: String,
        #[source]
        source: StoreError,
    },

    /// Both the update and the fallback insert failed.
    #[error("failed to publish on topic {topic}: {source}")]
    Publish {
        topic: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// The notification stream was cut off. Messages may have been missed.
    #[error("subscription stream terminated: {0}")]
    Stream(#[source] StoreError),

    #[error("subtopic of non-name topic {0}")]
    NotHierarchical(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T, E = BrokerError> = std::result::Result<T, E>;
