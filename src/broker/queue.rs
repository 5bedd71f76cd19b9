//! Queues and subscriptions
//!
//! A `Queue` collects bindings; `consume` turns them into a `Subscription`,
//! the live feed of matching notifications. There is no named, durable queue
//! on the store side: the subscription's buffer is the queue, and it is gone
//! once the subscription is closed or the connection drops.
//!
//! Bindings are captured when `consume` is called. Binding more patterns
//! afterwards does not change an open subscription; it only affects the
//! next call to `consume`.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tracing::debug;

use crate::broker::exchange::Exchange;
use crate::broker::message::Notification;
use crate::matcher::{Binding, CompiledBinding, TopicMatcher};
use crate::persistence::ChangeCursor;
use crate::utils::error::{BrokerError, Result};

#[derive(Debug, Clone)]
pub struct Queue {
    exchange: Arc<Exchange>,
    matcher: TopicMatcher,
}

impl Queue {
    /// A queue with no bindings.
    pub fn new(exchange: Arc<Exchange>) -> Self {
        Self {
            exchange,
            matcher: TopicMatcher::new(),
        }
    }

    pub fn exchange(&self) -> &Arc<Exchange> {
        &self.exchange
    }

    /// Add a binding. Malformed bindings are rejected here.
    pub fn bind(&mut self, binding: impl Into<Binding>) -> Result<&mut Self> {
        let binding = CompiledBinding::compile(binding.into())?;
        debug!(binding = binding.source(), "binding");
        self.matcher.push(binding);
        Ok(self)
    }

    /// Add several bindings. Either all are added or, on error, none.
    pub fn bind_all<I, B>(&mut self, bindings: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = B>,
        B: Into<Binding>,
    {
        let compiled = TopicMatcher::compile(bindings)?;
        if !compiled.is_empty() {
            debug!(bindings = %compiled, "binding");
        }
        self.matcher.merge(compiled);
        Ok(self)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &str> {
        self.matcher.sources()
    }

    /// Start consuming messages that match any of the current bindings.
    pub fn consume(&self) -> Result<Subscription> {
        self.exchange.open_filtered_stream(self.matcher.clone())
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Queue({})", self.matcher)
    }
}

/// Live, ordered feed of notifications for one queue.
///
/// The stream never ends on its own. It ends after `close`, or after
/// yielding a single `BrokerError::Stream` when the connection is lost.
#[derive(Debug)]
pub struct Subscription {
    cursor: ChangeCursor,
    matcher: TopicMatcher,
}

impl Subscription {
    pub(crate) fn new(cursor: ChangeCursor, matcher: TopicMatcher) -> Self {
        Self { cursor, matcher }
    }

    /// Wait for the next notification.
    pub async fn next_message(&mut self) -> Option<Result<Notification>> {
        self.next().await
    }

    /// Stop consuming. Notifications not yet received are discarded.
    pub fn close(&mut self) {
        debug!(bindings = %self.matcher, "closing subscription");
        self.cursor.close();
    }

    pub fn bindings(&self) -> impl Iterator<Item = &str> {
        self.matcher.sources()
    }
}

impl Stream for Subscription {
    type Item = Result<Notification>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.cursor.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(doc))) => Poll::Ready(Some(Ok(doc.into()))),
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(BrokerError::Stream(e)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
