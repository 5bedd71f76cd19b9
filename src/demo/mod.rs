//! Command line demos.
//!
//! Each demo runs a publisher and a subscriber against one exchange in the
//! same process: the publisher emits random superhero headlines and the
//! subscriber binds a random pattern and prints what it receives. `relay`
//! is the interactive variant, publishing lines typed on stdin.

pub mod content;

use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::{IteratorRandom, SliceRandom};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::broker::message::{Notification, TopicKey};
use crate::broker::{Exchange, Subscription};
use crate::matcher::Binding;
use crate::utils::error::{BrokerError, PatternError};

pub use content::{DemoContent, TopicParts};

#[derive(Debug, Error)]
pub enum DemoError {
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("demo content has an empty word list")]
    EmptyContent,

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PatternError> for DemoError {
    fn from(err: PatternError) -> Self {
        DemoError::Broker(err.into())
    }
}

/// Which kind of topic the demo publishes and binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DemoKind {
    /// `category.chartype.character` names, bound with a wildcard pattern
    Pattern,
    /// `category.chartype.character` names, bound with a regular expression
    Regex,
    /// tag set topics, bound by required tags
    Tags,
    /// nested record topics, bound by a path into the record
    Hierarchy,
}

impl DemoKind {
    /// Name of the exchange the demo uses.
    pub fn exchange_name(self) -> &'static str {
        match self {
            DemoKind::Pattern => "pattern_demo",
            DemoKind::Regex => "regex_demo",
            DemoKind::Tags => "tags_demo",
            DemoKind::Hierarchy => "hierarchy_demo",
        }
    }
}

/// How long a demo runs and how fast it publishes.
#[derive(Debug, Clone)]
pub struct DemoOptions {
    /// Stop after this many received messages. `None` runs until interrupted.
    pub count: Option<usize>,
    pub interval: Duration,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            count: None,
            interval: Duration::from_millis(500),
        }
    }
}

/// Pick the subscriber's binding for `kind`, with a description for display.
pub fn random_binding(
    kind: DemoKind,
    content: &DemoContent,
    rng: &mut StdRng,
) -> Result<(Binding, String), DemoError> {
    let parts = content.random_topic(rng).ok_or(DemoError::EmptyContent)?;
    let binding = match kind {
        DemoKind::Pattern => {
            let pattern = [
                format!("{}.*.{}", parts.category, parts.character),
                format!("#.{}", parts.character),
                format!("{}.{}.#", parts.category, parts.chartype),
            ]
            .choose(rng)
            .cloned()
            .ok_or(DemoError::EmptyContent)?;
            Binding::pattern(pattern)
        }
        DemoKind::Regex => {
            // Avoid regexes like `fights\.(.+)\.Batman` where the chartype
            // can only be one thing.
            let category = [regex::escape(&parts.category), "(.+)".to_string()]
                .choose(rng)
                .cloned()
                .ok_or(DemoError::EmptyContent)?;
            let character = [regex::escape(&parts.character), "(.+)".to_string()]
                .choose(rng)
                .cloned()
                .ok_or(DemoError::EmptyContent)?;
            let rest = [
                format!(r"{}\.{character}", regex::escape(&parts.chartype)),
                "(.+)".to_string(),
            ]
            .choose(rng)
            .cloned()
            .ok_or(DemoError::EmptyContent)?;
            Binding::regex(&format!(r"^{category}\.{rest}$"))?
        }
        DemoKind::Tags => {
            let tags = parts.tags().into_iter().choose_multiple(rng, 2);
            Binding::tags(tags)
        }
        DemoKind::Hierarchy => Binding::path([parts.category, parts.chartype], parts.character),
    };
    let description = binding.to_string();
    Ok((binding, description))
}

/// A random topic and payload to publish for `kind`.
pub fn random_message(
    kind: DemoKind,
    content: &DemoContent,
    rng: &mut StdRng,
) -> Option<(TopicKey, String)> {
    match kind {
        DemoKind::Pattern | DemoKind::Regex => {
            let parts = content.random_topic(rng)?;
            let headline = content.headline(&parts.category, rng)?;
            Some((TopicKey::name(parts.to_name()), headline))
        }
        DemoKind::Tags => {
            let tags = content.random_tags(rng)?;
            let headline = content.any_headline(rng)?;
            Some((TopicKey::Tags(tags), headline))
        }
        DemoKind::Hierarchy => content.random_hierarchy(rng),
    }
}

fn print_banner(text: &str) {
    let rule = "=".repeat(text.len());
    println!("{rule}\n{text}\n{rule}\n");
}

fn print_notification(notification: &Notification) {
    match &notification.payload {
        serde_json::Value::String(text) => println!("[{}] received:\n    {text}", notification.topic),
        other => println!("[{}] received:\n    {other}", notification.topic),
    }
}

/// Run publisher and subscriber for `kind` until `options.count` messages
/// have been received, or forever.
pub async fn run(
    exchange: Arc<Exchange>,
    kind: DemoKind,
    content: DemoContent,
    options: DemoOptions,
) -> Result<usize, DemoError> {
    if !content.is_usable() {
        return Err(DemoError::EmptyContent);
    }
    let mut rng = StdRng::from_entropy();
    let (binding, description) = random_binding(kind, &content, &mut rng)?;
    let mut subscription = exchange.queue([binding])?.consume()?;
    let banner = format!("Subscribed to: {description}");
    print_banner(&banner);

    let publisher = {
        let exchange = Arc::clone(&exchange);
        let interval = options.interval;
        tokio::spawn(async move {
            let mut rng = StdRng::from_entropy();
            loop {
                let Some((topic, payload)) = random_message(kind, &content, &mut rng) else {
                    break;
                };
                info!(%topic, "publishing");
                if let Err(e) = exchange.publish(&topic, payload) {
                    warn!("publisher stopped: {e}");
                    break;
                }
                tokio::time::sleep(interval).await;
            }
        })
    };

    let received = receive(&mut subscription, options.count, &banner).await;
    publisher.abort();
    received
}

async fn receive(
    subscription: &mut Subscription,
    count: Option<usize>,
    banner: &str,
) -> Result<usize, DemoError> {
    let mut received = 0;
    while count.is_none_or(|limit| received < limit) {
        match subscription.next_message().await {
            Some(Ok(notification)) => {
                print_notification(&notification);
                received += 1;
                if received % 10 == 0 {
                    // reminder of what we're subscribed to
                    print_banner(banner);
                }
            }
            Some(Err(e)) => return Err(e.into()),
            None => break,
        }
    }
    subscription.close();
    Ok(received)
}

/// Subscribe to `patterns` and publish every `<topic> <message>` line read
/// from stdin, printing everything the subscription receives.
pub async fn relay(exchange: Arc<Exchange>, patterns: Vec<String>) -> Result<(), DemoError> {
    let mut subscription = exchange.queue(patterns)?.consume()?;
    let bindings: Vec<&str> = subscription.bindings().collect();
    info!("listening for patterns: {}", bindings.join(", "));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_relay_line(&line) {
                    Some((topic, message)) => exchange.topic(topic).publish(message)?,
                    None => println!("usage: <topic> <message>"),
                }
            }
            message = subscription.next_message() => match message {
                Some(Ok(notification)) => print_notification(&notification),
                Some(Err(e)) => return Err(e.into()),
                None => break,
            },
        }
    }
    subscription.close();
    Ok(())
}

/// Split `weather.us.temp 74` into topic and message.
pub fn parse_relay_line(line: &str) -> Option<(&str, &str)> {
    let (topic, message) = line.trim().split_once(char::is_whitespace)?;
    let message = message.trim();
    if topic.is_empty() || message.is_empty() {
        return None;
    }
    Some((topic, message))
}
