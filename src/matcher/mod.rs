//! Topic matching
//!
//! Compiles queue bindings into predicates over `TopicKey`s. Four binding
//! forms are supported:
//!
//! - `Pattern`: AMQP-style segment wildcards over dot-delimited names.
//!   `*` matches exactly one segment, `#` matches zero or more.
//! - `Tags`: the topic's tag set must contain every bound tag.
//! - `Path`: descend a nested record topic by keys and test the leaf.
//! - `Regex`: a caller-compiled regular expression over name topics.
//!
//! Wildcards only ever match whole segments made of ASCII alphanumerics,
//! `_` and `-`. A lone `#` is the exception and matches every name topic.
//!
//! Compilation is eager so that a malformed binding is reported when it is
//! bound, not when the first notification arrives.

use std::collections::BTreeSet;
use std::fmt;

use regex::Regex;

use crate::broker::message::TopicKey;
use crate::utils::error::PatternError;

/// Character class of one segment matched by `*` or `#`.
const SEGMENT: &str = "[A-Za-z0-9_-]+";

/// A binding as supplied by the caller, before compilation.
#[derive(Debug, Clone)]
pub enum Binding {
    Pattern(String),
    Tags(BTreeSet<String>),
    Path { path: Vec<String>, value: String },
    Regex(Regex),
    Exact(TopicKey),
}

impl Binding {
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Binding::Pattern(pattern.into())
    }

    pub fn tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Binding::Tags(tags.into_iter().map(Into::into).collect())
    }

    pub fn path<I, S>(path: I, value: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Binding::Path {
            path: path.into_iter().map(Into::into).collect(),
            value: value.into(),
        }
    }

    /// Compile `source` as a regular expression binding.
    pub fn regex(source: &str) -> Result<Self, PatternError> {
        Ok(Binding::Regex(Regex::new(source)?))
    }

    pub fn exact(topic: impl Into<TopicKey>) -> Self {
        Binding::Exact(topic.into())
    }
}

impl From<&str> for Binding {
    fn from(pattern: &str) -> Self {
        Binding::Pattern(pattern.to_string())
    }
}

impl From<String> for Binding {
    fn from(pattern: String) -> Self {
        Binding::Pattern(pattern)
    }
}

impl From<Regex> for Binding {
    fn from(regex: Regex) -> Self {
        Binding::Regex(regex)
    }
}

impl From<BTreeSet<String>> for Binding {
    fn from(tags: BTreeSet<String>) -> Self {
        Binding::Tags(tags)
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Pattern(pattern) => write!(f, "{pattern:?}"),
            Binding::Tags(tags) => write!(f, "{}", TopicKey::Tags(tags.clone())),
            Binding::Path { path, value } => {
                for key in path {
                    write!(f, "[{key:?}]")?;
                }
                write!(f, ".contains({value:?})")
            }
            Binding::Regex(regex) => write!(f, "/{}/", regex.as_str()),
            Binding::Exact(topic) => write!(f, "={topic}"),
        }
    }
}

#[derive(Debug, Clone)]
enum Predicate {
    Any,
    Regex(Regex),
    Tags(BTreeSet<String>),
    Path { path: Vec<String>, value: String },
    Exact(TopicKey),
}

/// A validated binding, ready to be evaluated against topics.
#[derive(Debug, Clone)]
pub struct CompiledBinding {
    source: String,
    predicate: Predicate,
}

impl CompiledBinding {
    pub fn compile(binding: Binding) -> Result<Self, PatternError> {
        let source = binding.to_string();
        let predicate = match binding {
            Binding::Pattern(pattern) => {
                let regex = binding_key_to_regex(&pattern)?;
                if regex == MATCH_ALL {
                    Predicate::Any
                } else {
                    Predicate::Regex(Regex::new(&regex)?)
                }
            }
            Binding::Tags(tags) => {
                if tags.is_empty() {
                    return Err(PatternError::EmptyTags);
                }
                Predicate::Tags(tags)
            }
            Binding::Path { path, value } => {
                if path.is_empty() || path.iter().any(String::is_empty) {
                    return Err(PatternError::InvalidPath { path });
                }
                Predicate::Path { path, value }
            }
            Binding::Regex(regex) => Predicate::Regex(regex),
            Binding::Exact(topic) => Predicate::Exact(topic),
        };
        Ok(Self { source, predicate })
    }

    /// Human readable form of the original binding.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, topic: &TopicKey) -> bool {
        match &self.predicate {
            Predicate::Any => topic.as_name().is_some(),
            Predicate::Regex(regex) => topic.as_name().is_some_and(|name| regex.is_match(name)),
            Predicate::Tags(wanted) => match topic {
                TopicKey::Tags(tags) => wanted.is_subset(tags),
                _ => false,
            },
            Predicate::Path { path, value } => path_matches(topic, path, value),
            Predicate::Exact(key) => key == topic,
        }
    }
}

fn path_matches(topic: &TopicKey, path: &[String], value: &str) -> bool {
    let mut node = topic;
    for key in path {
        node = match node {
            TopicKey::Record(fields) => match fields.get(key) {
                Some(child) => child,
                None => return false,
            },
            _ => return false,
        };
    }
    match node {
        TopicKey::Tags(tags) => tags.contains(value),
        TopicKey::Name(name) => name == value,
        TopicKey::Record(_) => false,
    }
}

/// OR-combination of compiled bindings.
#[derive(Debug, Clone, Default)]
pub struct TopicMatcher {
    bindings: Vec<CompiledBinding>,
}

impl TopicMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile every binding, failing on the first malformed one.
    pub fn compile<I, B>(bindings: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = B>,
        B: Into<Binding>,
    {
        let bindings = bindings
            .into_iter()
            .map(|b| CompiledBinding::compile(b.into()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { bindings })
    }

    pub fn push(&mut self, binding: CompiledBinding) {
        self.bindings.push(binding);
    }

    /// Append all bindings of `other`.
    pub fn merge(&mut self, other: TopicMatcher) {
        self.bindings.extend(other.bindings);
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(CompiledBinding::source)
    }

    /// True if any binding matches. An empty matcher matches nothing.
    pub fn matches(&self, topic: &TopicKey) -> bool {
        self.bindings.iter().any(|b| b.matches(topic))
    }
}

impl fmt::Display for TopicMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources: Vec<&str> = self.sources().collect();
        f.write_str(&sources.join(" | "))
    }
}

const MATCH_ALL: &str = "^(?s:.*)$";

enum Token<'a> {
    Literal(&'a str),
    One,
    Many,
}

fn tokenize(pattern: &str) -> Result<Vec<Token<'_>>, PatternError> {
    let mut tokens = Vec::new();
    if pattern.is_empty() {
        return Ok(tokens);
    }
    for segment in pattern.split('.') {
        let token = match segment {
            "" => {
                return Err(PatternError::EmptySegment {
                    pattern: pattern.to_string(),
                });
            }
            "*" => Token::One,
            "#" => Token::Many,
            s if s.contains(['*', '#']) => {
                return Err(PatternError::InvalidSegment {
                    pattern: pattern.to_string(),
                    segment: s.to_string(),
                });
            }
            s => Token::Literal(s),
        };
        // `#.#` is the same as `#`
        if matches!(token, Token::Many) && matches!(tokens.last(), Some(Token::Many)) {
            continue;
        }
        tokens.push(token);
    }
    Ok(tokens)
}

/// Translate an AMQP binding key into an anchored regular expression.
pub fn binding_key_to_regex(pattern: &str) -> Result<String, PatternError> {
    let tokens = tokenize(pattern)?;
    if let [Token::Many] = tokens.as_slice() {
        return Ok(MATCH_ALL.to_string());
    }

    let leading_many = matches!(tokens.first(), Some(Token::Many));
    let mut out = String::from("^");
    for (i, token) in tokens.iter().enumerate() {
        // A leading `#` carries its own trailing separator.
        let separator = if i == 0 || (i == 1 && leading_many) {
            ""
        } else {
            r"\."
        };
        match token {
            Token::Many if i == 0 => out.push_str(&format!(r"(?:{SEGMENT}\.)*")),
            Token::Many => out.push_str(&format!(r"(?:\.{SEGMENT})*")),
            Token::One => {
                out.push_str(separator);
                out.push_str(SEGMENT);
            }
            Token::Literal(literal) => {
                out.push_str(separator);
                out.push_str(&regex::escape(literal));
            }
        }
    }
    out.push('$');
    Ok(out)
}

#[cfg(test)]
mod tests;
