//! Word lists for the demos.
//!
//! Everything random in the demos is drawn from a `DemoContent` value so that
//! callers (and tests) can supply their own lists.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use rand::seq::{IteratorRandom, SliceRandom};

use crate::broker::message::TopicKey;

const TEAMUPS: &[&str] = &[
    "You'll never guess who's teaming up",
    "A completely one-sided fight between superheroes",
    "Sidekick goes on rampage. Hundreds given parking tickets",
    "Local politician warns of pairing between villains",
    "Unexpected coalition teams up to take on opponents",
];

const FIGHTS: &[&str] = &[
    "A fight rages between combatants",
    "Tussle between mighty foes continues",
    "All out war in the streets between battling heroes",
    "City's greatest hero defeated!",
    "Villain locked in minimum security prison after defeat",
];

const EVENTS: &[&str] = &[
    "Scientists accidentally thaw a T-Rex and release it",
    "Time vortex opens over downtown",
    "EMP turns out the lights. You'll never guess who turned them back on",
    "Inter-dimensional sludge released. Who can contain it?",
    "Super computer-virus disables all police cars. City helpless.",
];

/// Headline categories and character groups used to build topics.
#[derive(Debug, Clone)]
pub struct DemoContent {
    /// category -> headlines
    pub categories: BTreeMap<String, Vec<String>>,
    /// character type -> characters
    pub characters: BTreeMap<String, Vec<String>>,
}

/// The three parts of a flat demo topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicParts {
    pub category: String,
    pub chartype: String,
    pub character: String,
}

impl TopicParts {
    pub fn to_name(&self) -> String {
        format!("{}.{}.{}", self.category, self.chartype, self.character)
    }

    pub fn tags(&self) -> [String; 3] {
        [
            self.category.clone(),
            self.chartype.clone(),
            self.character.clone(),
        ]
    }
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for DemoContent {
    fn default() -> Self {
        let categories = BTreeMap::from([
            ("teamups".to_string(), owned(TEAMUPS)),
            ("fights".to_string(), owned(FIGHTS)),
            ("events".to_string(), owned(EVENTS)),
        ]);
        let characters = BTreeMap::from([
            (
                "superheroes".to_string(),
                owned(&["Batman", "Superman", "CaptainAmerica"]),
            ),
            (
                "supervillains".to_string(),
                owned(&["Joker", "LexLuthor", "RedSkull"]),
            ),
            (
                "sidekicks".to_string(),
                owned(&["Robin", "JimmyOlsen", "BuckyBarnes"]),
            ),
        ]);
        Self {
            categories,
            characters,
        }
    }
}

impl DemoContent {
    /// True if every list has at least one entry.
    pub fn is_usable(&self) -> bool {
        !self.categories.is_empty()
            && !self.characters.is_empty()
            && self.categories.values().all(|v| !v.is_empty())
            && self.characters.values().all(|v| !v.is_empty())
    }

    pub fn random_topic<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<TopicParts> {
        let category = self.categories.keys().choose(rng)?;
        let (chartype, characters) = self.characters.iter().choose(rng)?;
        let character = characters.choose(rng)?;
        Some(TopicParts {
            category: category.clone(),
            chartype: chartype.clone(),
            character: character.clone(),
        })
    }

    /// A headline from `category`.
    pub fn headline<R: Rng + ?Sized>(&self, category: &str, rng: &mut R) -> Option<String> {
        self.categories.get(category)?.choose(rng).cloned()
    }

    /// A headline from any category.
    pub fn any_headline<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        self.categories.values().flatten().choose(rng).cloned()
    }

    /// Union of two random topics' parts, as a tag set.
    pub fn random_tags<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<BTreeSet<String>> {
        let mut tags = BTreeSet::new();
        for _ in 0..2 {
            tags.extend(self.random_topic(rng)?.tags());
        }
        Some(tags)
    }

    /// A nested topic `{category: {chartype: [characters]}}` together with a
    /// headline from one of its categories.
    pub fn random_hierarchy<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(TopicKey, String)> {
        let mut topic = BTreeMap::new();
        let mut headlines = Vec::new();

        let count = rng.gen_range(1..=2).min(self.categories.len());
        for (category, lines) in self.categories.iter().choose_multiple(rng, count) {
            headlines.extend(lines.iter().cloned());
            let mut chartypes = BTreeMap::new();
            let count = rng.gen_range(1..=2).min(self.characters.len());
            for (chartype, characters) in self.characters.iter().choose_multiple(rng, count) {
                let count = rng.gen_range(1..=2).min(characters.len());
                let picked = characters.iter().cloned().choose_multiple(rng, count);
                chartypes.insert(chartype.clone(), TopicKey::tags(picked));
            }
            topic.insert(category.clone(), TopicKey::Record(chartypes));
        }

        let headline = headlines.choose(rng)?.clone();
        Some((TopicKey::Record(topic), headline))
    }
}
