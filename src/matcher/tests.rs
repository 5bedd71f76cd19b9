use super::{Binding, CompiledBinding, TopicMatcher, binding_key_to_regex};
use crate::broker::message::TopicKey;
use crate::utils::error::PatternError;

fn matches(pattern: &str, topic: &str) -> bool {
    CompiledBinding::compile(Binding::pattern(pattern))
        .unwrap()
        .matches(&TopicKey::name(topic))
}

#[test]
fn test_literal_pattern_matches_only_itself() {
    let cases = ["a", "a.b", "weather.us.temp", "x.y.z.w"];
    for pattern in cases {
        for topic in cases {
            assert_eq!(matches(pattern, topic), pattern == topic, "{pattern} vs {topic}");
        }
    }
    assert!(!matches("a.b", "a.bc"));
    assert!(!matches("a.b", "a.b.c"));
}

#[test]
fn test_literal_segments_are_escaped() {
    assert!(matches("a+b.c", "a+b.c"));
    assert!(!matches("a+b.c", "aab.c"));
    assert!(matches("fights.supervillains.Lex Luthor", "fights.supervillains.Lex Luthor"));
}

#[test]
fn test_star_matches_exactly_one_segment() {
    assert!(matches("a.*.c", "a.b.c"));
    assert!(matches("a.*.c", "a.x.c"));
    assert!(!matches("a.*.c", "a.b.b.c"));
    assert!(!matches("a.*.c", "a.c"));
    assert!(matches("*", "anything"));
    assert!(!matches("*", ""));
    assert!(!matches("*", "a.b"));
}

#[test]
fn test_hash_matches_zero_or_more_segments() {
    assert!(matches("a.#", "a"));
    assert!(matches("a.#", "a.b"));
    assert!(matches("a.#", "a.b.c"));
    assert!(!matches("a.#", "ab"));
    assert!(!matches("a.#", "x.a"));
}

#[test]
fn test_hash_in_leading_and_middle_position() {
    assert!(matches("#.temp", "temp"));
    assert!(matches("#.temp", "weather.us.temp"));
    assert!(!matches("#.temp", "weather.temperature"));
    assert!(matches("weather.#.temp", "weather.temp"));
    assert!(matches("weather.#.temp", "weather.us.ca.temp"));
    assert!(!matches("weather.#.temp", "weathertemp"));
    assert!(matches("#.#.a", "x.a"));
}

#[test]
fn test_lone_hash_matches_every_name_topic() {
    assert!(matches("#", ""));
    assert!(matches("#", "a"));
    assert!(matches("#", "a.b.c"));
    assert!(matches("#", "fights.supervillains.Lex Luthor"));

    let binding = CompiledBinding::compile(Binding::pattern("#")).unwrap();
    assert!(!binding.matches(&TopicKey::tags(["a"])));
}

#[test]
fn test_empty_pattern_matches_only_empty_topic() {
    assert!(matches("", ""));
    assert!(!matches("", "a"));
}

#[test]
fn test_binding_key_to_regex_is_anchored() {
    assert_eq!(binding_key_to_regex("a.b").unwrap(), r"^a\.b$");
    assert_eq!(
        binding_key_to_regex("a.*").unwrap(),
        r"^a\.[A-Za-z0-9_-]+$"
    );
    assert_eq!(
        binding_key_to_regex("a.#").unwrap(),
        r"^a(?:\.[A-Za-z0-9_-]+)*$"
    );
    assert_eq!(
        binding_key_to_regex("#.a").unwrap(),
        r"^(?:[A-Za-z0-9_-]+\.)*a$"
    );
}

#[test]
fn test_malformed_patterns_are_rejected() {
    for pattern in ["a..b", ".a", "a.", "."] {
        let err = CompiledBinding::compile(Binding::pattern(pattern)).unwrap_err();
        assert!(matches!(err, PatternError::EmptySegment { .. }), "{pattern}");
    }
    for pattern in ["a*", "a.#b", "a.*.c*"] {
        let err = CompiledBinding::compile(Binding::pattern(pattern)).unwrap_err();
        assert!(matches!(err, PatternError::InvalidSegment { .. }), "{pattern}");
    }
}

#[test]
fn test_tags_binding_requires_superset() {
    let binding = CompiledBinding::compile(Binding::tags(["Batman", "fights"])).unwrap();
    assert!(binding.matches(&TopicKey::tags(["fights", "Batman"])));
    assert!(binding.matches(&TopicKey::tags(["Joker", "fights", "Batman"])));
    assert!(!binding.matches(&TopicKey::tags(["Batman"])));
    assert!(!binding.matches(&TopicKey::name("Batman.fights")));
}

#[test]
fn test_empty_tags_binding_is_rejected() {
    let err = CompiledBinding::compile(Binding::tags(Vec::<String>::new())).unwrap_err();
    assert!(matches!(err, PatternError::EmptyTags));
}

#[test]
fn test_path_binding_descends_nested_record() {
    let topic = TopicKey::record([(
        "fights",
        TopicKey::record([
            ("superheroes", TopicKey::tags(["Batman", "Superman"])),
            ("leader", TopicKey::name("Joker")),
        ]),
    )]);

    let contains = CompiledBinding::compile(Binding::path(["fights", "superheroes"], "Batman")).unwrap();
    assert!(contains.matches(&topic));

    let equals = CompiledBinding::compile(Binding::path(["fights", "leader"], "Joker")).unwrap();
    assert!(equals.matches(&topic));

    let missing = CompiledBinding::compile(Binding::path(["events", "superheroes"], "Batman")).unwrap();
    assert!(!missing.matches(&topic));

    let too_deep =
        CompiledBinding::compile(Binding::path(["fights", "leader", "x"], "Joker")).unwrap();
    assert!(!too_deep.matches(&topic));
}

#[test]
fn test_invalid_paths_are_rejected() {
    let empty = CompiledBinding::compile(Binding::path(Vec::<String>::new(), "x")).unwrap_err();
    assert!(matches!(empty, PatternError::InvalidPath { .. }));

    let blank = CompiledBinding::compile(Binding::path(["a", ""], "x")).unwrap_err();
    assert!(matches!(blank, PatternError::InvalidPath { .. }));
}

#[test]
fn test_regex_binding() {
    let binding = CompiledBinding::compile(Binding::regex(r"^fights\.(.+)\.Batman$").unwrap()).unwrap();
    assert!(binding.matches(&TopicKey::name("fights.superheroes.Batman")));
    assert!(!binding.matches(&TopicKey::name("events.superheroes.Batman")));

    assert!(matches!(Binding::regex("(unclosed"), Err(PatternError::Regex(_))));
}

#[test]
fn test_matcher_is_or_of_bindings() {
    let matcher = TopicMatcher::compile(["weather.us.#", "weather.uk.temp"]).unwrap();
    assert_eq!(matcher.len(), 2);
    assert!(matcher.matches(&TopicKey::name("weather.us.ca.temp")));
    assert!(matcher.matches(&TopicKey::name("weather.uk.temp")));
    assert!(!matcher.matches(&TopicKey::name("weather.uk.rain")));
}

#[test]
fn test_empty_matcher_matches_nothing() {
    let matcher = TopicMatcher::new();
    assert!(matcher.is_empty());
    assert!(!matcher.matches(&TopicKey::name("a")));
}

#[test]
fn test_matcher_compile_fails_fast() {
    let err = TopicMatcher::compile(["a.b", "a..b"]).unwrap_err();
    assert!(matches!(err, PatternError::EmptySegment { .. }));
}

#[test]
fn test_matching_is_deterministic() {
    let matcher = TopicMatcher::compile(["a.*.c"]).unwrap();
    let topic = TopicKey::name("a.b.c");
    for _ in 0..3 {
        assert!(matcher.matches(&topic));
    }
}

#[test]
fn test_matcher_display_lists_sources() {
    let matcher = TopicMatcher::compile(["a.#", "b"]).unwrap();
    assert_eq!(matcher.to_string(), r#""a.#" | "b""#);
}
