//! Canned replies for trivial greetings.
//!
//! A small pure matcher that short-circuits the backend for phrases like
//! "hi" or "thanks". Input is normalized (trim + lowercase), checked for an
//! exact phrase first, then scanned for the first table phrase the input
//! contains as a substring. The scan runs in declaration order of
//! [`PHRASE_TABLE`], so precedence between overlapping phrases is the order
//! they are written below.

use rand::seq::SliceRandom;

/// Static phrase table: normalized phrase -> reply variants.
///
/// Declaration order is the substring-match precedence.
const PHRASE_TABLE: &[(&str, &[&str])] = &[
    (
        "hello",
        &[
            "Hello! How can I help you today?",
            "Hello there! What can I do for you?",
        ],
    ),
    (
        "hi",
        &["Hi! What's on your mind?", "Hi there! How can I help?"],
    ),
    ("hey", &["Hey! Need anything?"]),
    (
        "good morning",
        &["Good morning! Hope your day is off to a great start."],
    ),
    ("good evening", &["Good evening! How can I help?"]),
    (
        "thanks",
        &["You're welcome!", "Happy to help!", "Any time!"],
    ),
    ("thank you", &["You're welcome!", "My pleasure!"]),
    ("bye", &["Goodbye! Come back any time.", "See you around!"]),
    ("how are you", &["Doing great, thanks for asking! How about you?"]),
];

/// Returns a canned reply for trivial input, or `None` when the caller
/// should fall through to the backend gateway.
///
/// When a phrase carries several variants one is chosen uniformly at
/// random.
pub fn quick_reply(text: &str) -> Option<String> {
    let normalized = text.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    let variants = lookup(&normalized)?;
    variants
        .choose(&mut rand::thread_rng())
        .map(|reply| (*reply).to_string())
}

/// All reply variants registered for a phrase, for callers (and tests)
/// that need the full set rather than a random pick.
pub fn reply_variants(phrase: &str) -> Option<&'static [&'static str]> {
    let normalized = phrase.trim().to_lowercase();
    PHRASE_TABLE
        .iter()
        .find(|(key, _)| *key == normalized)
        .map(|(_, variants)| *variants)
}

fn lookup(normalized: &str) -> Option<&'static [&'static str]> {
    // Exact phrase wins over any substring hit.
    if let Some((_, variants)) = PHRASE_TABLE.iter().find(|(key, _)| *key == normalized) {
        return Some(variants);
    }

    PHRASE_TABLE
        .iter()
        .find(|(key, _)| normalized.contains(key))
        .map(|(_, variants)| *variants)
}
