//! Failure-message classification.
//!
//! Upstream failures only expose a reason string, so the decision between
//! relay fallback, "no transcript" and a plain error is made by keyword
//! matching. Keep every keyword in the tables below.

use serde::Serialize;

/// Category of an upstream failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The service's network origin is being rejected; worth retrying through a relay
    Blocked,
    /// Captions are disabled or missing for the video; retrying cannot help
    Unavailable,
    /// Anything else
    Other,
}

/// A message is "unavailable" when it mentions the subject AND one of the qualifiers
const UNAVAILABLE_SUBJECT: &str = "transcript";
const UNAVAILABLE_QUALIFIERS: &[&str] = &["disabled", "not available"];

/// Substrings that indicate the caller's origin is blocked
const BLOCKING_PHRASES: &[&str] = &[
    "blocked",
    "blocking",
    "cloud provider",
    "requests from your ip",
    "too many requests",
    "ip address",
];

/// Whole words that indicate blocking; matched as tokens, since "ip" appears inside "transcript"
const BLOCKING_WORDS: &[&str] = &["ip"];

/// Classify a failure message.
///
/// Unavailability is checked first: those messages say "transcript", which
/// would otherwise trip the blocking check.
pub fn classify_failure(message: &str) -> FailureKind {
    let lower = message.to_lowercase();

    if lower.contains(UNAVAILABLE_SUBJECT)
        && UNAVAILABLE_QUALIFIERS.iter().any(|q| lower.contains(q))
    {
        return FailureKind::Unavailable;
    }

    if BLOCKING_PHRASES.iter().any(|p| lower.contains(p)) || has_word(&lower, BLOCKING_WORDS) {
        return FailureKind::Blocked;
    }

    FailureKind::Other
}

fn has_word(lower: &str, words: &[&str]) -> bool {
    lower
        .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .any(|token| words.contains(&token))
}
