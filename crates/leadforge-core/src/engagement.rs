//! Reply classification.
//!
//! A keyword heuristic rather than a model call: the backend never talks to
//! an LLM, and the dashboard only needs a coarse signal.

use crate::models::Sentiment;

const UNSUBSCRIBE_PHRASES: &[&str] = &[
    "unsubscribe",
    "remove me",
    "stop emailing",
    "opt out",
    "opt-out",
    "take me off",
];

const NEGATIVE_PHRASES: &[&str] = &[
    "not interested",
    "no thanks",
    "no thank you",
    "don't contact",
    "do not contact",
    "wrong person",
    "not a fit",
    "spam",
];

const POSITIVE_PHRASES: &[&str] = &[
    "interested",
    "sounds good",
    "sounds great",
    "let's talk",
    "lets talk",
    "happy to chat",
    "book a call",
    "schedule",
    "tell me more",
    "love to",
];

/// Result of classifying one reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyClassification {
    pub sentiment: Sentiment,
    /// The sender asked to stop receiving email.
    pub unsubscribe: bool,
}

fn contains_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| text.contains(p))
}

/// Classify a reply by subject and body.
///
/// Negative phrases are checked before positive ones so that
/// "not interested" never counts as "interested".
pub fn classify_reply(subject: Option<&str>, body: &str) -> ReplyClassification {
    let text = format!("{} {}", subject.unwrap_or_default(), body).to_lowercase();

    if contains_any(&text, UNSUBSCRIBE_PHRASES) {
        return ReplyClassification {
            sentiment: Sentiment::Negative,
            unsubscribe: true,
        };
    }
    let sentiment = if contains_any(&text, NEGATIVE_PHRASES) {
        Sentiment::Negative
    } else if contains_any(&text, POSITIVE_PHRASES) {
        Sentiment::Positive
    } else {
        Sentiment::Neutral
    };
    ReplyClassification {
        sentiment,
        unsubscribe: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsubscribe_request() {
        let c = classify_reply(Some("Re: intro"), "Please REMOVE ME from this list");
        assert_eq!(c.sentiment, Sentiment::Negative);
        assert!(c.unsubscribe);

        let c = classify_reply(Some("Unsubscribe"), "");
        assert!(c.unsubscribe);
    }

    #[test]
    fn test_not_interested_is_negative() {
        let c = classify_reply(None, "Thanks, but we're not interested right now.");
        assert_eq!(c.sentiment, Sentiment::Negative);
        assert!(!c.unsubscribe);
    }

    #[test]
    fn test_positive_reply() {
        let c = classify_reply(Some("Re: quick question"), "Sounds good, can we schedule Tuesday?");
        assert_eq!(c.sentiment, Sentiment::Positive);
    }

    #[test]
    fn test_neutral_reply() {
        let c = classify_reply(None, "I'm out of office until Monday.");
        assert_eq!(c.sentiment, Sentiment::Neutral);
        assert!(!c.unsubscribe);
    }
}
