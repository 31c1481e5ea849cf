//! Self-check pass over outgoing drafts. Catches near-duplicate
//! replies to the same user and flat, marker-less phrasing, then
//! rewraps the draft with an opening/closing pair the user has not
//! seen recently.

use rand::seq::SliceRandom;

use crate::normalize::normalize_text;

/// Similarity against the single most recent reply that triggers a
/// rewrite; tighter than the window-wide bound below.
pub const DEFAULT_RECENT_SIMILARITY: f64 = 0.5;

/// Similarity against any reply in the recent window that triggers a
/// rewrite.
const HISTORY_SIMILARITY: f64 = 0.6;

const OPENINGS: &[&str] = &[
    "Look {name},",
    "Alright {name},",
    "Here's the thing:",
    "Quick one for you:",
    "So, to keep you posted:",
    "Right then,",
    "Okay, here we go:",
    "For what it's worth,",
];

const CLOSINGS: &[&str] = &[
    "Want me to change anything?",
    "Anything else you need?",
    "Sound good?",
    "Just say the word if there's more.",
    "I'm here if you need anything else.",
    "Clear enough?",
    "Shout if something's off.",
];

const DISCOURSE_MARKERS: &[&str] = &["look", "alright", "so,", "right", "okay", "here"];

/// Token-Jaccard similarity over normalized tokens longer than two
/// characters.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let tokens = |text: &str| -> std::collections::HashSet<String> {
        normalize_text(text)
            .split_whitespace()
            .filter(|token| token.chars().count() > 2)
            .map(str::to_string)
            .collect()
    };

    let set_a = tokens(a);
    let set_b = tokens(b);
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count() as f64;
    let union = set_a.union(&set_b).count() as f64;
    intersection / union
}

#[derive(Clone, Debug)]
pub struct SelfCheck {
    recent_similarity: f64,
}

impl Default for SelfCheck {
    fn default() -> Self {
        Self { recent_similarity: DEFAULT_RECENT_SIMILARITY }
    }
}

impl SelfCheck {
    pub fn new(recent_similarity: f64) -> Self {
        Self { recent_similarity }
    }

    /// Return the draft unchanged when it reads fresh, or a rewrapped
    /// variant when it is too close to what the user just heard.
    pub fn review(&self, draft: &str, name: &str, recent_replies: &[String]) -> String {
        let too_similar = recent_replies
            .iter()
            .any(|reply| jaccard_similarity(draft, reply) > HISTORY_SIMILARITY);
        let repeats_last = recent_replies
            .first()
            .map(|last| jaccard_similarity(draft, last) > self.recent_similarity)
            .unwrap_or(false);
        let lacks_markers = {
            let lowered = draft.to_lowercase();
            !DISCOURSE_MARKERS.iter().any(|marker| lowered.contains(marker))
        };

        if too_similar || repeats_last || lacks_markers {
            rewrap(draft, name, recent_replies)
        } else {
            draft.to_string()
        }
    }
}

/// Wrap the draft in an opening/closing pair, preferring phrases not
/// present in any recent reply and falling back to the full bank when
/// every phrase has been used lately.
fn rewrap(draft: &str, name: &str, recent_replies: &[String]) -> String {
    let mut rng = rand::thread_rng();

    let fresh_openings: Vec<&&str> = OPENINGS
        .iter()
        .filter(|opening| {
            let rendered = opening.replace("{name}", name);
            !recent_replies.iter().any(|reply| reply.contains(&rendered))
        })
        .collect();
    let fresh_closings: Vec<&&str> = CLOSINGS
        .iter()
        .filter(|closing| !recent_replies.iter().any(|reply| reply.contains(**closing)))
        .collect();

    let opening = if fresh_openings.is_empty() {
        OPENINGS.choose(&mut rng).copied().unwrap_or(OPENINGS[0])
    } else {
        fresh_openings.choose(&mut rng).map(|o| **o).unwrap_or(OPENINGS[0])
    }
    .replace("{name}", name);

    let closing = if fresh_closings.is_empty() {
        CLOSINGS.choose(&mut rng).copied().unwrap_or(CLOSINGS[0])
    } else {
        fresh_closings.choose(&mut rng).map(|c| **c).unwrap_or(CLOSINGS[0])
    };

    format!("{opening} {draft} {closing}")
}

#[cfg(test)]
mod tests {
    use super::{jaccard_similarity, SelfCheck};

    #[test]
    fn identical_strings_have_full_similarity() {
        assert_eq!(jaccard_similarity("your balance is ready", "your balance is ready"), 1.0);
    }

    #[test]
    fn disjoint_strings_have_zero_similarity() {
        assert_eq!(jaccard_similarity("alpha bravo charlie", "delta echo foxtrot"), 0.0);
    }

    #[test]
    fn short_tokens_are_ignored() {
        // Every token has <= 2 characters, so neither side contributes.
        assert_eq!(jaccard_similarity("a b c", "a b c"), 0.0);
    }

    #[test]
    fn repeated_draft_is_rewritten_differently() {
        let check = SelfCheck::default();
        let first = check.review("The transfer draft is ready for review.", "Sam", &[]);
        let second =
            check.review("The transfer draft is ready for review.", "Sam", &[first.clone()]);
        assert_ne!(first, second);
        assert!(second.contains("The transfer draft is ready for review."));
    }

    #[test]
    fn fresh_marked_draft_passes_through() {
        let check = SelfCheck::default();
        let draft = "Alright, the ingest finished and three passages were indexed.";
        let out = check.review(draft, "Sam", &["totally unrelated prior reply".to_string()]);
        assert_eq!(out, draft);
    }

    #[test]
    fn markerless_draft_gets_wrapped() {
        let check = SelfCheck::default();
        let draft = "Transfer executed.";
        let out = check.review(draft, "Sam", &[]);
        assert_ne!(out, draft);
        assert!(out.contains(draft));
    }

    #[test]
    fn wrapper_prefers_unused_phrases() {
        let check = SelfCheck::default();
        let recent = vec!["Look Sam, something happened. Sound good?".to_string()];
        for _ in 0..20 {
            let out = check.review("Transfer executed.", "Sam", &recent);
            assert!(!out.starts_with("Look Sam,"));
            assert!(!out.ends_with("Sound good?"));
        }
    }
}
