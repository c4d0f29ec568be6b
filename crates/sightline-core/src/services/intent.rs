//! Chat intent classification.
//!
//! [`KeywordClassifier`] is a substring heuristic. Callers only see the
//! [`IntentClassifier`] trait, so a structured intent model can replace it
//! without touching the router.

use strum::IntoStaticStr;

/// Default number of images for "recent changes" when the text has no number.
pub const DEFAULT_RECENT_COUNT: usize = 2;
/// Bounds for the "recent changes" count.
pub const MIN_RECENT_COUNT: usize = 1;
pub const MAX_RECENT_COUNT: usize = 10;

const RECENT_KEYWORDS: [&str; 3] = ["latest", "recent", "change"];
const HISTORY_KEYWORDS: [&str; 3] = ["all", "everything", "summary"];

/// Which read-only query, if any, should ground the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Intent {
    /// The `count` most recent images.
    RecentChanges { count: usize },
    /// Every image, newest first.
    FullHistory,
    /// No tool; plain conversation.
    Chat,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

pub trait IntentClassifier: Send + Sync + 'static {
    fn classify(&self, text: &str) -> Intent;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl IntentClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Intent {
        let lower = text.to_lowercase();
        if RECENT_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Intent::RecentChanges {
                count: extract_count(text),
            }
        } else if HISTORY_KEYWORDS.iter().any(|k| lower.contains(k)) {
            Intent::FullHistory
        } else {
            Intent::Chat
        }
    }
}

/// First integer literal in `text`, defaulting to [`DEFAULT_RECENT_COUNT`] and
/// clamped to `[MIN_RECENT_COUNT, MAX_RECENT_COUNT]`. Literals too large for
/// `usize` clamp to the maximum.
pub fn extract_count(text: &str) -> usize {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    if digits.is_empty() {
        return DEFAULT_RECENT_COUNT;
    }
    digits
        .parse::<usize>()
        .unwrap_or(MAX_RECENT_COUNT)
        .clamp(MIN_RECENT_COUNT, MAX_RECENT_COUNT)
}
