//! Keyword mining from item titles, descriptions and tags.
//!
//! Deterministic: output depends only on the input text and the static
//! stop-word list. Order is first-seen order.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

/// Title tokens shorter than this are dropped.
pub const TITLE_MIN_LEN: usize = 4;
/// Description tokens shorter than this are dropped.
pub const DESCRIPTION_MIN_LEN: usize = 6;
/// Only this many qualifying description tokens are considered.
pub const DESCRIPTION_TOKEN_LIMIT: usize = 3;
/// Hard cap on the extractor's output.
pub const MAX_KEYWORDS: usize = 5;

const STOP_WORDS: &[&str] = &[
    "the", "and", "you", "that", "was", "for", "are", "with", "his", "they", "this", "have",
    "from", "one", "had", "word", "but", "not", "what", "all",
];

fn title_separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\s\-|,.!?]+").expect("Invalid regex pattern"))
}

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Lower-cased tokens of `text` that are at least `min_len` chars and not stop words.
fn qualifying_tokens<'a>(
    tokens: impl Iterator<Item = &'a str> + 'a,
    min_len: usize,
) -> impl Iterator<Item = String> + 'a {
    tokens
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .filter(move |t| t.chars().count() >= min_len && !is_stop_word(t))
}

/// Ordered, de-duplicated accumulator capped at `MAX_KEYWORDS`.
#[derive(Default)]
struct KeywordSet {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl KeywordSet {
    fn extend(&mut self, words: impl IntoIterator<Item = String>) {
        for word in words {
            if self.seen.insert(word.clone()) {
                self.ordered.push(word);
            }
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.ordered.truncate(MAX_KEYWORDS);
        self.ordered
    }
}

/// Candidate keywords from a batch of search-result titles.
pub fn keywords_from_titles<'a, I>(titles: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut set = KeywordSet::default();
    for title in titles {
        set.extend(qualifying_tokens(title_separators().split(title), TITLE_MIN_LEN));
    }
    set.finish()
}

/// Candidate keywords from a single item's title, description and existing tags.
pub fn keywords_from_item(title: &str, description: &str, tags: &[String]) -> Vec<String> {
    let mut set = KeywordSet::default();
    set.extend(qualifying_tokens(title_separators().split(title), TITLE_MIN_LEN));
    set.extend(
        qualifying_tokens(description.split_whitespace(), DESCRIPTION_MIN_LEN)
            .take(DESCRIPTION_TOKEN_LIMIT),
    );
    set.extend(
        tags.iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty()),
    );
    set.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_titles_split_on_punctuation() {
        let kws = keywords_from_titles(["Golang Tutorial - Channels|Goroutines, explained!"]);
        assert_eq!(kws, vec!["golang", "tutorial", "channels", "goroutines", "explained"]);
    }

    #[test]
    fn test_titles_drop_short_and_stop_words() {
        let kws = keywords_from_titles(["This is how you write Rust with that crate"]);
        // "this", "with", "that" are stop words; "is", "how", "you" are too short
        assert_eq!(kws, vec!["write", "rust", "crate"]);
    }

    #[test]
    fn test_titles_dedup_preserves_first_seen_order() {
        let kws = keywords_from_titles(["Rust async", "ASYNC rust tokio"]);
        assert_eq!(kws, vec!["rust", "async", "tokio"]);
    }

    #[test]
    fn test_output_capped_at_five() {
        let kws = keywords_from_titles(["alpha bravo charlie delta echoes foxtrot golfer"]);
        assert_eq!(kws.len(), MAX_KEYWORDS);
        assert_eq!(kws[0], "alpha");
        assert_eq!(kws[4], "echoes");
    }

    #[test]
    fn test_item_description_threshold_and_limit() {
        let kws = keywords_from_item(
            "Tokio",
            "short words here then several lengthy tokens appear afterwards everywhere",
            &[],
        );
        // description: only tokens >= 6 chars, first three of them
        assert_eq!(kws, vec!["tokio", "several", "lengthy", "tokens"]);
    }

    #[test]
    fn test_item_tags_appended_last() {
        let tags = vec!["Systems".to_string(), " ".to_string(), "tokio".to_string()];
        let kws = keywords_from_item("Tokio internals", "", &tags);
        assert_eq!(kws, vec!["tokio", "internals", "systems"]);
    }

    #[test]
    fn test_deterministic() {
        let a = keywords_from_item("Same title words", "identical description content", &[]);
        let b = keywords_from_item("Same title words", "identical description content", &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_input() {
        assert!(keywords_from_titles(std::iter::empty::<&str>()).is_empty());
        assert!(keywords_from_item("", "", &[]).is_empty());
    }
}
