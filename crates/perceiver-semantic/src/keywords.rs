//! Tokenizing and keyword extraction for instructions and element text

use unicode_segmentation::UnicodeSegmentation;

/// Words that carry no signal about which element is meant.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "in", "is", "it",
    "its", "of", "on", "or", "that", "the", "to", "was", "will", "with", "this", "but", "your",
    "you", "then", "into", "area", "here", "there", "please", "now",
];

/// Keyword extractor
#[derive(Clone, Debug)]
pub struct KeywordExtractor {
    stop_words: Vec<String>,
    min_len: usize,
}

impl KeywordExtractor {
    /// Create new keyword extractor
    pub fn new() -> Self {
        Self {
            stop_words: STOP_WORDS.iter().map(|s| s.to_string()).collect(),
            min_len: 3,
        }
    }

    /// Extend the stop-word list.
    pub fn with_stop_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_words
            .extend(words.into_iter().map(|w| w.into().to_lowercase()));
        self
    }

    /// Keywords in order of first appearance, deduplicated.
    ///
    /// `exclude` removes additional words (e.g. action verbs).
    pub fn extract(&self, text: &str, exclude: &[&str]) -> Vec<String> {
        let mut keywords: Vec<String> = Vec::new();
        for word in tokenize(text) {
            if word.chars().count() < self.min_len
                || self.stop_words.contains(&word)
                || exclude.contains(&word.as_str())
                || keywords.contains(&word)
            {
                continue;
            }
            keywords.push(word);
        }
        keywords
    }

    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.iter().any(|w| w == word)
    }
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase words split on Unicode word boundaries.
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

/// Whole-word (or whole-phrase) containment.
pub fn contains_phrase(words: &[String], phrase: &str) -> bool {
    let needle = tokenize(phrase);
    if needle.is_empty() || needle.len() > words.len() {
        return false;
    }
    words
        .windows(needle.len())
        .any(|window| window.iter().zip(&needle).all(|(a, b)| a == b))
}

/// Index of the first whole-word occurrence of `word`.
pub fn word_position(words: &[String], word: &str) -> Option<usize> {
    words.iter().position(|w| w == word)
}
