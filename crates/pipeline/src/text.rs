//! TF-IDF vectorization of free-text documents.
//!
//! Documents are first passed through a `TextCleaner`, then weighted with
//! smoothed TF-IDF:
//!
//! ```text
//! idf(t)      = ln((1 + n) / (1 + df(t))) + 1
//! weight(t,d) = count(t, d) * idf(t), then L2-normalised per document
//! ```
//!
//! Tokens are runs of at least two word characters. The vocabulary is sorted,
//! which fixes the order of the text feature names.

use crate::traits::TextCleaner;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Common English words removed by `StopwordCleaner`
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just",
    "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once",
    "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Default document cleaner: lowercases, turns punctuation into spaces and
/// drops stop words.
#[derive(Debug, Clone)]
pub struct StopwordCleaner {
    stop_words: HashSet<String>,
}

impl StopwordCleaner {
    pub fn new() -> Self {
        Self::with_stop_words(ENGLISH_STOP_WORDS)
    }

    pub fn with_stop_words(words: &[&str]) -> Self {
        Self {
            stop_words: words.iter().map(|w| w.to_lowercase()).collect(),
        }
    }
}

impl Default for StopwordCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl TextCleaner for StopwordCleaner {
    fn name(&self) -> &str {
        "StopwordCleaner"
    }

    fn clean(&self, raw: &str) -> String {
        raw.to_lowercase()
            .split(|c: char| !is_word_char(c))
            .filter(|word| !word.is_empty() && !self.stop_words.contains(*word))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Sparse TF-IDF output: one term→weight map per input document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextFeatures {
    pub rows: Vec<BTreeMap<String, f32>>,
    pub feature_names: Vec<String>,
}

impl TextFeatures {
    /// `n` empty rows and no vocabulary
    pub fn empty(n: usize) -> Self {
        Self {
            rows: vec![BTreeMap::new(); n],
            feature_names: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TfidfVectorizer {
    smooth_idf: bool,
    normalize: bool,
}

impl Default for TfidfVectorizer {
    fn default() -> Self {
        Self {
            smooth_idf: true,
            normalize: true,
        }
    }
}

impl TfidfVectorizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one to document frequencies, as if an extra document held every term
    pub fn with_smooth_idf(mut self, smooth: bool) -> Self {
        self.smooth_idf = smooth;
        self
    }

    /// L2-normalise each document row
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Clean `documents` with `cleaner`, then weight them
    pub fn vectorize(&self, documents: &[String], cleaner: &dyn TextCleaner) -> TextFeatures {
        let cleaned: Vec<String> = documents.iter().map(|doc| cleaner.clean(doc)).collect();
        tracing::debug!("Cleaned {} documents with {}", cleaned.len(), cleaner.name());
        self.fit_transform(&cleaned)
    }

    /// Learn the vocabulary and IDF of `documents` and weight each of them.
    ///
    /// Always returns exactly one row per document. A corpus with no usable
    /// token gives empty rows and an empty vocabulary.
    pub fn fit_transform(&self, documents: &[String]) -> TextFeatures {
        if docs_empty(documents) {
            return TextFeatures::empty(documents.len());
        }

        let tokenized: Vec<Vec<String>> = documents.iter().map(|doc| tokenize(doc)).collect();

        let mut document_frequency: BTreeMap<&str, usize> = BTreeMap::new();
        for tokens in &tokenized {
            let unique: BTreeSet<&str> = tokens.iter().map(String::as_str).collect();
            for term in unique {
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }
        if document_frequency.is_empty() {
            return TextFeatures::empty(documents.len());
        }

        let n = documents.len() as f64;
        let idf: HashMap<&str, f64> = document_frequency
            .iter()
            .map(|(&term, &df)| (term, self.idf(n, df as f64)))
            .collect();

        let rows = tokenized
            .iter()
            .map(|tokens| {
                let mut counts: HashMap<&str, f64> = HashMap::new();
                for token in tokens {
                    *counts.entry(token.as_str()).or_insert(0.0) += 1.0;
                }
                let mut weights: Vec<(&str, f64)> = counts
                    .into_iter()
                    .map(|(term, count)| (term, count * idf[term]))
                    .collect();

                if self.normalize {
                    let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
                    if norm > 0.0 {
                        for (_, w) in weights.iter_mut() {
                            *w /= norm;
                        }
                    }
                }

                weights
                    .into_iter()
                    .filter(|(_, w)| *w != 0.0)
                    .map(|(term, w)| (term.to_string(), w as f32))
                    .collect()
            })
            .collect();

        TextFeatures {
            rows,
            feature_names: document_frequency.keys().map(|t| t.to_string()).collect(),
        }
    }

    fn idf(&self, n: f64, df: f64) -> f64 {
        if self.smooth_idf {
            ((1.0 + n) / (1.0 + df)).ln() + 1.0
        } else {
            (n / df).ln() + 1.0
        }
    }
}

/// True if no document has any non-whitespace content
pub(crate) fn docs_empty(documents: &[String]) -> bool {
    documents.iter().all(|doc| doc.trim().is_empty())
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Lowercased runs of word characters, at least two characters long
pub(crate) fn tokenize(document: &str) -> Vec<String> {
    document
        .to_lowercase()
        .split(|c: char| !is_word_char(c))
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn test_whitespace_corpus_returns_empty_rows() {
        let features = TfidfVectorizer::new().fit_transform(&docs(&["", "   ", "\t\n"]));

        assert_eq!(features.rows.len(), 3);
        assert!(features.rows.iter().all(|row| row.is_empty()));
        assert!(features.feature_names.is_empty());
    }

    #[test]
    fn test_no_usable_tokens_returns_empty_rows() {
        let features = TfidfVectorizer::new().fit_transform(&docs(&["a b", "c"]));
        assert_eq!(features.rows.len(), 2);
        assert!(features.feature_names.is_empty());
    }

    #[test]
    fn test_identical_documents_get_identical_weights() {
        let features = TfidfVectorizer::new().fit_transform(&docs(&["rust course", "rust course"]));

        assert_eq!(features.rows[0], features.rows[1]);
        assert!(features.rows[0].values().all(|w| *w > 0.0));
        assert_eq!(features.feature_names, vec!["course", "rust"]);
    }

    #[test]
    fn test_rarer_term_weighs_more() {
        let features = TfidfVectorizer::new().fit_transform(&docs(&["rust safety", "rust speed"]));

        let row = &features.rows[0];
        assert!(row["safety"] > row["rust"]);
        assert!(!row.contains_key("speed"));
    }

    #[test]
    fn test_rows_are_unit_length() {
        let features =
            TfidfVectorizer::new().fit_transform(&docs(&["data data science", "science fiction"]));
        for row in &features.rows {
            let norm: f32 = row.values().map(|w| w * w).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_smoothed_idf_values() {
        let features = TfidfVectorizer::new()
            .with_normalize(false)
            .fit_transform(&docs(&["alpha beta", "alpha", ""]));

        // n = 3: idf(alpha) = ln(4/3) + 1, idf(beta) = ln(4/2) + 1
        let expected_alpha = ((4.0f64 / 3.0).ln() + 1.0) as f32;
        let expected_beta = ((4.0f64 / 2.0).ln() + 1.0) as f32;
        assert!((features.rows[0]["alpha"] - expected_alpha).abs() < 1e-6);
        assert!((features.rows[0]["beta"] - expected_beta).abs() < 1e-6);
        assert!(features.rows[2].is_empty());
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Hello, World! a_b x 42"),
            vec!["hello", "world", "a_b", "42"]
        );
    }

    #[test]
    fn test_stopword_cleaner() {
        let cleaner = StopwordCleaner::new();
        assert_eq!(cleaner.clean("The Basics of Rust, and more!"), "basics rust");
        assert_eq!(cleaner.clean(""), "");
    }

    #[test]
    fn test_vectorize_cleans_first() {
        let cleaner = StopwordCleaner::new();
        let features = TfidfVectorizer::new().vectorize(&docs(&["the and of", "to be"]), &cleaner);

        assert_eq!(features.rows.len(), 2);
        assert!(features.feature_names.is_empty());
    }
}
