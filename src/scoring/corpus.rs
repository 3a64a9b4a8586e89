//! Fixed background corpus and stop-word list.
//!
//! The corpus gives the IDF statistics realistic weight: it contributes no
//! output text of its own, it only anchors how rare or common a term is in
//! general English. Both the documents and the stop words are embedded at
//! compile time, loaded once at startup, and shared read-only across all
//! workers.

use std::collections::HashSet;

const STOPWORDS: &str = include_str!("../../data/stopwords.txt");

const DOCUMENTS: &[&str] = &[
    include_str!("../../data/corpus/civic.txt"),
    include_str!("../../data/corpus/weather.txt"),
    include_str!("../../data/corpus/sports.txt"),
    include_str!("../../data/corpus/economy.txt"),
    include_str!("../../data/corpus/health.txt"),
    include_str!("../../data/corpus/technology.txt"),
    include_str!("../../data/corpus/agriculture.txt"),
    include_str!("../../data/corpus/education.txt"),
    include_str!("../../data/corpus/culture.txt"),
];

/// Embedded general-English documents plus the stop-word list.
#[derive(Debug)]
pub struct BackgroundCorpus {
    documents: Vec<String>,
    stop_words: HashSet<String>,
}

impl Default for BackgroundCorpus {
    fn default() -> Self {
        Self::embedded()
    }
}

impl BackgroundCorpus {
    /// Builds a corpus from explicit documents and stop words.
    pub fn new(documents: Vec<String>, stop_words: HashSet<String>) -> Self {
        Self {
            documents,
            stop_words,
        }
    }

    /// Loads the compiled-in corpus and stop-word list.
    pub fn embedded() -> Self {
        let documents = DOCUMENTS
            .iter()
            .map(|doc| doc.trim().to_string())
            .filter(|doc| !doc.is_empty())
            .collect();

        let stop_words = STOPWORDS
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_lowercase)
            .collect();

        Self {
            documents,
            stop_words,
        }
    }

    /// The background documents, in their fixed order.
    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    /// True if `term` (already lowercased) is a stop word.
    pub fn is_stop_word(&self, term: &str) -> bool {
        self.stop_words.contains(term)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
