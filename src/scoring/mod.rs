//! Subject relevance scoring.
//!
//! Builds a TF-IDF vector space over the subject descriptions, the article
//! description, and the fixed background corpus, then scores each subject as
//! the cosine similarity between its vector and the article's vector.
//!
//! Document order inside the space is: all subject descriptions in input
//! order, then the article, then the background documents. The order only
//! matters internally for slicing the right rows back out; scores do not
//! depend on it.
//!
//! With non-negative term weights every score lands in [0.0, 1.0], and the
//! whole computation is deterministic for a fixed corpus and stop-word list.

pub mod corpus;

pub use corpus::BackgroundCorpus;

use std::collections::HashMap;
use std::sync::Arc;

use ndarray::{Array1, Array2};
use regex::Regex;

use crate::error::ScoreError;
use crate::models::{Article, Subject};

/// Word tokens: letters and digits, with embedded apostrophes kept so
/// contractions match the stop-word list.
const TOKEN_PATTERN: &str = r"[a-z0-9]+(?:'[a-z]+)?";

/// TF-IDF scoring engine.
///
/// Cheap to share: holds only a reference to the read-only corpus and a
/// compiled token pattern.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    corpus: Arc<BackgroundCorpus>,
    token_pattern: Regex,
}

impl ScoringEngine {
    /// Creates an engine over the given background corpus.
    ///
    /// # Errors
    ///
    /// Returns [`ScoreError::EmptyCorpus`] if the corpus has no documents.
    pub fn new(corpus: Arc<BackgroundCorpus>) -> Result<Self, ScoreError> {
        if corpus.is_empty() {
            return Err(ScoreError::EmptyCorpus);
        }
        let token_pattern = Regex::new(TOKEN_PATTERN)?;
        Ok(Self {
            corpus,
            token_pattern,
        })
    }

    /// Scores every subject against the article.
    ///
    /// Returns the same subjects in the same order with only `score`
    /// overwritten; no subject is added or removed. Degenerate vectors (no
    /// weighted terms on either side) score 0.0.
    pub fn score(
        &self,
        article: &Article,
        mut subjects: Vec<Subject>,
    ) -> Result<Vec<Subject>, ScoreError> {
        if subjects.is_empty() {
            return Ok(subjects);
        }

        let mut documents: Vec<Vec<String>> = subjects
            .iter()
            .map(|subject| self.tokenize(&subject.describe()))
            .collect();
        documents.push(self.tokenize(&article.describe()));
        for doc in self.corpus.documents() {
            documents.push(self.tokenize(doc));
        }

        let tfidf = self.tfidf_matrix(&documents);
        let article_vector = tfidf.row(subjects.len()).to_owned();

        for (i, subject) in subjects.iter_mut().enumerate() {
            let subject_vector = tfidf.row(i).to_owned();
            subject.score = cosine_similarity(&subject_vector, &article_vector);
        }

        Ok(subjects)
    }

    /// Lowercased word tokens with stop words removed.
    fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.token_pattern
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .filter(|token| !self.corpus.is_stop_word(token))
            .collect()
    }

    /// Term-frequency matrix reweighted by smoothed inverse document
    /// frequency: `ln((1 + n) / (1 + df)) + 1`, which keeps every weight
    /// strictly positive.
    fn tfidf_matrix(&self, documents: &[Vec<String>]) -> Array2<f64> {
        let mut vocabulary: HashMap<&str, usize> = HashMap::new();
        for doc in documents {
            for term in doc {
                let next = vocabulary.len();
                vocabulary.entry(term.as_str()).or_insert(next);
            }
        }

        let n_docs = documents.len();
        let n_terms = vocabulary.len();
        let mut matrix = Array2::zeros((n_docs, n_terms));

        for (d, doc) in documents.iter().enumerate() {
            for term in doc {
                matrix[[d, vocabulary[term.as_str()]]] += 1.0;
            }
        }

        let mut idf = Array1::zeros(n_terms);
        for t in 0..n_terms {
            let df = (0..n_docs).filter(|&d| matrix[[d, t]] > 0.0).count() as f64;
            idf[t] = ((1.0 + n_docs as f64) / (1.0 + df)).ln() + 1.0;
        }

        for d in 0..n_docs {
            for t in 0..n_terms {
                matrix[[d, t]] *= idf[t];
            }
        }

        matrix
    }
}

/// Computes cosine similarity between two vectors.
///
/// Returns 0.0 when either vector is degenerate (near-zero norm).
pub fn cosine_similarity(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    let dot_product: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a < 1e-10 || norm_b < 1e-10 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
